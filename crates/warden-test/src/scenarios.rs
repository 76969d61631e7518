//! Reference scenarios
//!
//! Each scenario scripts a guest against a fully wired host and records
//! every expectation that did not hold. Tests assert `passed()`; the report
//! keeps the failures readable when one does not.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use warden_capability::{names, CapabilityRegistry, FactoryResult, MemoryStorage, StorageApi};
use warden_core::{SessionEndReason, ValidationMode, WardenResult};
use warden_emit::{DropReason, PipelineConfig};
use warden_runtime::HostConfig;
use warden_session::DropCode;

use crate::{HarnessConfig, ScenarioHarness};

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug)]
pub struct ScenarioReport {
    pub name: &'static str,
    pub checks: usize,
    pub failures: Vec<String>,
}

impl ScenarioReport {
    fn new(name: &'static str) -> Self {
        ScenarioReport {
            name,
            checks: 0,
            failures: Vec::new(),
        }
    }

    fn check(&mut self, ok: bool, what: impl Into<String>) {
        self.checks += 1;
        if !ok {
            self.failures.push(what.into());
        }
    }

    fn fail(name: &'static str, error: impl std::fmt::Display) -> Self {
        let mut report = Self::new(name);
        report.check(false, format!("setup: {}", error));
        report
    }

    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

fn level_started(session_id: &str) -> Value {
    json!({"kind": "LEVEL_STARTED", "sessionId": session_id, "levelId": "L1", "difficulty": 3})
}

// ============================================================================
// SCENARIOS
// ============================================================================

/// Events around one session: before, during, with a foreign id, and after
pub fn scenario_session_gate() -> ScenarioReport {
    const NAME: &str = "session_gate";
    match run_session_gate() {
        Ok(report) => report,
        Err(e) => ScenarioReport::fail(NAME, e),
    }
}

fn run_session_gate() -> WardenResult<ScenarioReport> {
    let mut report = ScenarioReport::new("session_gate");
    let harness = ScenarioHarness::new(HarnessConfig::default())?;

    report.check(
        !harness.emit_and_check(level_started("s1")),
        "LEVEL_STARTED before any session was delivered",
    );
    report.check(
        harness.last_gate_code() == Some(DropCode::BeforeSession),
        format!("expected BEFORE_SESSION, got {:?}", harness.last_gate_code()),
    );

    harness.host().start_session("s1")?;
    harness.advance_ms(1_500);
    report.check(
        harness.emit_and_check(level_started("s1")),
        "LEVEL_STARTED during s1 was not delivered",
    );
    if let Some(last) = harness.recorder().last() {
        report.check(
            last.session_id().map(|s| s.as_str()) == Some("s1"),
            format!("enriched session id {:?}", last.session_id()),
        );
        report.check(
            last.delivered_at().as_millis() == HarnessConfig::default().start_ms + 1_500,
            "delivery timestamp does not come from the host clock",
        );
        report.check(last.producer_id() == "warden-host", "unexpected producer id");
    }

    report.check(
        !harness.emit_and_check(level_started("s2")),
        "event for a foreign session was delivered",
    );
    report.check(
        harness.last_gate_code() == Some(DropCode::SessionIdMismatch),
        format!("expected SESSION_ID_MISMATCH, got {:?}", harness.last_gate_code()),
    );

    report.check(
        harness.emit_and_check(json!({"kind": "ERROR_OCCURRED", "errorType": "runtime", "message": "m", "recoverable": false})),
        "session-less error report was not delivered",
    );

    harness.host().end_session(SessionEndReason::Completed)?;
    report.check(
        !harness.emit_and_check(level_started("s1")),
        "LEVEL_STARTED after the session ended was delivered",
    );
    report.check(
        harness.last_gate_code() == Some(DropCode::AfterSessionEnded),
        format!("expected AFTER_SESSION_ENDED, got {:?}", harness.last_gate_code()),
    );

    let stats = harness.stats();
    report.check(stats.delivered == 2, format!("delivered {}", stats.delivered));
    report.check(
        stats.dropped_for(DropReason::NotAdmitted) == 3,
        format!("not admitted {}", stats.dropped_for(DropReason::NotAdmitted)),
    );
    Ok(report)
}

/// A burst past the rate limit, then recovery in the next window
pub fn scenario_rate_limit() -> ScenarioReport {
    const NAME: &str = "rate_limit";
    match run_rate_limit() {
        Ok(report) => report,
        Err(e) => ScenarioReport::fail(NAME, e),
    }
}

fn run_rate_limit() -> WardenResult<ScenarioReport> {
    let mut report = ScenarioReport::new("rate_limit");
    let harness = ScenarioHarness::new(HarnessConfig::default())?;
    harness.host().start_session("burst")?;

    for _ in 0..60 {
        harness.emit(level_started("burst"));
    }
    report.check(harness.recorder().len() == 50, format!("burst delivered {}", harness.recorder().len()));
    report.check(
        harness.drops_for(DropReason::RateLimited) == 10,
        format!("rate limited {}", harness.drops_for(DropReason::RateLimited)),
    );

    harness.advance_ms(999);
    report.check(
        !harness.emit_and_check(level_started("burst")),
        "event inside the exhausted window was delivered",
    );

    harness.advance_ms(1);
    report.check(
        harness.emit_and_check(level_started("burst")),
        "event in the next window was not delivered",
    );
    Ok(report)
}

/// DEV_LOG reaches handlers only in development
pub fn scenario_dev_log_filtering() -> ScenarioReport {
    const NAME: &str = "dev_log_filtering";
    match run_dev_log_filtering() {
        Ok(report) => report,
        Err(e) => ScenarioReport::fail(NAME, e),
    }
}

fn run_dev_log_filtering() -> WardenResult<ScenarioReport> {
    let mut report = ScenarioReport::new("dev_log_filtering");
    let log = json!({"kind": "DEV_LOG", "level": "debug", "message": "frame 12"});

    let production = ScenarioHarness::new(HarnessConfig::default())?;
    report.check(!production.emit_and_check(log.clone()), "DEV_LOG delivered in production");
    report.check(
        production.drops_for(DropReason::FilteredDevLog) == 1,
        "production DEV_LOG drop not recorded",
    );

    let development = ScenarioHarness::new(HarnessConfig::development())?;
    report.check(development.emit_and_check(log.clone()), "DEV_LOG dropped in development");
    development.host().start_session("d1")?;
    development.host().end_session(SessionEndReason::UserExit)?;
    report.check(
        !development.emit_and_check(log.clone()),
        "DEV_LOG after session end delivered without opt-in",
    );

    let mut lenient = HarnessConfig::development();
    lenient.host.gate.allow_dev_log_after_end = true;
    let lenient = ScenarioHarness::new(lenient)?;
    lenient.host().start_session("d2")?;
    lenient.host().end_session(SessionEndReason::Timeout)?;
    report.check(lenient.emit_and_check(log), "opted-in DEV_LOG after end was dropped");
    Ok(report)
}

/// Unknown kinds are rejected loudly in development and quietly in production
pub fn scenario_unknown_kind() -> ScenarioReport {
    const NAME: &str = "unknown_kind";
    match run_unknown_kind() {
        Ok(report) => report,
        Err(e) => ScenarioReport::fail(NAME, e),
    }
}

fn run_unknown_kind() -> WardenResult<ScenarioReport> {
    let mut report = ScenarioReport::new("unknown_kind");
    let raw = json!({"kind": "LEVEL_EXPLODED", "sessionId": "u1"});

    for mode in [ValidationMode::Production, ValidationMode::Development] {
        let config = HarnessConfig {
            host: HostConfig::default().with_mode(mode),
            ..Default::default()
        };
        let harness = ScenarioHarness::new(config)?;
        harness.host().start_session("u1")?;
        report.check(!harness.emit_and_check(raw.clone()), format!("unknown kind delivered in {}", mode));
        let invalid = harness.drops_for(DropReason::Invalid);
        report.check(invalid == 1, format!("{} invalid drops in {}", invalid, mode));
        let kind = harness.drops().last().and_then(|d| d.kind.clone());
        report.check(
            kind.as_deref() == Some("LEVEL_EXPLODED"),
            format!("drop record kind {:?}", kind),
        );
    }
    Ok(report)
}

/// Declared, registered, denied and undeclared capabilities
pub fn scenario_capability_fallback() -> ScenarioReport {
    const NAME: &str = "capability_fallback";
    match run_capability_fallback() {
        Ok(report) => report,
        Err(e) => ScenarioReport::fail(NAME, e),
    }
}

fn run_capability_fallback() -> WardenResult<ScenarioReport> {
    let mut report = ScenarioReport::new("capability_fallback");

    let backing = Arc::new(MemoryStorage::new());
    let shared = backing.clone();
    let mut registry = CapabilityRegistry::new();
    registry.register_storage(move || -> FactoryResult<dyn StorageApi> { Ok(shared.clone()) })?;
    registry.register_audio(|| Err("no audio device".into()))?;

    let config = HarnessConfig {
        host: HostConfig::default().with_capabilities([names::STORAGE, names::AUDIO]),
        ..Default::default()
    };
    let harness = ScenarioHarness::with_capabilities(config, registry)?;
    let guard = harness.host().capabilities();

    match guard.storage() {
        Ok(storage) => {
            report.check(storage.is_available(), "storage should be live");
            storage.set("best", "42".into());
            report.check(backing.get("best").as_deref() == Some("42"), "write did not reach backing store");
        }
        Err(e) => report.check(false, format!("storage: {}", e)),
    }

    match guard.audio() {
        Ok(audio) => {
            report.check(!audio.is_available(), "audio should have fallen back");
            report.check(
                audio.reason().map_or(false, |r| r.contains("no audio device")),
                format!("audio reason {:?}", audio.reason()),
            );
            audio.play("click", 1.0);
        }
        Err(e) => report.check(false, format!("audio: {}", e)),
    }

    report.check(guard.haptics().is_err(), "undeclared haptics resolved");
    Ok(report)
}

/// Run every reference scenario
pub fn all_scenarios() -> Vec<ScenarioReport> {
    vec![
        scenario_session_gate(),
        scenario_rate_limit(),
        scenario_dev_log_filtering(),
        scenario_unknown_kind(),
        scenario_capability_fallback(),
    ]
}

/// Host configuration tuned for throughput measurements
pub fn unthrottled_config(mode: ValidationMode) -> HostConfig {
    HostConfig {
        pipeline: PipelineConfig::default()
            .with_mode(mode)
            .with_rate_limit(u32::MAX, Duration::from_secs(1)),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_passed(report: ScenarioReport) {
        assert!(report.checks > 0, "{} checked nothing", report.name);
        assert!(report.passed(), "{} failed: {:#?}", report.name, report.failures);
    }

    #[test]
    fn test_session_gate() {
        assert_passed(scenario_session_gate());
    }

    #[test]
    fn test_rate_limit() {
        assert_passed(scenario_rate_limit());
    }

    #[test]
    fn test_dev_log_filtering() {
        assert_passed(scenario_dev_log_filtering());
    }

    #[test]
    fn test_unknown_kind() {
        assert_passed(scenario_unknown_kind());
    }

    #[test]
    fn test_capability_fallback() {
        assert_passed(scenario_capability_fallback());
    }

    #[test]
    fn test_all_scenarios() {
        let reports = all_scenarios();
        assert_eq!(reports.len(), 5);
        assert!(reports.iter().all(ScenarioReport::passed));
    }

    #[test]
    fn test_unthrottled_host_takes_bursts() {
        let config = HarnessConfig {
            host: unthrottled_config(ValidationMode::Production),
            ..Default::default()
        };
        let harness = ScenarioHarness::new(config).unwrap();
        harness.host().start_session("b").unwrap();
        for _ in 0..500 {
            harness.emit(level_started("b"));
        }
        assert_eq!(harness.recorder().len(), 500);
    }
}
