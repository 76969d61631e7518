//! Lifecycle-aware event gate
//!
//! Decision table:
//!
//! | Phase      | Admitted                                   | Dropped as          |
//! |------------|--------------------------------------------|---------------------|
//! | Initial    | `DEV_LOG` only                             | `BeforeSession`     |
//! | InSession  | events whose session id (if any) matches   | `SessionIdMismatch` |
//! | Ended      | `DEV_LOG` when `allow_dev_log_after_end`   | `AfterSessionEnded` |
//!
//! `SESSION_STARTED` is dropped while Initial: the host starts sessions, the
//! guest only acknowledges them.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use warden_core::{contain, GuestEvent, LifecycleContext};

/// Why the gate refused an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DropCode {
    BeforeSession,
    SessionIdMismatch,
    AfterSessionEnded,
}

impl DropCode {
    pub fn as_str(self) -> &'static str {
        match self {
            DropCode::BeforeSession => "BEFORE_SESSION",
            DropCode::SessionIdMismatch => "SESSION_ID_MISMATCH",
            DropCode::AfterSessionEnded => "AFTER_SESSION_ENDED",
        }
    }
}

impl fmt::Display for DropCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateDecision {
    Admit,
    Drop { code: DropCode, reason: String },
}

impl GateDecision {
    #[inline]
    pub fn is_admit(&self) -> bool {
        matches!(self, GateDecision::Admit)
    }

    pub fn code(&self) -> Option<DropCode> {
        match self {
            GateDecision::Admit => None,
            GateDecision::Drop { code, .. } => Some(*code),
        }
    }

    fn dropped(code: DropCode, reason: impl Into<String>) -> Self {
        GateDecision::Drop {
            code,
            reason: reason.into(),
        }
    }
}

/// Gate configuration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GateConfig {
    /// Keep diagnostics flowing after the session has ended
    pub allow_dev_log_after_end: bool,
}

/// Drop diagnostic: (event, reason, code)
pub type GateDropHook = Arc<dyn Fn(&GuestEvent, &str, DropCode) + Send + Sync>;

#[derive(Clone, Default)]
pub struct LifecycleGate {
    config: GateConfig,
    on_drop: Option<GateDropHook>,
}

impl LifecycleGate {
    pub fn new(config: GateConfig) -> Self {
        LifecycleGate {
            config,
            on_drop: None,
        }
    }

    pub fn with_on_drop<F>(mut self, hook: F) -> Self
    where
        F: Fn(&GuestEvent, &str, DropCode) + Send + Sync + 'static,
    {
        self.on_drop = Some(Arc::new(hook));
        self
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Pure admission decision
    pub fn evaluate(&self, context: &LifecycleContext, event: &GuestEvent) -> GateDecision {
        match context {
            LifecycleContext::Initial(_) => {
                if event.is_diagnostic() {
                    GateDecision::Admit
                } else {
                    GateDecision::dropped(
                        DropCode::BeforeSession,
                        format!("{} before any session started", event.kind()),
                    )
                }
            }
            LifecycleContext::InSession(ctx) => match event.session_id() {
                Some(claimed) if *claimed != ctx.session_id => GateDecision::dropped(
                    DropCode::SessionIdMismatch,
                    format!(
                        "{} claims session {} but {} is active",
                        event.kind(),
                        claimed,
                        ctx.session_id
                    ),
                ),
                _ => GateDecision::Admit,
            },
            LifecycleContext::Ended(ctx) => {
                if event.is_diagnostic() && self.config.allow_dev_log_after_end {
                    GateDecision::Admit
                } else {
                    GateDecision::dropped(
                        DropCode::AfterSessionEnded,
                        format!("{} after session {} ended", event.kind(), ctx.session_id),
                    )
                }
            }
        }
    }

    /// Evaluate and report drops to the diagnostic hook
    pub fn check(&self, context: &LifecycleContext, event: &GuestEvent) -> GateDecision {
        let decision = self.evaluate(context, event);
        self.report(event, &decision);
        decision
    }

    /// Hand a drop decision to the diagnostic hook, if one is installed
    pub fn report(&self, event: &GuestEvent, decision: &GateDecision) {
        if let (GateDecision::Drop { code, reason }, Some(hook)) = (decision, &self.on_drop) {
            if let Err(panic) = contain(|| hook(event, reason, *code)) {
                warn!(code = %code, panic = %panic, "Gate drop hook panicked");
            }
        }
    }
}

impl fmt::Debug for LifecycleGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleGate")
            .field("config", &self.config)
            .field("has_on_drop", &self.on_drop.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use proptest::prelude::*;
    use serde_json::json;
    use warden_core::{
        DevLog, DevLogLevel, Difficulty, DifficultyChangeReason, DifficultyChanged, DurationMs,
        ErrorOccurred, ErrorType, EventKind, FrictionReported, FrictionType, GuestDescriptor,
        LevelCompleted, LevelFailReason, LevelFailed, LevelId, LevelStarted, PerformanceSample,
        Preferences, ProgressCheckpoint, SessionEndReason, SessionEnded, SessionId, SessionStarted,
        SignalType, StateSaveRequested, TimeOnTask, Timestamp, UserSignal,
    };

    fn sid(raw: &str) -> SessionId {
        SessionId::new(raw).unwrap()
    }

    fn initial() -> LifecycleContext {
        LifecycleContext::initial(GuestDescriptor::default(), Preferences::default())
    }

    fn in_session(id: &str) -> LifecycleContext {
        LifecycleContext::in_session(sid(id), Timestamp::from_millis(0))
    }

    fn ended(id: &str) -> LifecycleContext {
        LifecycleContext::ended(sid(id), DurationMs::from_millis(10))
    }

    fn level_started(id: &str) -> GuestEvent {
        LevelStarted {
            session_id: sid(id),
            level_id: LevelId::new("intro").unwrap(),
            difficulty: Difficulty::new(1).unwrap(),
        }
        .into()
    }

    fn dev_log() -> GuestEvent {
        DevLog {
            level: DevLogLevel::Info,
            message: "hello".into(),
        }
        .into()
    }

    /// One event of `kind`; `session` is ignored by kinds that carry none
    fn sample(kind: EventKind, session: Option<&str>) -> GuestEvent {
        let id = sid(session.unwrap_or("s0"));
        let level = LevelId::new("intro").unwrap();
        match kind {
            EventKind::SessionStarted => SessionStarted { session_id: id }.into(),
            EventKind::SessionEnded => SessionEnded {
                session_id: id,
                reason: SessionEndReason::Completed,
            }
            .into(),
            EventKind::LevelStarted => level_started(id.as_str()),
            EventKind::LevelCompleted => LevelCompleted {
                session_id: id,
                level_id: level,
                duration_ms: DurationMs::from_millis(1_200),
                accuracy: Some(0.9),
                score: None,
            }
            .into(),
            EventKind::LevelFailed => LevelFailed {
                session_id: id,
                level_id: level,
                reason: LevelFailReason::OutOfMoves,
                attempts: Some(2),
            }
            .into(),
            EventKind::ProgressCheckpoint => ProgressCheckpoint {
                session_id: id,
                level_id: level,
                completed_steps: 1,
                total_steps: 3,
            }
            .into(),
            EventKind::PerformanceSample => PerformanceSample {
                session_id: id,
                level_id: None,
                accuracy: Some(0.5),
                success_rate: None,
                reaction_time_ms: Some(300.0),
                error_count: None,
                streak: Some(4),
            }
            .into(),
            EventKind::TimeOnTask => TimeOnTask {
                session_id: id,
                level_id: Some(level),
                duration_ms: DurationMs::from_millis(8_000),
                focus_ratio: None,
            }
            .into(),
            EventKind::DifficultyChanged => DifficultyChanged {
                session_id: id,
                level_id: None,
                from: Difficulty::new(2).unwrap(),
                to: Difficulty::new(3).unwrap(),
                reason: DifficultyChangeReason::Adaptive,
            }
            .into(),
            EventKind::FrictionReported => FrictionReported {
                session_id: id,
                level_id: None,
                friction_type: FrictionType::Stuck,
                intensity: Some(0.7),
            }
            .into(),
            EventKind::ErrorOccurred => ErrorOccurred {
                session_id: session.map(sid),
                error_type: ErrorType::AssetLoad,
                message: "missing sprite".into(),
                recoverable: true,
            }
            .into(),
            EventKind::StateSaveRequested => StateSaveRequested {
                session_id: id,
                payload: json!({"slot": 1}),
            }
            .into(),
            EventKind::UserSignal => UserSignal {
                session_id: id,
                signal_type: SignalType::Confidence,
                value: Some(0.4),
            }
            .into(),
            EventKind::DevLog => dev_log(),
        }
    }

    #[test]
    fn test_initial_admits_only_dev_log() {
        let gate = LifecycleGate::default();
        assert!(gate.evaluate(&initial(), &dev_log()).is_admit());
        assert_eq!(
            gate.evaluate(&initial(), &level_started("s1")).code(),
            Some(DropCode::BeforeSession)
        );
        let ack: GuestEvent = SessionStarted { session_id: sid("s1") }.into();
        assert_eq!(
            gate.evaluate(&initial(), &ack).code(),
            Some(DropCode::BeforeSession)
        );
    }

    #[test]
    fn test_in_session_checks_session_id() {
        let gate = LifecycleGate::default();
        let ctx = in_session("s1");
        assert!(gate.evaluate(&ctx, &level_started("s1")).is_admit());
        assert_eq!(
            gate.evaluate(&ctx, &level_started("s2")).code(),
            Some(DropCode::SessionIdMismatch)
        );
        assert!(gate.evaluate(&ctx, &dev_log()).is_admit());

        let anonymous_error: GuestEvent = ErrorOccurred {
            session_id: None,
            error_type: ErrorType::Runtime,
            message: "x".into(),
            recoverable: true,
        }
        .into();
        assert!(gate.evaluate(&ctx, &anonymous_error).is_admit());
    }

    #[test]
    fn test_ended_drops_everything_by_default() {
        let gate = LifecycleGate::default();
        let ctx = ended("s1");
        let ack: GuestEvent = SessionEnded {
            session_id: sid("s1"),
            reason: SessionEndReason::Completed,
        }
        .into();
        assert_eq!(gate.evaluate(&ctx, &ack).code(), Some(DropCode::AfterSessionEnded));
        assert_eq!(gate.evaluate(&ctx, &dev_log()).code(), Some(DropCode::AfterSessionEnded));

        let lenient = LifecycleGate::new(GateConfig {
            allow_dev_log_after_end: true,
        });
        assert!(lenient.evaluate(&ctx, &dev_log()).is_admit());
        assert!(!lenient.evaluate(&ctx, &level_started("s1")).is_admit());
    }

    #[test]
    fn test_every_kind_in_every_phase() {
        let gate = LifecycleGate::default();
        for &kind in EventKind::ALL {
            let own = sample(kind, Some("s1"));
            let foreign = sample(kind, Some("s2"));
            let anonymous = sample(kind, None);
            assert_eq!(own.kind(), kind);

            let before = gate.evaluate(&initial(), &own);
            if kind == EventKind::DevLog {
                assert!(before.is_admit());
            } else {
                assert_eq!(before.code(), Some(DropCode::BeforeSession), "{}", kind);
            }

            let ctx = in_session("s1");
            assert!(gate.evaluate(&ctx, &own).is_admit(), "{}", kind);
            let expected = foreign.session_id().map(|_| DropCode::SessionIdMismatch);
            assert_eq!(gate.evaluate(&ctx, &foreign).code(), expected, "{}", kind);

            let after = gate.evaluate(&ended("s1"), &anonymous);
            assert_eq!(after.code(), Some(DropCode::AfterSessionEnded), "{}", kind);
        }

        let anonymous_error = sample(EventKind::ErrorOccurred, None);
        assert_eq!(anonymous_error.session_id(), None);
        assert!(gate.evaluate(&in_session("s1"), &anonymous_error).is_admit());
    }

    #[test]
    fn test_check_reports_drops() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let gate = LifecycleGate::default()
            .with_on_drop(move |event, _reason, code| sink.lock().push((event.kind(), code)));

        gate.check(&initial(), &dev_log());
        gate.check(&initial(), &level_started("s1"));

        let log = log.lock();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].1, DropCode::BeforeSession);
    }

    #[test]
    fn test_panicking_hook_contained() {
        let gate = LifecycleGate::default().with_on_drop(|_, _, _| panic!("hook bug"));
        let decision = gate.check(&initial(), &level_started("s1"));
        assert_eq!(decision.code(), Some(DropCode::BeforeSession));
    }

    #[test]
    fn test_drop_code_wire_names() {
        assert_eq!(DropCode::BeforeSession.to_string(), "BEFORE_SESSION");
        assert_eq!(
            serde_json::to_string(&DropCode::AfterSessionEnded).unwrap(),
            "\"AFTER_SESSION_ENDED\""
        );
    }

    fn context() -> impl Strategy<Value = LifecycleContext> {
        prop_oneof![
            Just(initial()),
            "s[0-2]".prop_map(|id| in_session(&id)),
            "s[0-2]".prop_map(|id| ended(&id)),
        ]
    }

    fn event() -> impl Strategy<Value = GuestEvent> {
        (
            proptest::sample::select(EventKind::ALL),
            proptest::option::of("s[0-2]"),
        )
            .prop_map(|(kind, id)| sample(kind, id.as_deref()))
    }

    proptest! {
        #[test]
        fn prop_decisions_deterministic(ctx in context(), ev in event(), allow in any::<bool>()) {
            let gate = LifecycleGate::new(GateConfig { allow_dev_log_after_end: allow });
            let first = gate.evaluate(&ctx, &ev);
            prop_assert_eq!(&first, &gate.evaluate(&ctx.clone(), &ev.clone()));

            let expected_admit = match &ctx {
                LifecycleContext::Initial(_) => ev.is_diagnostic(),
                LifecycleContext::InSession(c) => ev.session_id().map_or(true, |s| *s == c.session_id),
                LifecycleContext::Ended(_) => ev.is_diagnostic() && allow,
            };
            prop_assert_eq!(first.is_admit(), expected_admit);
        }

        #[test]
        fn prop_every_kind_reaches_gate(kind in proptest::sample::select(EventKind::ALL)) {
            let ev = sample(kind, None);
            prop_assert_eq!(ev.kind(), kind);
            let gate = LifecycleGate::default();
            prop_assert_eq!(gate.evaluate(&initial(), &ev).is_admit(), kind.is_diagnostic());
        }
    }
}
