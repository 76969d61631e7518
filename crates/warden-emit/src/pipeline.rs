//! Emission pipeline
//!
//! State owned per instance:
//! - the rate limit window (behind a short mutex)
//! - the handler list (cloned out before fan-out)
//! - atomic counters
//!
//! No lock is held while calling a handler, filter, session provider or
//! hook, so any of them may call back into the pipeline.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, trace, warn};

use warden_core::{contain, ActiveSession, Clock, EventKind, GuestEvent, ValidationMode, KIND_FIELD};
use warden_validate::{EventValidator, ValidatorConfig, MAX_EVENT_BYTES, MAX_STATE_BYTES};

use crate::{
    AdmissionFilter, Counters, DropReason, EnrichedEvent, EventHandler, PipelineStats, RateWindow,
    DEFAULT_MAX_EVENTS, DEFAULT_WINDOW,
};

/// Pipeline configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    pub mode: ValidationMode,
    /// Events admitted per window
    pub max_events: u32,
    /// Window length in milliseconds
    pub window_ms: u64,
    pub max_event_bytes: usize,
    pub max_state_bytes: usize,
    /// Identifies this host in enriched events
    pub producer_id: String,
    pub pipeline_version: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            mode: ValidationMode::Production,
            max_events: DEFAULT_MAX_EVENTS,
            window_ms: DEFAULT_WINDOW.as_millis() as u64,
            max_event_bytes: MAX_EVENT_BYTES,
            max_state_bytes: MAX_STATE_BYTES,
            producer_id: "warden-host".to_string(),
            pipeline_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn development() -> Self {
        PipelineConfig {
            mode: ValidationMode::Development,
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_rate_limit(mut self, max_events: u32, window: Duration) -> Self {
        self.max_events = max_events;
        self.window_ms = window.as_millis().min(u64::MAX as u128) as u64;
        self
    }

    pub fn with_producer_id(mut self, producer_id: impl Into<String>) -> Self {
        self.producer_id = producer_id.into();
        self
    }

    pub fn validator_config(&self) -> ValidatorConfig {
        ValidatorConfig {
            mode: self.mode,
            max_event_bytes: self.max_event_bytes,
            max_state_bytes: self.max_state_bytes,
        }
    }

    #[inline]
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Description of a dropped event handed to the drop hook
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DropRecord {
    pub reason: DropReason,
    /// `kind` tag of the raw event, when it had one
    pub kind: Option<String>,
    pub detail: String,
}

pub type DropHook = Arc<dyn Fn(&DropRecord) + Send + Sync>;

/// Rate-limited, validating fan-out of guest events to host handlers
pub struct EmissionPipeline {
    config: PipelineConfig,
    validator: EventValidator,
    clock: Arc<dyn Clock>,
    window: Mutex<RateWindow>,
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
    filter: Option<Arc<dyn AdmissionFilter>>,
    sessions: Option<Arc<dyn ActiveSession>>,
    on_drop: Option<DropHook>,
    counters: Counters,
}

impl EmissionPipeline {
    pub fn new(config: PipelineConfig, clock: Arc<dyn Clock>) -> Self {
        EmissionPipeline {
            validator: EventValidator::new(config.validator_config()),
            window: Mutex::new(RateWindow::new(config.max_events, config.window())),
            config,
            clock,
            handlers: RwLock::new(Vec::new()),
            filter: None,
            sessions: None,
            on_drop: None,
            counters: Counters::default(),
        }
    }

    pub fn with_filter(mut self, filter: Arc<dyn AdmissionFilter>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_session_provider(mut self, sessions: Arc<dyn ActiveSession>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn with_drop_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&DropRecord) + Send + Sync + 'static,
    {
        self.on_drop = Some(Arc::new(hook));
        self
    }

    pub fn with_handler(self, handler: Arc<dyn EventHandler>) -> Self {
        self.add_handler(handler);
        self
    }

    pub fn add_handler(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.write().push(handler);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stats(&self) -> PipelineStats {
        self.counters.snapshot()
    }

    /// Fire-and-forget entry point for raw guest input
    pub fn emit(&self, raw: Value) {
        self.emit_ref(&raw);
    }

    /// Trusted-producer convenience; takes the same path as raw input
    pub fn emit_event(&self, event: &GuestEvent) {
        match event.to_value() {
            Ok(raw) => self.emit_ref(&raw),
            Err(e) => self.dropped(
                DropReason::InternalError,
                Some(event.kind().as_str()),
                format!("serialization failed: {}", e),
            ),
        }
    }

    fn emit_ref(&self, raw: &Value) {
        let kind = raw.get(KIND_FIELD).and_then(Value::as_str);
        let now = self.clock.now();

        if !self.window.lock().try_acquire(now) {
            self.dropped(DropReason::RateLimited, kind, "rate limit exceeded".to_string());
            return;
        }

        if self.config.mode.is_production() && kind == Some(EventKind::DevLog.as_str()) {
            self.dropped(
                DropReason::FilteredDevLog,
                kind,
                "diagnostics disabled in production".to_string(),
            );
            return;
        }

        let event = match contain(|| self.validator.validate(raw)) {
            Ok(Ok(outcome)) => {
                if self.config.mode.is_development() && !outcome.warnings.is_empty() {
                    for warning in &outcome.warnings {
                        debug!(kind = kind.unwrap_or("?"), %warning, "Event field sanitized");
                    }
                }
                let summary = outcome.error_summary();
                match outcome.into_event() {
                    Some(event) => event,
                    None => return self.dropped(DropReason::Invalid, kind, summary),
                }
            }
            Ok(Err(unrecognized)) => {
                return self.dropped(DropReason::Invalid, kind, unrecognized.to_string())
            }
            Err(panic) => {
                return self.dropped(
                    DropReason::InternalError,
                    kind,
                    format!("validator panicked: {}", panic),
                )
            }
        };

        if let Some(filter) = &self.filter {
            match contain(|| filter.admit(&event)) {
                Ok(Ok(())) => {}
                Ok(Err(refusal)) => {
                    return self.dropped(DropReason::NotAdmitted, kind, refusal.to_string())
                }
                Err(panic) => {
                    return self.dropped(
                        DropReason::InternalError,
                        kind,
                        format!("admission filter panicked: {}", panic),
                    )
                }
            }
        }

        let session_id = match &self.sessions {
            Some(sessions) => match contain(|| sessions.active_session()) {
                Ok(session_id) => session_id,
                Err(panic) => {
                    return self.dropped(
                        DropReason::InternalError,
                        kind,
                        format!("session provider panicked: {}", panic),
                    )
                }
            },
            None => None,
        };

        let enriched = EnrichedEvent::new(
            event,
            now,
            session_id,
            self.config.producer_id.clone(),
            self.config.pipeline_version.clone(),
        );
        self.counters.record_delivered();
        self.fan_out(&enriched);
    }

    fn fan_out(&self, enriched: &EnrichedEvent) {
        let handlers: Vec<Arc<dyn EventHandler>> = self.handlers.read().clone();
        trace!(kind = %enriched.event().kind(), handlers = handlers.len(), "Delivering event");

        for handler in handlers {
            let failure = match contain(|| handler.handle(enriched)) {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(panic) => format!("handler {} panicked: {}", handler.name(), panic),
            };
            self.counters.record_handler_error();
            if self.config.mode.is_development() {
                error!(kind = %enriched.event().kind(), error = %failure, "Event handler failed");
            } else {
                debug!(kind = %enriched.event().kind(), error = %failure, "Event handler failed");
            }
        }
    }

    fn dropped(&self, reason: DropReason, kind: Option<&str>, detail: String) {
        self.counters.record_drop(reason);
        let kind = kind.unwrap_or("?");
        if self.config.mode.is_development() {
            warn!(%reason, kind, %detail, "Event dropped");
        } else {
            debug!(%reason, kind, %detail, "Event dropped");
        }

        if let Some(hook) = &self.on_drop {
            let record = DropRecord {
                reason,
                kind: (kind != "?").then(|| kind.to_string()),
                detail,
            };
            if let Err(panic) = contain(|| hook(&record)) {
                warn!(panic = %panic, "Drop hook panicked");
            }
        }
    }
}

impl fmt::Debug for EmissionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmissionPipeline")
            .field("config", &self.config)
            .field("handlers", &self.handler_count())
            .field("has_filter", &self.filter.is_some())
            .field("stats", &self.stats())
            .finish()
    }
}
