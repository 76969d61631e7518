//! Event validation engine
//!
//! `validate` never fails on guest input, with one deliberate exception: in
//! development mode an unrecognized `kind` tag is returned as
//! `Err(UnrecognizedKind)` so integration bugs surface early. In production
//! the same input is an ordinary rejection.
//!
//! Every kind has its own branch in [`EventValidator::dispatch`], and the
//! match is exhaustive over [`EventKind`], so a new kind does not compile
//! until it has validation rules.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use warden_core::{
    DevLog, DevLogLevel, DifficultyChangeReason, DifficultyChanged, ErrorOccurred, ErrorType,
    EventKind, FrictionReported, FrictionType, LevelCompleted, LevelFailReason, LevelFailed,
    LevelStarted, PerformanceSample, ProgressCheckpoint, SessionEndReason, SessionEnded,
    SessionStarted, SignalType, StateSaveRequested, TimeOnTask, UnrecognizedKind, UserSignal,
    ValidationMode, KIND_FIELD,
};

use crate::fields::{self, FieldReader};
use crate::{capped_len, object_len_excluding, ValidationOutcome, MAX_EVENT_BYTES, MAX_STATE_BYTES};

/// Field holding the opaque blob of a state-save request
pub const STATE_PAYLOAD_FIELD: &str = "payload";

/// Validator configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidatorConfig {
    pub mode: ValidationMode,
    /// Ceiling on the encoded event, state payload excluded
    pub max_event_bytes: usize,
    /// Ceiling on a state-save payload
    pub max_state_bytes: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        ValidatorConfig {
            mode: ValidationMode::Production,
            max_event_bytes: MAX_EVENT_BYTES,
            max_state_bytes: MAX_STATE_BYTES,
        }
    }
}

impl ValidatorConfig {
    pub fn development() -> Self {
        ValidatorConfig {
            mode: ValidationMode::Development,
            ..Default::default()
        }
    }

    pub fn production() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_event_bytes(mut self, bytes: usize) -> Self {
        self.max_event_bytes = bytes;
        self
    }

    pub fn with_max_state_bytes(mut self, bytes: usize) -> Self {
        self.max_state_bytes = bytes;
        self
    }
}

/// Runtime validator for raw guest events
#[derive(Clone, Debug, Default)]
pub struct EventValidator {
    config: ValidatorConfig,
}

impl EventValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        EventValidator { config }
    }

    pub fn development() -> Self {
        Self::new(ValidatorConfig::development())
    }

    pub fn production() -> Self {
        Self::new(ValidatorConfig::production())
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn mode(&self) -> ValidationMode {
        self.config.mode
    }

    /// Validate and clean one raw event
    pub fn validate(&self, raw: &Value) -> Result<ValidationOutcome, UnrecognizedKind> {
        let Value::Object(obj) = raw else {
            return Ok(ValidationOutcome::reject_event(format!(
                "expected object, found {}",
                fields::json_type(raw)
            )));
        };

        let Some(tag) = obj.get(KIND_FIELD).and_then(Value::as_str) else {
            return Ok(ValidationOutcome::reject_event(
                "missing string discriminant field \"kind\"",
            ));
        };

        if let Some(oversized) = self.check_size(raw, obj, tag) {
            return Ok(oversized);
        }

        match EventKind::from_tag(tag) {
            Some(kind) => Ok(self.dispatch(kind, obj)),
            None if self.config.mode.is_development() => Err(UnrecognizedKind(tag.to_string())),
            None => Ok(ValidationOutcome::rejected(
                vec![crate::FieldError::new(KIND_FIELD, "unrecognized event kind")],
                Vec::new(),
            )),
        }
    }

    /// Global size precondition; applies before the kind is even known
    fn check_size(&self, raw: &Value, obj: &Map<String, Value>, tag: &str) -> Option<ValidationOutcome> {
        let max_event = self.config.max_event_bytes;

        if tag != EventKind::StateSaveRequested.as_str() {
            let len = capped_len(raw, max_event);
            return (len > max_event).then(|| {
                ValidationOutcome::reject_event(format!("event exceeds {} byte limit", max_event))
            });
        }

        let max_state = self.config.max_state_bytes;
        if let Some(payload) = obj.get(STATE_PAYLOAD_FIELD) {
            if capped_len(payload, max_state) > max_state {
                return Some(ValidationOutcome::rejected(
                    vec![crate::FieldError::new(
                        STATE_PAYLOAD_FIELD,
                        format!("state payload exceeds {} byte limit", max_state),
                    )],
                    Vec::new(),
                ));
            }
        }

        (object_len_excluding(obj, STATE_PAYLOAD_FIELD, max_event) > max_event).then(|| {
            ValidationOutcome::reject_event(format!("event exceeds {} byte limit", max_event))
        })
    }

    fn dispatch(&self, kind: EventKind, obj: &Map<String, Value>) -> ValidationOutcome {
        let r = FieldReader::new(obj);
        match kind {
            EventKind::SessionStarted => session_started(r),
            EventKind::SessionEnded => session_ended(r),
            EventKind::LevelStarted => level_started(r),
            EventKind::LevelCompleted => level_completed(r),
            EventKind::LevelFailed => level_failed(r),
            EventKind::ProgressCheckpoint => progress_checkpoint(r),
            EventKind::PerformanceSample => performance_sample(r),
            EventKind::TimeOnTask => time_on_task(r),
            EventKind::DifficultyChanged => difficulty_changed(r),
            EventKind::FrictionReported => friction_reported(r),
            EventKind::ErrorOccurred => error_occurred(r),
            EventKind::StateSaveRequested => state_save_requested(r),
            EventKind::UserSignal => user_signal(r),
            EventKind::DevLog => dev_log(r),
        }
    }
}

fn session_started(mut r: FieldReader<'_>) -> ValidationOutcome {
    let Some(session_id) = r.required("sessionId", fields::session_id) else {
        return r.reject();
    };
    r.finish(SessionStarted { session_id }.into())
}

fn session_ended(mut r: FieldReader<'_>) -> ValidationOutcome {
    let session_id = r.required("sessionId", fields::session_id);
    let reason = r.tag("reason", SessionEndReason::from_tag);

    let (Some(session_id), Some(reason)) = (session_id, reason) else {
        return r.reject();
    };
    r.finish(SessionEnded { session_id, reason }.into())
}

fn level_started(mut r: FieldReader<'_>) -> ValidationOutcome {
    let session_id = r.required("sessionId", fields::session_id);
    let level_id = r.required("levelId", fields::level_id);
    let difficulty = r.required("difficulty", fields::difficulty);

    let (Some(session_id), Some(level_id), Some(difficulty)) = (session_id, level_id, difficulty)
    else {
        return r.reject();
    };
    r.finish(
        LevelStarted {
            session_id,
            level_id,
            difficulty,
        }
        .into(),
    )
}

fn level_completed(mut r: FieldReader<'_>) -> ValidationOutcome {
    let session_id = r.required("sessionId", fields::session_id);
    let level_id = r.required("levelId", fields::level_id);
    let duration_ms = r.required("durationMs", fields::duration);
    let accuracy = r.proportion("accuracy");
    let score = r.magnitude("score");

    let (Some(session_id), Some(level_id), Some(duration_ms)) = (session_id, level_id, duration_ms)
    else {
        return r.reject();
    };
    r.finish(
        LevelCompleted {
            session_id,
            level_id,
            duration_ms,
            accuracy,
            score,
        }
        .into(),
    )
}

fn level_failed(mut r: FieldReader<'_>) -> ValidationOutcome {
    let session_id = r.required("sessionId", fields::session_id);
    let level_id = r.required("levelId", fields::level_id);
    let reason = r.tag("reason", LevelFailReason::from_tag);
    let attempts = r.optional("attempts", fields::positive_count);

    let (Some(session_id), Some(level_id), Some(reason)) = (session_id, level_id, reason) else {
        return r.reject();
    };
    r.finish(
        LevelFailed {
            session_id,
            level_id,
            reason,
            attempts,
        }
        .into(),
    )
}

fn progress_checkpoint(mut r: FieldReader<'_>) -> ValidationOutcome {
    let session_id = r.required("sessionId", fields::session_id);
    let level_id = r.required("levelId", fields::level_id);
    let completed_steps = r.required("completedSteps", fields::step_count);
    let total_steps = r.required("totalSteps", fields::positive_count);

    if let (Some(completed), Some(total)) = (completed_steps, total_steps) {
        if completed > total {
            r.error(
                "completedSteps",
                format!("{} exceeds totalSteps {}", completed, total),
            );
        }
    }

    let (Some(session_id), Some(level_id), Some(completed_steps), Some(total_steps)) =
        (session_id, level_id, completed_steps, total_steps)
    else {
        return r.reject();
    };
    r.finish(
        ProgressCheckpoint {
            session_id,
            level_id,
            completed_steps,
            total_steps,
        }
        .into(),
    )
}

fn performance_sample(mut r: FieldReader<'_>) -> ValidationOutcome {
    let session_id = r.required("sessionId", fields::session_id);
    let level_id = r.optional("levelId", fields::level_id);
    let accuracy = r.proportion("accuracy");
    let success_rate = r.proportion("successRate");
    let reaction_time_ms = r.magnitude("reactionTimeMs");
    let error_count = r.count("errorCount");
    let streak = r.count("streak");

    let Some(session_id) = session_id else {
        return r.reject();
    };
    r.finish(
        PerformanceSample {
            session_id,
            level_id,
            accuracy,
            success_rate,
            reaction_time_ms,
            error_count,
            streak,
        }
        .into(),
    )
}

fn time_on_task(mut r: FieldReader<'_>) -> ValidationOutcome {
    let session_id = r.required("sessionId", fields::session_id);
    let level_id = r.optional("levelId", fields::level_id);
    let duration_ms = r.required("durationMs", fields::duration);
    let focus_ratio = r.proportion("focusRatio");

    let (Some(session_id), Some(duration_ms)) = (session_id, duration_ms) else {
        return r.reject();
    };
    r.finish(
        TimeOnTask {
            session_id,
            level_id,
            duration_ms,
            focus_ratio,
        }
        .into(),
    )
}

fn difficulty_changed(mut r: FieldReader<'_>) -> ValidationOutcome {
    let session_id = r.required("sessionId", fields::session_id);
    let level_id = r.optional("levelId", fields::level_id);
    let from = r.required("from", fields::difficulty);
    let to = r.required("to", fields::difficulty);
    let reason = r.tag("reason", DifficultyChangeReason::from_tag);

    let (Some(session_id), Some(from), Some(to), Some(reason)) = (session_id, from, to, reason)
    else {
        return r.reject();
    };
    r.finish(
        DifficultyChanged {
            session_id,
            level_id,
            from,
            to,
            reason,
        }
        .into(),
    )
}

fn friction_reported(mut r: FieldReader<'_>) -> ValidationOutcome {
    let session_id = r.required("sessionId", fields::session_id);
    let level_id = r.optional("levelId", fields::level_id);
    let friction_type = r.tag("frictionType", FrictionType::from_tag);
    let intensity = r.proportion("intensity");

    let (Some(session_id), Some(friction_type)) = (session_id, friction_type) else {
        return r.reject();
    };
    r.finish(
        FrictionReported {
            session_id,
            level_id,
            friction_type,
            intensity,
        }
        .into(),
    )
}

fn error_occurred(mut r: FieldReader<'_>) -> ValidationOutcome {
    let session_id = r.optional("sessionId", fields::session_id);
    let error_type = r.tag("errorType", ErrorType::from_tag);
    let message = r.required("message", fields::non_empty_string);
    let recoverable = r.required("recoverable", fields::boolean);

    let (Some(error_type), Some(message), Some(recoverable)) = (error_type, message, recoverable)
    else {
        return r.reject();
    };
    r.finish(
        ErrorOccurred {
            session_id,
            error_type,
            message,
            recoverable,
        }
        .into(),
    )
}

fn state_save_requested(mut r: FieldReader<'_>) -> ValidationOutcome {
    let session_id = r.required("sessionId", fields::session_id);
    let payload = r.required(STATE_PAYLOAD_FIELD, fields::opaque);

    let (Some(session_id), Some(payload)) = (session_id, payload) else {
        return r.reject();
    };
    r.finish(StateSaveRequested { session_id, payload }.into())
}

/// `value` is clamped when numeric and dropped (event kept) when it is not
fn user_signal(mut r: FieldReader<'_>) -> ValidationOutcome {
    let session_id = r.required("sessionId", fields::session_id);
    let signal_type = r.tag("signalType", SignalType::from_tag);
    let value = r.proportion("value");

    let (Some(session_id), Some(signal_type)) = (session_id, signal_type) else {
        return r.reject();
    };
    r.finish(
        UserSignal {
            session_id,
            signal_type,
            value,
        }
        .into(),
    )
}

fn dev_log(mut r: FieldReader<'_>) -> ValidationOutcome {
    let level = r.tag("level", DevLogLevel::from_tag);
    let message = r.required("message", fields::string);

    let (Some(level), Some(message)) = (level, message) else {
        return r.reject();
    };
    r.finish(DevLog { level, message }.into())
}
