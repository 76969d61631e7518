//! Guest event vocabulary
//!
//! Events are facts a guest reports about what it observed. The set of kinds
//! is closed: the `kind` tag fully determines the shape of the event, and a
//! tag outside this vocabulary can only arrive as raw untrusted input.
//!
//! Wire form is a JSON object with a SCREAMING_SNAKE_CASE `kind` tag and
//! camelCase fields. Optional analytics fields are omitted when absent.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Difficulty, DurationMs, LevelId, SessionId};

/// Name of the discriminant field on the wire
pub const KIND_FIELD: &str = "kind";

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $tag:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $tag)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn from_tag(tag: &str) -> Option<Self> {
                match tag {
                    $($tag => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $tag,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum!(
    /// Discriminant of every event kind in the vocabulary
    EventKind {
        SessionStarted => "SESSION_STARTED",
        SessionEnded => "SESSION_ENDED",
        LevelStarted => "LEVEL_STARTED",
        LevelCompleted => "LEVEL_COMPLETED",
        LevelFailed => "LEVEL_FAILED",
        ProgressCheckpoint => "PROGRESS_CHECKPOINT",
        PerformanceSample => "PERFORMANCE_SAMPLE",
        TimeOnTask => "TIME_ON_TASK",
        DifficultyChanged => "DIFFICULTY_CHANGED",
        FrictionReported => "FRICTION_REPORTED",
        ErrorOccurred => "ERROR_OCCURRED",
        StateSaveRequested => "STATE_SAVE_REQUESTED",
        UserSignal => "USER_SIGNAL",
        DevLog => "DEV_LOG",
    }
);

impl EventKind {
    /// Development-only diagnostic kind
    #[inline]
    pub fn is_diagnostic(self) -> bool {
        self == EventKind::DevLog
    }

    /// Session lifecycle acknowledgments sent by the guest
    #[inline]
    pub fn is_lifecycle_ack(self) -> bool {
        matches!(self, EventKind::SessionStarted | EventKind::SessionEnded)
    }
}

wire_enum!(
    /// Why the guest says its session ended
    SessionEndReason {
        Completed => "completed",
        UserExit => "user_exit",
        Timeout => "timeout",
        Error => "error",
    }
);

wire_enum!(
    /// Why a level attempt failed
    LevelFailReason {
        Timeout => "timeout",
        OutOfMoves => "out_of_moves",
        UserQuit => "user_quit",
        Error => "error",
    }
);

wire_enum!(
    /// What caused a difficulty change
    DifficultyChangeReason {
        PlayerRequest => "player_request",
        Adaptive => "adaptive",
        HintUsed => "hint_used",
    }
);

wire_enum!(
    /// Category of friction the guest observed
    FrictionType {
        Stuck => "stuck",
        Confused => "confused",
        TooHard => "too_hard",
        TooEasy => "too_easy",
        UiProblem => "ui_problem",
    }
);

wire_enum!(
    /// Category of guest-side failure
    ErrorType {
        Runtime => "runtime",
        AssetLoad => "asset_load",
        StateCorrupt => "state_corrupt",
        Unavailable => "unavailable",
    }
);

wire_enum!(
    /// Self-reported user state
    SignalType {
        Frustration => "frustration",
        Enjoyment => "enjoyment",
        Fatigue => "fatigue",
        Confidence => "confidence",
    }
);

wire_enum!(
    /// Severity of a diagnostic log line
    DevLogLevel {
        Debug => "debug",
        Info => "info",
        Warn => "warn",
        Error => "error",
    }
);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStarted {
    pub session_id: SessionId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEnded {
    pub session_id: SessionId,
    pub reason: SessionEndReason,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelStarted {
    pub session_id: SessionId,
    pub level_id: LevelId,
    pub difficulty: Difficulty,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelCompleted {
    pub session_id: SessionId,
    pub level_id: LevelId,
    pub duration_ms: DurationMs,
    /// Proportion in [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    /// Non-negative magnitude
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelFailed {
    pub session_id: SessionId,
    pub level_id: LevelId,
    pub reason: LevelFailReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressCheckpoint {
    pub session_id: SessionId,
    pub level_id: LevelId,
    pub completed_steps: u32,
    pub total_steps: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSample {
    pub session_id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_id: Option<LevelId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction_time_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streak: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeOnTask {
    pub session_id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_id: Option<LevelId>,
    pub duration_ms: DurationMs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_ratio: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyChanged {
    pub session_id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_id: Option<LevelId>,
    pub from: Difficulty,
    pub to: Difficulty,
    pub reason: DifficultyChangeReason,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrictionReported {
    pub session_id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_id: Option<LevelId>,
    pub friction_type: FrictionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorOccurred {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub error_type: ErrorType,
    pub message: String,
    pub recoverable: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSaveRequested {
    pub session_id: SessionId,
    /// Opaque to the boundary; only its size is checked
    pub payload: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSignal {
    pub session_id: SessionId,
    pub signal_type: SignalType,
    /// Intensity in [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevLog {
    pub level: DevLogLevel,
    pub message: String,
}

/// A fact reported by a guest
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuestEvent {
    SessionStarted(SessionStarted),
    SessionEnded(SessionEnded),
    LevelStarted(LevelStarted),
    LevelCompleted(LevelCompleted),
    LevelFailed(LevelFailed),
    ProgressCheckpoint(ProgressCheckpoint),
    PerformanceSample(PerformanceSample),
    TimeOnTask(TimeOnTask),
    DifficultyChanged(DifficultyChanged),
    FrictionReported(FrictionReported),
    ErrorOccurred(ErrorOccurred),
    StateSaveRequested(StateSaveRequested),
    UserSignal(UserSignal),
    DevLog(DevLog),
}

impl GuestEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            GuestEvent::SessionStarted(_) => EventKind::SessionStarted,
            GuestEvent::SessionEnded(_) => EventKind::SessionEnded,
            GuestEvent::LevelStarted(_) => EventKind::LevelStarted,
            GuestEvent::LevelCompleted(_) => EventKind::LevelCompleted,
            GuestEvent::LevelFailed(_) => EventKind::LevelFailed,
            GuestEvent::ProgressCheckpoint(_) => EventKind::ProgressCheckpoint,
            GuestEvent::PerformanceSample(_) => EventKind::PerformanceSample,
            GuestEvent::TimeOnTask(_) => EventKind::TimeOnTask,
            GuestEvent::DifficultyChanged(_) => EventKind::DifficultyChanged,
            GuestEvent::FrictionReported(_) => EventKind::FrictionReported,
            GuestEvent::ErrorOccurred(_) => EventKind::ErrorOccurred,
            GuestEvent::StateSaveRequested(_) => EventKind::StateSaveRequested,
            GuestEvent::UserSignal(_) => EventKind::UserSignal,
            GuestEvent::DevLog(_) => EventKind::DevLog,
        }
    }

    /// Session the event claims to belong to, if its shape carries one
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            GuestEvent::SessionStarted(e) => Some(&e.session_id),
            GuestEvent::SessionEnded(e) => Some(&e.session_id),
            GuestEvent::LevelStarted(e) => Some(&e.session_id),
            GuestEvent::LevelCompleted(e) => Some(&e.session_id),
            GuestEvent::LevelFailed(e) => Some(&e.session_id),
            GuestEvent::ProgressCheckpoint(e) => Some(&e.session_id),
            GuestEvent::PerformanceSample(e) => Some(&e.session_id),
            GuestEvent::TimeOnTask(e) => Some(&e.session_id),
            GuestEvent::DifficultyChanged(e) => Some(&e.session_id),
            GuestEvent::FrictionReported(e) => Some(&e.session_id),
            GuestEvent::ErrorOccurred(e) => e.session_id.as_ref(),
            GuestEvent::StateSaveRequested(e) => Some(&e.session_id),
            GuestEvent::UserSignal(e) => Some(&e.session_id),
            GuestEvent::DevLog(_) => None,
        }
    }

    pub fn level_id(&self) -> Option<&LevelId> {
        match self {
            GuestEvent::LevelStarted(e) => Some(&e.level_id),
            GuestEvent::LevelCompleted(e) => Some(&e.level_id),
            GuestEvent::LevelFailed(e) => Some(&e.level_id),
            GuestEvent::ProgressCheckpoint(e) => Some(&e.level_id),
            GuestEvent::PerformanceSample(e) => e.level_id.as_ref(),
            GuestEvent::TimeOnTask(e) => e.level_id.as_ref(),
            GuestEvent::DifficultyChanged(e) => e.level_id.as_ref(),
            GuestEvent::FrictionReported(e) => e.level_id.as_ref(),
            GuestEvent::SessionStarted(_)
            | GuestEvent::SessionEnded(_)
            | GuestEvent::ErrorOccurred(_)
            | GuestEvent::StateSaveRequested(_)
            | GuestEvent::UserSignal(_)
            | GuestEvent::DevLog(_) => None,
        }
    }

    #[inline]
    pub fn is_diagnostic(&self) -> bool {
        self.kind().is_diagnostic()
    }

    /// Wire form of the event
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

macro_rules! impl_from_payload {
    ($($variant:ident),+ $(,)?) => {
        $(
            impl From<$variant> for GuestEvent {
                fn from(e: $variant) -> Self {
                    GuestEvent::$variant(e)
                }
            }
        )+
    };
}

impl_from_payload!(
    SessionStarted,
    SessionEnded,
    LevelStarted,
    LevelCompleted,
    LevelFailed,
    ProgressCheckpoint,
    PerformanceSample,
    TimeOnTask,
    DifficultyChanged,
    FrictionReported,
    ErrorOccurred,
    StateSaveRequested,
    UserSignal,
    DevLog,
);
