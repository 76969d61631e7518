//! Lifecycle context snapshots
//!
//! A context is an immutable picture of where the host session is:
//! - Initial: no session yet, static descriptor and preferences
//! - InSession: exactly one active session
//! - Ended: terminal, with the total duration
//!
//! Snapshots are owned values. Handing one out never shares state with the
//! state machine or with other holders.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Difficulty, DurationMs, LevelId, SessionId, Timestamp};

/// Phase of the session lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecyclePhase {
    Initial,
    InSession,
    Ended,
}

impl LifecyclePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecyclePhase::Initial => "INITIAL",
            LifecyclePhase::InSession => "IN_SESSION",
            LifecyclePhase::Ended => "ENDED",
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of the guest module
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestDescriptor {
    pub guest_id: String,
    pub name: String,
    pub version: String,
}

impl GuestDescriptor {
    pub fn new(guest_id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        GuestDescriptor {
            guest_id: guest_id.into(),
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Accessibility and presentation preferences passed to the guest
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub reduced_motion: bool,
    pub high_contrast: bool,
    pub audio_enabled: bool,
    pub locale: Option<String>,
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            reduced_motion: false,
            high_contrast: false,
            audio_enabled: true,
            locale: None,
        }
    }
}

/// Host-side view of how far the guest has progressed
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionSnapshot {
    pub current_level: Option<LevelId>,
    pub difficulty: Option<Difficulty>,
    pub levels_completed: u32,
    pub levels_failed: u32,
}

/// A single progression change recorded by the host
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressUpdate {
    LevelStarted {
        level: LevelId,
        difficulty: Difficulty,
    },
    LevelCompleted {
        level: LevelId,
    },
    LevelFailed {
        level: LevelId,
    },
    DifficultyChanged(Difficulty),
}

impl ProgressionSnapshot {
    pub fn apply(&mut self, update: ProgressUpdate) {
        match update {
            ProgressUpdate::LevelStarted { level, difficulty } => {
                self.current_level = Some(level);
                self.difficulty = Some(difficulty);
            }
            ProgressUpdate::LevelCompleted { level } => {
                self.levels_completed = self.levels_completed.saturating_add(1);
                self.current_level = Some(level);
            }
            ProgressUpdate::LevelFailed { level } => {
                self.levels_failed = self.levels_failed.saturating_add(1);
                self.current_level = Some(level);
            }
            ProgressUpdate::DifficultyChanged(difficulty) => {
                self.difficulty = Some(difficulty);
            }
        }
    }
}

/// Closing figures carried into the Ended snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub levels_completed: u32,
    pub levels_failed: u32,
    pub final_level: Option<LevelId>,
}

impl From<&ProgressionSnapshot> for SessionSummary {
    fn from(progression: &ProgressionSnapshot) -> Self {
        SessionSummary {
            levels_completed: progression.levels_completed,
            levels_failed: progression.levels_failed,
            final_level: progression.current_level.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialContext {
    pub descriptor: GuestDescriptor,
    pub preferences: Preferences,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InSessionContext {
    pub session_id: SessionId,
    pub started_at: Timestamp,
    pub progression: ProgressionSnapshot,
    pub saved_state: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndedContext {
    pub session_id: SessionId,
    pub total_duration: DurationMs,
    pub summary: Option<SessionSummary>,
}

/// Snapshot of the lifecycle, exactly one shape at a time
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleContext {
    Initial(InitialContext),
    InSession(InSessionContext),
    Ended(EndedContext),
}

impl LifecycleContext {
    pub fn initial(descriptor: GuestDescriptor, preferences: Preferences) -> Self {
        LifecycleContext::Initial(InitialContext {
            descriptor,
            preferences,
        })
    }

    pub fn in_session(session_id: SessionId, started_at: Timestamp) -> Self {
        LifecycleContext::InSession(InSessionContext {
            session_id,
            started_at,
            progression: ProgressionSnapshot::default(),
            saved_state: None,
        })
    }

    pub fn ended(session_id: SessionId, total_duration: DurationMs) -> Self {
        LifecycleContext::Ended(EndedContext {
            session_id,
            total_duration,
            summary: None,
        })
    }

    pub fn phase(&self) -> LifecyclePhase {
        match self {
            LifecycleContext::Initial(_) => LifecyclePhase::Initial,
            LifecycleContext::InSession(_) => LifecyclePhase::InSession,
            LifecycleContext::Ended(_) => LifecyclePhase::Ended,
        }
    }

    /// Session bound to this snapshot (active or ended)
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            LifecycleContext::Initial(_) => None,
            LifecycleContext::InSession(ctx) => Some(&ctx.session_id),
            LifecycleContext::Ended(ctx) => Some(&ctx.session_id),
        }
    }

    /// Session that is currently running, if any
    pub fn active_session_id(&self) -> Option<&SessionId> {
        match self {
            LifecycleContext::InSession(ctx) => Some(&ctx.session_id),
            _ => None,
        }
    }

    #[inline]
    pub fn is_in_session(&self) -> bool {
        matches!(self, LifecycleContext::InSession(_))
    }
}

/// Source of the currently active session identifier
pub trait ActiveSession: Send + Sync {
    fn active_session(&self) -> Option<SessionId>;
}

impl<T: ActiveSession + ?Sized> ActiveSession for Arc<T> {
    fn active_session(&self) -> Option<SessionId> {
        (**self).active_session()
    }
}

/// Session provider that never reports an active session
#[derive(Clone, Copy, Debug, Default)]
pub struct NoSession;

impl ActiveSession for NoSession {
    fn active_session(&self) -> Option<SessionId> {
        None
    }
}

/// Session provider pinned to one identifier
#[derive(Clone, Debug)]
pub struct FixedSession(pub SessionId);

impl ActiveSession for FixedSession {
    fn active_session(&self) -> Option<SessionId> {
        Some(self.0.clone())
    }
}
