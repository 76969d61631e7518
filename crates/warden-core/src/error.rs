//! Error types for the guest boundary
//!
//! Only host integration errors surface as `Err`. Guest input problems are
//! reported through validation outcomes and drop counters instead.

use thiserror::Error;

use crate::LifecyclePhase;

/// A raw value failed its branded validator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("Invalid session id: {0:?} (expected non-empty string)")]
    InvalidSessionId(String),

    #[error("Invalid level id: {0:?} (expected non-empty string)")]
    InvalidLevelId(String),

    #[error("Invalid capability name: {0:?} (expected non-empty string)")]
    InvalidCapabilityName(String),

    #[error("Invalid difficulty: {0} (expected integer 1-10)")]
    InvalidDifficulty(String),

    #[error("Invalid timestamp: {0} (expected non-negative integer milliseconds)")]
    InvalidTimestamp(String),

    #[error("Invalid duration: {0} (expected non-negative integer milliseconds)")]
    InvalidDuration(String),
}

/// Illegal use of the session state machine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Illegal transition: cannot {action} while {phase}")]
    IllegalTransition {
        action: &'static str,
        phase: LifecyclePhase,
    },
}

/// Capability declaration or lookup failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("Capability not declared: {0}")]
    NotDeclared(String),

    #[error("Capability declared twice: {0}")]
    DuplicateDeclaration(String),

    #[error("Capability provider registered twice: {0}")]
    DuplicateProvider(String),

    #[error("No provider registered for declared capability: {0}")]
    NotProvided(String),

    #[error("Capability {0} requested with the wrong API type")]
    TypeMismatch(String),

    #[error("No-op factory failed for capability {name}: {reason}")]
    NoopUnavailable { name: String, reason: String },
}

/// Development-mode rejection of an event tag outside the vocabulary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unrecognized event kind: {0:?}")]
pub struct UnrecognizedKind(pub String);

/// A host handler failed while receiving an enriched event
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Handler {handler} failed: {message}")]
pub struct HandlerError {
    pub handler: String,
    pub message: String,
}

impl HandlerError {
    pub fn new(handler: impl Into<String>, message: impl Into<String>) -> Self {
        HandlerError {
            handler: handler.into(),
            message: message.into(),
        }
    }
}

/// Host configuration could not be loaded
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Any host-facing boundary error
#[derive(Error, Debug)]
pub enum WardenError {
    #[error(transparent)]
    Value(#[from] ValueError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for host-facing boundary operations
pub type WardenResult<T> = Result<T, WardenError>;
