//! Pipeline extension points
//!
//! - [`EventHandler`]: receives every delivered event
//! - [`AdmissionFilter`]: may refuse a validated event before enrichment

use std::fmt;

use warden_core::{GuestEvent, HandlerError};

use crate::EnrichedEvent;

/// Host-side receiver of delivered events
pub trait EventHandler: Send + Sync {
    /// Name used in diagnostics
    fn name(&self) -> &str {
        "handler"
    }

    fn handle(&self, event: &EnrichedEvent) -> Result<(), HandlerError>;
}

/// Adapter turning a closure into an [`EventHandler`]
pub struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&EnrichedEvent) -> Result<(), HandlerError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        FnHandler { name: name.into(), f }
    }
}

impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&EnrichedEvent) -> Result<(), HandlerError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, event: &EnrichedEvent) -> Result<(), HandlerError> {
        (self.f)(event)
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").field("name", &self.name).finish()
    }
}

/// Why an admission filter refused an event
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Refusal {
    /// Stable machine-readable code, e.g. `BEFORE_SESSION`
    pub code: &'static str,
    pub reason: String,
}

impl Refusal {
    pub fn new(code: &'static str, reason: impl Into<String>) -> Self {
        Refusal {
            code,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.reason)
    }
}

/// Admission stage run on validated events
pub trait AdmissionFilter: Send + Sync {
    fn admit(&self, event: &GuestEvent) -> Result<(), Refusal>;
}
