//! Validation outcome types

use std::fmt;

use warden_core::GuestEvent;

/// Field-level rejection reason
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    /// Wire name of the offending field (`$` for the event as a whole)
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        FieldError {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Field-level sanitization notice; never causes a rejection
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldWarning {
    pub field: String,
    pub message: String,
}

impl FieldWarning {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        FieldWarning {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of validating one raw event
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationOutcome {
    pub valid: bool,
    /// Cleaned event, present only when `valid`
    pub event: Option<GuestEvent>,
    pub errors: Vec<FieldError>,
    pub warnings: Vec<FieldWarning>,
}

impl ValidationOutcome {
    pub fn accepted(event: GuestEvent, warnings: Vec<FieldWarning>) -> Self {
        ValidationOutcome {
            valid: true,
            event: Some(event),
            errors: Vec::new(),
            warnings,
        }
    }

    pub fn rejected(errors: Vec<FieldError>, warnings: Vec<FieldWarning>) -> Self {
        ValidationOutcome {
            valid: false,
            event: None,
            errors,
            warnings,
        }
    }

    /// Reject the event as a whole
    pub fn reject_event(message: impl Into<String>) -> Self {
        Self::rejected(vec![FieldError::new("$", message)], Vec::new())
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn into_event(self) -> Option<GuestEvent> {
        self.event
    }

    /// True if some error names the given field
    pub fn has_error_for(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    pub fn has_warning_for(&self, field: &str) -> bool {
        self.warnings.iter().any(|w| w.field == field)
    }

    /// One-line summary of all errors, for logs
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}
