//! Validation mode
//!
//! Development favors loud failure so integration bugs surface before
//! release. Production favors availability: the same failures are silent.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    Development,
    #[default]
    Production,
}

impl ValidationMode {
    #[inline]
    pub fn is_development(self) -> bool {
        self == ValidationMode::Development
    }

    #[inline]
    pub fn is_production(self) -> bool {
        self == ValidationMode::Production
    }
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationMode::Development => f.write_str("development"),
            ValidationMode::Production => f.write_str("production"),
        }
    }
}
