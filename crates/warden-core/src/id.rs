//! Branded identifier types
//!
//! Identifiers cross the boundary as raw strings. The only way to obtain one
//! of these types is through its validating constructor, and serde
//! deserialization goes through the same constructor.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ValueError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $err:ident, $debug:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and brand a raw string
            pub fn new(raw: impl Into<String>) -> Result<Self, ValueError> {
                let raw = raw.into();
                if Self::is_valid(&raw) {
                    Ok($name(raw))
                } else {
                    Err(ValueError::$err(raw))
                }
            }

            /// Same check as [`Self::new`] without constructing
            #[inline]
            pub fn is_valid(raw: &str) -> bool {
                !raw.is_empty()
            }

            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValueError;

            fn try_from(raw: String) -> Result<Self, Self::Error> {
                $name::new(raw)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = ValueError;

            fn try_from(raw: &str) -> Result<Self, Self::Error> {
                $name::new(raw)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($debug, "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Session identity - binds every guest fact to one play session
    SessionId,
    InvalidSessionId,
    "Session"
);

string_id!(
    /// Level identity - names a unit of guest progression
    LevelId,
    InvalidLevelId,
    "Level"
);

string_id!(
    /// Name of a side-effecting host feature a guest may declare
    CapabilityName,
    InvalidCapabilityName,
    "Capability"
);
