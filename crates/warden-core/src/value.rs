//! Branded numeric values
//!
//! Guests report numbers as JSON, so every validator accepts both an `i64`
//! and an `f64` rendition of the raw input. A fractional, negative or
//! non-finite raw number never becomes a branded value.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ValueError;

/// Largest integer a JSON number can carry without losing precision
pub const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Interpret a raw float as a non-negative integer, if it is one
#[inline]
pub fn non_negative_integer(raw: f64) -> Option<u64> {
    if raw.is_finite() && raw >= 0.0 && raw.fract() == 0.0 && raw <= MAX_SAFE_INTEGER {
        Some(raw as u64)
    } else {
        None
    }
}

/// Difficulty claim - integer in [1, 10]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Difficulty(u8);

impl Difficulty {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    pub fn new(raw: i64) -> Result<Self, ValueError> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&raw) {
            Ok(Difficulty(raw as u8))
        } else {
            Err(ValueError::InvalidDifficulty(raw.to_string()))
        }
    }

    pub fn from_f64(raw: f64) -> Result<Self, ValueError> {
        match non_negative_integer(raw) {
            Some(n) if (Self::MIN as u64..=Self::MAX as u64).contains(&n) => {
                Ok(Difficulty(n as u8))
            }
            _ => Err(ValueError::InvalidDifficulty(raw.to_string())),
        }
    }

    #[inline]
    pub fn is_valid(raw: f64) -> bool {
        Self::from_f64(raw).is_ok()
    }

    #[inline]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Difficulty {
    type Error = ValueError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        Difficulty::new(raw)
    }
}

impl From<Difficulty> for u8 {
    fn from(d: Difficulty) -> u8 {
        d.0
    }
}

impl fmt::Debug for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Difficulty({})", self.0)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wall-clock instant in milliseconds
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn new(raw: i64) -> Result<Self, ValueError> {
        if raw >= 0 {
            Ok(Timestamp(raw as u64))
        } else {
            Err(ValueError::InvalidTimestamp(raw.to_string()))
        }
    }

    pub fn from_f64(raw: f64) -> Result<Self, ValueError> {
        non_negative_integer(raw)
            .map(Timestamp)
            .ok_or_else(|| ValueError::InvalidTimestamp(raw.to_string()))
    }

    #[inline]
    pub fn is_valid(raw: f64) -> bool {
        non_negative_integer(raw).is_some()
    }

    /// Unsigned milliseconds are non-negative by construction
    #[inline]
    pub fn from_millis(millis: u64) -> Self {
        Timestamp(millis)
    }

    #[inline]
    pub fn as_millis(self) -> u64 {
        self.0
    }

    /// Elapsed time since an earlier instant (zero if `earlier` is later)
    #[inline]
    pub fn elapsed_since(self, earlier: Timestamp) -> DurationMs {
        DurationMs(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t({}ms)", self.0)
    }
}

/// Non-negative span in milliseconds
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DurationMs(u64);

impl DurationMs {
    pub const ZERO: DurationMs = DurationMs(0);

    pub fn new(raw: i64) -> Result<Self, ValueError> {
        if raw >= 0 {
            Ok(DurationMs(raw as u64))
        } else {
            Err(ValueError::InvalidDuration(raw.to_string()))
        }
    }

    pub fn from_f64(raw: f64) -> Result<Self, ValueError> {
        non_negative_integer(raw)
            .map(DurationMs)
            .ok_or_else(|| ValueError::InvalidDuration(raw.to_string()))
    }

    #[inline]
    pub fn is_valid(raw: f64) -> bool {
        non_negative_integer(raw).is_some()
    }

    #[inline]
    pub fn from_millis(millis: u64) -> Self {
        DurationMs(millis)
    }

    #[inline]
    pub fn from_duration(duration: Duration) -> Self {
        DurationMs(duration.as_millis().min(u64::MAX as u128) as u64)
    }

    #[inline]
    pub fn as_millis(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.0)
    }
}

impl fmt::Debug for DurationMs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}
