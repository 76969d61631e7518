//! Pipeline counters

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Why the pipeline dropped an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    RateLimited,
    FilteredDevLog,
    Invalid,
    NotAdmitted,
    InternalError,
}

impl DropReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DropReason::RateLimited => "rate_limited",
            DropReason::FilteredDevLog => "filtered_dev_log",
            DropReason::Invalid => "invalid",
            DropReason::NotAdmitted => "not_admitted",
            DropReason::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time copy of the pipeline counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStats {
    pub delivered: u64,
    /// Sum of every per-reason drop counter
    pub dropped: u64,
    pub rate_limited: u64,
    pub filtered_dev_log: u64,
    pub invalid: u64,
    pub not_admitted: u64,
    pub internal_error: u64,
    /// Handler calls that failed; the event still counts as delivered
    pub handler_errors: u64,
}

impl PipelineStats {
    pub fn dropped_for(&self, reason: DropReason) -> u64 {
        match reason {
            DropReason::RateLimited => self.rate_limited,
            DropReason::FilteredDevLog => self.filtered_dev_log,
            DropReason::Invalid => self.invalid,
            DropReason::NotAdmitted => self.not_admitted,
            DropReason::InternalError => self.internal_error,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    delivered: AtomicU64,
    dropped: AtomicU64,
    rate_limited: AtomicU64,
    filtered_dev_log: AtomicU64,
    invalid: AtomicU64,
    not_admitted: AtomicU64,
    internal_error: AtomicU64,
    handler_errors: AtomicU64,
}

impl Counters {
    pub(crate) fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_handler_error(&self) {
        self.handler_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_drop(&self, reason: DropReason) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        let counter = match reason {
            DropReason::RateLimited => &self.rate_limited,
            DropReason::FilteredDevLog => &self.filtered_dev_log,
            DropReason::Invalid => &self.invalid,
            DropReason::NotAdmitted => &self.not_admitted,
            DropReason::InternalError => &self.internal_error,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            filtered_dev_log: self.filtered_dev_log.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
            not_admitted: self.not_admitted.load(Ordering::Relaxed),
            internal_error: self.internal_error.load(Ordering::Relaxed),
            handler_errors: self.handler_errors.load(Ordering::Relaxed),
        }
    }
}
