//! Warden Validate - Event validation engine
//!
//! Raw guest input is untrusted data. This crate turns a raw JSON value into
//! a typed [`GuestEvent`](warden_core::GuestEvent) under a fixed policy:
//! - Structural fields (identifiers, enumerated reasons, control-flow counts)
//!   reject the whole event when invalid; every violation is reported
//! - Analytics fields (proportions, magnitudes, counts, intensities) are
//!   clamped into range with a warning and never cause a rejection
//! - Non-numeric analytics values are dropped with a warning
//! - Oversized input is rejected before any per-kind work

pub mod outcome;
pub mod size;
pub mod fields;
pub mod validator;

pub use outcome::*;
pub use size::*;
pub use validator::*;
