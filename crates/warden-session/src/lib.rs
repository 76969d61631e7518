//! Warden Session - Lifecycle state machine and event gate
//!
//! The driver owns the single source of truth for where a guest session is
//! (`INITIAL -> IN_SESSION -> ENDED`, never backwards). The gate is a pure
//! function of a lifecycle snapshot and an event deciding whether the event
//! may be admitted.

pub mod driver;
pub mod gate;

pub use driver::*;
pub use gate::*;
