//! Warden Core - Fundamental types for the guest boundary
//!
//! This crate defines the types shared by every layer of the boundary:
//! - Branded identifiers (SessionId, LevelId, CapabilityName)
//! - Branded values (Difficulty, Timestamp, DurationMs)
//! - The closed guest event vocabulary
//! - Lifecycle context snapshots
//! - Injected clocks and the validation mode
//! - The error taxonomy
//! - Panic containment for callbacks

pub mod id;
pub mod value;
pub mod event;
pub mod context;
pub mod clock;
pub mod mode;
pub mod error;
pub mod contain;

pub use id::*;
pub use value::*;
pub use event::*;
pub use context::*;
pub use clock::*;
pub use mode::*;
pub use error::*;
pub use contain::*;
