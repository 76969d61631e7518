//! Warden Runtime - Host-side wiring of the guest boundary
//!
//! A [`GuestHost`] owns one session driver, one emission pipeline with the
//! lifecycle gate installed as its admission filter, and one capability
//! guard. The rendering adapter receives the driver and a gated
//! [`Emitter`]; nothing else crosses to the guest.

pub mod config;
pub mod observability;
pub mod admission;
pub mod host;

pub use config::*;
pub use observability::*;
pub use admission::*;
pub use host::*;
