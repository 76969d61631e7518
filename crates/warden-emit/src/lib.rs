//! Warden Emit - Guest event emission pipeline
//!
//! `emit` is the only door a guest has into the host. It returns nothing,
//! never blocks and never panics out. Each raw event passes, in order:
//! 1. Rate limit (fixed budget per sliding window)
//! 2. Production-only discard of `DEV_LOG`
//! 3. Validation and clamping
//! 4. Optional admission filter
//! 5. Enrichment with host metadata
//! 6. Fan-out to every handler, each call contained
//!
//! Anything refused along the way is counted and reported, never queued.

pub mod window;
pub mod enriched;
pub mod handler;
pub mod stats;
pub mod pipeline;

pub use window::*;
pub use enriched::*;
pub use handler::*;
pub use stats::*;
pub use pipeline::*;
