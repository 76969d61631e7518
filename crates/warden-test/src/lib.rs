//! Warden Test Harness - Boundary scenarios and fuzzing
//!
//! This crate provides:
//! - A scripted scenario harness over a fully wired guest host
//! - Recording handlers and drop logs
//! - A seeded raw-event fuzzer for the validator and pipeline
//! - Reference end-to-end scenarios

pub mod harness;
pub mod event_fuzzer;
pub mod scenarios;

pub use harness::*;
pub use event_fuzzer::*;
pub use scenarios::*;
