//! Load engine
//!
//! Reads a scenario, ramps up virtual users on a schedule, drives the
//! scenario's requests for a bounded wall-clock duration, and aggregates
//! per-endpoint latency statistics. Per-request failures are data, not
//! errors: they become event fields and failure counts, never aborts.

pub mod error;
pub mod runner;
pub mod stats;
pub mod summary;

pub use error::EngineError;
pub use runner::{run, run_with_events};
pub use summary::{EndpointSummary, Summary};
