//! Engine error types

use pulse_core::CoreError;

/// Error type for scenario execution
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Scenario(#[from] CoreError),

    #[error("failed to write summary: {0}")]
    SummaryWrite(String),
}
