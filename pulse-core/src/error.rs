//! Core error types

/// Error type for the shared data model
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("malformed scenario: {0}")]
    MalformedScenario(String),

    #[error("invalid event: {0}")]
    InvalidEvent(String),
}

impl CoreError {
    pub fn malformed(message: impl Into<String>) -> Self {
        CoreError::MalformedScenario(message.into())
    }

    pub fn invalid_event(message: impl Into<String>) -> Self {
        CoreError::InvalidEvent(message.into())
    }
}
