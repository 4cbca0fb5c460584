//! Recorder error types

/// Error type for proxy operations
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("failed to bind {addr}: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("upstream request failed: {0}")]
    UpstreamFailure(String),

    #[error("client connection could not be hijacked: {0}")]
    HijackUnavailable(String),

    #[error("tunnel dial to {host} failed: {message}")]
    DialFailed { host: String, message: String },

    #[error("failed to write session artifact: {0}")]
    WriteArtifactFailed(String),
}
