//! Recorder configuration

use std::path::PathBuf;
use std::time::Duration;

/// Tunables for the recording proxy
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Address the proxy listens on
    pub addr: String,
    /// Directory session artifacts are written to
    pub out_dir: PathBuf,
    /// Connect timeout for CONNECT tunnel targets
    pub dial_timeout: Duration,
    /// Grace period for in-flight traffic after a stop signal
    pub drain: Duration,
    /// Hard deadline for open connections during shutdown
    pub shutdown_deadline: Duration,
    /// Capacity of the live events channel
    pub events_capacity: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8888".to_string(),
            out_dir: PathBuf::from("examples"),
            dial_timeout: Duration::from_secs(10),
            drain: Duration::from_secs(2),
            shutdown_deadline: Duration::from_secs(5),
            events_capacity: 100,
        }
    }
}
