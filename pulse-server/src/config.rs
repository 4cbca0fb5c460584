//! Server configuration

use std::path::PathBuf;
use std::time::Duration;

/// Tunables for the control surface
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the recording proxy binds when started
    pub recorder_addr: String,
    /// Directory recorded sessions are written to and listed from
    pub recordings_dir: PathBuf,
    /// Directory uploaded scenarios are stored in
    pub uploads_dir: PathBuf,
    /// Directory run summaries are written to
    pub results_dir: PathBuf,
    /// Idle keep-alive interval for the control event stream
    pub heartbeat: Duration,
    /// Heartbeat interval for the recorder log feed
    pub log_heartbeat: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            recorder_addr: "0.0.0.0:8888".to_string(),
            recordings_dir: PathBuf::from("examples"),
            uploads_dir: PathBuf::from("uploads"),
            results_dir: PathBuf::from("results"),
            heartbeat: Duration::from_secs(10),
            log_heartbeat: Duration::from_secs(5),
        }
    }
}
