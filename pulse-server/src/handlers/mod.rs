//! Control-surface handlers

mod ingest;
mod recording;
mod streams;

pub use ingest::{report, run_scenario, upload_scenario};
pub use recording::{list_recordings, start_record, status, stop_record};
pub use streams::{stream_events, stream_logs};

use serde::Serialize;

/// Uniform `{message}` reply body
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub(crate) fn message(text: impl Into<String>) -> MessageResponse {
    MessageResponse {
        message: text.into(),
    }
}
