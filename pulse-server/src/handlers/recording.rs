//! Recorder lifecycle verbs

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use pulse_recorder::{Recorder, RecorderConfig};
use serde::Serialize;
use tracing::{error, info};

use super::{message, MessageResponse};
use crate::errors::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub message: String,
    pub status: String,
}

/// `POST /api/start-record`
///
/// Constructs a recorder, subscribes a pump that serializes its events
/// onto the bus, and launches it in the background. A second start while
/// one is running is a conflict.
pub async fn start_record(State(state): State<AppState>) -> ApiResult<Json<MessageResponse>> {
    let mut slot = state.recorder.lock();
    if slot.running {
        return Err(ApiError::AlreadyRunning);
    }

    let config = RecorderConfig {
        addr: state.config.recorder_addr.clone(),
        out_dir: state.config.recordings_dir.clone(),
        ..RecorderConfig::default()
    };
    let addr = config.addr.clone();
    let (recorder, mut events) = Recorder::new(config).map_err(ApiError::internal)?;
    let recorder = Arc::new(recorder);

    slot.running = true;
    slot.current = Some(Arc::clone(&recorder));
    slot.generation += 1;
    let generation = slot.generation;
    drop(slot);

    info!(%addr, "starting recorder");
    state
        .broker
        .publish(format!("Recorder started on {addr}").into_bytes());

    let pump_broker = state.broker.clone();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match serde_json::to_vec(&event) {
                Ok(json) => pump_broker.publish(json),
                Err(e) => error!(error = %e, "failed to serialize recorder event"),
            }
        }
    });

    let run_broker = state.broker.clone();
    let recorder_slot = Arc::clone(&state.recorder);
    tokio::spawn(async move {
        match recorder.start().await {
            Ok(()) => run_broker.publish("Recorder stopped; session artifact written".as_bytes().to_vec()),
            Err(e) => {
                error!(error = %e, "recorder failed");
                run_broker.publish(format!("Recorder error: {e}").into_bytes());
            }
        }
        let mut slot = recorder_slot.lock();
        if slot.generation == generation {
            slot.running = false;
            slot.current = None;
        }
    });

    Ok(Json(message(format!(
        "Recorder started on {addr}; configure your client proxy to this address"
    ))))
}

/// `POST /api/stop-record`
///
/// Signals stop and replies immediately; the artifact write happens in
/// the recorder's own task.
pub async fn stop_record(State(state): State<AppState>) -> ApiResult<Json<MessageResponse>> {
    let mut slot = state.recorder.lock();
    let Some(recorder) = slot.current.take() else {
        return Err(ApiError::NotRunning);
    };
    slot.running = false;
    drop(slot);

    recorder.stop();
    info!("recorder stop requested");
    state.broker.publish(
        format!(
            "Recorder stopped; writing session to {}",
            state.config.recordings_dir.display()
        )
        .into_bytes(),
    );

    Ok(Json(message(format!(
        "Recorder stopped; session written to {}",
        state.config.recordings_dir.display()
    ))))
}

/// `GET /api/status`
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let running = state.recorder.lock().running;
    let message = if running {
        format!("Recorder is running on {}", state.config.recorder_addr)
    } else {
        "Recorder is idle".to_string()
    };
    Json(StatusResponse {
        running,
        message,
        status: "ok".to_string(),
    })
}

/// `GET /api/recordings`: `.yaml` file names in the recordings directory.
pub async fn list_recordings(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    let mut entries = tokio::fs::read_dir(&state.config.recordings_dir)
        .await
        .map_err(|_| ApiError::Internal("cannot read recordings directory".to_string()))?;

    let mut recordings = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if is_file && name.ends_with(".yaml") {
            recordings.push(name);
        }
    }
    recordings.sort();
    Ok(Json(recordings))
}
