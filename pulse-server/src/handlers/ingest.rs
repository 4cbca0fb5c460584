//! Event ingest and scenario verbs

use std::path::Path;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use pulse_core::Event;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{error, info};

use super::{message, MessageResponse};
use crate::errors::{ApiError, ApiResult};
use crate::state::AppState;

/// `POST /api/report`
///
/// Ingest for external worker processes. System-class events are dropped
/// on the floor; valid observations are published to every subscriber.
/// This path never touches the recorder mutex.
pub async fn report(
    State(state): State<AppState>,
    payload: Result<Json<Event>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Json(event) = payload.map_err(|e| ApiError::InvalidEvent(e.body_text()))?;
    event
        .validate()
        .map_err(|e| ApiError::InvalidEvent(e.to_string()))?;

    if event.is_system() {
        return Ok(Json(message("System event ignored")));
    }

    info!(
        name = %event.name,
        path = %event.path,
        status = event.status,
        latency_ms = event.latency_ms,
        "report received"
    );

    let json = serde_json::to_vec(&event).map_err(ApiError::internal)?;
    state.broker.publish(json);
    Ok(Json(message("Report received successfully")))
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub file: String,
}

/// `POST /api/run`
///
/// Launches a scenario run in the background. Per-request events flow to
/// the bus; the summary lands in the results directory when the wall
/// clock expires.
pub async fn run_scenario(
    State(state): State<AppState>,
    payload: Result<Json<RunRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let name = Path::new(&request.file)
        .file_name()
        .ok_or_else(|| ApiError::bad_request("invalid scenario file name"))?
        .to_owned();
    let path = state.config.uploads_dir.join(&name);

    // Validate up front so a broken upload fails the request, not the run.
    pulse_core::load_scenario_file(&path).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let broker = state.broker.clone();
    let results_dir = state.config.results_dir.clone();
    tokio::spawn(async move {
        let (tx, mut rx) = mpsc::channel::<Event>(100);

        let pump = {
            let broker = broker.clone();
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    if let Ok(json) = serde_json::to_vec(&event) {
                        broker.publish(json);
                    }
                }
            })
        };

        match pulse_engine::run_with_events(&path, Arc::new(tx)).await {
            Ok(summary) => {
                if let Err(e) = summary.write_json(&results_dir) {
                    error!(error = %e, "could not persist run summary");
                }
                broker.publish(
                    format!(
                        "Run finished: {} requests, {} failures",
                        summary.total_requests, summary.failures
                    )
                    .into_bytes(),
                );
            }
            Err(e) => {
                error!(error = %e, "scenario run failed");
                broker.publish(format!("Run failed: {e}").into_bytes());
            }
        }
        let _ = pump.await;
    });

    Ok(Json(message(format!(
        "Running scenario {}",
        name.to_string_lossy()
    ))))
}

/// `POST /api/scenarios`
///
/// Stores a raw YAML scenario under the uploads directory after checking
/// that it parses.
pub async fn upload_scenario(
    State(state): State<AppState>,
    body: String,
) -> ApiResult<Json<MessageResponse>> {
    pulse_core::parse_scenario_file(&body).map_err(|e| ApiError::bad_request(e.to_string()))?;

    tokio::fs::create_dir_all(&state.config.uploads_dir)
        .await
        .map_err(ApiError::internal)?;
    let path = state.config.uploads_dir.join("totest.yaml");
    tokio::fs::write(&path, body.as_bytes())
        .await
        .map_err(ApiError::internal)?;

    info!(path = %path.display(), "scenario stored");
    Ok(Json(message("Scenario stored as totest.yaml")))
}
