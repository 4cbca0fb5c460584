//! Scenario execution
//!
//! Phase 1 plans the ramp schedule, phase 2 drives exactly `concurrency`
//! workers against the wall clock, phase 3 drains results into the
//! statistics buckets, phase 4 summarizes. Results are never dropped:
//! workers block on the bounded results channel if the consumer lags.
//! Event offers are the opposite, best-effort and lossy.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use pulse_core::{load_first_scenario, Event, EventSink, RequestSpec, Scenario};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::EngineError;
use crate::stats::Stats;
use crate::summary::Summary;

const RESULTS_CAPACITY: usize = 10_000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

struct WorkerResult {
    name: String,
    method: String,
    path: String,
    status: u16,
    latency: Duration,
    err: Option<String>,
}

/// Run a scenario file and print its summary.
pub async fn run(path: impl AsRef<Path>) -> Result<Summary, EngineError> {
    run_internal(path.as_ref(), None).await
}

/// Like [`run`], but offers an [`Event`] per completed request to `sink`.
pub async fn run_with_events(
    path: impl AsRef<Path>,
    sink: Arc<dyn EventSink>,
) -> Result<Summary, EngineError> {
    run_internal(path.as_ref(), Some(sink)).await
}

async fn run_internal(
    path: &Path,
    sink: Option<Arc<dyn EventSink>>,
) -> Result<Summary, EngineError> {
    let scenario = Arc::new(load_first_scenario(path)?);
    let profile = &scenario.profile;

    info!(
        scenario = %scenario.name,
        concurrency = profile.concurrency,
        duration = ?profile.duration,
        ramp_up = ?profile.ramp_up,
        "running scenario"
    );

    let step = if profile.ramp_up > Duration::ZERO && profile.concurrency > 0 {
        profile.ramp_up / profile.concurrency
    } else {
        Duration::ZERO
    };

    let (results_tx, mut results_rx) = mpsc::channel::<WorkerResult>(RESULTS_CAPACITY);
    let active_users = Arc::new(AtomicU32::new(0));
    let start = Instant::now();

    if profile.duration > Duration::ZERO {
        for index in 0..profile.concurrency {
            tokio::spawn(worker(
                index,
                step,
                start,
                profile.duration,
                Arc::clone(&scenario),
                results_tx.clone(),
                Arc::clone(&active_users),
                sink.clone(),
            ));
        }
    }
    // The channel closes when the last worker drops its sender; holding
    // ours past this point would stall the drain loop forever.
    drop(results_tx);

    let mut stats = Stats::default();
    while let Some(result) = results_rx.recv().await {
        if let Some(sink) = &sink {
            sink.offer(&Event {
                ts: Utc::now(),
                name: result.name.clone(),
                method: result.method,
                path: result.path,
                status: result.status,
                latency_ms: crate::stats::ms(result.latency),
                err: result.err.clone(),
                concurrency: active_users.load(Ordering::Relaxed),
            });
        }
        stats.record(&result.name, result.latency, result.err.is_some());
    }

    let summary = stats.summarize(&scenario.name);
    summary.print();
    Ok(summary)
}

#[allow(clippy::too_many_arguments)]
async fn worker(
    index: u32,
    step: Duration,
    start: Instant,
    duration: Duration,
    scenario: Arc<Scenario>,
    results: mpsc::Sender<WorkerResult>,
    active_users: Arc<AtomicU32>,
    sink: Option<Arc<dyn EventSink>>,
) {
    if step > Duration::ZERO {
        tokio::time::sleep(step * index).await;
    }

    let current = active_users.fetch_add(1, Ordering::Relaxed) + 1;
    if let Some(sink) = &sink {
        sink.offer(&Event {
            ts: Utc::now(),
            name: "RAMP_PROGRESS".to_string(),
            method: "SYSTEM".to_string(),
            path: format!("Worker #{} started", index + 1),
            status: 0,
            latency_ms: 0.0,
            err: None,
            concurrency: current,
        });
    }

    let client = match reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => {
            warn!(worker = index, error = %e, "could not build HTTP client");
            return;
        }
    };

    while start.elapsed() < duration {
        for spec in &scenario.requests {
            if start.elapsed() >= duration {
                break;
            }
            let (status, latency, err) = execute(&client, spec).await;
            let result = WorkerResult {
                name: spec.canonical_key(),
                method: spec.method.clone(),
                path: spec.path.clone(),
                status,
                latency,
                err,
            };
            if results.send(result).await.is_err() {
                return;
            }
        }
    }
}

/// Issue one request and classify the outcome. Latency brackets the
/// response-header round trip; the body is drained afterwards and
/// discarded.
async fn execute(client: &reqwest::Client, spec: &RequestSpec) -> (u16, Duration, Option<String>) {
    let method = match reqwest::Method::from_bytes(spec.method.as_bytes()) {
        Ok(method) => method,
        Err(e) => return (0, Duration::ZERO, Some(format!("invalid method {:?}: {e}", spec.method))),
    };

    let mut request = client.request(method, spec.url());
    for (name, value) in &spec.headers {
        request = request.header(name.as_str(), value.as_str());
    }
    if !spec.body.is_empty() {
        request = request.body(spec.body.clone());
    }

    let issued = Instant::now();
    let response = request.send().await;
    let latency = issued.elapsed();

    match response {
        Ok(response) => {
            let status = response.status().as_u16();
            let _ = response.bytes().await;
            if status >= 400 {
                (status, latency, Some(format!("status {status}")))
            } else {
                (status, latency, None)
            }
        }
        Err(e) => (0, latency, Some(e.to_string())),
    }
}
