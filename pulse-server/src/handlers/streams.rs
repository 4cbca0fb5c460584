//! SSE stream handlers
//!
//! Both endpoints subscribe to the shared bus; the subscription is
//! released when the client disconnects and its stream is dropped. A
//! subscriber that cannot keep up misses messages, never blocks the bus.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use chrono::Local;
use futures::stream::Stream;
use futures::StreamExt;
use tokio_stream::wrappers::IntervalStream;

use crate::state::AppState;

/// `GET /api/events`: control stream with comment keep-alives (`: ping`)
/// when idle.
pub async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let messages = state
        .broker
        .subscribe()
        .into_stream()
        .map(|bytes| Ok(SseEvent::default().data(String::from_utf8_lossy(&bytes).into_owned())));

    Sse::new(messages).keep_alive(
        KeepAlive::new()
            .interval(state.config.heartbeat)
            .text("ping"),
    )
}

/// `GET /api/logs`: recorder log feed; interleaves a visible heartbeat
/// data message on a fixed cadence.
pub async fn stream_logs(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let messages = state
        .broker
        .subscribe()
        .into_stream()
        .map(|bytes| SseEvent::default().data(String::from_utf8_lossy(&bytes).into_owned()));

    let period = state.config.log_heartbeat;
    let first_tick = tokio::time::Instant::now() + period;
    let heartbeats = IntervalStream::new(tokio::time::interval_at(first_tick, period)).map(|_| {
        SseEvent::default().data(format!("🔄 heartbeat {}", Local::now().format("%H:%M:%S")))
    });

    Sse::new(futures::stream::select(messages, heartbeats).map(Ok))
}
