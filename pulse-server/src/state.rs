//! Shared application state

use std::sync::Arc;

use parking_lot::Mutex;
use pulse_broker::EventBroker;
use pulse_recorder::Recorder;

use crate::config::ServerConfig;

/// State shared across handlers. One broker and at most one live recorder
/// per process; the recorder slot's mutex serializes every lifecycle
/// transition, while the ingest path never touches it.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub broker: EventBroker,
    pub recorder: Arc<Mutex<RecorderSlot>>,
}

/// The currently owned recorder, if any. `generation` ties background
/// cleanup to the instance that spawned it, so a stale task never clears
/// a successor's slot.
#[derive(Default)]
pub struct RecorderSlot {
    pub running: bool,
    pub current: Option<Arc<Recorder>>,
    pub generation: u64,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
            broker: EventBroker::new(),
            recorder: Arc::new(Mutex::new(RecorderSlot::default())),
        }
    }
}
