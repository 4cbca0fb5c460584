//! Live event model
//!
//! Events are the bus payload: one per completed request, plus synthetic
//! ramp-progress markers. `status == 0` means the request never received a
//! response; a populated `err` marks the observation as a failure even when
//! the status is a 2xx.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::CoreError;

/// Methods that mark an event as system-generated rather than a request
/// observation. The ingest path drops these.
const SYSTEM_METHODS: [&str; 3] = ["", "SYSTEM", "INFO"];

/// A single observation published on the event bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub ts: DateTime<Utc>,
    pub name: String,
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub latency_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
    #[serde(default)]
    pub concurrency: u32,
}

impl Event {
    /// Whether the consumer must count this observation as a failure.
    pub fn is_failure(&self) -> bool {
        self.err.as_deref().is_some_and(|e| !e.is_empty())
    }

    /// Whether this is a system-class event (ramp markers, log lines).
    pub fn is_system(&self) -> bool {
        SYSTEM_METHODS.contains(&self.method.as_str())
    }

    /// Enforce the event integrity invariants.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.status != 0 && !(100..=599).contains(&self.status) {
            return Err(CoreError::invalid_event(format!(
                "status {} out of range",
                self.status
            )));
        }
        if !self.latency_ms.is_finite() || self.latency_ms < 0.0 {
            return Err(CoreError::invalid_event(format!(
                "latency_ms {} is negative or not a number",
                self.latency_ms
            )));
        }
        Ok(())
    }
}

/// Non-blocking destination for events.
///
/// Offers must complete in bounded time regardless of consumer liveness;
/// implementations drop the event when their queue is full.
pub trait EventSink: Send + Sync {
    fn offer(&self, event: &Event);
}

impl EventSink for mpsc::Sender<Event> {
    fn offer(&self, event: &Event) {
        let _ = self.try_send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(status: u16, latency_ms: f64) -> Event {
        Event {
            ts: Utc::now(),
            name: "GET /".into(),
            method: "GET".into(),
            path: "/".into(),
            status,
            latency_ms,
            err: None,
            concurrency: 1,
        }
    }

    #[test]
    fn json_field_names_match_wire_format() {
        let ev = event(200, 12.5);
        let value: serde_json::Value = serde_json::to_value(&ev).unwrap();
        for key in ["ts", "name", "method", "path", "status", "latency_ms", "concurrency"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        // err is elided when absent
        assert!(value.get("err").is_none());
    }

    #[test]
    fn validates_status_range_and_latency() {
        assert!(event(0, 0.0).validate().is_ok());
        assert!(event(100, 1.0).validate().is_ok());
        assert!(event(599, 1.0).validate().is_ok());
        assert!(event(42, 1.0).validate().is_err());
        assert!(event(600, 1.0).validate().is_err());
        assert!(event(200, -1.0).validate().is_err());
        assert!(event(200, f64::NAN).validate().is_err());
    }

    #[test]
    fn error_marks_failure_regardless_of_status() {
        let mut ev = event(200, 1.0);
        assert!(!ev.is_failure());
        ev.err = Some("connection reset".into());
        assert!(ev.is_failure());
    }

    #[test]
    fn system_events_are_classified() {
        let mut ev = event(0, 0.0);
        for method in ["SYSTEM", "INFO", ""] {
            ev.method = method.into();
            assert!(ev.is_system());
        }
        ev.method = "GET".into();
        assert!(!ev.is_system());
    }

    #[tokio::test]
    async fn sink_offer_drops_when_full() {
        let (tx, mut rx) = mpsc::channel::<Event>(1);
        let ev = event(200, 1.0);
        tx.offer(&ev);
        tx.offer(&ev); // queue full, dropped
        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }
}
