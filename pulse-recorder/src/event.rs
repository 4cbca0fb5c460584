//! Live observations emitted by the proxy
//!
//! These ride the event channel only; they carry the response body for
//! live viewers, which the persisted artifact deliberately omits.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One request observation, as serialized onto the event bus
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecorderEvent {
    pub method: String,
    pub url: String,
    pub status: u16,
    /// Local wall-clock time, `HH:MM:SS`
    pub time: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub response: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub proto: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub port: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub err: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub note: String,
}
