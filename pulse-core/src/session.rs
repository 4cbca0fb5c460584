//! Recorded-session artifact
//!
//! The proxy accumulates [`RecordedRequest`]s in memory and, on stop, maps
//! them into a [`SessionDocument`]: a flat scenario header plus one request
//! entry per capture. The `Cookie` header is stripped from the artifact;
//! request bodies are stored as raw strings.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::scenario::{Profile, Protocol, RequestSpec, Scenario};

/// One request observed by the recording proxy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedRequest {
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cookies: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub proto: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// On-disk session artifact header and request list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDocument {
    pub version: String,
    pub scenario: String,
    pub concurrency: u32,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    #[serde(default)]
    pub requests: Vec<SessionRequest>,
}

/// One artifact entry; [`RequestSpec`] plus the tunnel note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub name: String,
    pub method: String,
    pub protocol: Protocol,
    pub host: String,
    pub path: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl SessionDocument {
    /// Map captured requests into the artifact grammar.
    pub fn from_records(records: &[RecordedRequest]) -> Self {
        let requests = records
            .iter()
            .enumerate()
            .map(|(i, rec)| {
                let (protocol, path) = split_url(&rec.url, &rec.host);
                let headers = rec
                    .headers
                    .iter()
                    .filter(|(k, _)| !k.eq_ignore_ascii_case("cookie"))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                SessionRequest {
                    name: format!("{:02}_{}", i + 1, sanitize_name(&format!("{}_{}", rec.method, rec.host))),
                    method: rec.method.clone(),
                    protocol,
                    host: rec.host.clone(),
                    path,
                    headers,
                    body: rec.body.clone(),
                    note: rec.note.clone(),
                }
            })
            .collect();

        SessionDocument {
            version: "1.0".to_string(),
            scenario: "Recorded Session".to_string(),
            concurrency: 1,
            duration: Duration::from_secs(10),
            requests,
        }
    }

    /// Emit the canonical YAML form.
    pub fn emit(&self) -> Result<String, CoreError> {
        serde_yaml::to_string(self).map_err(|e| CoreError::malformed(e.to_string()))
    }

    /// Turn the artifact back into an executable scenario.
    pub fn into_scenario(self) -> Scenario {
        let requests = self
            .requests
            .into_iter()
            .map(|r| RequestSpec {
                name: r.name,
                method: r.method,
                protocol: r.protocol,
                host: r.host,
                path: r.path,
                headers: r.headers,
                body: r.body,
            })
            .collect();
        Scenario {
            name: self.scenario,
            profile: Profile {
                concurrency: self.concurrency,
                duration: self.duration,
                ..Profile::default()
            },
            requests,
        }
    }
}

/// Derive protocol and path from a captured URL. The path is the URL with
/// `scheme://host` removed; a URL without a scheme (CONNECT targets) keeps
/// its full form and maps to https.
fn split_url(url: &str, host: &str) -> (Protocol, String) {
    if url.starts_with("http://") {
        let prefix = format!("http://{host}");
        (Protocol::Http, url.strip_prefix(&prefix).unwrap_or(url).to_string())
    } else if url.starts_with("https://") {
        let prefix = format!("https://{host}");
        (Protocol::Https, url.strip_prefix(&prefix).unwrap_or(url).to_string())
    } else {
        (Protocol::Https, url.to_string())
    }
}

fn sanitize_name(s: &str) -> String {
    s.replace([':', '/', ' '], "_")
}
