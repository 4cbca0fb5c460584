//! Scenario file grammar and codec
//!
//! A scenario file declares one or more named workloads; only the first
//! scenario is ever executed. Parsing is tolerant: optional fields default
//! (`concurrency = 0`, durations to zero, headers and body empty) and only
//! unreadable input or an unparseable duration string is rejected.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::session::SessionDocument;

/// Top-level scenario document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioFile {
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
}

/// A named workload: a load profile plus an ordered request list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub profile: Profile,
    #[serde(default)]
    pub requests: Vec<RequestSpec>,
}

/// Load profile for a scenario
///
/// `ramp_down`, `iterations` and `startup_delay` are part of the grammar
/// but reserved: they round-trip through the codec and are never read by
/// the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub concurrency: u32,
    #[serde(with = "humantime_serde", default)]
    pub ramp_up: Duration,
    #[serde(with = "humantime_serde", default)]
    pub duration: Duration,
    #[serde(
        with = "humantime_serde::option",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub ramp_down: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u32>,
    #[serde(
        with = "humantime_serde::option",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub startup_delay: Option<Duration>,
}

/// Scheme a request is issued over
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => write!(f, "http"),
            Protocol::Https => write!(f, "https"),
        }
    }
}

/// One request descriptor inside a scenario
///
/// Names need not be unique; aggregation keys use [`RequestSpec::canonical_key`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,
}

impl RequestSpec {
    /// Full URL the worker issues: `protocol://host||path`
    pub fn url(&self) -> String {
        format!("{}://{}{}", self.protocol, self.host, self.path)
    }

    /// Canonical aggregation key: `"METHOD PATH"`
    pub fn canonical_key(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// Parse a scenario document from YAML text.
///
/// A document without a `scenarios` key is tried as a recorded-session
/// artifact and mapped to a single scenario, so recordings replay directly.
pub fn parse_scenario_file(input: &str) -> Result<ScenarioFile, CoreError> {
    let file: ScenarioFile = serde_yaml::from_str(input)
        .map_err(|e| CoreError::malformed(format!("invalid YAML format: {e}")))?;

    if !file.scenarios.is_empty() {
        return Ok(file);
    }

    if let Ok(session) = serde_yaml::from_str::<SessionDocument>(input) {
        if !session.requests.is_empty() {
            return Ok(ScenarioFile {
                scenarios: vec![session.into_scenario()],
            });
        }
    }

    Ok(file)
}

/// Read and parse a scenario file from disk.
pub fn load_scenario_file(path: impl AsRef<Path>) -> Result<ScenarioFile, CoreError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| CoreError::malformed(format!("cannot read {}: {e}", path.display())))?;
    parse_scenario_file(&content)
}

/// Load a scenario file and return the scenario the engine executes.
pub fn load_first_scenario(path: impl AsRef<Path>) -> Result<Scenario, CoreError> {
    let file = load_scenario_file(path)?;
    file.scenarios
        .into_iter()
        .next()
        .ok_or_else(|| CoreError::malformed("no scenarios found in file"))
}

/// Emit the canonical YAML form of a scenario document.
pub fn emit_scenario_file(file: &ScenarioFile) -> Result<String, CoreError> {
    serde_yaml::to_string(file).map_err(|e| CoreError::malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
scenarios:
  - name: checkout flow
    profile:
      concurrency: 4
      ramp_up: 400ms
      duration: 500ms
      iterations: 3
    requests:
      - name: home
        method: GET
        protocol: http
        host: 127.0.0.1:8080
        path: /
        headers:
          Accept: text/html
      - name: submit
        method: POST
        protocol: https
        host: shop.example.com
        path: /cart
        headers:
          Content-Type: application/json
        body: '{"sku":1}'
"#;

    #[test]
    fn parses_full_document() {
        let file = parse_scenario_file(FULL).unwrap();
        assert_eq!(file.scenarios.len(), 1);

        let scenario = &file.scenarios[0];
        assert_eq!(scenario.name, "checkout flow");
        assert_eq!(scenario.profile.concurrency, 4);
        assert_eq!(scenario.profile.ramp_up, Duration::from_millis(400));
        assert_eq!(scenario.profile.duration, Duration::from_millis(500));
        assert_eq!(scenario.profile.iterations, Some(3));
        assert_eq!(scenario.profile.ramp_down, None);

        let submit = &scenario.requests[1];
        assert_eq!(submit.url(), "https://shop.example.com/cart");
        assert_eq!(submit.canonical_key(), "POST /cart");
        assert_eq!(submit.body, r#"{"sku":1}"#);
    }

    #[test]
    fn missing_optionals_default() {
        let file = parse_scenario_file(
            "scenarios:\n  - name: bare\n    requests:\n      - method: GET\n        host: a\n        path: /\n",
        )
        .unwrap();
        let scenario = &file.scenarios[0];
        assert_eq!(scenario.profile.concurrency, 0);
        assert_eq!(scenario.profile.duration, Duration::ZERO);
        assert!(scenario.requests[0].headers.is_empty());
        assert!(scenario.requests[0].body.is_empty());
        assert_eq!(scenario.requests[0].protocol, Protocol::Http);
    }

    #[test]
    fn rejects_bad_duration() {
        let err = parse_scenario_file(
            "scenarios:\n  - name: x\n    profile:\n      duration: forever-and-a-day\n",
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::MalformedScenario(_)));
    }

    #[test]
    fn rejects_unreadable_input() {
        assert!(matches!(
            parse_scenario_file("scenarios: [:::"),
            Err(CoreError::MalformedScenario(_))
        ));
        assert!(matches!(
            load_scenario_file("/no/such/file.yaml"),
            Err(CoreError::MalformedScenario(_))
        ));
    }

    #[test]
    fn round_trip_is_identity() {
        let file = parse_scenario_file(FULL).unwrap();
        let emitted = emit_scenario_file(&file).unwrap();
        let reparsed = parse_scenario_file(&emitted).unwrap();
        assert_eq!(file, reparsed);
    }

    #[test]
    fn session_artifact_parses_as_scenario() {
        let yaml = r#"
version: "1.0"
scenario: Recorded Session
concurrency: 1
duration: 10s
requests:
  - name: 01_GET_example.com
    method: GET
    protocol: http
    host: example.com
    path: /hello
    headers:
      Accept: "*/*"
"#;
        let file = parse_scenario_file(yaml).unwrap();
        assert_eq!(file.scenarios.len(), 1);
        let scenario = &file.scenarios[0];
        assert_eq!(scenario.name, "Recorded Session");
        assert_eq!(scenario.profile.concurrency, 1);
        assert_eq!(scenario.profile.duration, Duration::from_secs(10));
        assert_eq!(scenario.requests[0].url(), "http://example.com/hello");
    }
}
