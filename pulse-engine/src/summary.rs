//! Run summaries: console report and JSON artifact

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Aggregated view over a whole run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub scenario: String,
    pub total_requests: usize,
    pub failures: usize,
    pub avg_ms: f64,
    pub p95_ms: f64,
    pub endpoints: Vec<EndpointSummary>,
}

/// One `"METHOD PATH"` row of the per-request table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointSummary {
    pub name: String,
    pub count: usize,
    pub failures: usize,
    pub err_pct: f64,
    pub avg_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
}

impl Summary {
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Print the per-request table and global totals to stdout.
    pub fn print(&self) {
        if self.is_empty() {
            println!("No requests executed.");
            return;
        }

        println!("\n--- PER REQUEST METRICS ---");
        println!(
            "{:<30} {:<10} {:<10} {:<10} {:<10} {:<10} {:<10}",
            "Request", "Count", "Fails", "Err(%)", "Avg(ms)", "P90(ms)", "P95(ms)"
        );
        for row in &self.endpoints {
            println!(
                "{:<30} {:<10} {:<10} {:<10.2} {:<10.2} {:<10.2} {:<10.2}",
                row.name, row.count, row.failures, row.err_pct, row.avg_ms, row.p90_ms, row.p95_ms
            );
        }

        println!("\n--- RESULTS ---");
        println!("Total Requests: {}", self.total_requests);
        println!("Failures: {}", self.failures);
        println!("Average Latency: {:.2}ms", self.avg_ms);
        println!("P95 Latency: {:.2}ms", self.p95_ms);
        println!("----------------");
    }

    /// Persist the summary as `run_YYYY-MM-DD_HHMMSS.summary.json` under
    /// `dir`, returning the file path.
    pub fn write_json(&self, dir: impl AsRef<Path>) -> Result<PathBuf, EngineError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .map_err(|e| EngineError::SummaryWrite(format!("create {}: {e}", dir.display())))?;

        let filename = format!("run_{}.summary.json", Local::now().format("%Y-%m-%d_%H%M%S"));
        let path = dir.join(filename);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::SummaryWrite(e.to_string()))?;
        fs::write(&path, json)
            .map_err(|e| EngineError::SummaryWrite(format!("write {}: {e}", path.display())))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_json_round_trips() {
        let summary = Summary {
            scenario: "s".into(),
            total_requests: 2,
            failures: 1,
            avg_ms: 3.5,
            p95_ms: 6.0,
            endpoints: vec![EndpointSummary {
                name: "GET /".into(),
                count: 2,
                failures: 1,
                err_pct: 50.0,
                avg_ms: 3.5,
                p90_ms: 6.0,
                p95_ms: 6.0,
            }],
        };

        let dir = tempfile::tempdir().unwrap();
        let path = summary.write_json(dir.path()).unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("run_"));
        assert!(name.ends_with(".summary.json"));

        let loaded: Summary =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, summary);
    }
}
