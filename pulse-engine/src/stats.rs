//! Latency aggregation
//!
//! Buckets are keyed by the canonical `"METHOD PATH"` form and owned by a
//! single consumer, so no locking is involved. Percentiles follow the
//! index rule `k = min(n - 1, floor(n * p / 100))` over ascending
//! latencies; empty buckets report zero.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::summary::{EndpointSummary, Summary};

#[derive(Debug, Default)]
pub struct Stats {
    buckets: BTreeMap<String, Bucket>,
}

#[derive(Debug, Default)]
struct Bucket {
    latencies: Vec<Duration>,
    failures: usize,
}

impl Stats {
    pub fn record(&mut self, key: &str, latency: Duration, failed: bool) {
        let bucket = self.buckets.entry(key.to_string()).or_default();
        bucket.latencies.push(latency);
        if failed {
            bucket.failures += 1;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Collapse the buckets into a reportable summary. Endpoint rows come
    /// out in lexicographic key order (BTreeMap iteration order).
    pub fn summarize(self, scenario: &str) -> Summary {
        let mut endpoints = Vec::with_capacity(self.buckets.len());
        let mut global: Vec<Duration> = Vec::new();
        let mut total_failures = 0usize;

        for (name, mut bucket) in self.buckets {
            if bucket.latencies.is_empty() {
                continue;
            }
            bucket.latencies.sort_unstable();

            let count = bucket.latencies.len();
            total_failures += bucket.failures;

            endpoints.push(EndpointSummary {
                name,
                count,
                failures: bucket.failures,
                err_pct: (bucket.failures as f64 / count as f64) * 100.0,
                avg_ms: ms(average(&bucket.latencies)),
                p90_ms: ms(percentile(&bucket.latencies, 90)),
                p95_ms: ms(percentile(&bucket.latencies, 95)),
            });
            global.extend_from_slice(&bucket.latencies);
        }

        global.sort_unstable();
        Summary {
            scenario: scenario.to_string(),
            total_requests: global.len(),
            failures: total_failures,
            avg_ms: ms(average(&global)),
            p95_ms: ms(percentile(&global, 95)),
            endpoints,
        }
    }
}

pub fn average(latencies: &[Duration]) -> Duration {
    if latencies.is_empty() {
        return Duration::ZERO;
    }
    latencies.iter().sum::<Duration>() / latencies.len() as u32
}

/// The p-th percentile of an ascending-sorted latency slice.
pub fn percentile(sorted: &[Duration], p: usize) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let k = (sorted.len() * p) / 100;
    sorted[k.min(sorted.len() - 1)]
}

pub fn ms(d: Duration) -> f64 {
    d.as_micros() as f64 / 1000.0
}
