//! Timing sinks fed by the per-route instrumentation.

use std::collections::BTreeMap;
use std::time::Instant;

use dashmap::DashMap;
use serde::Serialize;

/// Receives named timing observations.
pub trait MetricsSink: Send + Sync {
    /// Record the time elapsed since `start` against every key.
    fn end_timing(&self, keys: &[String], start: Instant);

    fn normalize_name(&self, name: &str) -> String {
        normalize_name(name)
    }
}

/// Dots become `_`, path separators become `.`, anything outside
/// `[A-Za-z0-9._-]` becomes `_`.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '.' => '_',
            '/' => '.',
            c if c.is_ascii_alphanumeric() || c == '_' || c == '-' => c,
            _ => '_',
        })
        .collect()
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Writes every observation set as one `metrics` debug event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMetrics;

impl MetricsSink for LogMetrics {
    fn end_timing(&self, keys: &[String], start: Instant) {
        tracing::debug!(
            target: "metrics",
            keys = %keys.join(","),
            elapsed_ms = elapsed_ms(start),
            "timing"
        );
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct TimingStat {
    pub count: u64,
    pub total_ms: f64,
    pub max_ms: f64,
}

/// Aggregates timings per key; served by `/metrics`.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    timings: DashMap<String, TimingStat>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<TimingStat> {
        self.timings.get(key).map(|s| *s)
    }

    pub fn snapshot(&self) -> BTreeMap<String, TimingStat> {
        self.timings
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect()
    }
}

impl MetricsSink for InMemoryMetrics {
    fn end_timing(&self, keys: &[String], start: Instant) {
        let ms = elapsed_ms(start);
        for key in keys {
            let mut stat = self.timings.entry(key.clone()).or_default();
            stat.count += 1;
            stat.total_ms += ms;
            if ms > stat.max_ms {
                stat.max_ms = ms;
            }
        }
    }
}
