// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for tiered-cache.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding application is responsible for choosing the exporter.
//!
//! # Metric Naming Convention
//! - `tiered_cache_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `tier`: memory, disk, remote
//! - `operation`: fetch, store, clear, set_up
//! - `outcome`: success, error, timeout, cancelled

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Record a fetch served by a tier
pub fn record_hit(tier: &str) {
    counter!(
        "tiered_cache_hits_total",
        "tier" => tier.to_string()
    )
    .increment(1);
}

/// Record a round trip to the remote loader
pub fn record_remote_fetch(outcome: &str) {
    counter!(
        "tiered_cache_remote_fetches_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record an error with category for alerting
pub fn record_error(tier: &str, operation: &str, error_type: &str) {
    counter!(
        "tiered_cache_errors_total",
        "tier" => tier.to_string(),
        "operation" => operation.to_string(),
        "error_type" => error_type.to_string()
    )
    .increment(1);
}

/// Record how a timeout guard resolved
pub fn record_guard_outcome(outcome: &str) {
    counter!(
        "tiered_cache_guard_outcomes_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record bytes written to the persistent tier
pub fn record_bytes_written(bytes: usize) {
    counter!("tiered_cache_bytes_written_total").increment(bytes as u64);
}

/// Record bytes read from the persistent tier
pub fn record_bytes_read(bytes: usize) {
    counter!("tiered_cache_bytes_read_total").increment(bytes as u64);
}

/// Set number of names in the persisted-key index
pub fn set_index_entries(count: usize) {
    gauge!("tiered_cache_index_entries").set(count as f64);
}

/// Set number of items in the memory tier
pub fn set_memory_entries(count: usize) {
    gauge!("tiered_cache_memory_entries").set(count as f64);
}

/// Set current disk access count
pub fn set_access_count(count: u64) {
    gauge!("tiered_cache_disk_access_count").set(count as f64);
}

/// Record operation latency
pub fn record_latency(tier: &str, operation: &str, duration: Duration) {
    histogram!(
        "tiered_cache_operation_seconds",
        "tier" => tier.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Latency timer that records on drop
pub struct LatencyTimer {
    tier: &'static str,
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    pub fn new(tier: &'static str, operation: &'static str) -> Self {
        Self {
            tier,
            operation,
            start: Instant::now(),
        }
    }

    /// Re-label the tier once the serving tier is known
    pub fn set_tier(&mut self, tier: &'static str) {
        self.tier = tier;
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.tier, self.operation, self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Without an installed recorder these are no-ops; they must not panic.
    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_hit("memory");
        record_remote_fetch("success");
        record_error("disk", "fetch", "read");
        record_guard_outcome("timeout");
        record_bytes_written(10);
        record_bytes_read(10);
        set_index_entries(3);
        set_memory_entries(2);
        set_access_count(1);
    }

    #[test]
    fn test_latency_timer_records_on_drop() {
        let mut timer = LatencyTimer::new("memory", "fetch");
        timer.set_tier("disk");
        drop(timer);
    }
}
