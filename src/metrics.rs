use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::time::Instant;

use crate::mem;
use crate::types::{PortStatus, ProbeResult, ScanMetrics};

/// Incremental aggregator for one scan run.
///
/// `observe` is called once per completed probe, `record_workers` whenever
/// the in-flight worker count changes, and `finalize` exactly once when the
/// controller reaches a terminal state (completion, cancellation or abort).
#[derive(Debug)]
pub struct MetricsCollector {
    started: Instant,
    metrics: ScanMetrics,
    response_time_sum: u64,
    response_time_count: u64,
    worker_samples: u64,
    worker_sum: u64,
    finalized: bool,
}

impl MetricsCollector {
    pub fn start(total_ports: u64) -> Self {
        let mut metrics = ScanMetrics {
            start_time: now_rfc3339(),
            total_ports,
            ..ScanMetrics::default()
        };
        metrics.peak_memory_bytes = mem::rss_bytes().unwrap_or(0);
        Self {
            started: Instant::now(),
            metrics,
            response_time_sum: 0,
            response_time_count: 0,
            worker_samples: 0,
            worker_sum: 0,
            finalized: false,
        }
    }

    /// Fold one probe result into the counters.
    pub fn observe(&mut self, result: &ProbeResult) {
        self.metrics.scanned_ports += 1;
        match result.status {
            PortStatus::Open => self.metrics.open_ports += 1,
            PortStatus::Timeout => self.metrics.timeout_ports += 1,
            // Filtered never comes out of the connect probe; count it with
            // closed so the status sum identity holds for imported data too.
            PortStatus::Closed | PortStatus::Filtered => self.metrics.closed_ports += 1,
        }
        if result.response_time_ms > 0 {
            self.response_time_sum += result.response_time_ms;
            self.response_time_count += 1;
        }
        if let Some(rss) = mem::rss_bytes() {
            self.metrics.peak_memory_bytes = self.metrics.peak_memory_bytes.max(rss);
        }
    }

    /// Sample the number of probes currently in flight.
    pub fn record_workers(&mut self, active: u64) {
        self.metrics.max_concurrent_workers = self.metrics.max_concurrent_workers.max(active);
        self.worker_sum += active;
        self.worker_samples += 1;
    }

    /// Compute the derived figures. Later observations are a logic error.
    pub fn finalize(&mut self) {
        debug_assert!(!self.finalized, "finalize called twice");
        self.finalized = true;

        let elapsed = self.started.elapsed();
        self.metrics.end_time = Some(now_rfc3339());
        self.metrics.duration_ms = elapsed.as_millis() as u64;

        let secs = elapsed.as_secs_f64();
        self.metrics.scan_speed = if secs > 0.0 {
            self.metrics.scanned_ports as f64 / secs
        } else {
            0.0
        };
        self.metrics.average_response_time_ms = if self.response_time_count > 0 {
            self.response_time_sum as f64 / self.response_time_count as f64
        } else {
            0.0
        };
        self.metrics.average_active_workers = if self.worker_samples > 0 {
            self.worker_sum as f64 / self.worker_samples as f64
        } else {
            0.0
        };
    }

    pub fn snapshot(&self) -> ScanMetrics {
        self.metrics.clone()
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
