use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{info, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::ScanError;
use crate::mem;
use crate::metrics::MetricsCollector;
use crate::probe;
use crate::targets;
use crate::types::{ProbeResult, ScanMethod, ScanMetrics, ScanRequest, ScanType};

/// Hard cap on host x port pairs per scan. Larger requests are rejected
/// before any socket is opened.
pub const MAX_TOTAL_WORK: u64 = 10_000;

/// Pause inserted before each port group after the first when the port list
/// spans multiple groups, so bursts of connects do not arrive back to back.
const GROUP_PACING: Duration = Duration::from_millis(50);

/// Pause applied when memory pressure crosses the high-water mark.
const PRESSURE_BACKOFF: Duration = Duration::from_millis(250);

/// Degree of parallelism for a scan of `total_work` host/port pairs.
///
/// The tiers are deliberately non-monotonic: very large scans get fewer
/// in-flight sockets, not more, because file-descriptor headroom matters
/// more than raw throughput at that size. The last tier is reachable only
/// through this function directly, since the controller rejects work above
/// [`MAX_TOTAL_WORK`] first.
pub fn concurrency_for(total_work: u64) -> usize {
    if total_work <= 100 {
        10
    } else if total_work <= 1000 {
        25
    } else if total_work <= 10_000 {
        50
    } else {
        8
    }
}

/// Ports per work group for one host. Groups shrink as the port list grows
/// so each group's completion latency stays bounded.
pub fn group_size_for(port_count: usize) -> usize {
    if port_count <= 100 {
        100
    } else if port_count <= 1000 {
        50
    } else {
        25
    }
}

/// Lifecycle of one engine's current (or last) scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// Progress observer; called with `(completed, total)` after every finished
/// probe. Must not block: controller pacing does not wait on it.
pub type ProgressFn = dyn Fn(u64, u64) + Send + Sync;

/// Concurrent TCP probing engine.
///
/// Holds all mutable scan state per instance (no process-wide globals), so
/// several engines can coexist and tests stay deterministic. At most one
/// scan runs per engine at a time; a second `perform_scan` while one is
/// active fails with [`ScanError::ScanInProgress`].
pub struct PortScanner {
    running: AtomicBool,
    state: Mutex<ScanState>,
    cancel: Mutex<CancellationToken>,
    results: Mutex<Vec<ProbeResult>>,
    metrics: Mutex<ScanMetrics>,
    pressure_fn: fn() -> Option<f64>,
}

impl PortScanner {
    pub fn new() -> Self {
        Self::with_pressure_source(mem::pressure)
    }

    /// Engine with a substitute memory-pressure reading, sampled before
    /// each work-group admission. Lets callers and tests drive the
    /// throttle/abort guard deterministically; `new` wires in
    /// [`mem::pressure`].
    pub fn with_pressure_source(pressure_fn: fn() -> Option<f64>) -> Self {
        Self {
            running: AtomicBool::new(false),
            state: Mutex::new(ScanState::Idle),
            cancel: Mutex::new(CancellationToken::new()),
            results: Mutex::new(Vec::new()),
            metrics: Mutex::new(ScanMetrics::default()),
            pressure_fn,
        }
    }

    /// Run one scan to a terminal state.
    ///
    /// Hosts come from the request's target (expanded when `scan_type` is
    /// `Range`); work is partitioned into per-host port groups and executed
    /// through a semaphore-bounded task set. Returns the full result list
    /// and finalized metrics on completion or cooperative cancellation.
    ///
    /// `on_progress` is invoked inline on the controller after each
    /// completed probe; it must return quickly and must not block.
    ///
    /// On a memory-pressure abort the error is returned instead; the
    /// partial results and finalized metrics remain readable through
    /// [`get_results`](Self::get_results) and
    /// [`get_metrics`](Self::get_metrics).
    pub async fn perform_scan(
        &self,
        request: &ScanRequest,
        on_progress: Option<Arc<ProgressFn>>,
    ) -> Result<(Vec<ProbeResult>, ScanMetrics), ScanError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ScanError::ScanInProgress);
        }

        let outcome = self.scan_inner(request, on_progress).await;
        self.running.store(false, Ordering::SeqCst);
        outcome
    }

    async fn scan_inner(
        &self,
        request: &ScanRequest,
        on_progress: Option<Arc<ProgressFn>>,
    ) -> Result<(Vec<ProbeResult>, ScanMetrics), ScanError> {
        // Input validation happens before any socket activity and before
        // the previous scan's state is discarded.
        let target = request.target.trim();
        if target.is_empty() {
            return Err(ScanError::EmptyTarget);
        }
        if request.ports.is_empty() {
            return Err(ScanError::InvalidPorts(crate::ports::PortError::Empty));
        }
        let hosts = match request.scan_type {
            ScanType::Single => vec![target.to_string()],
            ScanType::Range => targets::expand(target),
        };
        let total = hosts.len() as u64 * request.ports.len() as u64;
        if total > MAX_TOTAL_WORK {
            return Err(ScanError::OversizedRequest {
                total,
                max: MAX_TOTAL_WORK,
            });
        }
        if !matches!(request.method, ScanMethod::Tcp) {
            warn!("{:?} scanning is not implemented; using TCP connect", request.method);
        }

        let timeout = Duration::from_millis(request.timeout_ms.max(1));
        let concurrency = concurrency_for(total);
        let group_size = group_size_for(request.ports.len());
        info!(
            "scanning {} hosts x {} ports (concurrency {}, groups of {})",
            hosts.len(),
            request.ports.len(),
            concurrency,
            group_size
        );

        // Fresh cancellation token and state for this run; stop_scan on an
        // idle engine cancels a token nobody is holding.
        let cancel = CancellationToken::new();
        *self.cancel.lock().unwrap() = cancel.clone();
        *self.state.lock().unwrap() = ScanState::Running;
        self.results.lock().unwrap().clear();

        let mut collector = MetricsCollector::start(total);
        *self.metrics.lock().unwrap() = collector.snapshot();

        let sem = Arc::new(Semaphore::new(concurrency));
        let mut completed: u64 = 0;
        let mut aborted: Option<ScanError> = None;

        'hosts: for host in &hosts {
            if cancel.is_cancelled() {
                break;
            }
            for (group_idx, group) in request.ports.chunks(group_size).enumerate() {
                if cancel.is_cancelled() {
                    break 'hosts;
                }
                if group_idx > 0 && request.ports.len() > group_size {
                    tokio::time::sleep(GROUP_PACING).await;
                }
                match (self.pressure_fn)() {
                    Some(p) if p >= mem::CRITICAL_WATER => {
                        warn!("memory pressure {:.0}% critical, aborting scan", p * 100.0);
                        aborted = Some(ScanError::ResourceExhausted { pressure: p });
                        break 'hosts;
                    }
                    Some(p) if p >= mem::HIGH_WATER => {
                        warn!("memory pressure {:.0}% high, throttling", p * 100.0);
                        tokio::time::sleep(PRESSURE_BACKOFF).await;
                    }
                    _ => {}
                }

                let mut set: JoinSet<ProbeResult> = JoinSet::new();
                for &port in group {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let permit = sem
                        .clone()
                        .acquire_owned()
                        .await
                        .expect("semaphore outlives the scan");
                    // The permit wait can outlive a cancellation request;
                    // re-check before admitting more work.
                    if cancel.is_cancelled() {
                        break;
                    }
                    let host = host.clone();
                    set.spawn(async move {
                        let _permit = permit; // held until the probe resolves
                        probe::probe_port(&host, port, timeout).await
                    });
                    // Active workers are the permits currently handed out,
                    // not the tasks sitting undrained in the join set.
                    collector
                        .record_workers(concurrency.saturating_sub(sem.available_permits()) as u64);
                }

                // Single-writer: only this loop touches results and metrics.
                while let Some(joined) = set.join_next().await {
                    collector
                        .record_workers(concurrency.saturating_sub(sem.available_permits()) as u64);
                    let Ok(result) = joined else { continue };
                    completed += 1;
                    collector.observe(&result);
                    self.results.lock().unwrap().push(result);
                    *self.metrics.lock().unwrap() = collector.snapshot();
                    if let Some(cb) = &on_progress {
                        cb(completed, total);
                    }
                }
            }
        }

        collector.finalize();
        let metrics = collector.snapshot();
        *self.metrics.lock().unwrap() = metrics.clone();

        let terminal = match (&aborted, cancel.is_cancelled()) {
            (Some(_), _) => ScanState::Failed,
            (None, true) => ScanState::Cancelled,
            (None, false) => ScanState::Completed,
        };
        *self.state.lock().unwrap() = terminal;
        info!(
            "scan {:?}: {}/{} probes, {} open",
            terminal, metrics.scanned_ports, total, metrics.open_ports
        );

        if let Some(err) = aborted {
            return Err(err);
        }
        Ok((self.results.lock().unwrap().clone(), metrics))
    }

    /// Request cooperative cancellation. Idempotent; a no-op when no scan
    /// is active. In-flight probes run to their own resolution; no new
    /// work is admitted.
    pub fn stop_scan(&self) {
        self.cancel.lock().unwrap().cancel();
    }

    /// Results of the last scan, partial while one is running.
    pub fn get_results(&self) -> Vec<ProbeResult> {
        self.results.lock().unwrap().clone()
    }

    /// Metrics of the last scan, partial while one is running.
    pub fn get_metrics(&self) -> ScanMetrics {
        self.metrics.lock().unwrap().clone()
    }

    pub fn state(&self) -> ScanState {
        *self.state.lock().unwrap()
    }
}

impl Default for PortScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_tiers() {
        assert_eq!(concurrency_for(1), 10);
        assert_eq!(concurrency_for(100), 10);
        assert_eq!(concurrency_for(101), 25);
        assert_eq!(concurrency_for(1000), 25);
        assert_eq!(concurrency_for(1001), 50);
        assert_eq!(concurrency_for(10_000), 50);
        // Beyond the hard cap the formula stays defined and conservative.
        assert_eq!(concurrency_for(50_000), 8);
    }

    #[test]
    fn group_sizes_shrink_as_port_lists_grow() {
        assert_eq!(group_size_for(10), 100);
        assert_eq!(group_size_for(100), 100);
        assert_eq!(group_size_for(500), 50);
        assert_eq!(group_size_for(5000), 25);
    }

    #[test]
    fn new_engine_is_idle() {
        let engine = PortScanner::new();
        assert_eq!(engine.state(), ScanState::Idle);
        assert!(engine.get_results().is_empty());
    }

    #[test]
    fn stop_scan_without_active_scan_is_safe() {
        let engine = PortScanner::new();
        engine.stop_scan();
        engine.stop_scan();
        assert_eq!(engine.state(), ScanState::Idle);
    }

    #[tokio::test]
    async fn empty_target_is_rejected() {
        let engine = PortScanner::new();
        let request = ScanRequest {
            target: "   ".into(),
            ports: vec![80],
            scan_type: ScanType::Single,
            timeout_ms: 100,
            method: ScanMethod::Tcp,
        };
        let err = engine.perform_scan(&request, None).await.unwrap_err();
        assert!(matches!(err, ScanError::EmptyTarget));
    }

    #[tokio::test]
    async fn oversized_request_is_rejected_before_scanning() {
        let engine = PortScanner::new();
        let request = ScanRequest {
            target: "192.0.2.1-200".into(),
            ports: (1..=100).collect(),
            scan_type: ScanType::Range,
            timeout_ms: 100,
            method: ScanMethod::Tcp,
        };
        let err = engine.perform_scan(&request, None).await.unwrap_err();
        match err {
            ScanError::OversizedRequest { total, max } => {
                assert_eq!(total, 20_000);
                assert_eq!(max, MAX_TOTAL_WORK);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(engine.get_results().is_empty());
    }
}
