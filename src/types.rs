use serde::{Deserialize, Serialize};

/// Outcome of a single (host, port) probe.
///
/// `Filtered` is never produced by the TCP connect probe itself but is part
/// of the wire contract so exporters can round-trip results from other scan
/// methods.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PortStatus {
    Open,
    Closed,
    Filtered,
    Timeout,
}

/// How the probe talks to the target. Only `Tcp` (full connect) is
/// implemented; the other variants exist so requests naming them still parse.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScanMethod {
    #[default]
    Tcp,
    Syn,
    Udp,
}

/// Whether the target string is one host or a last-octet IP range.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    Single,
    Range,
}

/// One scan invocation, immutable for the duration of the scan.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScanRequest {
    pub target: String,
    pub ports: Vec<u16>,
    #[serde(rename = "scanType")]
    pub scan_type: ScanType,
    #[serde(rename = "timeout", default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub method: ScanMethod,
}

pub fn default_timeout_ms() -> u64 {
    3000
}

/// One result entry per (host, port) pair attempted. Never retried by the
/// engine; a reissued request produces a fresh entry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub ip: String,
    pub port: u16,
    pub status: PortStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    #[serde(rename = "responseTime")]
    pub response_time_ms: u64,
}

/// Aggregate counters and timing for one scan run.
///
/// Created when the scan starts, updated as results arrive, finalized
/// exactly once when the controller reaches a terminal state.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ScanMetrics {
    #[serde(rename = "startTime")]
    pub start_time: String,
    #[serde(rename = "endTime")]
    pub end_time: Option<String>,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
    #[serde(rename = "totalPorts")]
    pub total_ports: u64,
    #[serde(rename = "scannedPorts")]
    pub scanned_ports: u64,
    #[serde(rename = "openPorts")]
    pub open_ports: u64,
    #[serde(rename = "closedPorts")]
    pub closed_ports: u64,
    #[serde(rename = "timeoutPorts")]
    pub timeout_ports: u64,
    /// Probes completed per second over the whole run.
    #[serde(rename = "scanSpeed")]
    pub scan_speed: f64,
    #[serde(rename = "averageResponseTime")]
    pub average_response_time_ms: f64,
    #[serde(rename = "peakMemory")]
    pub peak_memory_bytes: u64,
    #[serde(rename = "maxConcurrentWorkers")]
    pub max_concurrent_workers: u64,
    #[serde(rename = "averageActiveWorkers")]
    pub average_active_workers: f64,
}
