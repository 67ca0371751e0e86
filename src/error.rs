use thiserror::Error;

use crate::ports::PortError;

/// Fatal scan-level failures.
///
/// Per-probe conditions (refused, timeout, DNS failure) are never errors:
/// they are normalized into `ProbeResult` statuses so one unreachable host
/// cannot abort a batch.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    InvalidPorts(#[from] PortError),

    #[error("target must not be empty")]
    EmptyTarget,

    #[error("scan of {total} host/port pairs exceeds the limit of {max}")]
    OversizedRequest { total: u64, max: u64 },

    #[error("a scan is already running on this engine")]
    ScanInProgress,

    #[error("scan aborted: memory pressure at {:.0}%", pressure * 100.0)]
    ResourceExhausted { pressure: f64 },
}
