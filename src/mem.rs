//! Process memory sampling for the scan-time resource guard.
//!
//! Readings are best-effort: on platforms or sandboxes where the sources
//! below are unavailable, sampling returns `None` and the guard stays
//! disengaged rather than guessing.

/// Fraction of total memory above which the controller throttles admission.
pub const HIGH_WATER: f64 = 0.80;
/// Fraction of total memory above which the scan is aborted.
pub const CRITICAL_WATER: f64 = 0.90;

/// Resident set size of this process in bytes.
pub fn rss_bytes() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        for line in status.lines() {
            if let Some(rest) = line.strip_prefix("VmRSS:") {
                let kb: u64 = rest.split_whitespace().next()?.parse().ok()?;
                return Some(kb * 1024);
            }
        }
        None
    }
    #[cfg(target_os = "macos")]
    {
        let out = std::process::Command::new("ps")
            .args(["-o", "rss=", "-p", &std::process::id().to_string()])
            .output()
            .ok()?;
        let kb: u64 = String::from_utf8_lossy(&out.stdout).trim().parse().ok()?;
        Some(kb * 1024)
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

/// Total physical memory in bytes.
pub fn total_bytes() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
        for line in meminfo.lines() {
            if let Some(rest) = line.strip_prefix("MemTotal:") {
                let kb: u64 = rest.split_whitespace().next()?.parse().ok()?;
                return Some(kb * 1024);
            }
        }
        None
    }
    #[cfg(target_os = "macos")]
    {
        let out = std::process::Command::new("sysctl")
            .args(["-n", "hw.memsize"])
            .output()
            .ok()?;
        String::from_utf8_lossy(&out.stdout).trim().parse().ok()
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

/// Current memory pressure as `rss / total`, if both readings are available.
pub fn pressure() -> Option<f64> {
    let rss = rss_bytes()? as f64;
    let total = total_bytes()? as f64;
    if total > 0.0 {
        Some(rss / total)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(target_os = "linux")]
    fn rss_reads_something_plausible() {
        let rss = rss_bytes().expect("VmRSS should be readable on Linux");
        // A test binary occupies at least a few hundred KB.
        assert!(rss > 100 * 1024);
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn pressure_is_a_sane_fraction() {
        let p = pressure().expect("pressure should be readable on Linux");
        assert!(p > 0.0 && p < 1.0);
    }

    #[test]
    fn watermarks_are_ordered() {
        assert!(HIGH_WATER < CRITICAL_WATER);
    }
}
