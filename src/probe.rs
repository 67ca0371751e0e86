use std::cmp;
use std::time::Duration;

use log::debug;
use tokio::net::TcpStream;
use tokio::time::{self, Instant};

use crate::banner;
use crate::types::{PortStatus, ProbeResult};

/// Cap on the secondary banner-grab timeout after a successful connect.
const BANNER_TIMEOUT: Duration = Duration::from_millis(2000);

/// Probe one (host, port) pair with a full TCP connect.
///
/// Exactly one result is produced per call and no retries happen here:
/// - connect succeeds before the timeout: `Open`, response time is the
///   connect latency, and a best-effort banner grab runs with the shorter
///   of 2s and the probe timeout;
/// - connect is refused or otherwise errors (including DNS failure):
///   `Closed` with the elapsed time;
/// - nothing answers in time: `Timeout` with the full timeout as the
///   response time.
///
/// The socket is owned by this scope and dropped on every path.
pub async fn probe_port(host: &str, port: u16, timeout: Duration) -> ProbeResult {
    let start = Instant::now();
    match time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => {
            let response_time_ms = start.elapsed().as_millis() as u64;
            // The probe socket is not reused for the banner exchange; the
            // grabber opens its own connection so protocol state starts
            // clean.
            drop(stream);
            debug!("open {host}:{port} in {response_time_ms}ms");

            let info = banner::grab_banner(host, port, cmp::min(BANNER_TIMEOUT, timeout)).await;
            ProbeResult {
                ip: host.to_string(),
                port,
                status: PortStatus::Open,
                service: info.service,
                banner: if info.banner.is_empty() {
                    None
                } else {
                    Some(info.banner)
                },
                response_time_ms,
            }
        }
        Ok(Err(e)) => {
            debug!("closed {host}:{port}: {e}");
            ProbeResult {
                ip: host.to_string(),
                port,
                status: PortStatus::Closed,
                service: banner::default_service(port).map(str::to_string),
                banner: None,
                response_time_ms: start.elapsed().as_millis() as u64,
            }
        }
        Err(_) => {
            debug!("timeout {host}:{port}");
            ProbeResult {
                ip: host.to_string(),
                port,
                status: PortStatus::Timeout,
                service: banner::default_service(port).map(str::to_string),
                banner: None,
                response_time_ms: timeout.as_millis() as u64,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_port_reports_open_with_latency() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                let _ = listener.accept().await;
            }
        });

        let res = probe_port("127.0.0.1", port, Duration::from_secs(1)).await;
        assert_eq!(res.status, PortStatus::Open);
        assert!(res.response_time_ms < 1000);
        assert_eq!(res.ip, "127.0.0.1");
        assert_eq!(res.port, port);
    }

    #[tokio::test]
    async fn closed_port_reports_closed_quickly() {
        // Bind then drop to find a port that is very likely closed.
        let port = {
            let l = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().port()
        };

        let res = probe_port("127.0.0.1", port, Duration::from_secs(3)).await;
        assert_eq!(res.status, PortStatus::Closed);
        assert!(res.response_time_ms < 3000);
    }

    #[tokio::test]
    async fn unresolvable_host_never_errors() {
        // DNS failure is data, not an error; depending on resolver speed
        // it surfaces as closed or as a timeout.
        let res = probe_port("host.invalid", 80, Duration::from_secs(2)).await;
        assert!(matches!(
            res.status,
            PortStatus::Closed | PortStatus::Timeout
        ));
    }

    #[tokio::test]
    async fn unroutable_address_times_out_at_the_limit() {
        // RFC 5737 TEST-NET-1 is not routed; connects normally hang until
        // the timeout. Some sandboxes fail such connects immediately, in
        // which case there is nothing to measure here.
        let timeout = Duration::from_millis(300);
        let res = probe_port("192.0.2.1", 80, timeout).await;
        if res.status == PortStatus::Closed {
            eprintln!("skipping: environment rejects unroutable connects immediately");
            return;
        }
        assert_eq!(res.status, PortStatus::Timeout);
        assert_eq!(res.response_time_ms, 300);
    }
}
