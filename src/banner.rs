use std::time::Duration;

use log::debug;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{self, Instant};

/// Stop reading once this many banner bytes have accumulated.
const BANNER_LIMIT: usize = 100;

/// Well-known port to service-name table, used as the fallback label when a
/// service sends no banner (or an unrecognizable one) before the timeout.
const COMMON_SERVICES: &[(u16, &str)] = &[
    (20, "FTP-DATA"),
    (21, "FTP"),
    (22, "SSH"),
    (23, "Telnet"),
    (25, "SMTP"),
    (53, "DNS"),
    (80, "HTTP"),
    (110, "POP3"),
    (143, "IMAP"),
    (443, "HTTPS"),
    (587, "SMTP"),
    (993, "IMAPS"),
    (995, "POP3S"),
    (1433, "MSSQL"),
    (3306, "MySQL"),
    (3389, "RDP"),
    (5432, "PostgreSQL"),
    (5900, "VNC"),
    (6379, "Redis"),
    (8080, "HTTP"),
    (8443, "HTTPS"),
    (27017, "MongoDB"),
    (27019, "MongoDB"),
];

/// Default service label for a port, from the static table.
pub fn default_service(port: u16) -> Option<&'static str> {
    COMMON_SERVICES
        .iter()
        .find(|(p, _)| *p == port)
        .map(|(_, name)| *name)
}

/// Classify raw banner text into a service label.
///
/// Predicates run in a fixed priority order. The order matters: the bare
/// `220` greeting is ambiguous (FTP, SMTP and POP3 all use it) and is
/// disambiguated only by the second token it pairs with.
pub fn classify(banner: &str, port: u16) -> Option<&'static str> {
    if banner.contains("SSH-") {
        Some("SSH")
    } else if banner.contains("220") && banner.contains("FTP") {
        Some("FTP")
    } else if banner.contains("220") && (banner.contains("SMTP") || banner.contains("mail")) {
        Some("SMTP")
    } else if banner.contains("220") && banner.contains("POP3") {
        Some("POP3")
    } else if banner.contains("* OK") && banner.contains("IMAP") {
        Some("IMAP")
    } else if banner.contains("HTTP/") {
        if port == 443 || port == 8443 {
            Some("HTTPS")
        } else {
            Some("HTTP")
        }
    } else if banner.contains("MySQL") {
        Some("MySQL")
    } else if banner.contains("PostgreSQL") {
        Some("PostgreSQL")
    } else if banner.contains("Redis") {
        Some("Redis")
    } else if banner.contains("MongoDB") {
        Some("MongoDB")
    } else {
        None
    }
}

/// Clear-text payload that coaxes a response out of services which do not
/// banner unprompted. FTP, SSH, MySQL, PostgreSQL and MongoDB all speak
/// first, so they get nothing.
fn priming_payload(host: &str, port: u16) -> Option<Vec<u8>> {
    match port {
        80 | 443 | 8000 | 8080 | 8443 | 8888 => Some(
            format!("GET / HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\n\r\n").into_bytes(),
        ),
        25 | 587 => Some(b"EHLO localhost\r\n".to_vec()),
        110 => Some(b"USER test\r\n".to_vec()),
        143 => Some(b"a001 LOGIN test test\r\n".to_vec()),
        6379 => Some(b"INFO\r\n".to_vec()),
        _ => None,
    }
}

/// Banner text plus the resolved service label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BannerInfo {
    pub banner: String,
    pub service: Option<String>,
}

/// Best-effort banner grab against an already-known-open port.
///
/// Connects, optionally writes a port-specific priming payload, then
/// accumulates bytes until at least [`BANNER_LIMIT`] bytes arrived, a
/// newline is seen, or the deadline passes. Failures never propagate: on
/// any error the static port-table label and an empty banner are returned.
pub async fn grab_banner(host: &str, port: u16, timeout: Duration) -> BannerInfo {
    let fallback = || BannerInfo {
        banner: String::new(),
        service: default_service(port).map(str::to_string),
    };

    let deadline = Instant::now() + timeout;
    let mut stream = match time::timeout_at(deadline, TcpStream::connect((host, port))).await {
        Ok(Ok(s)) => s,
        _ => return fallback(),
    };

    if let Some(payload) = priming_payload(host, port) {
        if time::timeout_at(deadline, stream.write_all(&payload))
            .await
            .map_or(true, |r| r.is_err())
        {
            return fallback();
        }
    }

    let mut banner = String::new();
    let mut buf = [0u8; 256];
    loop {
        match time::timeout_at(deadline, stream.read(&mut buf)).await {
            Ok(Ok(n)) if n > 0 => {
                banner.push_str(&String::from_utf8_lossy(&buf[..n]));
                if banner.len() >= BANNER_LIMIT || banner.contains('\n') {
                    break;
                }
            }
            // EOF, read error, or deadline: keep whatever arrived so far.
            _ => break,
        }
    }

    if banner.is_empty() {
        return fallback();
    }

    debug!("banner from {host}:{port}: {} bytes", banner.len());
    let service = classify(&banner, port)
        .map(str::to_string)
        .or_else(|| default_service(port).map(str::to_string));
    BannerInfo {
        banner: banner.trim().to_string(),
        service,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssh_banner_wins_over_port_default() {
        assert_eq!(classify("SSH-2.0-OpenSSH_8.9", 2222), Some("SSH"));
    }

    #[test]
    fn http_on_tls_port_labels_https() {
        assert_eq!(classify("HTTP/1.1 200 OK", 443), Some("HTTPS"));
        assert_eq!(classify("HTTP/1.1 200 OK", 8443), Some("HTTPS"));
        assert_eq!(classify("HTTP/1.1 200 OK", 8080), Some("HTTP"));
    }

    #[test]
    fn bare_220_needs_a_second_token() {
        assert_eq!(classify("220 service ready", 2121), None);
        assert_eq!(classify("220 ProFTPD FTP Server", 21), Some("FTP"));
        assert_eq!(classify("220 mx1 ESMTP SMTP ready", 25), Some("SMTP"));
        assert_eq!(classify("220 mail.example.com", 25), Some("SMTP"));
        assert_eq!(classify("220 POP3 ready", 110), Some("POP3"));
    }

    #[test]
    fn imap_requires_ok_and_token() {
        assert_eq!(classify("* OK IMAP4rev1 ready", 143), Some("IMAP"));
        assert_eq!(classify("* OK something else", 143), None);
    }

    #[test]
    fn ssh_takes_priority_over_ftp_pair() {
        // Both predicates match; the first in priority order wins.
        assert_eq!(classify("220 FTP over SSH-2.0 tunnel", 21), Some("SSH"));
    }

    #[test]
    fn database_banners() {
        assert_eq!(classify("5.7.42-MySQL Community", 3306), Some("MySQL"));
        assert_eq!(classify("PostgreSQL 15.2", 5432), Some("PostgreSQL"));
        assert_eq!(classify("Redis server v7", 6379), Some("Redis"));
        assert_eq!(classify("MongoDB 6.0", 27017), Some("MongoDB"));
    }

    #[test]
    fn default_table_covers_known_families() {
        assert_eq!(default_service(22), Some("SSH"));
        assert_eq!(default_service(443), Some("HTTPS"));
        assert_eq!(default_service(27017), Some("MongoDB"));
        assert_eq!(default_service(12345), None);
    }

    #[test]
    fn priming_payload_selection() {
        assert!(priming_payload("h", 80).is_some());
        assert!(priming_payload("h", 6379).is_some());
        // Services that banner unprompted are left alone.
        assert!(priming_payload("h", 22).is_none());
        assert!(priming_payload("h", 21).is_none());
        assert!(priming_payload("h", 3306).is_none());
    }

    #[tokio::test]
    async fn grab_banner_against_dead_port_falls_back() {
        // Port 1 on localhost is almost certainly closed; the grab must
        // still resolve to the table default with an empty banner.
        let info = grab_banner("127.0.0.1", 1, Duration::from_millis(200)).await;
        assert_eq!(info.banner, "");
        assert_eq!(info.service, None);
    }

    #[tokio::test]
    async fn grab_banner_stops_at_the_byte_limit_without_newline() {
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            // More than the limit, no newline; hold the connection open so
            // neither EOF nor the deadline can end the read instead.
            sock.write_all(&[b'A'; 150]).await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(sock);
        });

        let started = Instant::now();
        let info = grab_banner("127.0.0.1", port, Duration::from_secs(8)).await;
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(info.banner.len() >= 100);
        assert!(info.banner.bytes().all(|b| b == b'A'));
    }

    #[tokio::test]
    async fn grab_banner_reads_unprompted_greeting() {
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(b"SSH-2.0-OpenSSH_8.9\r\n").await.unwrap();
        });

        let info = grab_banner("127.0.0.1", port, Duration::from_secs(2)).await;
        assert!(info.banner.starts_with("SSH-2.0"));
        assert_eq!(info.service.as_deref(), Some("SSH"));
    }
}
