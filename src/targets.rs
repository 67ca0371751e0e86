use crate::types::ScanType;

/// Expand a target specification into concrete host strings.
///
/// A spec containing `-` is treated as a last-octet IPv4 range
/// `a.b.c.N-M`: the first three octets are held fixed and one address is
/// produced per integer in `N..=M`. Anything else (hostname, IPv4 or IPv6
/// literal) is returned unchanged; name resolution is the probe's job.
///
/// Octet bounds are deliberately not validated here. A nonsense range such
/// as `10.0.0.250-300` expands as written and the bogus addresses surface
/// as probe-time connection failures.
pub fn expand(spec: &str) -> Vec<String> {
    let Some((base, end_str)) = spec.split_once('-') else {
        return vec![spec.to_string()];
    };

    let octets: Vec<&str> = base.split('.').collect();
    let (Some(start), Some(end)) = (
        octets.last().and_then(|o| o.parse::<u32>().ok()),
        end_str.trim().parse::<u32>().ok(),
    ) else {
        return vec![spec.to_string()];
    };
    if octets.len() != 4 {
        return vec![spec.to_string()];
    }

    let prefix = octets[..3].join(".");
    (start..=end).map(|n| format!("{prefix}.{n}")).collect()
}

/// Classify a target spec the way the range syntax above is interpreted.
pub fn scan_type_for(spec: &str) -> ScanType {
    if spec.contains('-') {
        ScanType::Range
    } else {
        ScanType::Single
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_host_passes_through() {
        assert_eq!(expand("192.168.1.5"), vec!["192.168.1.5"]);
        assert_eq!(expand("localhost"), vec!["localhost"]);
        assert_eq!(expand("::1"), vec!["::1"]);
    }

    #[test]
    fn last_octet_range_expands_ascending() {
        let hosts = expand("192.168.1.1-10");
        assert_eq!(hosts.len(), 10);
        assert_eq!(hosts.first().unwrap(), "192.168.1.1");
        assert_eq!(hosts.last().unwrap(), "192.168.1.10");
        for w in hosts.windows(2) {
            let a: u32 = w[0].rsplit('.').next().unwrap().parse().unwrap();
            let b: u32 = w[1].rsplit('.').next().unwrap().parse().unwrap();
            assert_eq!(b, a + 1);
        }
    }

    #[test]
    fn degenerate_range_is_one_host() {
        assert_eq!(expand("10.0.0.7-7"), vec!["10.0.0.7"]);
    }

    #[test]
    fn hyphenated_hostname_is_not_a_range() {
        assert_eq!(expand("my-server"), vec!["my-server"]);
    }

    #[test]
    fn scan_type_classification() {
        assert_eq!(scan_type_for("10.0.0.1"), ScanType::Single);
        assert_eq!(scan_type_for("10.0.0.1-20"), ScanType::Range);
    }
}
