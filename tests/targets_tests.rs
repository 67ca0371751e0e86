use port_probe_rs::targets;

#[test]
fn expands_last_octet_range_inclusively() {
    let hosts = targets::expand("192.168.1.1-10");
    let expected: Vec<String> = (1..=10).map(|n| format!("192.168.1.{n}")).collect();
    assert_eq!(hosts, expected);
}

#[test]
fn passes_non_range_targets_through() {
    assert_eq!(targets::expand("example.com"), vec!["example.com"]);
    assert_eq!(targets::expand("10.20.30.40"), vec!["10.20.30.40"]);
}

#[test]
fn out_of_bounds_octets_are_not_validated_here() {
    // Garbage in: the bogus addresses surface later as probe failures.
    let hosts = targets::expand("10.0.0.254-257");
    assert_eq!(hosts.len(), 4);
    assert_eq!(hosts.last().unwrap(), "10.0.0.257");
}
