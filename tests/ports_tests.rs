use port_probe_rs::ports;

#[test]
fn parses_mixed_individual_and_range_spec() {
    let parsed = ports::parse("22,80-83,443").unwrap();
    assert_eq!(parsed.individual, vec![22, 443]);
    assert_eq!(parsed.ranges.len(), 1);
    assert_eq!(parsed.ranges[0].start, 80);
    assert_eq!(parsed.ranges[0].end, 83);
    assert_eq!(parsed.expanded, vec![22, 80, 81, 82, 83, 443]);
    assert_eq!(parsed.total, 6);
}

#[test]
fn expanded_invariants_hold_for_overlapping_input() {
    let parsed = ports::parse(" 443 ,80-85, 82 , 80 ").unwrap();
    assert!(parsed.expanded.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(parsed.total, parsed.expanded.len());
}

#[test]
fn rejects_invalid_specs() {
    assert!(ports::parse("80-22").is_err());
    assert!(ports::parse("0").is_err());
    assert!(ports::parse("65536").is_err());
    assert!(ports::parse("abc").is_err());
    assert!(ports::parse("").is_err());
}

#[test]
fn validate_flags_large_scans_without_failing() {
    let v = ports::validate("1-5000");
    assert!(v.is_valid);
    assert_eq!(v.port_count, 5000);
    assert!(!v.warnings.is_empty());
}
