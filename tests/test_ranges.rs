use harbor::http::ranges::parse_ranges;

#[test]
fn test_single_bounded_range() {
    assert_eq!(parse_ranges("2-5", 10), Some(vec![(2, 5)]));
}

#[test]
fn test_range_end_clamped_to_size() {
    assert_eq!(parse_ranges("5-999", 10), Some(vec![(5, 9)]));
}

#[test]
fn test_open_ended_range() {
    assert_eq!(parse_ranges("3-", 10), Some(vec![(3, 9)]));
}

#[test]
fn test_suffix_range() {
    assert_eq!(parse_ranges("-4", 10), Some(vec![(6, 9)]));
}

#[test]
fn test_suffix_range_longer_than_file() {
    assert_eq!(parse_ranges("-100", 10), Some(vec![(0, 9)]));
}

#[test]
fn test_multiple_ranges_preserve_order() {
    assert_eq!(
        parse_ranges("8-9,0-1,4-5", 10),
        Some(vec![(8, 9), (0, 1), (4, 5)])
    );
}

#[test]
fn test_whole_file_range() {
    assert_eq!(parse_ranges("0-9", 10), Some(vec![(0, 9)]));
}

#[test]
fn test_invalid_ranges() {
    // inverted
    assert_eq!(parse_ranges("5-2", 10), None);
    // start past the end
    assert_eq!(parse_ranges("10-12", 10), None);
    // not numbers
    assert_eq!(parse_ranges("a-b", 10), None);
    // no dash
    assert_eq!(parse_ranges("5", 10), None);
    // empty suffix
    assert_eq!(parse_ranges("-0", 10), None);
    // empty value
    assert_eq!(parse_ranges("", 10), None);
    // one bad spec spoils the set
    assert_eq!(parse_ranges("0-1,9-5", 10), None);
}

#[test]
fn test_empty_file_never_satisfiable() {
    assert_eq!(parse_ranges("0-0", 0), None);
}
