//! `Range` header parsing.
//!
//! Input is the header value with the `bytes=` prefix already stripped,
//! e.g. `"0-499"`, `"500-"`, `"-200"`, or a comma-separated list. Output
//! preserves the order of the input specs.

/// Parses a byte-range set against a resource of `size` bytes.
///
/// Each returned pair is an inclusive `(start, end)` offset range. Returns
/// `None` when any spec is malformed or unsatisfiable.
pub fn parse_ranges(value: &str, size: u64) -> Option<Vec<(u64, u64)>> {
    if size == 0 {
        return None;
    }

    let mut ranges = Vec::new();
    for spec in value.split(',') {
        let spec = spec.trim();
        let (start_str, end_str) = spec.split_once('-')?;

        let range = if start_str.is_empty() {
            // "-n": the final n bytes
            let n: u64 = end_str.parse().ok()?;
            if n == 0 {
                return None;
            }
            (size.saturating_sub(n), size - 1)
        } else if end_str.is_empty() {
            // "a-": from a to the end
            let start: u64 = start_str.parse().ok()?;
            if start >= size {
                return None;
            }
            (start, size - 1)
        } else {
            // "a-b", end clamped to the last byte
            let start: u64 = start_str.parse().ok()?;
            let end: u64 = end_str.parse().ok()?;
            if start > end || start >= size {
                return None;
            }
            (start, end.min(size - 1))
        };

        ranges.push(range);
    }

    if ranges.is_empty() {
        return None;
    }

    Some(ranges)
}
