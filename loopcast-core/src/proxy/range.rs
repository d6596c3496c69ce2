//! HTTP Range header resolution
//!
//! Translates a single `bytes=` range specification and the current resource
//! length into a concrete inclusive byte interval. Multi-range requests are
//! not served: any value containing a comma is unsatisfiable.

/// Inclusive byte interval `start..=end` within a resource.
///
/// Always satisfies `start <= end < length` for the length it was resolved
/// against, so it is never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Interval covering a whole resource, or `None` for an empty one.
    pub fn full(length: u64) -> Option<Self> {
        let end = length.checked_sub(1)?;
        Some(Self { start: 0, end })
    }

    /// Number of bytes covered by the interval.
    pub fn size(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` value for this interval of a `length`-byte resource.
    pub fn content_range(&self, length: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, length)
    }
}

/// The Range header cannot be satisfied for the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Range not satisfiable")]
pub struct Unsatisfiable;

/// Resolve a `Range` header value against a resource of `length` bytes.
///
/// Supports `bytes=start-end`, `bytes=start-` and the suffix form
/// `bytes=-N`. A value without any `-` is read as an open-ended start. An end
/// past the resource is clamped to the last byte.
///
/// # Examples
/// ```
/// use loopcast_core::proxy::range::{ByteRange, resolve_range};
///
/// assert_eq!(
///     resolve_range("bytes=500-599", 1000),
///     Ok(ByteRange { start: 500, end: 599 })
/// );
/// assert_eq!(
///     resolve_range("bytes=-100", 1000),
///     Ok(ByteRange { start: 900, end: 999 })
/// );
/// assert!(resolve_range("bytes=2000-", 1000).is_err());
/// ```
///
/// # Errors
/// - `Unsatisfiable` - Wrong unit, multiple ranges, unparsable bounds, a start
///   beyond the resource, `start > end`, a zero suffix or an empty resource
pub fn resolve_range(value: &str, length: u64) -> Result<ByteRange, Unsatisfiable> {
    let spec = value.strip_prefix("bytes=").ok_or(Unsatisfiable)?.trim();
    if spec.contains(',') {
        return Err(Unsatisfiable);
    }
    let last = length.checked_sub(1).ok_or(Unsatisfiable)?;

    let (start_part, end_part) = match spec.split_once('-') {
        Some((start, end)) => (start.trim(), end.trim()),
        None => (spec, ""),
    };
    let start = parse_bound(start_part)?;
    let end = parse_bound(end_part)?;

    match (start, end) {
        (None, None) => Err(Unsatisfiable),
        (Some(start), end) => {
            let end = end.map_or(last, |end| end.min(last));
            if start > end {
                return Err(Unsatisfiable);
            }
            Ok(ByteRange { start, end })
        }
        (None, Some(suffix)) => {
            if suffix == 0 {
                return Err(Unsatisfiable);
            }
            Ok(ByteRange {
                start: length.saturating_sub(suffix),
                end: last,
            })
        }
    }
}

fn parse_bound(part: &str) -> Result<Option<u64>, Unsatisfiable> {
    if part.is_empty() {
        return Ok(None);
    }
    part.parse::<u64>().map(Some).map_err(|_| Unsatisfiable)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_explicit_range() {
        assert_eq!(
            resolve_range("bytes=500-599", 1000),
            Ok(ByteRange {
                start: 500,
                end: 599
            })
        );
    }

    #[test]
    fn test_open_ended_range() {
        assert_eq!(
            resolve_range("bytes=500-", 1000),
            Ok(ByteRange {
                start: 500,
                end: 999
            })
        );
        // A bare start is read the same way
        assert_eq!(
            resolve_range("bytes=500", 1000),
            Ok(ByteRange {
                start: 500,
                end: 999
            })
        );
    }

    #[test]
    fn test_end_clamped_to_length() {
        assert_eq!(
            resolve_range("bytes=900-5000", 1000),
            Ok(ByteRange {
                start: 900,
                end: 999
            })
        );
    }

    #[test]
    fn test_suffix_range() {
        assert_eq!(
            resolve_range("bytes=-100", 1000),
            Ok(ByteRange {
                start: 900,
                end: 999
            })
        );
        // Suffix longer than the resource covers all of it
        assert_eq!(
            resolve_range("bytes=-5000", 1000),
            Ok(ByteRange { start: 0, end: 999 })
        );
    }

    #[test]
    fn test_unsatisfiable_ranges() {
        assert_eq!(resolve_range("bytes=2000-", 1000), Err(Unsatisfiable));
        assert_eq!(resolve_range("bytes=1000-1000", 1000), Err(Unsatisfiable));
        assert_eq!(resolve_range("bytes=600-500", 1000), Err(Unsatisfiable));
        assert_eq!(resolve_range("bytes=-0", 1000), Err(Unsatisfiable));
        assert_eq!(resolve_range("bytes=-", 1000), Err(Unsatisfiable));
        assert_eq!(resolve_range("bytes=", 1000), Err(Unsatisfiable));
    }

    #[test]
    fn test_malformed_values() {
        assert_eq!(resolve_range("items=0-10", 1000), Err(Unsatisfiable));
        assert_eq!(resolve_range("0-10", 1000), Err(Unsatisfiable));
        assert_eq!(resolve_range("bytes=abc-10", 1000), Err(Unsatisfiable));
        assert_eq!(resolve_range("bytes=0-xyz", 1000), Err(Unsatisfiable));
        assert_eq!(resolve_range("bytes=--5", 1000), Err(Unsatisfiable));
    }

    #[test]
    fn test_multi_range_is_unsatisfiable() {
        assert_eq!(resolve_range("bytes=0-10,20-30", 1000), Err(Unsatisfiable));
        assert_eq!(resolve_range("bytes=0-10,", 1000), Err(Unsatisfiable));
    }

    #[test]
    fn test_empty_resource() {
        assert_eq!(resolve_range("bytes=0-", 0), Err(Unsatisfiable));
        assert_eq!(resolve_range("bytes=-10", 0), Err(Unsatisfiable));
        assert_eq!(ByteRange::full(0), None);
    }

    #[test]
    fn test_byte_range_helpers() {
        let range = ByteRange::full(1000).unwrap();
        assert_eq!(range, ByteRange { start: 0, end: 999 });
        assert_eq!(range.size(), 1000);
        assert_eq!(range.content_range(1000), "bytes 0-999/1000");
    }

    proptest! {
        #[test]
        fn prop_valid_explicit_ranges_resolve_exactly(
            length in 1u64..1_000_000,
            a in 0u64..1_000_000,
            b in 0u64..1_000_000,
        ) {
            let start = a % length;
            let end = start + b % (length - start);
            let range = resolve_range(&format!("bytes={start}-{end}"), length).unwrap();
            prop_assert_eq!(range, ByteRange { start, end });
            prop_assert_eq!(range.size(), end - start + 1);
        }

        #[test]
        fn prop_suffix_yields_last_n_bytes(length in 1u64..1_000_000, n in 1u64..1_000_000) {
            let n = 1 + n % length;
            let range = resolve_range(&format!("bytes=-{n}"), length).unwrap();
            prop_assert_eq!(range.size(), n);
            prop_assert_eq!(range.end, length - 1);
        }

        #[test]
        fn prop_start_past_end_is_unsatisfiable(
            length in 1u64..1_000_000,
            start in 0u64..2_000_000,
            gap in 1u64..1000,
        ) {
            let end = start.saturating_sub(gap);
            prop_assume!(start > end);
            prop_assert_eq!(
                resolve_range(&format!("bytes={start}-{end}"), length),
                Err(Unsatisfiable)
            );
        }

        #[test]
        fn prop_start_at_or_past_length_is_unsatisfiable(
            length in 0u64..1_000_000,
            extra in 0u64..1_000_000,
        ) {
            let start = length + extra;
            prop_assert_eq!(
                resolve_range(&format!("bytes={start}-"), length),
                Err(Unsatisfiable)
            );
        }

        #[test]
        fn prop_resolved_ranges_stay_in_bounds(value in "bytes=[0-9]{0,7}-[0-9]{0,7}", length in 0u64..10_000_000) {
            if let Ok(range) = resolve_range(&value, length) {
                prop_assert!(range.start <= range.end);
                prop_assert!(range.end < length);
            }
        }
    }
}
