//! `Range: bytes=...` parsing against a known content length.
//!
//! Only single ranges are accepted. An open-ended range (`bytes=500-`) is
//! capped at one chunk so a client probing a large video does not pin a
//! producer on the whole remainder of the file.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("malformed range expression")]
    Malformed,
    #[error("unsupported range unit")]
    UnsupportedUnit,
    #[error("multiple ranges are not supported")]
    MultipleRanges,
    #[error("object is empty")]
    EmptyObject,
    #[error("range starts beyond the end of the object")]
    StartBeyondEnd,
    #[error("range start is after range end")]
    Inverted,
    #[error("suffix length must be positive")]
    ZeroSuffix,
}

/// Inclusive byte range, always within `0..content_length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` header value, e.g. `bytes 100-199/1000`.
    pub fn content_range(&self, content_length: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, content_length)
    }
}

fn parse_position(raw: &str) -> Result<u64, RangeError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RangeError::Malformed);
    }
    raw.parse().map_err(|_| RangeError::Malformed)
}

/// Parses a single `bytes=` range.
///
/// A missing end defaults to `min(start + default_chunk - 1, content_length - 1)`;
/// an explicit end past the object is clamped to the last byte.
pub fn parse_range(
    expression: &str,
    content_length: u64,
    default_chunk: u64,
) -> Result<ByteRange, RangeError> {
    let (unit, spec) = expression
        .trim()
        .split_once('=')
        .ok_or(RangeError::Malformed)?;

    if !unit.trim().eq_ignore_ascii_case("bytes") {
        return Err(RangeError::UnsupportedUnit);
    }

    let spec = spec.trim();
    if spec.contains(',') {
        return Err(RangeError::MultipleRanges);
    }

    let (first, last) = spec.split_once('-').ok_or(RangeError::Malformed)?;
    let (first, last) = (first.trim(), last.trim());

    if content_length == 0 {
        return Err(RangeError::EmptyObject);
    }
    let last_byte = content_length - 1;

    if first.is_empty() {
        let suffix = parse_position(last)?;
        if suffix == 0 {
            return Err(RangeError::ZeroSuffix);
        }
        let suffix = suffix.min(content_length);
        return Ok(ByteRange {
            start: content_length - suffix,
            end: last_byte,
        });
    }

    let start = parse_position(first)?;
    if start >= content_length {
        return Err(RangeError::StartBeyondEnd);
    }

    let end = if last.is_empty() {
        (start.saturating_add(default_chunk.max(1)) - 1).min(last_byte)
    } else {
        parse_position(last)?.min(last_byte)
    };

    if start > end {
        return Err(RangeError::Inverted);
    }

    Ok(ByteRange { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    fn bounds(expr: &str, len: u64) -> Result<(u64, u64), RangeError> {
        parse_range(expr, len, MB).map(|r| (r.start, r.end))
    }

    #[test]
    fn test_open_ended_and_suffix() {
        assert_eq!(bounds("bytes=500-", 1000), Ok((500, 999)));
        assert_eq!(bounds("bytes=-100", 1000), Ok((900, 999)));
        assert_eq!(bounds("bytes=0-0", 1000), Ok((0, 0)));
        assert_eq!(bounds("bytes=100-199", 1000), Ok((100, 199)));
    }

    #[test]
    fn test_start_past_end_is_invalid() {
        assert_eq!(bounds("bytes=2000-", 1000), Err(RangeError::StartBeyondEnd));
        assert_eq!(bounds("bytes=1000-", 1000), Err(RangeError::StartBeyondEnd));
    }

    #[test]
    fn test_open_end_capped_at_one_chunk() {
        let r = parse_range("bytes=0-", 10 * MB, MB).unwrap();
        assert_eq!((r.start, r.end), (0, MB - 1));
        assert_eq!(r.len(), MB);
    }

    #[test]
    fn test_explicit_end_clamped() {
        assert_eq!(bounds("bytes=900-5000", 1000), Ok((900, 999)));
    }

    #[test]
    fn test_suffix_larger_than_object() {
        assert_eq!(bounds("bytes=-5000", 1000), Ok((0, 999)));
        assert_eq!(bounds("bytes=-0", 1000), Err(RangeError::ZeroSuffix));
    }

    #[test]
    fn test_inverted_and_malformed() {
        assert_eq!(bounds("bytes=500-100", 1000), Err(RangeError::Inverted));
        assert_eq!(bounds("bytes=abc-", 1000), Err(RangeError::Malformed));
        assert_eq!(bounds("bytes=+5-10", 1000), Err(RangeError::Malformed));
        assert_eq!(bounds("bytes=5", 1000), Err(RangeError::Malformed));
        assert_eq!(bounds("bytes=-", 1000), Err(RangeError::Malformed));
        assert_eq!(bounds("500-600", 1000), Err(RangeError::Malformed));
        assert_eq!(bounds("", 1000), Err(RangeError::Malformed));
    }

    #[test]
    fn test_unit_and_multi_range() {
        assert_eq!(bounds("items=0-5", 1000), Err(RangeError::UnsupportedUnit));
        assert_eq!(bounds("Bytes = 0-5", 1000), Ok((0, 5)));
        assert_eq!(
            bounds("bytes=0-5,10-20", 1000),
            Err(RangeError::MultipleRanges)
        );
    }

    #[test]
    fn test_empty_object() {
        assert_eq!(bounds("bytes=0-", 0), Err(RangeError::EmptyObject));
        assert_eq!(bounds("bytes=-10", 0), Err(RangeError::EmptyObject));
    }

    #[test]
    fn test_content_range_header() {
        let r = parse_range("bytes=100-199", 1000, MB).unwrap();
        assert_eq!(r.content_range(1000), "bytes 100-199/1000");
        assert_eq!(r.len(), 100);
    }
}
