use thiserror::Error;

const BYTES_UNIT: &str = "bytes=";

/// A single inclusive byte interval, checked against a concrete file size.
///
/// Only [`parse`] constructs one. Both bounds are below the size they were
/// checked against, but `start <= end` is not required: an inverted range is
/// passed through and has a [`len`](RangeSpec::len) of zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpec {
    pub start: u64,
    pub end: u64,
}

impl RangeSpec {
    /// Number of bytes covered by the range.
    pub fn len(&self) -> u64 {
        if self.end < self.start {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("invalid Range header")]
    Malformed,
    #[error("range not satisfiable")]
    NotSatisfiable,
}

/// Parses a `Range` header of the form `bytes=<start>-[<end>]`.
///
/// Suffix ranges (`bytes=-500`) and multiple ranges are rejected as
/// malformed. An absent end means "to the end of the file".
pub fn parse(header: &str, file_size: u64) -> Result<RangeSpec, RangeError> {
    let interval = header
        .strip_prefix(BYTES_UNIT)
        .ok_or(RangeError::Malformed)?;
    let (start, end) = interval.split_once('-').ok_or(RangeError::Malformed)?;

    let start = parse_position(start)?;
    let end = if end.is_empty() {
        None
    } else {
        Some(parse_position(end)?)
    };

    if start >= file_size {
        tracing::debug!(start, file_size, "range start past end of file");
        return Err(RangeError::NotSatisfiable);
    }

    // file_size > start >= 0, so this cannot underflow
    let end = end.unwrap_or(file_size - 1);
    if end >= file_size {
        tracing::debug!(end, file_size, "range end past end of file");
        return Err(RangeError::NotSatisfiable);
    }

    Ok(RangeSpec { start, end })
}

/// Digits only: `u64::from_str` would also take a leading `+`.
fn parse_position(digits: &str) -> Result<u64, RangeError> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RangeError::Malformed);
    }
    digits.parse().map_err(|_| RangeError::Malformed)
}
