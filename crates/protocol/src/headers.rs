//! Parsing rules for numeric tus header values.

use crate::constants::STATUS_LOCKED;

/// Error returned when a numeric header value cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderError {
    #[error("empty header value")]
    Empty,

    #[error("invalid header value: {0:?}")]
    Invalid(String),
}

/// Parses an `Upload-Offset` value: a non-negative decimal integer.
pub fn parse_offset(value: &str) -> Result<u64, HeaderError> {
    parse_non_negative(value)
}

/// Parses an `Upload-Length` value: a non-negative decimal integer.
pub fn parse_length(value: &str) -> Result<u64, HeaderError> {
    parse_non_negative(value)
}

fn parse_non_negative(value: &str) -> Result<u64, HeaderError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(HeaderError::Empty);
    }
    // `u64::from_str` accepts a leading '+', the protocol does not.
    if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(HeaderError::Invalid(value.to_string()));
    }
    trimmed
        .parse::<u64>()
        .map_err(|_| HeaderError::Invalid(value.to_string()))
}

/// Returns `true` if a response with this status is worth retrying.
///
/// Server errors (5xx) and 423 Locked are transient. Every other status,
/// including the remaining 4xx codes, means the request itself is wrong
/// and sending it again will not help.
pub fn is_retryable_status(status: u16) -> bool {
    (500..600).contains(&status) || status == STATUS_LOCKED
}
