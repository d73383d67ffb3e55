//! `grpc-timeout` header parsing.

use std::time::Duration;

use thiserror::Error;

/// Request header carrying a client-supplied call timeout.
pub const TIMEOUT_HEADER: &str = "grpc-timeout";

/// The header value was not `<digits><unit>`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid grpc-timeout value {0:?}")]
pub struct InvalidTimeout(pub String);

/// Parse a timeout of the form `<1-8 digits><H|M|S|m|u|n>`.
pub fn parse_timeout(raw: &str) -> Result<Duration, InvalidTimeout> {
    let invalid = || InvalidTimeout(raw.to_string());
    let raw_trimmed = raw.trim();
    if raw_trimmed.len() < 2 || !raw_trimmed.is_ascii() {
        return Err(invalid());
    }

    let (digits, unit) = raw_trimmed.split_at(raw_trimmed.len() - 1);
    if digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let amount: u64 = digits.parse().map_err(|_| invalid())?;

    let duration = match unit {
        "H" => Duration::from_secs(amount * 3600),
        "M" => Duration::from_secs(amount * 60),
        "S" => Duration::from_secs(amount),
        "m" => Duration::from_millis(amount),
        "u" => Duration::from_micros(amount),
        "n" => Duration::from_nanos(amount),
        _ => return Err(invalid()),
    };
    Ok(duration)
}
