use std::time::Duration;

use crate::ProtocolError;

/// Parses a `fetch-timeout` value such as `"300ms"`, `"1m30s"` or `"0"`.
///
/// Units follow `humantime` (`ns`, `us`, `ms`, `s`, `m`, `h` and their long
/// forms). A negative duration is accepted and clamps to zero.
pub fn parse_duration(input: &str) -> Result<Duration, ProtocolError> {
    let text = input.trim();
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    if rest == "0" {
        return Ok(Duration::ZERO);
    }

    let duration = humantime::parse_duration(rest)
        .map_err(|e| ProtocolError::InvalidFetchTimeout(format!("{input:?}: {e}")))?;
    if negative {
        return Ok(Duration::ZERO);
    }
    Ok(duration)
}
