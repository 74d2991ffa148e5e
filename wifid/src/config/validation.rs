//! Per-field validation for settings updates.
//!
//! Each validator takes the raw request value and either returns the typed
//! value to stage or a [`ValidationError`]. Station credentials are only
//! truncated: a wrong SSID or password is a connect failure, not a bad request.

use super::{OpMode, PASSWORD_LEN, SSID_LEN};
use crate::error::ValidationError;

pub type Result<T> = std::result::Result<T, ValidationError>;

/// Highest accepted transmit power value.
pub const MAX_TX_POWER: i64 = 82;

/// Shortest accepted non-empty AP password.
pub const MIN_PASSWORD_LEN: usize = 8;

fn parse_int(raw: &str) -> Result<i64> {
    raw.trim()
        .parse()
        .map_err(|_| ValidationError::NotANumber(raw.to_string()))
}

/// Operating mode: 1 (Client), 2 (AP only) or 3 (Client+AP).
pub fn opmode(raw: &str) -> Result<OpMode> {
    let code = parse_int(raw)?;
    match OpMode::from_code(code) {
        Some(OpMode::Disabled) | None => Err(ValidationError::BadOpMode(code)),
        Some(mode) => Ok(mode),
    }
}

/// Boolean switch. Never fails: anything not recognised as "on" is off.
pub fn flag(raw: &str) -> bool {
    let raw = raw.trim();
    match raw.parse::<i64>() {
        Ok(n) => n != 0,
        Err(_) => matches!(
            raw.to_ascii_lowercase().as_str(),
            "true" | "on" | "yes"
        ),
    }
}

pub fn tx_power(raw: &str) -> Result<u8> {
    let tpw = parse_int(raw)?;
    if (0..=MAX_TX_POWER).contains(&tpw) {
        Ok(tpw as u8)
    } else {
        Err(ValidationError::TxPowerOutOfRange(tpw))
    }
}

pub fn channel(raw: &str) -> Result<u8> {
    let channel = parse_int(raw)?;
    if (1..=14).contains(&channel) {
        Ok(channel as u8)
    } else {
        Err(ValidationError::ChannelOutOfRange(channel))
    }
}

/// Replace bytes outside printable ASCII with `_` and cut to [`SSID_LEN`].
pub fn sanitize_ssid(raw: &str) -> String {
    raw.bytes()
        .take(SSID_LEN)
        .map(|b| if (32..127).contains(&b) { b as char } else { '_' })
        .collect()
}

pub fn ap_ssid(raw: &str) -> Result<String> {
    let ssid = sanitize_ssid(raw);
    if ssid.is_empty() {
        return Err(ValidationError::EmptySsid);
    }
    Ok(ssid)
}

/// Empty for an open network, otherwise 8 to 62 bytes.
pub fn ap_password(raw: &str) -> Result<String> {
    let len = raw.len();
    if len == 0 || (MIN_PASSWORD_LEN..PASSWORD_LEN - 1).contains(&len) {
        Ok(raw.to_string())
    } else {
        Err(ValidationError::BadPasswordLength(len))
    }
}

pub fn sta_ssid(raw: &str) -> String {
    truncate(raw, SSID_LEN)
}

pub fn sta_password(raw: &str) -> String {
    truncate(raw, PASSWORD_LEN)
}

/// Cut to at most `max` bytes without splitting a character.
fn truncate(raw: &str, max: usize) -> String {
    if raw.len() <= max {
        return raw.to_string();
    }
    let mut end = max;
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    raw[..end].to_string()
}
