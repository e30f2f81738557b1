use std::fmt::Write;

use crate::bail;
use crate::error::{CdcResult, ErrorKind};
use crate::types::{LogPosition, TransactionLogPosition};

/// Renders bytes as upper-case hexadecimal digits without a prefix.
pub fn encode_hex_upper(bytes: &[u8]) -> String {
    let mut hex = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        // Writing into a `String` cannot fail.
        let _ = write!(hex, "{byte:02X}");
    }
    hex
}

/// Parses a log position from hexadecimal digits.
///
/// Accepts an optional `0x`/`0X` prefix and either letter case. An empty digit string and the
/// literal `NONE` yield [`LogPosition::NONE`].
pub fn parse_position_hex(hex: &str) -> CdcResult<LogPosition> {
    let hex = hex.trim();
    if hex.eq_ignore_ascii_case("none") {
        return Ok(LogPosition::NONE);
    }

    let digits = hex
        .strip_prefix("0x")
        .or_else(|| hex.strip_prefix("0X"))
        .unwrap_or(hex);

    if digits.len() % 2 != 0 {
        bail!(
            ErrorKind::InvalidPosition,
            "Could not convert hex string to log position",
            format!("The number of digits in '{hex}' is odd")
        );
    }

    if let Some(invalid) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
        bail!(
            ErrorKind::InvalidPosition,
            "Could not convert hex string to log position",
            format!("'{invalid}' in '{hex}' is not a hex digit")
        );
    }

    let mut bytes = Vec::with_capacity(digits.len() / 2);
    for i in (0..digits.len()).step_by(2) {
        bytes.push(u8::from_str_radix(&digits[i..i + 2], 16)?);
    }

    Ok(LogPosition::new(bytes))
}

/// Parses a transaction position rendered as `commit:row`.
pub fn parse_transaction_position_hex(value: &str) -> CdcResult<TransactionLogPosition> {
    let Some((commit, row)) = value.split_once(':') else {
        bail!(
            ErrorKind::InvalidPosition,
            "Could not convert string to transaction log position",
            format!("Expected 'commit:row', got '{value}'")
        );
    };

    Ok(TransactionLogPosition::new(
        parse_position_hex(commit)?,
        parse_position_hex(row)?,
    ))
}
