//! Field delimiter parsing.

use crate::errors::{AppError, AppResult};

/// Default field delimiter.
pub const DEFAULT_DELIMITER: u8 = b',';

/// Parses a client-supplied delimiter.
///
/// Only the first character is used; an absent or empty value means `,`.
/// Delimiters must be single-byte (ASCII) characters.
pub fn parse_delimiter(raw: Option<&str>) -> AppResult<u8> {
    let Some(first) = raw.and_then(|s| s.chars().next()) else {
        return Ok(DEFAULT_DELIMITER);
    };
    if !first.is_ascii() {
        return Err(AppError::Validation(format!(
            "Delimiter must be a single ASCII character, got '{}'",
            first
        )));
    }
    Ok(first as u8)
}
