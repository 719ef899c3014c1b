//! Integer literal parsing shared by register assignments and region specifications.

use std::num::ParseIntError;

/// Parses a `u64` literal.
///
/// Accepts decimal, `0x` hex, `0o` octal, and `0b` binary, case-insensitively, with `_`
/// digit separators anywhere in the digits.
///
/// # Errors
///
/// Returns the underlying [`ParseIntError`] for empty, malformed, or out-of-range input.
pub(crate) fn parse_u64(text: &str) -> Result<u64, ParseIntError> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect();

    if let Some(digits) = cleaned.strip_prefix("0x") {
        u64::from_str_radix(digits, 16)
    } else if let Some(digits) = cleaned.strip_prefix("0o") {
        u64::from_str_radix(digits, 8)
    } else if let Some(digits) = cleaned.strip_prefix("0b") {
        u64::from_str_radix(digits, 2)
    } else {
        cleaned.parse()
    }
}
