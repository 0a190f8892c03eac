//! Hex text codec
//!
//! Parses user-supplied hex such as `"DE AD BE EF"`, `"0xDEADBEEF"`,
//! `"2000 80D2"` or `"48 8D 0D ?? ?? ?? ??"` into bytes or wildcard
//! patterns, and formats bytes back for display.
//!
//! Tokens are separated by whitespace, `-`, `:` or `,`. A token may carry an
//! optional `0x` prefix and any even number of hex digits. `??` (or a lone
//! `?` token) stands for "any byte at this position".

use crate::error::{Error, Result};
use crate::signature::{PatternByte, SearchSignature};

/// Result of [`parse`]: plain bytes, or a signature when wildcards are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    Bytes(Vec<u8>),
    Signature(SearchSignature),
}

/// Parse hex text into concrete bytes, or into a [`SearchSignature`] if it
/// contains at least one wildcard.
pub fn parse(text: &str) -> Result<Parsed> {
    let pattern = parse_pattern(text)?;
    if pattern.iter().all(|b| b.is_fixed()) {
        let bytes = pattern.iter().filter_map(|b| b.value()).collect();
        return Ok(Parsed::Bytes(bytes));
    }
    SearchSignature::new(pattern).map(Parsed::Signature)
}

/// Parse hex text that must not contain wildcards.
pub fn parse_bytes(text: &str) -> Result<Vec<u8>> {
    match parse(text)? {
        Parsed::Bytes(bytes) => Ok(bytes),
        Parsed::Signature(_) => Err(Error::malformed_hex(
            text,
            "wildcards are not allowed here",
        )),
    }
}

/// Parse hex text into a sequence of fixed and wildcard positions.
///
/// Unlike [`parse`] this does not reject an all-wildcard sequence; callers
/// decide whether that is meaningful.
pub fn parse_pattern(text: &str) -> Result<Vec<PatternByte>> {
    let mut pattern = Vec::new();

    for token in text
        .split(|c: char| c.is_whitespace() || matches!(c, '-' | ':' | ','))
        .filter(|t| !t.is_empty())
    {
        if token == "?" {
            pattern.push(PatternByte::Any);
            continue;
        }

        let digits = strip_hex_prefix(token);
        if digits.is_empty() {
            return Err(Error::malformed_hex(
                text,
                format!("token '{}' has no hex digits", token),
            ));
        }
        if let Some(c) = digits.chars().find(|c| !c.is_ascii_hexdigit() && *c != '?') {
            return Err(Error::malformed_hex(
                text,
                format!("invalid character '{}' in token '{}'", c, token),
            ));
        }
        if digits.len() % 2 != 0 {
            return Err(Error::malformed_hex(
                text,
                format!("odd number of hex digits in token '{}'", token),
            ));
        }

        // ASCII only past this point, so byte indices are char boundaries.
        for i in (0..digits.len()).step_by(2) {
            let pair = &digits[i..i + 2];
            if pair == "??" {
                pattern.push(PatternByte::Any);
            } else if pair.contains('?') {
                return Err(Error::malformed_hex(
                    text,
                    format!("partial wildcard in token '{}'", token),
                ));
            } else {
                let value = u8::from_str_radix(pair, 16).map_err(|e| {
                    Error::malformed_hex(text, format!("token '{}': {}", token, e))
                })?;
                pattern.push(PatternByte::Fixed(value));
            }
        }
    }

    if pattern.is_empty() {
        return Err(Error::malformed_hex(text, "input is empty"));
    }

    Ok(pattern)
}

/// Format bytes as uppercase, space separated hex (`DE AD BE EF`).
pub fn format_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Format a pattern, rendering wildcards as `??`.
pub fn format_pattern(pattern: &[PatternByte]) -> String {
    pattern
        .iter()
        .map(|b| match b {
            PatternByte::Fixed(value) => format!("{:02X}", value),
            PatternByte::Any => "??".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse an offset string as hex, with or without a `0x`/`0X` prefix.
///
/// Signs are rejected, so `"+10"` and `"0x-1"` are malformed.
pub fn parse_offset(text: &str) -> Result<u64> {
    let digits = strip_hex_prefix(text.trim());
    if digits.is_empty() {
        return Err(Error::malformed_hex(text, "offset is empty"));
    }
    if let Some(c) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(Error::malformed_hex(
            text,
            format!("invalid character '{}' in offset", c),
        ));
    }

    u64::from_str_radix(digits, 16)
        .map_err(|e| Error::malformed_hex(text, format!("invalid offset: {}", e)))
}

fn strip_hex_prefix(token: &str) -> &str {
    token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token)
}
