use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::hex;

/// One position of a byte pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternByte {
    Fixed(u8),
    Any,
}

impl PatternByte {
    pub fn matches(self, byte: u8) -> bool {
        match self {
            PatternByte::Fixed(value) => value == byte,
            PatternByte::Any => true,
        }
    }

    pub fn is_fixed(self) -> bool {
        matches!(self, PatternByte::Fixed(_))
    }

    pub fn value(self) -> Option<u8> {
        match self {
            PatternByte::Fixed(value) => Some(value),
            PatternByte::Any => None,
        }
    }
}

/// A wildcarded byte pattern with at least one fixed position.
///
/// The longest run of fixed bytes is kept as the search anchor so scanners
/// can jump between anchor hits instead of testing every offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSignature {
    pattern: Vec<PatternByte>,
    anchor_start: usize,
    anchor: Vec<u8>,
}

impl SearchSignature {
    pub fn new(pattern: Vec<PatternByte>) -> Result<Self> {
        if pattern.is_empty() {
            return Err(Error::malformed_hex("", "signature is empty"));
        }

        let (anchor_start, anchor_len) = longest_fixed_run(&pattern);
        if anchor_len == 0 {
            return Err(Error::DegenerateSignature(hex::format_pattern(&pattern)));
        }

        let anchor = pattern[anchor_start..anchor_start + anchor_len]
            .iter()
            .filter_map(|b| b.value())
            .collect();

        Ok(Self {
            pattern,
            anchor_start,
            anchor,
        })
    }

    /// Parse a signature from hex text. Text without wildcards yields an
    /// exact-match signature.
    pub fn parse(text: &str) -> Result<Self> {
        Self::new(hex::parse_pattern(text)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::new(bytes.iter().copied().map(PatternByte::Fixed).collect())
    }

    pub fn pattern(&self) -> &[PatternByte] {
        &self.pattern
    }

    pub fn len(&self) -> usize {
        self.pattern.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pattern.is_empty()
    }

    pub fn has_wildcards(&self) -> bool {
        self.pattern.iter().any(|b| !b.is_fixed())
    }

    /// Offset of the anchor within the pattern, and the anchor bytes.
    pub fn anchor(&self) -> (usize, &[u8]) {
        (self.anchor_start, &self.anchor)
    }

    /// Check whether the signature matches `haystack` starting at `pos`.
    pub fn matches_at(&self, haystack: &[u8], pos: usize) -> bool {
        let Some(window) = pos
            .checked_add(self.pattern.len())
            .and_then(|end| haystack.get(pos..end))
        else {
            return false;
        };

        self.pattern
            .iter()
            .zip(window)
            .all(|(expected, &actual)| expected.matches(actual))
    }
}

impl fmt::Display for SearchSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::format_pattern(&self.pattern))
    }
}

impl FromStr for SearchSignature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn longest_fixed_run(pattern: &[PatternByte]) -> (usize, usize) {
    let mut best = (0, 0);
    let mut run_start = 0;

    for (i, byte) in pattern.iter().enumerate() {
        if !byte.is_fixed() {
            run_start = i + 1;
            continue;
        }
        let run_len = i + 1 - run_start;
        if run_len > best.1 {
            best = (run_start, run_len);
        }
    }

    best
}
