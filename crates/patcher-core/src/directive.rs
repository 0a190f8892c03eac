use std::fmt;

use strum::{Display, IntoStaticStr};

use crate::error::{Error, Result};
use crate::hex;
use crate::signature::{PatternByte, SearchSignature};

/// Where a directive applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// A symbol resolved through the dump's symbol table
    MethodName(String),
    /// A literal file offset
    Offset(u64),
    /// The single location matching a signature
    Wildcard(SearchSignature),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum SelectorKind {
    MethodName,
    Offset,
    Wildcard,
}

impl Selector {
    pub fn kind(&self) -> SelectorKind {
        match self {
            Selector::MethodName(_) => SelectorKind::MethodName,
            Selector::Offset(_) => SelectorKind::Offset,
            Selector::Wildcard(_) => SelectorKind::Wildcard,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::MethodName(name) => write!(f, "method {}", name),
            Selector::Offset(offset) => write!(f, "offset 0x{:X}", offset),
            Selector::Wildcard(signature) => write!(f, "wildcard {}", signature),
        }
    }
}

/// Replacement bytes. `Any` positions keep whatever byte is already there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement(Vec<PatternByte>);

impl Replacement {
    pub fn parse(text: &str) -> Result<Self> {
        let pattern = hex::parse_pattern(text)?;
        if !pattern.iter().any(|b| b.is_fixed()) {
            return Err(Error::DegenerateSignature(hex::format_pattern(&pattern)));
        }
        Ok(Self(pattern))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn pattern(&self) -> &[PatternByte] {
        &self.0
    }

    /// Concrete bytes to write over `original`, which must be `len()` bytes long.
    pub fn resolve(&self, original: &[u8]) -> Vec<u8> {
        self.0
            .iter()
            .zip(original)
            .map(|(byte, &old)| byte.value().unwrap_or(old))
            .collect()
    }
}

impl From<Vec<u8>> for Replacement {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes.into_iter().map(PatternByte::Fixed).collect())
    }
}

impl fmt::Display for Replacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::format_pattern(&self.0))
    }
}

/// One requested change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchDirective {
    pub selector: Selector,
    pub replacement: Replacement,
}

impl PatchDirective {
    pub fn new(selector: Selector, replacement: Replacement) -> Self {
        Self {
            selector,
            replacement,
        }
    }

    pub fn method(name: &str, hex_code: &str) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidDirective("method_name is empty".to_string()));
        }
        Ok(Self::new(
            Selector::MethodName(name.to_string()),
            Replacement::parse(hex_code)?,
        ))
    }

    pub fn offset(offset: u64, hex_code: &str) -> Result<Self> {
        Ok(Self::new(Selector::Offset(offset), Replacement::parse(hex_code)?))
    }

    pub fn wildcard(signature: &str, hex_code: &str) -> Result<Self> {
        Ok(Self::new(
            Selector::Wildcard(SearchSignature::parse(signature)?),
            Replacement::parse(hex_code)?,
        ))
    }
}

impl fmt::Display for PatchDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.selector, self.replacement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replacement_keeps_wildcard_bytes() {
        let replacement = Replacement::parse("1F ?? 20 ??").unwrap();
        assert_eq!(
            replacement.resolve(&[0xAA, 0xBB, 0xCC, 0xDD]),
            vec![0x1F, 0xBB, 0x20, 0xDD]
        );
    }

    #[test]
    fn test_replacement_all_wildcards_rejected() {
        assert!(matches!(
            Replacement::parse("?? ??"),
            Err(Error::DegenerateSignature(_))
        ));
    }

    #[test]
    fn test_constructors() {
        let method = PatchDirective::method("UnlockAll", "2000 80D2 C003 5FD6").unwrap();
        assert_eq!(method.selector.kind(), SelectorKind::MethodName);
        assert_eq!(method.replacement.len(), 8);

        let offset = PatchDirective::offset(0x04, "DEADBEEF").unwrap();
        assert_eq!(offset.to_string(), "offset 0x4 -> DE AD BE EF");

        let wildcard = PatchDirective::wildcard("AA ?? CC", "00 00 00").unwrap();
        assert_eq!(wildcard.selector.to_string(), "wildcard AA ?? CC");
        assert_eq!(SelectorKind::Wildcard.to_string(), "wildcard");
    }

    #[test]
    fn test_constructor_errors() {
        assert!(matches!(
            PatchDirective::method("  ", "00"),
            Err(Error::InvalidDirective(_))
        ));
        assert!(matches!(
            PatchDirective::offset(0, "XYZ"),
            Err(Error::MalformedHex { .. })
        ));
        assert!(matches!(
            PatchDirective::wildcard("?? ??", "00 00"),
            Err(Error::DegenerateSignature(_))
        ));
    }
}
