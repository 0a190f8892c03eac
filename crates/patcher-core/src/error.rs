use std::fmt;

use serde::Serialize;
use strum::{Display, IntoStaticStr};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed hex {input:?}: {reason}")]
    MalformedHex { input: String, reason: String },

    #[error("Degenerate pattern {0:?}: every position is a wildcard")]
    DegenerateSignature(String),

    #[error("Symbol not found: {0}")]
    AddressMiss(String),

    #[error("Ambiguous symbol {name}: {} candidates at {}", .addresses.len(), format_addresses(.addresses))]
    AmbiguousSymbol { name: String, addresses: Vec<u64> },

    #[error("Method name patches require a symbol dump, but no dump file was given")]
    MissingSymbolTable,

    #[error("Signature not found: {0}")]
    NoMatch(String),

    #[error(
        "Signature {signature} matched {} times at {}",
        match_count(.offsets, .truncated),
        format_offsets(.offsets)
    )]
    MultipleMatches {
        signature: String,
        offsets: Vec<usize>,
        truncated: bool,
    },

    #[error("Patch at {offset:#x} ({len} bytes) is out of bounds for a {binary_len} byte binary")]
    OutOfBounds {
        offset: u64,
        len: usize,
        binary_len: usize,
    },

    #[error("Length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Address {address:#x} is not aligned to the {width}-byte instruction width")]
    Misaligned { address: u64, width: usize },

    #[error(
        "Patch #{second} ({second_start:#x}..{second_end:#x}) overlaps patch #{first} ({first_start:#x}..{first_end:#x})"
    )]
    OverlappingPatches {
        first: usize,
        first_start: u64,
        first_end: u64,
        second: usize,
        second_start: u64,
        second_end: u64,
    },

    #[error("Invalid patch directive: {0}")]
    InvalidDirective(String),

    #[error("{0}")]
    Planning(PlanFailures),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Stable, serializable name of an [`Error`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, IntoStaticStr)]
pub enum ErrorKind {
    MalformedHex,
    DegenerateSignature,
    AddressMiss,
    AmbiguousSymbol,
    MissingSymbolTable,
    NoMatch,
    MultipleMatches,
    OutOfBounds,
    LengthMismatch,
    Misaligned,
    OverlappingPatches,
    InvalidDirective,
    Planning,
    #[strum(serialize = "IOFailure")]
    #[serde(rename = "IOFailure")]
    Io,
    Json,
}

impl Error {
    /// Check if this error is a "file not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MalformedHex { .. } => ErrorKind::MalformedHex,
            Error::DegenerateSignature(_) => ErrorKind::DegenerateSignature,
            Error::AddressMiss(_) => ErrorKind::AddressMiss,
            Error::AmbiguousSymbol { .. } => ErrorKind::AmbiguousSymbol,
            Error::MissingSymbolTable => ErrorKind::MissingSymbolTable,
            Error::NoMatch(_) => ErrorKind::NoMatch,
            Error::MultipleMatches { .. } => ErrorKind::MultipleMatches,
            Error::OutOfBounds { .. } => ErrorKind::OutOfBounds,
            Error::LengthMismatch { .. } => ErrorKind::LengthMismatch,
            Error::Misaligned { .. } => ErrorKind::Misaligned,
            Error::OverlappingPatches { .. } => ErrorKind::OverlappingPatches,
            Error::InvalidDirective(_) => ErrorKind::InvalidDirective,
            Error::Planning(_) => ErrorKind::Planning,
            Error::Io(_) => ErrorKind::Io,
            Error::Json(_) => ErrorKind::Json,
        }
    }

    /// Per-directive failures carried by a [`Error::Planning`] error, empty otherwise.
    pub fn failures(&self) -> &[DirectiveFailure] {
        match self {
            Error::Planning(failures) => &failures.0,
            _ => &[],
        }
    }

    pub(crate) fn malformed_hex(input: &str, reason: impl Into<String>) -> Self {
        Error::MalformedHex {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// A failure attributed to one directive, identified by its position in the input list.
#[derive(Debug)]
pub struct DirectiveFailure {
    pub index: usize,
    pub error: Error,
}

impl DirectiveFailure {
    pub fn new(index: usize, error: Error) -> Self {
        Self { index, error }
    }
}

impl fmt::Display for DirectiveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "patch #{}: {}", self.index, self.error)
    }
}

/// Every failure collected in one pass, ordered by directive index.
#[derive(Debug, Default)]
pub struct PlanFailures(pub Vec<DirectiveFailure>);

impl PlanFailures {
    pub fn push(&mut self, index: usize, error: Error) {
        self.0.push(DirectiveFailure::new(index, error));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Turn the collected failures into an error, or `Ok(())` when there are none.
    pub fn into_result(mut self) -> Result<()> {
        if self.0.is_empty() {
            return Ok(());
        }
        self.0.sort_by_key(|failure| failure.index);
        Err(Error::Planning(self))
    }
}

impl fmt::Display for PlanFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} patch directive(s) failed", self.0.len())?;
        for failure in &self.0 {
            write!(f, "\n  {}", failure)?;
        }
        Ok(())
    }
}

fn format_addresses(addresses: &[u64]) -> String {
    addresses
        .iter()
        .map(|a| format!("0x{:X}", a))
        .collect::<Vec<_>>()
        .join(", ")
}

fn match_count(offsets: &[usize], truncated: &bool) -> String {
    if *truncated {
        format!("{}+", offsets.len())
    } else {
        offsets.len().to_string()
    }
}

fn format_offsets(offsets: &[usize]) -> String {
    offsets
        .iter()
        .map(|o| format!("0x{:X}", o))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_not_found() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::Io(io_err);
        assert!(err.is_not_found());

        let other_io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err2 = Error::Io(other_io_err);
        assert!(!err2.is_not_found());
    }

    #[test]
    fn test_plan_failures_sorted_by_index() {
        let mut failures = PlanFailures::default();
        failures.push(3, Error::NoMatch("AA BB".to_string()));
        failures.push(0, Error::AddressMiss("Foo".to_string()));

        let err = failures.into_result().unwrap_err();
        let indices: Vec<usize> = err.failures().iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 3]);
        assert_eq!(err.kind(), ErrorKind::Planning);
    }

    #[test]
    fn test_empty_failures_are_ok() {
        assert!(PlanFailures::default().into_result().is_ok());
    }

    #[test]
    fn test_ambiguous_symbol_message_lists_candidates() {
        let err = Error::AmbiguousSymbol {
            name: "Foo".to_string(),
            addresses: vec![0x1000, 0x2000],
        };
        assert_eq!(
            err.to_string(),
            "Ambiguous symbol Foo: 2 candidates at 0x1000, 0x2000"
        );
    }

    #[test]
    fn test_io_kind_name() {
        let err = Error::Io(std::io::Error::other("disk full"));
        assert_eq!(err.kind().to_string(), "IOFailure");
    }
}
