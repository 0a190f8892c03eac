//! Run reports
//!
//! [`ApplyReport`] is what a successful run produces; [`FailureEntry`]
//! flattens a failed run into one entry per offending directive. Both
//! serialize to JSON with offsets as `0x..` strings and bytes as spaced hex.

use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};

use crate::error::{Error, ErrorKind, Result};
use crate::hex::format_bytes;
use crate::plan::{PatchPlan, ResolvedPatch};

#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub input: PathBuf,
    /// `None` for a dry run
    pub output: Option<PathBuf>,
    pub backup: Option<PathBuf>,
    pub binary_len: usize,
    pub applied_at: DateTime<Local>,
    pub dry_run: bool,
    /// In directive order
    pub patches: Vec<ResolvedPatch>,
}

impl ApplyReport {
    pub(crate) fn new(input: PathBuf, plan: &PatchPlan) -> Self {
        Self {
            input,
            output: None,
            backup: None,
            binary_len: plan.binary_len(),
            applied_at: Local::now(),
            dry_run: true,
            patches: plan.in_directive_order().into_iter().cloned().collect(),
        }
    }

    pub fn changed_bytes(&self) -> usize {
        self.patches
            .iter()
            .map(|p| {
                p.original
                    .iter()
                    .zip(&p.replacement)
                    .filter(|(old, new)| old != new)
                    .count()
            })
            .sum()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// One failure of a run, attributed to a directive when possible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureEntry {
    pub index: Option<usize>,
    pub kind: ErrorKind,
    pub message: String,
}

impl FailureEntry {
    /// Flatten an error into entries. A planning error yields one entry per
    /// failed directive; any other error yields a single unattributed entry.
    pub fn from_error(err: &Error) -> Vec<Self> {
        let failures = err.failures();
        if failures.is_empty() {
            return vec![Self {
                index: None,
                kind: err.kind(),
                message: err.to_string(),
            }];
        }

        failures
            .iter()
            .map(|failure| Self {
                index: Some(failure.index),
                kind: failure.error.kind(),
                message: failure.error.to_string(),
            })
            .collect()
    }
}

pub(crate) fn serialize_address<S: Serializer>(
    address: &u64,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("0x{:X}", address))
}

pub(crate) fn serialize_hex<S: Serializer>(
    bytes: &[u8],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_bytes(bytes))
}
