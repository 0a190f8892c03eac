//! Patch planning
//!
//! Turns directives into a validated [`PatchPlan`] without touching the
//! binary. Every directive is resolved even after an earlier one fails, so a
//! single run reports everything wrong with a configuration.

use std::ops::Range;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_INSTRUCTION_WIDTH;
use crate::directive::{PatchDirective, Selector};
use crate::error::{Error, PlanFailures, Result};
use crate::report::{serialize_address, serialize_hex};
use crate::scan::{PatternSearch, Scanner};
use crate::symbol::SymbolTable;

/// Number of match offsets kept for a `MultipleMatches` report
pub const MATCH_REPORT_LIMIT: usize = 8;

#[derive(Debug, Clone, Copy)]
pub struct PlanOptions {
    /// Method patches must be a multiple of this length and start aligned
    /// to it. Zero disables both checks.
    pub instruction_width: usize,
    /// Matches collected per wildcard before giving up on uniqueness
    pub match_limit: usize,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            instruction_width: DEFAULT_INSTRUCTION_WIDTH,
            match_limit: MATCH_REPORT_LIMIT,
        }
    }
}

/// A directive resolved to a concrete byte range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPatch {
    /// Position of the directive in the input list
    pub index: usize,
    pub selector: String,
    #[serde(serialize_with = "serialize_address")]
    pub offset: u64,
    #[serde(serialize_with = "serialize_hex")]
    pub original: Vec<u8>,
    #[serde(serialize_with = "serialize_hex")]
    pub replacement: Vec<u8>,
}

impl ResolvedPatch {
    pub fn len(&self) -> usize {
        self.replacement.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replacement.is_empty()
    }

    pub fn end(&self) -> u64 {
        self.offset + self.replacement.len() as u64
    }

    pub fn range(&self) -> Range<u64> {
        self.offset..self.end()
    }

    /// The bytes already equal the replacement.
    pub fn is_noop(&self) -> bool {
        self.original == self.replacement
    }
}

/// Validated, non-overlapping writes, ordered by offset.
#[derive(Debug, Clone, Serialize)]
pub struct PatchPlan {
    binary_len: usize,
    patches: Vec<ResolvedPatch>,
}

impl PatchPlan {
    pub fn binary_len(&self) -> usize {
        self.binary_len
    }

    /// Patches ordered by offset.
    pub fn patches(&self) -> &[ResolvedPatch] {
        &self.patches
    }

    /// Patches ordered by directive index.
    pub fn in_directive_order(&self) -> Vec<&ResolvedPatch> {
        let mut patches: Vec<&ResolvedPatch> = self.patches.iter().collect();
        patches.sort_by_key(|p| p.index);
        patches
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Overwrite `binary` with every patch.
    ///
    /// Fails without writing anything if `binary` is not the buffer the plan
    /// was made for.
    pub fn apply_to(&self, binary: &mut [u8]) -> Result<()> {
        if binary.len() != self.binary_len {
            return Err(Error::LengthMismatch {
                expected: self.binary_len,
                actual: binary.len(),
            });
        }

        for patch in &self.patches {
            let start = patch.offset as usize;
            binary[start..start + patch.len()].copy_from_slice(&patch.replacement);
        }
        Ok(())
    }
}

pub struct Planner<'a, S: PatternSearch = Scanner> {
    symbols: Option<&'a SymbolTable>,
    scanner: S,
    options: PlanOptions,
}

impl<'a> Planner<'a, Scanner> {
    pub fn new(symbols: Option<&'a SymbolTable>) -> Self {
        Self {
            symbols,
            scanner: Scanner,
            options: PlanOptions::default(),
        }
    }
}

impl<'a, S: PatternSearch> Planner<'a, S> {
    pub fn with_scanner<T: PatternSearch>(self, scanner: T) -> Planner<'a, T> {
        Planner {
            symbols: self.symbols,
            scanner,
            options: self.options,
        }
    }

    pub fn with_options(mut self, options: PlanOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolve and validate all directives against `binary`.
    pub fn plan(&self, binary: &[u8], directives: &[PatchDirective]) -> Result<PatchPlan> {
        self.plan_indexed(binary, directives.iter().enumerate(), PlanFailures::default())
    }

    /// Like [`Planner::plan`], for directives carrying their own indices.
    ///
    /// `failures` holds errors already attributed to other indices, such as
    /// entries that never became directives; they are reported together with
    /// the planning failures.
    pub fn plan_indexed<'d, I>(
        &self,
        binary: &[u8],
        directives: I,
        mut failures: PlanFailures,
    ) -> Result<PatchPlan>
    where
        I: IntoIterator<Item = (usize, &'d PatchDirective)>,
    {
        let mut patches = Vec::new();

        for (index, directive) in directives {
            match self.resolve(binary, index, directive) {
                Ok(patch) => {
                    debug!(
                        "Patch #{} ({}): 0x{:X}..0x{:X}",
                        index,
                        patch.selector,
                        patch.offset,
                        patch.end()
                    );
                    if patch.is_noop() {
                        warn!(
                            "Patch #{} at 0x{:X} is already applied (bytes unchanged)",
                            index, patch.offset
                        );
                    }
                    patches.push(patch);
                }
                Err(e) => {
                    debug!("Patch #{} ({}) failed: {}", index, directive.selector, e);
                    failures.push(index, e);
                }
            }
        }

        patches.sort_by_key(|p| (p.offset, p.index));
        check_overlaps(&patches, &mut failures);
        failures.into_result()?;

        info!(
            "Planned {} patch(es) over {} bytes",
            patches.len(),
            binary.len()
        );
        Ok(PatchPlan {
            binary_len: binary.len(),
            patches,
        })
    }

    fn resolve(
        &self,
        binary: &[u8],
        index: usize,
        directive: &PatchDirective,
    ) -> Result<ResolvedPatch> {
        let len = directive.replacement.len();
        let offset = self.locate(binary, &directive.selector, len)?;

        let end = offset
            .checked_add(len as u64)
            .filter(|end| *end <= binary.len() as u64)
            .ok_or(Error::OutOfBounds {
                offset,
                len,
                binary_len: binary.len(),
            })?;

        let original = binary[offset as usize..end as usize].to_vec();
        let replacement = directive.replacement.resolve(&original);

        Ok(ResolvedPatch {
            index,
            selector: directive.selector.to_string(),
            offset,
            original,
            replacement,
        })
    }

    fn locate(&self, binary: &[u8], selector: &Selector, len: usize) -> Result<u64> {
        match selector {
            Selector::MethodName(name) => {
                let symbols = self.symbols.ok_or(Error::MissingSymbolTable)?;
                let address = symbols.resolve(name)?;

                let width = self.options.instruction_width;
                if width > 0 {
                    if len % width != 0 {
                        return Err(Error::LengthMismatch {
                            expected: len.div_ceil(width) * width,
                            actual: len,
                        });
                    }
                    if address % width as u64 != 0 {
                        return Err(Error::Misaligned { address, width });
                    }
                }
                Ok(address)
            }
            Selector::Offset(offset) => {
                if *offset >= binary.len() as u64 {
                    return Err(Error::OutOfBounds {
                        offset: *offset,
                        len,
                        binary_len: binary.len(),
                    });
                }
                Ok(*offset)
            }
            Selector::Wildcard(signature) => {
                if len != signature.len() {
                    return Err(Error::LengthMismatch {
                        expected: signature.len(),
                        actual: len,
                    });
                }

                let limit = self.options.match_limit.max(2);
                let matches = self.scanner.find(binary, signature, Some(limit));
                match matches.offsets.as_slice() {
                    [] => Err(Error::NoMatch(signature.to_string())),
                    [offset] => Ok(*offset as u64),
                    _ => Err(Error::MultipleMatches {
                        signature: signature.to_string(),
                        offsets: matches.offsets,
                        truncated: matches.truncated,
                    }),
                }
            }
        }
    }
}

/// Plan `directives` with the default scanner and options.
pub fn plan(
    binary: &[u8],
    directives: &[PatchDirective],
    symbols: Option<&SymbolTable>,
) -> Result<PatchPlan> {
    Planner::new(symbols).plan(binary, directives)
}

/// Report each patch that starts before the furthest-reaching earlier patch ends.
fn check_overlaps(sorted: &[ResolvedPatch], failures: &mut PlanFailures) {
    let mut furthest: Option<&ResolvedPatch> = None;

    for patch in sorted {
        if let Some(previous) = furthest
            && patch.offset < previous.end()
        {
            let (first, second) = if previous.index < patch.index {
                (previous, patch)
            } else {
                (patch, previous)
            };
            failures.push(
                second.index,
                Error::OverlappingPatches {
                    first: first.index,
                    first_start: first.offset,
                    first_end: first.end(),
                    second: second.index,
                    second_start: second.offset,
                    second_end: second.end(),
                },
            );
        }

        if furthest.is_none_or(|previous| patch.end() > previous.end()) {
            furthest = Some(patch);
        }
    }
}
