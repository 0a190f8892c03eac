//! # patcher-core
//!
//! Binary patch engine for compiled native libraries.
//!
//! This crate provides:
//! - Hex and wildcard pattern parsing
//! - Symbol resolution from decompiler dumps
//! - Streaming masked byte-pattern scanning
//! - Patch planning with bounds, alignment and overlap validation
//! - Atomic application with non-overwriting backups
//!
//! ```ignore
//! use patcher_core::prelude::*;
//!
//! let report = Patcher::from_path("patch.json")?.run()?;
//! println!("{}", report.to_json()?);
//! ```

pub mod apply;
pub mod config;
pub mod directive;
pub mod error;
pub mod hex;
pub mod patcher;
pub mod plan;
pub mod prelude;
pub mod report;
pub mod scan;
pub mod signature;
pub mod symbol;

pub use apply::{ApplyOptions, apply, backup_path};
pub use config::{OffsetValue, PatchConfig, PatchEntry, PatchObject};
pub use directive::{PatchDirective, Replacement, Selector, SelectorKind};
pub use error::{DirectiveFailure, Error, ErrorKind, PlanFailures, Result};
pub use patcher::Patcher;
pub use plan::{PatchPlan, PlanOptions, Planner, ResolvedPatch, plan};
pub use report::{ApplyReport, FailureEntry};
pub use scan::{Matches, NaiveScanner, PatternSearch, Scanner, scan_reader};
pub use signature::{PatternByte, SearchSignature};
pub use symbol::{AddressField, SymbolEntry, SymbolTable};
