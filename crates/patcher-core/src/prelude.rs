//! Prelude module for convenient imports
//!
//! ```ignore
//! use patcher_core::prelude::*;
//! ```

// Pipeline
pub use crate::config::PatchConfig;
pub use crate::patcher::Patcher;
pub use crate::report::{ApplyReport, FailureEntry};

// Error handling
pub use crate::error::{Error, ErrorKind, Result};

// Building blocks
pub use crate::directive::{PatchDirective, Selector};
pub use crate::plan::{PatchPlan, Planner};
pub use crate::signature::SearchSignature;
pub use crate::symbol::{AddressField, SymbolTable};
