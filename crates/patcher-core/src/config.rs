//! Patch configuration file
//!
//! ```json
//! {
//!   "input_file": "lib/arm64-v8a/libil2cpp.so",
//!   "dump_file": "dump.cs",
//!   "output_file": "libil2cpp.patched.so",
//!   "patches": [
//!     { "method_name": "UnlockAll", "hex_code": "2000 80D2 C003 5FD6" },
//!     { "offset": "0x1BC8B00", "hex_code": "1F 20 03 D5" },
//!     { "wildcard": "FD 7B ?? A9 ?? ?? 00 91", "hex_code": "C0 03 5F D6 ?? ?? ?? ??" },
//!     "0x1BC8C00 | C0 03 5F D6"
//!   ]
//! }
//! ```
//!
//! The same object may be nested under a top-level `"Patcher"` key.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::directive::{PatchDirective, Replacement, Selector};
use crate::error::{Error, PlanFailures, Result};
use crate::hex::parse_offset;
use crate::signature::SearchSignature;
use crate::symbol::AddressField;

/// Key wrapping the configuration in combined config files
const WRAPPER_KEY: &str = "Patcher";

/// Instruction width assumed for method patches (AArch64)
pub const DEFAULT_INSTRUCTION_WIDTH: usize = 4;

#[derive(Debug, Clone, Deserialize)]
pub struct PatchConfig {
    pub input_file: PathBuf,
    #[serde(default)]
    pub dump_file: Option<PathBuf>,
    /// Absent means the input file is patched in place.
    #[serde(default)]
    pub output_file: Option<PathBuf>,
    #[serde(default)]
    pub backup: bool,
    #[serde(default)]
    pub address_field: AddressField,
    #[serde(default = "default_instruction_width")]
    pub instruction_width: usize,
    /// Raw entries, checked one by one in [`PatchConfig::directives`] so a
    /// malformed entry is reported by its index.
    pub patches: Vec<Value>,
}

fn default_instruction_width() -> usize {
    DEFAULT_INSTRUCTION_WIDTH
}

/// One entry of the `patches` array.
#[derive(Debug, Clone)]
pub enum PatchEntry {
    /// `"search | replace"` or `"0xOFFSET | replace"`
    Compact(String),
    Object(PatchObject),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatchObject {
    #[serde(default)]
    pub method_name: Option<String>,
    #[serde(default)]
    pub offset: Option<Value>,
    #[serde(default)]
    pub wildcard: Option<String>,
    #[serde(default)]
    pub hex_code: Option<String>,
}

/// An `offset` value: a JSON number taken as-is, or a hex string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OffsetValue {
    Number(u64),
    Text(String),
}

impl OffsetValue {
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Number(n) => n.as_u64().map(OffsetValue::Number).ok_or_else(|| {
                Error::InvalidDirective(format!("offset must be a non-negative integer, got {}", n))
            }),
            Value::String(text) => Ok(OffsetValue::Text(text.clone())),
            other => Err(Error::InvalidDirective(format!(
                "offset must be a number or a hex string, got {}",
                other
            ))),
        }
    }

    pub fn value(&self) -> Result<u64> {
        match self {
            OffsetValue::Number(n) => Ok(*n),
            OffsetValue::Text(text) => parse_offset(text),
        }
    }
}

impl PatchEntry {
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::String(code) => Ok(PatchEntry::Compact(code.clone())),
            Value::Object(_) => serde_json::from_value(value.clone())
                .map(PatchEntry::Object)
                .map_err(|e| Error::InvalidDirective(e.to_string())),
            other => Err(Error::InvalidDirective(format!(
                "expected an object or a 'search | replace' string, got {}",
                other
            ))),
        }
    }

    pub fn to_directive(&self) -> Result<PatchDirective> {
        match self {
            PatchEntry::Compact(code) => parse_compact(code),
            PatchEntry::Object(object) => object.to_directive(),
        }
    }
}

impl PatchObject {
    pub fn to_directive(&self) -> Result<PatchDirective> {
        let present: Vec<&str> = [
            ("method_name", self.method_name.is_some()),
            ("offset", self.offset.is_some()),
            ("wildcard", self.wildcard.is_some()),
        ]
        .into_iter()
        .filter_map(|(key, set)| set.then_some(key))
        .collect();

        if present.len() > 1 {
            return Err(Error::InvalidDirective(format!(
                "expected exactly one selector, found {}",
                present.join(", ")
            )));
        }

        let hex_code = self
            .hex_code
            .as_deref()
            .ok_or_else(|| Error::InvalidDirective("hex_code is missing".to_string()))?;

        if let Some(name) = &self.method_name {
            PatchDirective::method(name, hex_code)
        } else if let Some(offset) = &self.offset {
            PatchDirective::offset(OffsetValue::from_json(offset)?.value()?, hex_code)
        } else if let Some(signature) = &self.wildcard {
            PatchDirective::wildcard(signature, hex_code)
        } else {
            Err(Error::InvalidDirective(
                "expected one of method_name, offset or wildcard".to_string(),
            ))
        }
    }
}

fn parse_compact(code: &str) -> Result<PatchDirective> {
    let (target, replace) = code.split_once('|').ok_or_else(|| {
        Error::InvalidDirective(format!("expected 'search | replace', got {:?}", code))
    })?;
    let target = target.trim();
    let replacement = Replacement::parse(replace)?;

    let selector = if target.starts_with("0x") || target.starts_with("0X") {
        Selector::Offset(parse_offset(target)?)
    } else {
        Selector::Wildcard(SearchSignature::parse(target)?)
    };

    Ok(PatchDirective::new(selector, replacement))
}

impl PatchConfig {
    /// Load a configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let config = Self::parse(&content)?;
        debug!(
            "Loaded patch config from {} ({} patch entries)",
            path.as_ref().display(),
            config.patches.len()
        );
        Ok(config)
    }

    /// Parse configuration JSON, bare or nested under `"Patcher"`.
    pub fn parse(content: &str) -> Result<Self> {
        let mut value: Value = serde_json::from_str(content)?;
        if let Some(inner) = value.get_mut(WRAPPER_KEY) {
            value = inner.take();
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Convert every patch entry, keeping each directive's index.
    ///
    /// Entries that fail to convert are collected rather than stopping the
    /// conversion, so the remaining directives can still be planned.
    pub fn indexed_directives(&self) -> (Vec<(usize, PatchDirective)>, PlanFailures) {
        let mut directives = Vec::with_capacity(self.patches.len());
        let mut failures = PlanFailures::default();

        for (index, value) in self.patches.iter().enumerate() {
            match PatchEntry::from_json(value).and_then(|entry| entry.to_directive()) {
                Ok(directive) => directives.push((index, directive)),
                Err(e) => {
                    debug!("Patch entry #{} is invalid: {}", index, e);
                    failures.push(index, e);
                }
            }
        }

        (directives, failures)
    }

    /// Validate every patch entry, reporting all invalid entries at once.
    pub fn directives(&self) -> Result<Vec<PatchDirective>> {
        let (directives, failures) = self.indexed_directives();
        failures.into_result()?;
        Ok(directives.into_iter().map(|(_, d)| d).collect())
    }

    pub fn requires_symbols(&self) -> bool {
        self.patches
            .iter()
            .any(|entry| entry.get("method_name").is_some())
    }

    /// Where the patched binary is written.
    pub fn output_path(&self) -> &Path {
        self.output_file.as_deref().unwrap_or(&self.input_file)
    }

    /// Resolve relative paths against `base`, e.g. a decoded APK root.
    pub fn with_base_dir<P: AsRef<Path>>(mut self, base: P) -> Self {
        let base = base.as_ref();
        let rebase = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };

        rebase(&mut self.input_file);
        if let Some(path) = self.dump_file.as_mut() {
            rebase(path);
        }
        if let Some(path) = self.output_file.as_mut() {
            rebase(path);
        }
        self
    }
}

impl FromStr for PatchConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
