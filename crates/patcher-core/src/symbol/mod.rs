//! Symbol table built from a decompiler dump
//!
//! Resolution is strict: a name must identify exactly one entry. Duplicate
//! names are kept as-is and reported as [`Error::AmbiguousSymbol`] rather
//! than resolved to whichever entry comes first.

mod dump;

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Which address of an annotated dump line to patch at.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    IntoStaticStr,
    Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AddressField {
    /// File offset within the binary (what a file patch needs)
    #[default]
    Offset,
    /// Relative virtual address
    Rva,
    /// Absolute virtual address
    Va,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolEntry {
    pub name: String,
    /// Enclosing type, when the dump declares one
    pub class: Option<String>,
    pub address: u64,
}

impl SymbolEntry {
    pub fn new(name: impl Into<String>, address: u64) -> Self {
        Self {
            name: name.into(),
            class: None,
            address,
        }
    }

    pub fn qualified_name(&self) -> String {
        match &self.class {
            Some(class) => format!("{}.{}", class, self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    entries: Vec<SymbolEntry>,
}

impl SymbolTable {
    /// Parse dump text. Lines that do not describe a symbol are skipped.
    pub fn load(text: &str, field: AddressField) -> Self {
        Self {
            entries: dump::parse(text, field),
        }
    }

    pub fn from_bytes(bytes: &[u8], field: AddressField) -> Self {
        Self::load(&dump::decode(bytes), field)
    }

    pub fn from_file<P: AsRef<Path>>(path: P, field: AddressField) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let table = Self::from_bytes(&bytes, field);
        info!(
            "Loaded {} symbol(s) from {} ({} addresses)",
            table.len(),
            path.display(),
            field
        );
        Ok(table)
    }

    pub fn from_entries(entries: Vec<SymbolEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[SymbolEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries matching `name`.
    ///
    /// An exact name match wins. Failing that, `name` is matched against
    /// each entry's `Class.Method` form, so method names containing dots
    /// such as `Player..ctor` still resolve.
    pub fn lookup(&self, name: &str) -> Vec<&SymbolEntry> {
        let exact: Vec<&SymbolEntry> = self.entries.iter().filter(|e| e.name == name).collect();
        if !exact.is_empty() {
            return exact;
        }

        self.entries
            .iter()
            .filter(|e| {
                e.class
                    .as_deref()
                    .and_then(|class| name.strip_prefix(class))
                    .and_then(|rest| rest.strip_prefix('.'))
                    == Some(e.name.as_str())
            })
            .collect()
    }

    /// Resolve `name` to the address of the single entry it identifies.
    pub fn resolve(&self, name: &str) -> Result<u64> {
        match self.lookup(name).as_slice() {
            [] => Err(Error::AddressMiss(name.to_string())),
            [entry] => {
                debug!("Resolved {} to 0x{:X}", name, entry.address);
                Ok(entry.address)
            }
            candidates => Err(Error::AmbiguousSymbol {
                name: name.to_string(),
                addresses: candidates.iter().map(|e| e.address).collect(),
            }),
        }
    }
}
