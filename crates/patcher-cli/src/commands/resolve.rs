//! Resolve command implementation.

use anyhow::Result;
use patcher_core::{AddressField, Error, SymbolTable};
use std::path::Path;

/// Run the resolve command
pub fn run(dump: &Path, name: &str, field: AddressField) -> Result<()> {
    let table = SymbolTable::from_file(dump, field)?;
    print!("{}", describe(&table, name)?);
    Ok(())
}

/// Render the lookup result. Ambiguous names list every candidate before failing.
fn describe(table: &SymbolTable, name: &str) -> Result<String> {
    match table.resolve(name) {
        Ok(address) => {
            let qualified = table
                .lookup(name)
                .first()
                .map(|entry| entry.qualified_name())
                .unwrap_or_else(|| name.to_string());
            Ok(format!("{} -> 0x{:X}\n", qualified, address))
        }
        Err(e @ Error::AmbiguousSymbol { .. }) => {
            eprintln!("{} matches {} entries:", name, table.lookup(name).len());
            for entry in table.lookup(name) {
                eprintln!("  {} -> 0x{:X}", entry.qualified_name(), entry.address);
            }
            eprintln!("Use Class.Method to pick one");
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}
