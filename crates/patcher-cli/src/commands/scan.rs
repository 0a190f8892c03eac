//! Scan command implementation.

use anyhow::{Context, Result};
use patcher_core::hex::format_bytes;
use patcher_core::scan::DEFAULT_CHUNK_SIZE;
use patcher_core::{SearchSignature, scan_reader};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Bytes of context shown after each match
const CONTEXT_LEN: usize = 16;

/// Run the scan command
pub fn run(file: &Path, pattern: &str, limit: usize) -> Result<()> {
    let signature = SearchSignature::parse(pattern)?;
    let mut reader = BufReader::new(
        File::open(file).with_context(|| format!("Failed to open {}", file.display()))?,
    );

    println!(
        "Searching {} for pattern: {} ({} bytes)",
        file.display(),
        signature,
        signature.len()
    );
    println!();

    let matches = scan_reader(&mut reader, &signature, Some(limit), DEFAULT_CHUNK_SIZE)?;

    for (i, offset) in matches.offsets.iter().enumerate() {
        println!("[{}] 0x{:X}", i + 1, offset);
        let context = read_context(&mut reader, *offset as u64, CONTEXT_LEN)?;
        println!("     {}", format_bytes(&context));
    }

    println!();
    println!("Found {} result(s)", matches.len());
    if matches.truncated {
        println!("(limit reached, use --limit to increase)");
    }

    Ok(())
}

/// Read up to `len` bytes starting at `offset`.
fn read_context<R: Read + Seek>(reader: &mut R, offset: u64, len: usize) -> io::Result<Vec<u8>> {
    reader.seek(SeekFrom::Start(offset))?;
    let mut context = Vec::with_capacity(len);
    reader.take(len as u64).read_to_end(&mut context)?;
    Ok(context)
}
