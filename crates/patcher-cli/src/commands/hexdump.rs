//! Hexdump command implementation.
//!
//! Displays a region of a file in traditional hexdump format, useful for
//! checking patch targets before and after applying.
//!
//! # Output Format
//!
//! ```text
//! 0x00002000: 20 00 80 D2 C0 03 5F D6  FD 7B BF A9 FD 03 00 91  | ....._..{......|
//! ```

use anyhow::{Context, Result, bail};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

const BYTES_PER_LINE: usize = 16;

/// Run the hexdump command
pub fn run(file: &Path, offset: u64, size: usize, ascii: bool) -> Result<()> {
    let mut handle =
        File::open(file).with_context(|| format!("Failed to open {}", file.display()))?;
    let file_len = handle.metadata()?.len();
    if offset >= file_len {
        bail!(
            "Offset 0x{:X} is beyond the end of {} ({} bytes)",
            offset,
            file.display(),
            file_len
        );
    }

    handle.seek(SeekFrom::Start(offset))?;
    let mut bytes = Vec::with_capacity(size);
    handle.take(size as u64).read_to_end(&mut bytes)?;

    println!(
        "Hexdump of {} at 0x{:X} ({} bytes):",
        file.display(),
        offset,
        bytes.len()
    );
    println!();

    for (i, chunk) in bytes.chunks(BYTES_PER_LINE).enumerate() {
        println!(
            "{}",
            format_line(offset + (i * BYTES_PER_LINE) as u64, chunk, ascii)
        );
    }

    Ok(())
}

/// Format one line of up to 16 bytes.
fn format_line(offset: u64, chunk: &[u8], ascii: bool) -> String {
    let mut line = format!("0x{:08X}: ", offset);

    for j in 0..BYTES_PER_LINE {
        if j == 8 {
            line.push(' ');
        }
        match chunk.get(j) {
            Some(byte) => line.push_str(&format!("{:02X} ", byte)),
            // Padding for incomplete lines
            None => line.push_str("   "),
        }
    }

    if ascii {
        line.push_str(" |");
        for byte in chunk {
            if (0x20..0x7F).contains(byte) {
                line.push(*byte as char);
            } else {
                line.push('.');
            }
        }
        for _ in chunk.len()..BYTES_PER_LINE {
            line.push(' ');
        }
        line.push('|');
    }

    line.trim_end().to_string()
}
