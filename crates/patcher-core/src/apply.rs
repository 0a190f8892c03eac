//! Committing a plan to disk
//!
//! The patched buffer is written to a temporary file next to the destination,
//! flushed, and renamed over it. A failure at any point drops the temporary
//! file and leaves the destination as it was.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::plan::PatchPlan;
use crate::report::ApplyReport;

const BACKUP_EXTENSION: &str = ".bak";

#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Save the unpatched bytes to a sibling `.bak` file first.
    pub keep_backup: bool,
    /// Write here instead of over the input.
    pub output_path: Option<PathBuf>,
}

/// Apply `plan` to `binary`, the contents of `input`, and write the result.
pub fn apply(
    input: &Path,
    mut binary: Vec<u8>,
    plan: &PatchPlan,
    options: &ApplyOptions,
) -> Result<ApplyReport> {
    if binary.len() != plan.binary_len() {
        return Err(Error::LengthMismatch {
            expected: plan.binary_len(),
            actual: binary.len(),
        });
    }

    let output = options
        .output_path
        .clone()
        .unwrap_or_else(|| input.to_path_buf());

    let backup = if options.keep_backup {
        let path = write_backup(input, &binary)?;
        info!("Backup saved to {}", path.display());
        Some(path)
    } else {
        None
    };

    plan.apply_to(&mut binary)?;

    if let Err(e) = write_atomic(&output, &binary) {
        if let Some(path) = &backup {
            warn!(
                "Writing {} failed; backup kept at {}",
                output.display(),
                path.display()
            );
        }
        return Err(e);
    }

    info!(
        "Applied {} patch(es) to {}",
        plan.len(),
        output.display()
    );

    let mut report = ApplyReport::new(input.to_path_buf(), plan);
    report.output = Some(output);
    report.backup = backup;
    report.dry_run = false;
    Ok(report)
}

/// `<input>.bak` for `n == 0`, `<input>.bak.N` otherwise.
pub fn backup_path(input: &Path, n: usize) -> PathBuf {
    let mut name = input.as_os_str().to_owned();
    name.push(BACKUP_EXTENSION);
    if n > 0 {
        name.push(format!(".{}", n));
    }
    PathBuf::from(name)
}

/// Write `bytes` to the first backup path that does not exist yet.
fn write_backup(input: &Path, bytes: &[u8]) -> Result<PathBuf> {
    let mut n = 0;
    loop {
        let path = backup_path(input, n);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(bytes)?;
                file.sync_all()?;
                return Ok(path);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!("{} exists, trying next backup name", path.display());
                n += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Replace `dest` with `bytes` via a synced temporary file and a rename.
fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if !dir.exists() {
        debug!("Creating output directory {}", dir.display());
        fs::create_dir_all(dir)?;
    }

    let mut temp = tempfile::Builder::new()
        .prefix(".patcher-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    temp.write_all(bytes)?;

    if let Ok(metadata) = fs::metadata(dest) {
        temp.as_file().set_permissions(metadata.permissions())?;
    }
    temp.as_file().sync_all()?;
    temp.persist(dest).map_err(|e| e.error)?;

    debug!("Wrote {} bytes to {}", bytes.len(), dest.display());
    Ok(())
}
