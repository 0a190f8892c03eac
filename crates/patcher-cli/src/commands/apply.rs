//! Apply command implementation.

use anyhow::{Context, Result, bail};
use clap::Args;
use patcher_core::{FailureEntry, PatchConfig, Patcher};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

use crate::output::{Palette, format_failures, format_report};

#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Patch configuration (JSON)
    pub config: PathBuf,

    /// Resolve and validate every patch without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Keep a backup of the unpatched binary
    #[arg(long)]
    pub backup: bool,

    /// Write the patched binary here instead of over the input
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Decompiler dump used to resolve method names
    #[arg(long)]
    pub dump: Option<PathBuf>,

    /// Resolve relative paths in the config against this directory
    #[arg(long, env = "PATCHER_BASE_DIR")]
    pub base_dir: Option<PathBuf>,
}

/// Load the config and apply command-line overrides.
pub fn load_config(args: &ApplyArgs) -> Result<PatchConfig> {
    let mut config = PatchConfig::load(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;

    if let Some(base_dir) = &args.base_dir {
        config = config.with_base_dir(base_dir);
    }
    if args.backup {
        config.backup = true;
    }
    if let Some(output) = &args.output {
        config.output_file = Some(output.clone());
    }
    if let Some(dump) = &args.dump {
        config.dump_file = Some(dump.clone());
    }
    Ok(config)
}

/// Run the apply command
pub fn run(args: ApplyArgs) -> Result<()> {
    let config = load_config(&args)?;
    info!(
        "Patching {} with {} patch entries from {}",
        config.input_file.display(),
        config.patches.len(),
        args.config.display()
    );

    let patcher = Patcher::new(config);
    let result = if args.dry_run {
        patcher.dry_run()
    } else {
        patcher.run()
    };

    match result {
        Ok(report) => {
            if args.json {
                println!("{}", report.to_json()?);
            } else {
                print!("{}", format_report(&report, Palette::detect()));
            }
            Ok(())
        }
        Err(e) => {
            let failures = FailureEntry::from_error(&e);
            if args.json {
                let body = json!({ "ok": false, "failures": failures });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                eprint!("{}", format_failures(&failures, Palette::detect()));
            }
            bail!("Patching aborted: {} failure(s)", failures.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn args_for(config: PathBuf) -> ApplyArgs {
        ApplyArgs {
            config,
            dry_run: false,
            json: false,
            backup: false,
            output: None,
            dump: None,
            base_dir: None,
        }
    }

    #[test]
    fn test_load_config_overrides() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("patch.json");
        fs::write(
            &config_path,
            r#"{ "input_file": "lib/libil2cpp.so", "dump_file": "dump.cs", "patches": [] }"#,
        )
        .unwrap();

        let mut args = args_for(config_path);
        args.base_dir = Some(dir.path().to_path_buf());
        args.backup = true;
        args.output = Some(PathBuf::from("patched.so"));

        let config = load_config(&args).unwrap();
        assert_eq!(config.input_file, dir.path().join("lib/libil2cpp.so"));
        assert_eq!(config.dump_file, Some(dir.path().join("dump.cs")));
        assert_eq!(config.output_file, Some(PathBuf::from("patched.so")));
        assert!(config.backup);
    }

    #[test]
    fn test_run_applies_and_fails() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("libgame.so");
        fs::write(&input, [0u8; 16]).unwrap();

        let good = dir.path().join("good.json");
        fs::write(
            &good,
            r#"{ "input_file": "libgame.so", "patches": ["0x4 | DE AD BE EF"] }"#,
        )
        .unwrap();
        let mut args = args_for(good);
        args.base_dir = Some(dir.path().to_path_buf());
        run(args).unwrap();
        assert_eq!(&fs::read(&input).unwrap()[4..8], &[0xDE, 0xAD, 0xBE, 0xEF]);

        let bad = dir.path().join("bad.json");
        fs::write(
            &bad,
            r#"{ "input_file": "libgame.so", "patches": ["0x0 | 00", "0x20 | 00"] }"#,
        )
        .unwrap();
        let mut args = args_for(bad);
        args.base_dir = Some(dir.path().to_path_buf());
        args.json = true;
        assert!(run(args).is_err());
        assert_eq!(&fs::read(&input).unwrap()[4..8], &[0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn test_missing_config() {
        let err = load_config(&args_for(PathBuf::from("/nonexistent/patch.json"))).unwrap_err();
        assert!(err.to_string().contains("Failed to load config"));
    }
}
