mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use patcher_core::AddressField;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use commands::apply::ApplyArgs;
use commands::hex_utils::parse_offset_arg;

#[derive(Parser)]
#[command(name = "patcher")]
#[command(about = "Patch native libraries by method name, file offset or byte signature")]
#[command(version)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply the patches listed in a JSON configuration
    Apply(ApplyArgs),

    /// Search a file for a byte signature (supports ?? wildcards)
    Scan {
        file: PathBuf,

        /// Pattern such as "48 8D 0D ?? ?? ?? ??"
        pattern: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "100")]
        limit: usize,
    },

    /// Look up a method name in a decompiler dump
    Resolve {
        dump: PathBuf,

        /// Method name, optionally qualified as Class.Method
        name: String,

        /// Address column to read from annotated dumps
        #[arg(short, long, default_value = "offset")]
        field: AddressField,
    },

    /// Hexdump a region of a file
    Hexdump {
        file: PathBuf,

        /// Start offset in hex, 0x prefix optional
        #[arg(value_parser = parse_offset_arg)]
        offset: u64,

        /// Number of bytes to show
        #[arg(short, long, default_value = "256")]
        size: usize,

        /// Show ASCII column
        #[arg(short, long)]
        ascii: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so `apply --json` output stays parseable
    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("patcher={}", level).parse()?)
                .add_directive(format!("patcher_core={}", level).parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Apply(apply_args) => commands::apply::run(apply_args),
        Command::Scan {
            file,
            pattern,
            limit,
        } => commands::scan::run(&file, &pattern, limit),
        Command::Resolve { dump, name, field } => commands::resolve::run(&dump, &name, field),
        Command::Hexdump {
            file,
            offset,
            size,
            ascii,
        } => commands::hexdump::run(&file, offset, size, ascii),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_apply_flags() {
        let args = Args::try_parse_from([
            "patcher",
            "apply",
            "patch.json",
            "--dry-run",
            "--json",
            "--backup",
            "--output",
            "out.so",
            "--dump",
            "dump.cs",
        ])
        .unwrap();

        let Command::Apply(apply) = args.command else {
            panic!("expected apply");
        };
        assert_eq!(apply.config, PathBuf::from("patch.json"));
        assert!(apply.dry_run && apply.json && apply.backup);
        assert_eq!(apply.output, Some(PathBuf::from("out.so")));
        assert_eq!(apply.dump, Some(PathBuf::from("dump.cs")));
    }

    #[test]
    fn test_parse_hexdump_offset() {
        let args =
            Args::try_parse_from(["patcher", "-v", "hexdump", "lib.so", "0x1BC8A70", "--ascii"])
                .unwrap();
        assert!(args.verbose);
        match args.command {
            Command::Hexdump {
                offset,
                size,
                ascii,
                ..
            } => {
                assert_eq!(offset, 0x1BC8A70);
                assert_eq!(size, 256);
                assert!(ascii);
            }
            _ => panic!("expected hexdump"),
        }
    }

    #[test]
    fn test_parse_resolve_field() {
        let args =
            Args::try_parse_from(["patcher", "resolve", "dump.cs", "UnlockAll", "--field", "rva"])
                .unwrap();
        match args.command {
            Command::Resolve { field, .. } => assert_eq!(field, AddressField::Rva),
            _ => panic!("expected resolve"),
        }
        assert!(Args::try_parse_from(["patcher", "resolve", "d", "n", "--field", "x"]).is_err());
    }
}
