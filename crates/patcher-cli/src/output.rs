//! Terminal rendering of reports and failures.

use std::fmt::Display;
use std::io::IsTerminal;

use owo_colors::{OwoColorize, Style};
use patcher_core::hex::format_bytes;
use patcher_core::{ApplyReport, FailureEntry};

use crate::commands::hex_utils::format_hex_address;

/// Colors are used only when stdout is a terminal and `NO_COLOR` is unset.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    enabled: bool,
}

impl Palette {
    pub fn detect() -> Self {
        Self {
            enabled: std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
        }
    }

    #[cfg(test)]
    pub fn plain() -> Self {
        Self { enabled: false }
    }

    fn paint(&self, text: impl Display, style: Style) -> String {
        if self.enabled {
            text.style(style).to_string()
        } else {
            text.to_string()
        }
    }
}

pub fn format_report(report: &ApplyReport, palette: Palette) -> String {
    let mut out = String::new();
    let heading = if report.dry_run {
        format!("Planned {} patch(es) (dry run)", report.patches.len())
    } else {
        format!("Applied {} patch(es)", report.patches.len())
    };
    out.push_str(&palette.paint(heading, Style::new().bold()));
    out.push('\n');
    out.push_str(&format!(
        "Input:  {} ({} bytes)\n",
        report.input.display(),
        report.binary_len
    ));
    if let Some(output) = &report.output {
        out.push_str(&format!("Output: {}\n", output.display()));
    }
    if let Some(backup) = &report.backup {
        out.push_str(&format!("Backup: {}\n", backup.display()));
    }

    for patch in &report.patches {
        out.push_str(&format!(
            "\n[{}] {} {}\n",
            patch.index,
            palette.paint(format_hex_address(patch.offset), Style::new().cyan()),
            patch.selector
        ));
        out.push_str(&format!(
            "    - {}\n",
            palette.paint(format_bytes(&patch.original), Style::new().red())
        ));
        out.push_str(&format!(
            "    + {}\n",
            palette.paint(format_bytes(&patch.replacement), Style::new().green())
        ));
        if patch.is_noop() {
            out.push_str(&format!(
                "    {}\n",
                palette.paint("(already applied)", Style::new().yellow())
            ));
        }
    }

    out.push_str(&format!("\n{} byte(s) changed\n", report.changed_bytes()));
    out
}

pub fn format_failures(failures: &[FailureEntry], palette: Palette) -> String {
    let mut out = String::new();
    for failure in failures {
        let label = match failure.index {
            Some(index) => format!("patch #{}", index),
            None => "error".to_string(),
        };
        out.push_str(&format!(
            "{} [{}] {}\n",
            palette.paint(label, Style::new().red().bold()),
            failure.kind,
            failure.message
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use patcher_core::{ErrorKind, PatchConfig, Patcher};
    use std::fs;
    use tempfile::tempdir;

    fn dry_run_report() -> ApplyReport {
        let dir = tempdir().unwrap();
        let input = dir.path().join("lib.so");
        fs::write(&input, [0u8; 16]).unwrap();

        let mut config: PatchConfig = r#"{ "input_file": "lib.so", "patches": ["0x4 | DE AD BE EF"] }"#
            .parse()
            .unwrap();
        config.input_file = input;
        Patcher::new(config).dry_run().unwrap()
    }

    #[test]
    fn test_format_report_plain() {
        let rendered = format_report(&dry_run_report(), Palette::plain());
        assert!(rendered.starts_with("Planned 1 patch(es) (dry run)\n"));
        assert!(rendered.contains("[0] 0x4 offset 0x4\n"));
        assert!(rendered.contains("    - 00 00 00 00\n"));
        assert!(rendered.contains("    + DE AD BE EF\n"));
        assert!(!rendered.contains("Output:"));
        assert!(rendered.ends_with("4 byte(s) changed\n"));
        assert!(!rendered.contains('\u{1b}'));
    }

    #[test]
    fn test_format_failures_plain() {
        let failures = vec![
            FailureEntry {
                index: Some(2),
                kind: ErrorKind::NoMatch,
                message: "Signature not found: AA BB".to_string(),
            },
            FailureEntry {
                index: None,
                kind: ErrorKind::Io,
                message: "IO error: disk full".to_string(),
            },
        ];
        let rendered = format_failures(&failures, Palette::plain());
        assert_eq!(
            rendered,
            "patch #2 [NoMatch] Signature not found: AA BB\nerror [IOFailure] IO error: disk full\n"
        );
    }
}
