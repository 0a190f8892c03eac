//! Offset parsing and formatting for command arguments.

use patcher_core::hex::parse_offset;

/// Parse an offset argument as hex, with or without a `0x` prefix.
///
/// Used as a clap value parser, hence the `String` error.
pub fn parse_offset_arg(s: &str) -> Result<u64, String> {
    parse_offset(s).map_err(|e| e.to_string())
}

/// Format an offset as a hex string with 0x prefix.
pub fn format_hex_address(addr: u64) -> String {
    format!("0x{:X}", addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_offset_arg_with_prefix() {
        assert_eq!(parse_offset_arg("0x1000").unwrap(), 0x1000);
        assert_eq!(parse_offset_arg("0X1000").unwrap(), 0x1000);
    }

    #[test]
    fn test_parse_offset_arg_without_prefix() {
        assert_eq!(parse_offset_arg("4096").unwrap(), 0x4096);
    }

    #[test]
    fn test_parse_offset_arg_invalid() {
        assert!(parse_offset_arg("0xZZZ").is_err());
        assert!(parse_offset_arg("").is_err());
        assert!(parse_offset_arg("+10").is_err());
    }

    #[test]
    fn test_format_hex_address() {
        assert_eq!(format_hex_address(0x1000), "0x1000");
        assert_eq!(format_hex_address(0xDEADBEEF), "0xDEADBEEF");
        assert_eq!(format_hex_address(0), "0x0");
    }
}
