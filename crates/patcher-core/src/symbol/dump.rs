//! Decompiler dump parsing
//!
//! Two line shapes yield symbols:
//!
//! ```text
//! public class Player // TypeDefIndex: 1234
//! {
//!     // RVA: 0x1BC9A70 Offset: 0x1BC9A70 VA: 0x1BC9A70
//!     public void UnlockAll() { }
//! }
//!
//! UnlockAll -> 0x2000
//! Respawn = 0x2100
//! ```
//!
//! Everything else is skipped.

use tracing::{debug, warn};

use super::{AddressField, SymbolEntry};
use crate::hex::parse_offset;

const TYPE_KEYWORDS: [&str; 4] = ["class", "struct", "interface", "enum"];

/// Address fields of one `// RVA: .. Offset: .. VA: ..` annotation line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Annotation {
    rva: Option<u64>,
    offset: Option<u64>,
    va: Option<u64>,
}

impl Annotation {
    fn get(&self, field: AddressField) -> Option<u64> {
        match field {
            AddressField::Offset => self.offset,
            AddressField::Rva => self.rva,
            AddressField::Va => self.va,
        }
    }
}

/// Decode raw dump bytes, honoring a UTF-8 or UTF-16 byte order mark.
pub(crate) fn decode(bytes: &[u8]) -> String {
    let (text, encoding, had_errors) = encoding_rs::UTF_8.decode(bytes);
    if had_errors {
        warn!(
            "Dump contains invalid {} sequences; they were replaced",
            encoding.name()
        );
    }
    text.into_owned()
}

pub(crate) fn parse(text: &str, field: AddressField) -> Vec<SymbolEntry> {
    let mut entries = Vec::new();
    let mut current_class: Option<String> = None;
    let mut pending: Option<Annotation> = None;
    let mut skipped = 0usize;

    for (line_no, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(annotation) = parse_annotation(line) {
            pending = Some(annotation);
            continue;
        }

        let annotation = pending.take();

        if line.starts_with("//") {
            continue;
        }

        if let Some(class) = parse_type_declaration(line) {
            current_class = Some(class);
            continue;
        }

        if let Some(annotation) = annotation {
            let Some(name) = parse_method_name(line) else {
                continue;
            };
            match annotation.get(field) {
                Some(address) => entries.push(SymbolEntry {
                    name,
                    class: current_class.clone(),
                    address,
                }),
                None => {
                    skipped += 1;
                    debug!(
                        "Line {}: {} has no usable {} address, skipping",
                        line_no + 1,
                        name,
                        field
                    );
                }
            }
            continue;
        }

        if let Some((name, address)) = parse_flat_entry(line) {
            entries.push(SymbolEntry {
                name,
                class: None,
                address,
            });
        }
    }

    debug!(
        "Parsed {} symbol(s) from dump ({} without address)",
        entries.len(),
        skipped
    );
    entries
}

/// `// RVA: 0x1BC9A70 Offset: 0x1BC9A70 VA: 0x1BC9A70 Slot: 4`
fn parse_annotation(line: &str) -> Option<Annotation> {
    let body = line.strip_prefix("//")?;
    let tokens: Vec<&str> = body.split_whitespace().collect();
    let mut annotation = Annotation::default();
    let mut found = false;

    for pair in tokens.windows(2) {
        let target = match pair[0] {
            "RVA:" => &mut annotation.rva,
            "Offset:" => &mut annotation.offset,
            "VA:" => &mut annotation.va,
            _ => continue,
        };
        found = true;
        // Abstract methods carry "-1"; those stay None.
        *target = parse_offset(pair[1]).ok();
    }

    found.then_some(annotation)
}

/// `public sealed class Player : MonoBehaviour // TypeDefIndex: 1234`
fn parse_type_declaration(line: &str) -> Option<String> {
    let code = line.split("//").next()?;
    if code.contains('(') || code.contains('=') {
        return None;
    }

    let mut tokens = code.split_whitespace();
    tokens.by_ref().find(|t| TYPE_KEYWORDS.contains(t))?;
    let name = tokens.next()?;
    let name = name
        .split(['<', ':', '{'])
        .next()
        .filter(|n| is_identifier(n))?;
    Some(name.to_string())
}

/// `public void UnlockAll(int level) { }` -> `UnlockAll`
fn parse_method_name(line: &str) -> Option<String> {
    let (head, _) = line.split_once('(')?;
    let last = head.split_whitespace().last()?;
    let name = last.split('<').next().unwrap_or(last);
    is_identifier(name).then(|| name.to_string())
}

/// `UnlockAll -> 0x2000` or `UnlockAll = 0x2000`
fn parse_flat_entry(line: &str) -> Option<(String, u64)> {
    let (name, value) = line
        .split_once("->")
        .or_else(|| line.split_once('='))?;
    let name = name.trim();
    if !is_identifier(name) {
        return None;
    }
    let address = parse_offset(value).ok()?;
    Some((name.to_string(), address))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || c == '.')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '$' | '`'))
}

#[cfg(test)]
mod tests {
    use super::*;

    const IL2CPP_DUMP: &str = r#"
// Namespace: Game
public class Player : MonoBehaviour // TypeDefIndex: 1234
{
	// Fields
	private int coins; // 0x18
	public const int MaxLevel = 99;

	// Methods

	// RVA: 0x1BC9A70 Offset: 0x1BC8A70 VA: 0x1BC9A70
	public void UnlockAll() { }

	// RVA: 0x1BC9B00 Offset: 0x1BC8B00 VA: 0x1BC9B00 Slot: 4
	public override int GetCoins(bool cached) { }

	// RVA: -1 Offset: -1
	public abstract void Tick();

	// RVA: 0x1BC9C00 Offset: 0x1BC8C00 VA: 0x1BC9C00
	public T Find<T>(string name) { }
}

// Namespace: Game.Shop
public struct Wallet // TypeDefIndex: 1300
{
	// RVA: 0x2000 Offset: 0x1000 VA: 0x3000
	public void UnlockAll() { }
}
"#;

    #[test]
    fn test_parse_il2cpp_dump() {
        let entries = parse(IL2CPP_DUMP, AddressField::Offset);
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["UnlockAll", "GetCoins", "Find", "UnlockAll"]);

        assert_eq!(entries[0].address, 0x1BC8A70);
        assert_eq!(entries[0].class.as_deref(), Some("Player"));
        assert_eq!(entries[3].address, 0x1000);
        assert_eq!(entries[3].class.as_deref(), Some("Wallet"));
    }

    #[test]
    fn test_parse_selects_address_field() {
        let rva = parse(IL2CPP_DUMP, AddressField::Rva);
        assert_eq!(rva[3].address, 0x2000);
        let va = parse(IL2CPP_DUMP, AddressField::Va);
        assert_eq!(va[3].address, 0x3000);
    }

    #[test]
    fn test_parse_flat_entries() {
        let entries = parse(
            "UnlockAll -> 0x2000\nRespawn = 0x2100\nnot a symbol line\nBad -> zz\n",
            AddressField::Offset,
        );
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "UnlockAll");
        assert_eq!(entries[0].address, 0x2000);
        assert_eq!(entries[1].name, "Respawn");
        assert_eq!(entries[1].address, 0x2100);
    }

    #[test]
    fn test_flat_address_without_prefix_is_hex() {
        let entries = parse("UnlockAll -> 2000\nRespawn = 1BC8\n", AddressField::Offset);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].address, 0x2000);
        assert_eq!(entries[1].address, 0x1BC8);
    }

    #[test]
    fn test_annotation_only_applies_to_next_line() {
        let dump = "// RVA: 0x10 Offset: 0x10 VA: 0x10\n\nprivate int field;\npublic void Later() { }\n";
        let entries = parse(dump, AddressField::Offset);
        assert!(entries.is_empty());
    }

    #[test]
    fn test_parse_method_name() {
        assert_eq!(parse_method_name("public void A() { }").as_deref(), Some("A"));
        assert_eq!(parse_method_name("public T Find<T>(T x) { }").as_deref(), Some("Find"));
        assert_eq!(parse_method_name("public void .ctor() { }").as_deref(), Some(".ctor"));
        assert_eq!(parse_method_name("no parens here"), None);
    }

    #[test]
    fn test_decode_utf16_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "A -> 0x10".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode(&bytes), "A -> 0x10");
    }

    #[test]
    fn test_decode_utf8_bom_stripped() {
        assert_eq!(decode(b"\xEF\xBB\xBFA -> 0x10"), "A -> 0x10");
    }
}
