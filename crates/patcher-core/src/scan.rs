//! Masked byte-pattern scanning
//!
//! Every scanner reports all start offsets where a [`SearchSignature`]
//! matches, in increasing order, including overlapping matches.

use std::io::{ErrorKind, Read};

use memchr::memmem;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::signature::SearchSignature;

/// Default read size for [`scan_reader`] (4MB)
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Match offsets collected by a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Matches {
    pub offsets: Vec<usize>,
    /// More matches exist beyond the collection limit.
    pub truncated: bool,
}

impl Matches {
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// The only match, if there is exactly one.
    pub fn unique(&self) -> Option<usize> {
        match (self.offsets.as_slice(), self.truncated) {
            ([offset], false) => Some(*offset),
            _ => None,
        }
    }

    /// Record a match. Returns false once the limit is exceeded and scanning should stop.
    fn record(&mut self, offset: usize, limit: Option<usize>) -> bool {
        if let Some(limit) = limit
            && self.offsets.len() >= limit
        {
            self.truncated = true;
            return false;
        }
        self.offsets.push(offset);
        true
    }
}

/// Signature search over an in-memory buffer.
pub trait PatternSearch {
    fn find(&self, haystack: &[u8], signature: &SearchSignature, limit: Option<usize>)
    -> Matches;
}

/// Compares the signature at every offset. Kept as the reference behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaiveScanner;

impl PatternSearch for NaiveScanner {
    fn find(
        &self,
        haystack: &[u8],
        signature: &SearchSignature,
        limit: Option<usize>,
    ) -> Matches {
        let mut matches = Matches::default();
        let pattern = signature.pattern();
        if pattern.is_empty() || haystack.len() < pattern.len() {
            return matches;
        }

        let last = haystack.len() - pattern.len();

        'outer: for i in 0..=last {
            for (j, byte) in pattern.iter().enumerate() {
                if !byte.matches(haystack[i + j]) {
                    continue 'outer;
                }
            }
            if !matches.record(i, limit) {
                break;
            }
        }

        matches
    }
}

/// Jumps between hits of the signature's longest fixed run, then verifies
/// the full signature around each hit.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scanner;

impl PatternSearch for Scanner {
    fn find(
        &self,
        haystack: &[u8],
        signature: &SearchSignature,
        limit: Option<usize>,
    ) -> Matches {
        let mut matches = Matches::default();
        if signature.is_empty() || haystack.len() < signature.len() {
            return matches;
        }

        let (anchor_start, anchor) = signature.anchor();
        let finder = memmem::Finder::new(anchor);
        let last_start = haystack.len() - signature.len();
        // Anchor hits beyond this point cannot belong to a full match.
        let window_end = last_start + anchor_start + anchor.len();

        let mut pos = anchor_start;
        while pos + anchor.len() <= window_end {
            let Some(hit) = finder.find(&haystack[pos..window_end]) else {
                break;
            };
            let anchor_pos = pos + hit;
            let candidate = anchor_pos - anchor_start;
            if signature.matches_at(haystack, candidate) && !matches.record(candidate, limit) {
                break;
            }
            pos = anchor_pos + 1;
        }

        matches
    }
}

/// Find `signature` in `haystack` with the default [`Scanner`].
pub fn find(haystack: &[u8], signature: &SearchSignature, limit: Option<usize>) -> Matches {
    Scanner.find(haystack, signature, limit)
}

/// Scan a stream chunk by chunk without holding it in memory.
///
/// The last `len - 1` bytes of each chunk are carried into the next one so
/// matches spanning a chunk boundary are found exactly once. Offsets are
/// absolute positions in the stream.
pub fn scan_reader<R: Read>(
    mut reader: R,
    signature: &SearchSignature,
    limit: Option<usize>,
    chunk_size: usize,
) -> Result<Matches> {
    let keep = signature.len().saturating_sub(1);
    let chunk_size = chunk_size.max(signature.len()).max(1);

    let mut results = Matches::default();
    let mut chunk = vec![0u8; chunk_size];
    let mut data: Vec<u8> = Vec::with_capacity(chunk_size + keep);
    let mut data_base: usize = 0;
    let mut scanned: usize = 0;

    loop {
        let read = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        scanned += read;
        data.extend_from_slice(&chunk[..read]);

        let remaining = limit.map(|l| l.saturating_sub(results.len()));
        let found = Scanner.find(&data, signature, remaining);
        results
            .offsets
            .extend(found.offsets.iter().map(|offset| data_base + offset));
        if found.truncated {
            results.truncated = true;
            break;
        }

        if data.len() > keep {
            let drop = data.len() - keep;
            data.drain(..drop);
            data_base += drop;
        }
    }

    debug!(
        "Scanned {:#x} bytes for {}: {} match(es)",
        scanned,
        signature,
        results.len()
    );
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sig(text: &str) -> SearchSignature {
        SearchSignature::parse(text).unwrap()
    }

    fn substring_positions(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
        haystack
            .windows(needle.len())
            .enumerate()
            .filter(|(_, window)| *window == needle)
            .map(|(pos, _)| pos)
            .collect()
    }

    /// Deterministic pseudo-random bytes over a small alphabet so patterns recur.
    fn sample_buffer(len: usize) -> Vec<u8> {
        let mut state: u32 = 0x1234_5678;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
                [0x00, 0xAA, 0xBB, 0xCC][(state >> 16) as usize % 4]
            })
            .collect()
    }

    #[test]
    fn test_wildcard_match() {
        let signature = sig("AA ?? CC");
        assert_eq!(find(&[0xAA, 0x00, 0xCC], &signature, None).offsets, vec![0]);
        assert_eq!(find(&[0xAA, 0xFF, 0xCC], &signature, None).offsets, vec![0]);
        assert!(find(&[0xAA, 0x00, 0xCD], &signature, None).is_empty());
    }

    #[test]
    fn test_fixed_signature_equals_substring_search() {
        let buffer = sample_buffer(4096);
        let needles: [&[u8]; 4] = [
            &[0xAA],
            &[0xAA, 0xBB],
            &[0xCC, 0xCC, 0x00],
            &[0xBB, 0xAA, 0xBB, 0xAA],
        ];
        for needle in needles {
            let signature = SearchSignature::from_bytes(needle).unwrap();
            let expected = substring_positions(&buffer, needle);
            assert_eq!(find(&buffer, &signature, None).offsets, expected);
            assert_eq!(NaiveScanner.find(&buffer, &signature, None).offsets, expected);
        }
    }

    #[test]
    fn test_scanner_agrees_with_naive() {
        let buffer = sample_buffer(8192);
        for text in ["AA ?? BB", "?? CC CC ??", "00 ?? ?? AA BB", "BB ?? ?? ?? ?? CC", "?? AA"] {
            let signature = sig(text);
            assert_eq!(
                Scanner.find(&buffer, &signature, None),
                NaiveScanner.find(&buffer, &signature, None),
                "pattern {}",
                text
            );
        }
    }

    #[test]
    fn test_overlapping_matches_reported() {
        let signature = sig("AA AA");
        let matches = find(&[0xAA, 0xAA, 0xAA, 0xAA], &signature, None);
        assert_eq!(matches.offsets, vec![0, 1, 2]);
    }

    #[test]
    fn test_leading_wildcard_at_buffer_start() {
        let signature = sig("?? AA");
        assert_eq!(find(&[0xAA, 0xAA], &signature, None).offsets, vec![0]);
        assert!(find(&[0xAA], &signature, None).is_empty());
    }

    #[test]
    fn test_limit_sets_truncated() {
        let buffer = [0xAA; 8];
        let signature = sig("AA");

        let limited = find(&buffer, &signature, Some(2));
        assert_eq!(limited.offsets, vec![0, 1]);
        assert!(limited.truncated);
        assert_eq!(limited.unique(), None);

        let exact = find(&buffer, &signature, Some(8));
        assert_eq!(exact.len(), 8);
        assert!(!exact.truncated);
    }

    #[test]
    fn test_unique() {
        let matches = find(&[0x00, 0xAA, 0xBB, 0x00], &sig("AA BB"), Some(2));
        assert_eq!(matches.unique(), Some(1));
    }

    #[test]
    fn test_haystack_shorter_than_signature() {
        assert!(find(&[0xAA], &sig("AA BB"), None).is_empty());
        assert!(find(&[], &sig("AA"), None).is_empty());
    }

    #[test]
    fn test_scan_reader_matches_across_chunks() {
        let buffer = sample_buffer(10_000);
        for text in ["AA ?? BB CC", "CC CC CC", "00 AA ?? ?? 00"] {
            let signature = sig(text);
            let expected = find(&buffer, &signature, None);
            for chunk_size in [1, 3, 7, 64, 4096] {
                let streamed =
                    scan_reader(Cursor::new(&buffer), &signature, None, chunk_size).unwrap();
                assert_eq!(streamed, expected, "pattern {} chunk {}", text, chunk_size);
            }
        }
    }

    #[test]
    fn test_scan_reader_limit() {
        let buffer = [0xAA; 64];
        let signature = sig("AA AA");
        let streamed = scan_reader(Cursor::new(&buffer[..]), &signature, Some(5), 8).unwrap();
        assert_eq!(streamed.offsets, vec![0, 1, 2, 3, 4]);
        assert!(streamed.truncated);
    }

    #[test]
    fn test_scan_reader_limit_reached_at_chunk_end() {
        // Exactly two matches in the first chunk, a third in the next one.
        let buffer = [0xAA, 0x00, 0xAA, 0x00, 0x00, 0x00, 0xAA, 0x00];
        let signature = sig("AA");
        let streamed = scan_reader(Cursor::new(&buffer[..]), &signature, Some(2), 4).unwrap();
        assert_eq!(streamed.offsets, vec![0, 2]);
        assert!(streamed.truncated);
    }
}
