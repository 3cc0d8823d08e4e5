//! Incremental-update (revision) boundaries.
//!
//! Every save that appends to a PDF ends with `startxref <offset> %%EOF`.
//! The bytes up to each such trailer are a complete earlier version of the
//! document. Linearized files carry an extra first-page trailer pointing at
//! offset 0; it is not a revision.

use std::sync::OnceLock;

use regex::bytes::Regex;

fn trailer_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"startxref\s+(\d+)\s*%%EOF").expect("trailer pattern is valid")
    })
}

/// One earlier version of the document: `bytes[start..end]` is what the
/// save appended, `bytes[..end]` is the whole version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Revision {
    /// 0-based, oldest first
    pub number: usize,
    pub start: usize,
    pub end: usize,
}

/// Trailer positions found in the raw bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevisionScan {
    /// Offsets just past each `%%EOF`, ascending
    pub eof_offsets: Vec<usize>,
}

impl RevisionScan {
    pub fn scan(data: &[u8]) -> Self {
        let eof_offsets = trailer_pattern()
            .captures_iter(data)
            .filter(|caps| {
                let xref = std::str::from_utf8(&caps[1])
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok());
                xref.is_some_and(|offset| offset != 0)
            })
            .filter_map(|caps| caps.get(0).map(|m| m.end()))
            .collect();
        Self { eof_offsets }
    }

    /// Number of updates before the current version.
    pub fn update_count(&self) -> usize {
        self.eof_offsets.len().saturating_sub(1)
    }

    /// Earlier versions, oldest first, at most `max`. The current version is
    /// never included.
    pub fn revisions(&self, max: usize) -> Vec<Revision> {
        let earlier = &self.eof_offsets[..self.update_count()];
        earlier
            .iter()
            .enumerate()
            .take(max)
            .map(|(number, &end)| Revision {
                number,
                start: if number == 0 { 0 } else { earlier[number - 1] },
                end,
            })
            .collect()
    }
}
