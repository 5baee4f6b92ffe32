//! Dump normalization and sorted diff.

use crate::DriverError;
use oracle::DumpLine;
use std::cmp::Ordering;
use std::fmt;

/// Parses every non-blank line of `dump`, re-renders it canonically and sorts
/// the result (by fingerprint, since every line starts with `hash=`).
pub fn normalize(dump: &[u8]) -> Result<Vec<Vec<u8>>, DriverError> {
    let mut lines = Vec::new();
    for (i, raw) in dump.split(|b| *b == b'\n').enumerate() {
        if raw.iter().all(|b| b.is_ascii_whitespace()) {
            continue;
        }
        let parsed = DumpLine::parse(raw).map_err(|source| DriverError::BadDump {
            line: i + 1,
            source,
        })?;
        let mut canonical = Vec::with_capacity(raw.len());
        parsed.render(&mut canonical);
        lines.push(canonical);
    }
    lines.sort();
    Ok(lines)
}

/// One line present on only one side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffLine {
    /// Only in the oracle dump.
    Missing(Vec<u8>),
    /// Only in the engine dump.
    Unexpected(Vec<u8>),
}

impl fmt::Display for DiffLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffLine::Missing(l) => write!(f, "< {}", String::from_utf8_lossy(l)),
            DiffLine::Unexpected(l) => write!(f, "> {}", String::from_utf8_lossy(l)),
        }
    }
}

/// Merge-walks two sorted line lists.
pub fn diff_sorted(expected: &[Vec<u8>], actual: &[Vec<u8>]) -> Vec<DiffLine> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);

    while i < expected.len() && j < actual.len() {
        match expected[i].cmp(&actual[j]) {
            Ordering::Equal => {
                i += 1;
                j += 1;
            }
            Ordering::Less => {
                out.push(DiffLine::Missing(expected[i].clone()));
                i += 1;
            }
            Ordering::Greater => {
                out.push(DiffLine::Unexpected(actual[j].clone()));
                j += 1;
            }
        }
    }
    out.extend(expected[i..].iter().cloned().map(DiffLine::Missing));
    out.extend(actual[j..].iter().cloned().map(DiffLine::Unexpected));
    out
}
