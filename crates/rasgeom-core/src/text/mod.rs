//! Anchored text block extraction.
//!
//! HEC-RAS geometry files have no grammar. Records are found by literal
//! anchor lines (`River Reach=...`, `#Sta/Elev= 40 `) whose whitespace around
//! `=` and at the end of the line varies between program versions. This
//! module resolves anchors tolerantly and hands out [`Block`] views over the
//! lines of a [`RawDocument`].
//!
//! ## Termination rules
//!
//! A block starts at an anchor and ends by one of:
//!
//! 1. A fixed line count ([`Block::extract_by_count`])
//! 2. The first later line containing a terminator substring
//!    ([`Block::extract_by_terminators`])
//! 3. The next empty line ([`Block::extract_until_blank`])

mod packed;

use crate::error::{Error, Result};
use std::ops::Range;
use std::path::Path;
use tracing::trace;

pub use packed::{decode_packed_pairs, FieldWidth};

/// Separator between a key and its value on a HEC-RAS line
pub const KEY_TOKEN: &str = "=";

/// The decoded lines of one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDocument {
    lines: Vec<String>,
}

impl RawDocument {
    /// Splits text into lines (`\n` or `\r\n`)
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_owned).collect(),
        }
    }

    /// Reads a local file. Bytes that are not UTF-8 are replaced, since older
    /// files are written in a Windows code page.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| Error::file_read(path, e))?;
        Ok(Self::from_text(&String::from_utf8_lossy(&bytes)))
    }

    /// All lines of the document
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// True if the document has no lines
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// A view over the whole document
    pub fn block(&self) -> Block<'_> {
        Block::new(&self.lines)
    }

    /// The lines of a source range, clamped to the document
    pub fn source(&self, range: Range<usize>) -> &[String] {
        let end = range.end.min(self.lines.len());
        let start = range.start.min(end);
        &self.lines[start..end]
    }
}

/// A contiguous view into document lines.
///
/// Indices returned by a block are relative to the block; [`Block::range`]
/// gives the absolute line range within the document.
#[derive(Debug, Clone, Copy)]
pub struct Block<'a> {
    lines: &'a [String],
    offset: usize,
}

impl<'a> Block<'a> {
    /// A block over the given lines starting at document line 0
    pub fn new(lines: &'a [String]) -> Self {
        Self { lines, offset: 0 }
    }

    fn sub(&self, start: usize, end: usize) -> Block<'a> {
        Block {
            lines: &self.lines[start..end],
            offset: self.offset + start,
        }
    }

    /// The lines in this block
    pub fn lines(&self) -> &'a [String] {
        self.lines
    }

    /// Absolute line range in the document
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.lines.len()
    }

    /// First line of the block, usually the anchor
    pub fn first_line(&self) -> Option<&'a str> {
        self.lines.first().map(String::as_str)
    }

    /// True if the block has no lines
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Resolve `target` to a line present in this block.
    ///
    /// Tries the target as given, with trailing spaces stripped, and with one
    /// trailing space added; each of those also with `=` and `= ` swapped.
    /// Returns the block-relative index of the first variant found.
    pub fn locate_exact(&self, target: &str) -> Result<usize> {
        for variant in anchor_variants(target) {
            if let Some(index) = self.lines.iter().position(|line| *line == variant) {
                trace!("Resolved anchor {:?} as {:?} at line {}", target, variant, self.offset + index);
                return Ok(index);
            }
        }
        Err(Error::anchor_not_found(target))
    }

    /// The `count` lines immediately after the anchor
    pub fn extract_by_count(&self, anchor: &str, count: usize) -> Result<Block<'a>> {
        let start = self.locate_exact(anchor)? + 1;
        let available = self.lines.len() - start;
        if available < count {
            return Err(Error::insufficient_lines(anchor, count, available));
        }
        Ok(self.sub(start, start + count))
    }

    /// Lines from the anchor through the first later line containing any
    /// terminator, shifted by `trailing_extra` lines (`-1` stops just before
    /// the terminator). Runs to the end of the block if no terminator is found.
    pub fn extract_by_terminators(
        &self,
        anchor: &str,
        terminators: &[&str],
        trailing_extra: isize,
    ) -> Result<Block<'a>> {
        let start = self.locate_exact(anchor)?;

        let terminator = self.lines[start + 1..]
            .iter()
            .position(|line| terminators.iter().any(|t| line.contains(t)))
            .map(|relative| start + 1 + relative);

        let end = match terminator {
            Some(index) => {
                let end = (index as isize + 1 + trailing_extra).max(start as isize + 1) as usize;
                end.min(self.lines.len())
            }
            None => self.lines.len(),
        };

        Ok(self.sub(start, end))
    }

    /// The anchor line and everything through the next empty line
    pub fn extract_until_blank(&self, anchor: &str) -> Result<Block<'a>> {
        let start = self.locate_exact(anchor)?;
        let end = self.lines[start + 1..]
            .iter()
            .position(|line| line.is_empty())
            .map(|relative| start + 2 + relative)
            .unwrap_or(self.lines.len());
        Ok(self.sub(start, end))
    }

    /// Values following `token` on every line containing `{key}{token}`
    pub fn search_values(&self, key: &str, token: &str) -> Vec<&'a str> {
        let needle = format!("{key}{token}");
        self.lines
            .iter()
            .filter(|line| line.contains(&needle))
            .filter_map(|line| line.split(token).nth(1))
            .collect()
    }

    /// Like [`Block::search_values`] but exactly one match is required
    pub fn search_one(&self, key: &str, token: &str) -> Result<&'a str> {
        let values = self.search_values(key, token);
        match values.as_slice() {
            [value] => Ok(*value),
            _ => Err(Error::ambiguous_key(key, 1, values.len())),
        }
    }

    /// Exactly one `key=` value
    pub fn value(&self, key: &str) -> Result<&'a str> {
        self.search_one(key, KEY_TOKEN)
    }

    /// At most one `key=` value
    pub fn optional_value(&self, key: &str) -> Result<Option<&'a str>> {
        let values = self.search_values(key, KEY_TOKEN);
        match values.as_slice() {
            [] => Ok(None),
            [value] => Ok(Some(*value)),
            _ => Err(Error::ambiguous_key(key, 1, values.len())),
        }
    }
}

/// Whitespace variants of an anchor, in resolution order
fn anchor_variants(target: &str) -> Vec<String> {
    let bases = [
        target.to_string(),
        target.trim_end_matches(' ').to_string(),
        format!("{target} "),
    ];

    let mut variants = Vec::with_capacity(bases.len() * 2);
    for base in bases {
        let swapped = swap_equals_spacing(&base);
        variants.push(base);
        variants.push(swapped);
    }
    variants
}

fn swap_equals_spacing(line: &str) -> String {
    if line.contains("= ") {
        line.replace("= ", "=")
    } else {
        line.replace('=', "= ")
    }
}

/// Field `position` of a comma-delimited record, trimmed
pub fn comma_field(record: &str, position: usize) -> Result<&str> {
    record
        .split(',')
        .nth(position)
        .map(str::trim)
        .ok_or_else(|| Error::malformed_record(record, position))
}

/// Parse field `position` of a comma-delimited record as a float
pub fn comma_float(record: &str, position: usize, field: &str) -> Result<f64> {
    let raw = comma_field(record, position)?;
    raw.parse::<f64>()
        .map_err(|_| Error::malformed_numeric(field, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn doc(lines: &[&str]) -> RawDocument {
        RawDocument::from_text(&lines.join("\n"))
    }

    #[rstest]
    #[case("Reach XY= 4 ")]
    #[case("Reach XY= 4")]
    #[case("Reach XY=4")]
    #[case("Reach XY=4 ")]
    fn test_locate_exact_trailing_space_variants(#[case] target: &str) {
        for present in ["Reach XY= 4 ", "Reach XY= 4", "Reach XY=4"] {
            let d = doc(&["River Reach=A,B", present, "1 2"]);
            let index = d.block().locate_exact(target).unwrap();
            assert_eq!(d.lines()[index], present, "target {target:?} in {present:?}");
        }
    }

    #[test]
    fn test_locate_exact_missing() {
        let d = doc(&["River Reach=A,B"]);
        let err = d.block().locate_exact("Reach XY= 4 ").unwrap_err();
        assert!(matches!(err, Error::AnchorNotFound { ref anchor } if anchor == "Reach XY= 4 "));
    }

    #[test]
    fn test_extract_by_count() {
        let d = doc(&["head", "Reach XY= 3 ", "a", "b", "c"]);
        let block = d.block().extract_by_count("Reach XY=3", 2).unwrap();
        assert_eq!(block.lines(), &["a".to_string(), "b".to_string()]);
        assert_eq!(block.range(), 2..4);
    }

    #[test]
    fn test_extract_by_count_insufficient() {
        let d = doc(&["Reach XY= 3 ", "a"]);
        let err = d.block().extract_by_count("Reach XY= 3 ", 2).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientLines { expected: 2, found: 1, .. }
        ));
    }

    #[test]
    fn test_extract_by_terminators_inclusive_and_backoff() {
        let d = doc(&["River Reach=A,B", "x", "y", "River Reach=C,D", "z"]);

        let inclusive = d
            .block()
            .extract_by_terminators("River Reach=A,B", &["River Reach"], 0)
            .unwrap();
        assert_eq!(inclusive.range(), 0..4);

        let exclusive = d
            .block()
            .extract_by_terminators("River Reach=A,B", &["River Reach"], -1)
            .unwrap();
        assert_eq!(exclusive.range(), 0..3);
    }

    #[test]
    fn test_extract_by_terminators_runs_to_end() {
        let d = doc(&["head", "River Reach=C,D", "z", "w"]);
        let block = d
            .block()
            .extract_by_terminators("River Reach=C,D", &["River Reach"], -1)
            .unwrap();
        assert_eq!(block.range(), 1..4);
    }

    #[test]
    fn test_extract_until_blank() {
        let d = doc(&["Junct Name=J1", "Up River,Reach=A,B", "", "next"]);
        let block = d.block().extract_until_blank("Junct Name=J1").unwrap();
        assert_eq!(block.range(), 0..3);

        let d = doc(&["Junct Name=J1", "Up River,Reach=A,B"]);
        let block = d.block().extract_until_blank("Junct Name=J1").unwrap();
        assert_eq!(block.range(), 0..2);
    }

    #[test]
    fn test_nested_blocks_keep_absolute_offsets() {
        let d = doc(&["a", "River Reach=A,B", "b", "Reach XY= 1 ", "c", "d"]);
        let reach = d
            .block()
            .extract_by_terminators("River Reach=A,B", &["River Reach"], -1)
            .unwrap();
        let xy = reach.extract_by_count("Reach XY= 1 ", 1).unwrap();
        assert_eq!(xy.range(), 4..5);
        assert_eq!(xy.first_line(), Some("c"));
    }

    #[test]
    fn test_search_values() {
        let d = doc(&["Plan File=p01", "Plan File=p02", "Current Plan=p02"]);
        let block = d.block();
        assert_eq!(block.search_values("Plan File", KEY_TOKEN), vec!["p01", "p02"]);
        assert_eq!(block.value("Current Plan").unwrap(), "p02");

        let err = block.value("Plan File").unwrap_err();
        assert!(matches!(
            err,
            Error::AmbiguousOrMissingKey { expected: 1, found: 2, .. }
        ));
        let err = block.value("Geom File").unwrap_err();
        assert!(matches!(
            err,
            Error::AmbiguousOrMissingKey { expected: 1, found: 0, .. }
        ));
        assert_eq!(block.optional_value("Geom File").unwrap(), None);
    }

    #[test]
    fn test_comma_fields() {
        let record = " 1 ,83554.  ,237.02,192.39,113.07";
        assert_eq!(comma_field(record, 0).unwrap(), "1");
        assert_eq!(comma_float(record, 1, "river station").unwrap(), 83554.0);
        assert!(comma_field(record, 5).is_err());
        assert!(comma_float("a,,b", 1, "length").is_err());
    }

    #[test]
    fn test_source_is_clamped() {
        let d = doc(&["a", "b"]);
        assert_eq!(d.source(1..10), &["b".to_string()]);
        assert!(d.source(5..10).is_empty());
    }
}
