//! Fixed-width packed numeric fields.
//!
//! HEC-RAS writes coordinate and profile tables as runs of right-aligned
//! numbers with no delimiter between them. Each value occupies half of a
//! pair window:
//!
//! - Station/elevation profiles: 8 characters per value, 5 pairs per line
//! - Coordinates (cut lines, centerlines): 16 characters per value, 2 pairs per line

use crate::error::{Error, Result};

/// Width of one packed (x, y) window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldWidth {
    /// Station/elevation pairs, 16 characters per pair
    StationElevation,
    /// Coordinate pairs, 32 characters per pair
    Coordinate,
}

impl FieldWidth {
    /// Characters occupied by one (x, y) pair
    pub const fn chars(self) -> usize {
        match self {
            FieldWidth::StationElevation => 16,
            FieldWidth::Coordinate => 32,
        }
    }

    /// Number of pairs HEC-RAS writes on a full line
    pub const fn pairs_per_line(self) -> usize {
        match self {
            FieldWidth::StationElevation => 5,
            FieldWidth::Coordinate => 2,
        }
    }

    /// Number of lines needed to hold `pairs` pairs
    pub fn lines_for(self, pairs: usize) -> usize {
        pairs.div_ceil(self.pairs_per_line())
    }
}

/// Decode packed (x, y) pairs from consecutive lines.
///
/// The lines are concatenated and walked in `width` windows; each window is
/// split in half and both halves must parse as floats. Values are
/// right-aligned, so a table that does not end on a window boundary is
/// truncated or read with the wrong width and is rejected.
pub fn decode_packed_pairs(lines: &[String], width: FieldWidth) -> Result<Vec<(f64, f64)>> {
    let text = lines.concat();
    let text = text.trim_end();
    let window = width.chars();
    let half = window / 2;

    let mut pairs = Vec::with_capacity(text.len() / window + 1);
    let mut position = 0;

    while position < text.len() {
        let mid = position + half;
        let end = position + window;
        if end > text.len() {
            return Err(Error::malformed_numeric(
                format!("packed field at column {} (width {})", position, window),
                text.get(position..).unwrap_or_default(),
            ));
        }

        let x = parse_half(text, position..mid, width)?;
        let y = parse_half(text, mid..end, width)?;
        pairs.push((x, y));

        position += window;
    }

    Ok(pairs)
}

fn parse_half(text: &str, range: std::ops::Range<usize>, width: FieldWidth) -> Result<f64> {
    let field = format!("packed field at column {} (width {})", range.start, width.chars());
    let raw = text
        .get(range.clone())
        .ok_or_else(|| Error::malformed_numeric(field.clone(), "<split inside a character>"))?;

    raw.trim()
        .parse::<f64>()
        .map_err(|_| Error::malformed_numeric(field, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Packs pairs the way HEC-RAS writes them: right-aligned halves,
    /// `pairs_per_line` pairs per line.
    fn pack_pairs(pairs: &[(f64, f64)], width: FieldWidth) -> Vec<String> {
        let half = width.chars() / 2;
        pairs
            .chunks(width.pairs_per_line())
            .map(|chunk| {
                chunk
                    .iter()
                    .map(|(x, y)| format!("{:>half$}{:>half$}", x, y, half = half))
                    .collect::<String>()
            })
            .collect()
    }

    #[test]
    fn test_field_width_lines_for() {
        assert_eq!(FieldWidth::Coordinate.lines_for(4), 2);
        assert_eq!(FieldWidth::Coordinate.lines_for(5), 3);
        assert_eq!(FieldWidth::StationElevation.lines_for(5), 1);
        assert_eq!(FieldWidth::StationElevation.lines_for(11), 3);
        assert_eq!(FieldWidth::StationElevation.lines_for(0), 0);
    }

    #[test]
    fn test_decode_station_elevation_line() {
        let lines = vec![
            "       0   712.4      35   705.1    70.5   698.2".to_string(),
        ];
        let pairs = decode_packed_pairs(&lines, FieldWidth::StationElevation).unwrap();
        assert_eq!(pairs, vec![(0.0, 712.4), (35.0, 705.1), (70.5, 698.2)]);
    }

    #[test]
    fn test_decode_inverts_packing() {
        let pairs = vec![
            (2_003_512.25, 13_887_541.5),
            (2_003_611.0, 13_887_402.75),
            (2_003_700.125, 13_887_300.0),
        ];
        let lines = pack_pairs(&pairs, FieldWidth::Coordinate);
        assert_eq!(lines.len(), 2);

        let decoded = decode_packed_pairs(&lines, FieldWidth::Coordinate).unwrap();
        assert_eq!(decoded.len(), pairs.len());
        for ((x, y), (dx, dy)) in pairs.iter().zip(&decoded) {
            assert!((x - dx).abs() < 1e-9);
            assert!((y - dy).abs() < 1e-9);
        }
    }

    #[test]
    fn test_decode_rejects_garbage_half() {
        let lines = vec!["     12.5     abc".to_string()];
        let err = decode_packed_pairs(&lines, FieldWidth::StationElevation).unwrap_err();
        assert!(matches!(err, Error::MalformedNumericField { .. }));
    }

    #[test]
    fn test_decode_rejects_missing_y_half() {
        let lines = vec!["        2003512.25".to_string()];
        let err = decode_packed_pairs(&lines, FieldWidth::Coordinate).unwrap_err();
        assert!(matches!(err, Error::MalformedNumericField { .. }));
    }

    #[test]
    fn test_decode_rejects_truncated_table() {
        // last profile pair lost its elevation
        let lines = vec![
            "       0     110     100     104".to_string(),
            "     150".to_string(),
        ];
        let err = decode_packed_pairs(&lines, FieldWidth::StationElevation).unwrap_err();
        assert!(matches!(err, Error::MalformedNumericField { ref field, .. } if field.contains("column 32")));
    }

    #[test]
    fn test_wrong_width_fails_to_parse() {
        // 8-character halves read as 16-character halves run two numbers together
        let lines = vec!["   100.5   200.5   300.5   400.5".to_string()];
        assert!(decode_packed_pairs(&lines, FieldWidth::Coordinate).is_err());
    }

    #[test]
    fn test_decode_empty() {
        let pairs = decode_packed_pairs(&[], FieldWidth::Coordinate).unwrap();
        assert!(pairs.is_empty());
    }
}
