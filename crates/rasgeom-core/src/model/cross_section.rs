use crate::error::{Error, Result};
use crate::geometry::line_from_pairs;
use crate::text::{comma_field, comma_float, decode_packed_pairs, Block, FieldWidth};
use geo::LineString;
use std::fmt;
use std::ops::Range;
use tracing::{debug, trace};

use super::NODE_HEADER;

/// Key identifying a node within the network: river, reach and station
#[derive(Debug, Clone, PartialEq)]
pub struct NodeKey {
    /// River name
    pub river: String,
    /// Reach name
    pub reach: String,
    /// River station
    pub station: f64,
}

impl NodeKey {
    /// Creates a node key
    pub fn new(river: impl Into<String>, reach: impl Into<String>, station: f64) -> Self {
        Self {
            river: river.into(),
            reach: reach.into(),
            station,
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.river, self.reach, self.station)
    }
}

/// Fields of a `Type RM Length L Ch R` node header
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NodeHeader {
    pub(crate) code: i64,
    pub(crate) station: f64,
    pub(crate) interpolated: bool,
}

impl NodeHeader {
    /// Parse the value part of a node header, e.g. ` 1 ,83554.  ,237.02,192.39,113.07`
    pub(crate) fn parse(value: &str) -> Result<Self> {
        let code_field = comma_field(value, 0)?;
        let code = code_field
            .parse::<i64>()
            .map_err(|_| Error::malformed_numeric("node type", code_field))?;

        let station_field = comma_field(value, 1)?;
        let interpolated = station_field.contains('*');
        let station_text = station_field.replace('*', "");
        let station = station_text
            .trim()
            .parse::<f64>()
            .map_err(|_| Error::malformed_numeric("river station", station_field))?;

        Ok(Self {
            code,
            station,
            interpolated,
        })
    }
}

/// A surveyed cross section (node type 1)
#[derive(Debug, Clone, PartialEq)]
pub struct CrossSection {
    /// River name
    pub river: String,
    /// Reach name
    pub reach: String,
    /// River station
    pub river_station: f64,
    /// True if the station carries the `*` interpolation marker
    pub interpolated: bool,
    /// Left overbank reach length to the next section downstream
    pub left_reach_length: f64,
    /// Channel reach length to the next section downstream
    pub channel_reach_length: f64,
    /// Right overbank reach length to the next section downstream
    pub right_reach_length: f64,
    /// Cut line coordinates; empty when the section is not georeferenced
    pub cut_line: Vec<(f64, f64)>,
    /// Transverse (station, elevation) profile
    pub station_elevation: Vec<(f64, f64)>,
    /// Left and right bank stations
    pub bank_stations: (f64, f64),
    /// Source line range in the document
    pub source: Range<usize>,
}

impl CrossSection {
    /// Parse a cross section from its node block (header line first)
    pub(crate) fn parse(block: &Block<'_>, river: &str, reach: &str) -> Result<Self> {
        let header_value = block.search_one(NODE_HEADER, "=")?;
        let header = NodeHeader::parse(header_value)?;

        let left_reach_length = comma_float(header_value, 2, "left reach length")?;
        let channel_reach_length = comma_float(header_value, 3, "channel reach length")?;
        let right_reach_length = comma_float(header_value, 4, "right reach length")?;

        let cut_line = match declared_count(block, "XS GIS Cut Line")? {
            0 => Vec::new(),
            n => read_pairs(block, &format!("XS GIS Cut Line={n}"), n, FieldWidth::Coordinate)?,
        };

        let station_elevation = match declared_count(block, "#Sta/Elev")? {
            0 => Vec::new(),
            n => read_pairs(block, &format!("#Sta/Elev= {n} "), n, FieldWidth::StationElevation)?,
        };

        let bank = block.value("Bank Sta")?;
        let bank_stations = (
            comma_float(bank, 0, "left bank station")?,
            comma_float(bank, 1, "right bank station")?,
        );

        trace!(
            "Parsed XS {} {} {} ({} cut line points, {} profile points)",
            river,
            reach,
            header.station,
            cut_line.len(),
            station_elevation.len()
        );

        Ok(Self {
            river: river.to_string(),
            reach: reach.to_string(),
            river_station: header.station,
            interpolated: header.interpolated,
            left_reach_length,
            channel_reach_length,
            right_reach_length,
            cut_line,
            station_elevation,
            bank_stations,
            source: block.range(),
        })
    }

    /// Key of this section
    pub fn key(&self) -> NodeKey {
        NodeKey::new(&self.river, &self.reach, self.river_station)
    }

    /// Cut line geometry; empty if the section has no coordinates
    pub fn line(&self) -> LineString<f64> {
        line_from_pairs(&self.cut_line)
    }

    /// Number of cut line coordinates
    pub fn number_of_coords(&self) -> usize {
        self.cut_line.len()
    }

    /// Number of station/elevation points
    pub fn number_of_station_elevation_points(&self) -> usize {
        self.station_elevation.len()
    }

    /// True if the section has a usable cut line
    pub fn is_georeferenced(&self) -> bool {
        self.cut_line.len() >= 2
    }

    /// Lowest elevation of the profile
    pub fn thalweg(&self) -> Option<f64> {
        self.station_elevation
            .iter()
            .map(|&(_, elevation)| elevation)
            .reduce(f64::min)
    }

    /// Highest elevation of the profile
    pub fn max_elevation(&self) -> Option<f64> {
        self.station_elevation
            .iter()
            .map(|&(_, elevation)| elevation)
            .reduce(f64::max)
    }
}

/// Count declared by a `key=n` line. Absent or non-integer counts mean the
/// table is not present.
fn declared_count(block: &Block<'_>, key: &str) -> Result<usize> {
    match block.optional_value(key)? {
        None => Ok(0),
        Some(raw) => match raw.trim().parse::<usize>() {
            Ok(count) => Ok(count),
            Err(_) => {
                debug!("Treating non-integer count {:?} for '{}' as empty", raw, key);
                Ok(0)
            }
        },
    }
}

/// Decode `count` packed pairs following `anchor`
pub(crate) fn read_pairs(
    block: &Block<'_>,
    anchor: &str,
    count: usize,
    width: FieldWidth,
) -> Result<Vec<(f64, f64)>> {
    let lines = block.extract_by_count(anchor, width.lines_for(count))?;
    let pairs = decode_packed_pairs(lines.lines(), width)?;
    if pairs.len() != count {
        return Err(Error::pair_count_mismatch(anchor, count, pairs.len()));
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::RawDocument;
    use pretty_assertions::assert_eq;

    fn section(lines: &[&str]) -> Result<CrossSection> {
        let doc = RawDocument::from_text(&lines.join("\n"));
        CrossSection::parse(&doc.block(), "Butte Cr", "Upper")
    }

    const FULL: &[&str] = &[
        "Type RM Length L Ch R = 1 ,120.5   ,237.02,192.39,113.07",
        "XS GIS Cut Line=3",
        "            1000            2000            1010            2000",
        "            1020            2000",
        "Node Last Edited Time=Mar/14/2019 09:47:36",
        "#Sta/Elev= 4 ",
        "       0     105      10     101      20      99      30   104.5",
        "#Mann= 3 , 0 , 0 ",
        "Bank Sta=10,20",
    ];

    #[test]
    fn test_parse_full_section() {
        let xs = section(FULL).unwrap();
        assert_eq!(xs.river_station, 120.5);
        assert!(!xs.interpolated);
        assert_eq!(xs.left_reach_length, 237.02);
        assert_eq!(xs.channel_reach_length, 192.39);
        assert_eq!(xs.right_reach_length, 113.07);
        assert_eq!(xs.cut_line, vec![(1000.0, 2000.0), (1010.0, 2000.0), (1020.0, 2000.0)]);
        assert_eq!(xs.station_elevation.len(), 4);
        assert_eq!(xs.bank_stations, (10.0, 20.0));
        assert_eq!(xs.thalweg(), Some(99.0));
        assert_eq!(xs.max_elevation(), Some(105.0));
        assert_eq!(xs.source, 0..FULL.len());
        assert_eq!(xs.key().to_string(), "Butte Cr Upper 120.5");
    }

    #[test]
    fn test_non_integer_count_means_no_geometry() {
        let mut lines = FULL.to_vec();
        lines[1] = "XS GIS Cut Line=";
        let xs = section(&lines).unwrap();
        assert!(xs.cut_line.is_empty());
        assert!(xs.line().0.is_empty());
        assert!(!xs.is_georeferenced());
        assert_eq!(xs.station_elevation.len(), 4);
    }

    #[test]
    fn test_interpolated_station() {
        let mut lines = FULL.to_vec();
        lines[0] = "Type RM Length L Ch R = 1 ,95.0*   ,237.02,192.39,113.07";
        let xs = section(&lines).unwrap();
        assert_eq!(xs.river_station, 95.0);
        assert!(xs.interpolated);
    }

    #[test]
    fn test_missing_bank_stations() {
        let lines: Vec<&str> = FULL.iter().copied().filter(|l| !l.starts_with("Bank Sta")).collect();
        let err = section(&lines).unwrap_err();
        assert!(matches!(err, Error::AmbiguousOrMissingKey { ref key, found: 0, .. } if key == "Bank Sta"));
    }

    #[test]
    fn test_declared_count_larger_than_table() {
        let mut lines = FULL.to_vec();
        lines[5] = "#Sta/Elev= 5 ";
        let err = section(&lines).unwrap_err();
        assert!(matches!(err, Error::PairCountMismatch { expected: 5, found: 4, .. }));
    }

    #[test]
    fn test_malformed_profile_value() {
        let mut lines = FULL.to_vec();
        lines[6] = "       0     105      10     1x1      20      99      30   104.5";
        let err = section(&lines).unwrap_err();
        assert!(matches!(err, Error::MalformedNumericField { .. }));
    }

    #[test]
    fn test_node_header_parse() {
        let header = NodeHeader::parse(" 3 ,83554.  ,,,").unwrap();
        assert_eq!(header.code, 3);
        assert_eq!(header.station, 83554.0);
        assert!(NodeHeader::parse(" x ,1,2,3,4").is_err());
    }
}
