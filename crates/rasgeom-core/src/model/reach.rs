use crate::error::{Error, Result};
use crate::geometry::{cross_section_ribbon, line_from_pairs, offset_curve, planar_length};
use crate::text::{comma_field, Block, FieldWidth, KEY_TOKEN};
use geo::{LineString, Polygon};
use std::ops::Range;
use tracing::{debug, trace};

use super::cross_section::{read_pairs, CrossSection, NodeHeader, NodeKey};
use super::structure::{Structure, StructureKind};
use super::{NODE_HEADER, REACH_HEADER};

/// A cross section or structure within a reach
#[derive(Debug, Clone, PartialEq)]
pub enum ReachNode {
    /// Node type 1
    CrossSection(CrossSection),
    /// Node types 2 through 6
    Structure(Structure),
}

impl ReachNode {
    /// River station of the node
    pub fn river_station(&self) -> f64 {
        match self {
            ReachNode::CrossSection(xs) => xs.river_station,
            ReachNode::Structure(s) => s.river_station,
        }
    }

    /// Source line range of the node
    pub fn source(&self) -> Range<usize> {
        match self {
            ReachNode::CrossSection(xs) => xs.source.clone(),
            ReachNode::Structure(s) => s.source.clone(),
        }
    }
}

/// A named river segment with its centerline and nodes
#[derive(Debug, Clone, PartialEq)]
pub struct Reach {
    /// River name
    pub river: String,
    /// Reach name
    pub reach: String,
    /// The `River Reach=` value as written, padding included
    pub river_reach: String,
    /// Centerline coordinates
    pub centerline: Vec<(f64, f64)>,
    /// Nodes in file order, upstream to downstream
    pub nodes: Vec<ReachNode>,
    /// Source line range in the document
    pub source: Range<usize>,
}

impl Reach {
    /// Parse the reach whose `River Reach=` value is `raw_name`
    pub(crate) fn parse(document: &Block<'_>, raw_name: &str) -> Result<Self> {
        let block = document.extract_by_terminators(
            &format!("{REACH_HEADER}={raw_name}"),
            &[REACH_HEADER],
            -1,
        )?;

        let river = comma_field(raw_name, 0)?.to_string();
        let reach = comma_field(raw_name, 1)?.to_string();

        let count_raw = block.value("Reach XY")?;
        let count = count_raw
            .trim()
            .parse::<usize>()
            .map_err(|_| Error::malformed_numeric("Reach XY", count_raw))?;
        let centerline = read_pairs(&block, &format!("Reach XY= {count} "), count, FieldWidth::Coordinate)?;

        let mut nodes = Vec::new();
        let mut upstream_xs: Option<NodeKey> = None;

        for header_value in block.search_values(NODE_HEADER, KEY_TOKEN) {
            let header = NodeHeader::parse(header_value)?;
            let node_block = block.extract_by_terminators(
                &format!("{NODE_HEADER}={header_value}"),
                &[NODE_HEADER.trim_end(), REACH_HEADER],
                -1,
            )?;

            if header.code == 1 {
                let xs = CrossSection::parse(&node_block, &river, &reach)?;
                upstream_xs = Some(xs.key());
                nodes.push(ReachNode::CrossSection(xs));
                continue;
            }

            let kind = StructureKind::try_from(header.code)?;
            let upstream = upstream_xs.clone().ok_or_else(|| {
                Error::broken_topology(
                    &river,
                    &reach,
                    format!("{} at {} has no upstream cross section", kind, header.station),
                )
            })?;
            let structure = Structure::parse(&node_block, &header, kind, upstream)?;
            nodes.push(ReachNode::Structure(structure));
        }

        let parsed = Self {
            river,
            reach,
            river_reach: raw_name.to_string(),
            centerline,
            nodes,
            source: block.range(),
        };
        parsed.check_topology()?;

        debug!(
            "Parsed reach {}/{}: {} cross sections, {} structures",
            parsed.river,
            parsed.reach,
            parsed.cross_sections().count(),
            parsed.structures().count()
        );
        Ok(parsed)
    }

    /// Stations must strictly decrease and every structure must resolve to
    /// an upstream cross section of this reach at a greater station
    fn check_topology(&self) -> Result<()> {
        let mut previous: Option<f64> = None;
        for xs in self.cross_sections() {
            if let Some(upstream) = previous {
                if xs.river_station >= upstream {
                    return Err(Error::broken_topology(
                        &self.river,
                        &self.reach,
                        format!(
                            "cross section {} follows {} but stations must decrease downstream",
                            xs.river_station, upstream
                        ),
                    ));
                }
            }
            previous = Some(xs.river_station);
        }

        for structure in self.structures() {
            let Some(upstream) = self.cross_section(structure.upstream.station) else {
                return Err(Error::broken_topology(
                    &self.river,
                    &self.reach,
                    format!("upstream cross section {} not found", structure.upstream),
                ));
            };
            if upstream.river_station <= structure.river_station {
                return Err(Error::broken_topology(
                    &self.river,
                    &self.reach,
                    format!(
                        "{} at {} is not downstream of cross section {}",
                        structure.kind, structure.river_station, upstream.river_station
                    ),
                ));
            }
            trace!("Resolved {} upstream section {}", structure.key(), upstream.key());
        }

        Ok(())
    }

    /// Cross sections, upstream to downstream
    pub fn cross_sections(&self) -> impl Iterator<Item = &CrossSection> {
        self.nodes.iter().filter_map(|node| match node {
            ReachNode::CrossSection(xs) => Some(xs),
            ReachNode::Structure(_) => None,
        })
    }

    /// Structures, upstream to downstream
    pub fn structures(&self) -> impl Iterator<Item = &Structure> {
        self.nodes.iter().filter_map(|node| match node {
            ReachNode::Structure(s) => Some(s),
            ReachNode::CrossSection(_) => None,
        })
    }

    /// Cross section at an exact station
    pub fn cross_section(&self, station: f64) -> Option<&CrossSection> {
        self.cross_sections().find(|xs| xs.river_station == station)
    }

    /// Cross section with the greatest station
    pub fn upstream_cross_section(&self) -> Option<&CrossSection> {
        self.cross_sections()
            .max_by(|a, b| a.river_station.total_cmp(&b.river_station))
    }

    /// Cross section with the smallest station
    pub fn downstream_cross_section(&self) -> Option<&CrossSection> {
        self.cross_sections()
            .min_by(|a, b| a.river_station.total_cmp(&b.river_station))
    }

    /// First georeferenced cross section from the upstream end
    pub(crate) fn upstream_cut_line(&self) -> Option<LineString<f64>> {
        self.cross_sections().find(|xs| xs.is_georeferenced()).map(CrossSection::line)
    }

    /// First georeferenced cross section from the downstream end
    pub(crate) fn downstream_cut_line(&self) -> Option<LineString<f64>> {
        let sections: Vec<&CrossSection> = self.cross_sections().collect();
        sections
            .into_iter()
            .rev()
            .find(|xs| xs.is_georeferenced())
            .map(CrossSection::line)
    }

    /// Centerline geometry
    pub fn line(&self) -> LineString<f64> {
        line_from_pairs(&self.centerline)
    }

    /// Centerline length in coordinate units
    pub fn length(&self) -> f64 {
        planar_length(&self.line())
    }

    /// Structure geometry: its upstream cut line shifted by the structure
    /// distance
    pub fn structure_line(&self, structure: &Structure) -> Result<LineString<f64>> {
        let upstream = self.cross_section(structure.upstream.station).ok_or_else(|| {
            Error::broken_topology(
                &self.river,
                &self.reach,
                format!("upstream cross section {} not found", structure.upstream),
            )
        })?;
        Ok(offset_curve(&upstream.line(), structure.distance))
    }

    /// Ribbon polygon traced around the reach's cut lines
    pub fn ribbon(&self) -> Option<Polygon<f64>> {
        let lines: Vec<LineString<f64>> = self.cross_sections().map(CrossSection::line).collect();
        cross_section_ribbon(&lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::RawDocument;
    use pretty_assertions::assert_eq;

    fn xs_lines(station: &str, y: f64) -> Vec<String> {
        vec![
            format!("Type RM Length L Ch R = 1 ,{station:<8},100,100,100"),
            "XS GIS Cut Line=2".to_string(),
            format!("{:>16}{:>16}{:>16}{:>16}", 0.0, y, 100.0, y),
            "#Sta/Elev= 2 ".to_string(),
            "       0     105     100     104".to_string(),
            "Bank Sta=0,100".to_string(),
            String::new(),
        ]
    }

    fn reach_doc(nodes: Vec<Vec<String>>) -> RawDocument {
        let mut lines = vec![
            "River Reach=Butte Cr        ,Upper           ".to_string(),
            "Reach XY= 2 ".to_string(),
            format!("{:>16}{:>16}{:>16}{:>16}", 50.0, 400.0, 50.0, 0.0),
            String::new(),
        ];
        for node in nodes {
            lines.extend(node);
        }
        RawDocument::from_text(&lines.join("\n"))
    }

    fn parse(doc: &RawDocument) -> Result<Reach> {
        Reach::parse(&doc.block(), "Butte Cr        ,Upper           ")
    }

    #[test]
    fn test_stations_in_file_order() {
        let doc = reach_doc(vec![
            xs_lines("120.5", 300.0),
            xs_lines("95.0", 200.0),
            xs_lines("60.2", 100.0),
        ]);
        let reach = parse(&doc).unwrap();
        assert_eq!(reach.river, "Butte Cr");
        assert_eq!(reach.reach, "Upper");
        let stations: Vec<f64> = reach.cross_sections().map(|xs| xs.river_station).collect();
        assert_eq!(stations, vec![120.5, 95.0, 60.2]);
        assert_eq!(reach.upstream_cross_section().unwrap().river_station, 120.5);
        assert_eq!(reach.downstream_cross_section().unwrap().river_station, 60.2);
        assert_eq!(reach.length(), 400.0);
    }

    #[test]
    fn test_out_of_order_stations() {
        let doc = reach_doc(vec![xs_lines("95.0", 200.0), xs_lines("120.5", 300.0)]);
        let err = parse(&doc).unwrap_err();
        assert!(matches!(err, Error::BrokenTopology { .. }));
    }

    #[test]
    fn test_structure_links_to_upstream_section() {
        let bridge = vec![
            "Type RM Length L Ch R = 3 ,110     ,,,".to_string(),
            "Deck Dist Width WeirC Skew NumUp NumDn MinLoCord MaxHiCord MaxSubmerge Is_Ogee".to_string(),
            "25,40,2.6,0,10,10,0,,,0.95,0".to_string(),
            String::new(),
        ];
        let doc = reach_doc(vec![xs_lines("120.5", 300.0), bridge, xs_lines("95.0", 200.0)]);
        let reach = parse(&doc).unwrap();

        let structure = reach.structures().next().unwrap();
        assert_eq!(structure.kind, StructureKind::Bridge);
        assert_eq!(structure.upstream.station, 120.5);

        // cut line runs +x, so a positive offset moves it to +y
        let line = reach.structure_line(structure).unwrap();
        assert_eq!(line.0[0].y, 325.0);
        assert_eq!(line.0[1].y, 325.0);
    }

    #[test]
    fn test_structure_without_upstream_section() {
        let culvert = vec![
            "Type RM Length L Ch R = 2 ,130     ,,,".to_string(),
            "Deck Dist Width WeirC Skew NumUp NumDn MinLoCord MaxHiCord MaxSubmerge Is_Ogee".to_string(),
            "5,20,2.6,0,10,10,0,,,0.95,0".to_string(),
        ];
        let doc = reach_doc(vec![culvert, xs_lines("120.5", 300.0)]);
        let err = parse(&doc).unwrap_err();
        assert!(matches!(err, Error::BrokenTopology { .. }));
    }

    #[test]
    fn test_structure_at_upstream_section_station() {
        let bridge = vec![
            "Type RM Length L Ch R = 3 ,120.5   ,,,".to_string(),
            "Deck Dist Width WeirC Skew NumUp NumDn MinLoCord MaxHiCord MaxSubmerge Is_Ogee".to_string(),
            "25,40,2.6,0,10,10,0,,,0.95,0".to_string(),
            String::new(),
        ];
        let doc = reach_doc(vec![xs_lines("120.5", 300.0), bridge, xs_lines("95.0", 200.0)]);
        let err = parse(&doc).unwrap_err();
        match err {
            Error::BrokenTopology { details, .. } => {
                assert!(details.contains("not downstream of cross section 120.5"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unsupported_node_type() {
        let unknown = vec!["Type RM Length L Ch R = 7 ,110     ,,,".to_string()];
        let doc = reach_doc(vec![xs_lines("120.5", 300.0), unknown]);
        let err = parse(&doc).unwrap_err();
        assert!(matches!(err, Error::UnsupportedStructureType { code: 7, .. }));
    }

    #[test]
    fn test_ribbon_spans_sections() {
        let doc = reach_doc(vec![xs_lines("120.5", 300.0), xs_lines("60.2", 100.0)]);
        let reach = parse(&doc).unwrap();
        let ribbon = reach.ribbon().unwrap();
        use geo::Area;
        assert!((ribbon.unsigned_area() - 20_000.0).abs() < 1e-6);
    }
}
