use crate::error::{Error, Result};
use crate::text::{comma_float, Block};
use std::fmt;
use std::ops::Range;
use tracing::trace;

use super::cross_section::{NodeHeader, NodeKey};

/// Node type codes accepted as structures
pub const STRUCTURE_CODES: &[i64] = &[2, 3, 4, 5, 6];

/// Anchor preceding the bridge/culvert/multiple-opening deck record
const DECK_ANCHOR: &str =
    "Deck Dist Width WeirC Skew NumUp NumDn MinLoCord MaxHiCord MaxSubmerge Is_Ogee";

/// Anchor preceding the inline weir record
const INLINE_WEIR_ANCHOR: &str = "IW Dist,WD,Coef,Skew,MaxSub,Min_El,Is_Ogee,SpillHt,DesHd";

/// Hydraulic structure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureKind {
    /// Culvert (code 2)
    Culvert,
    /// Bridge (code 3)
    Bridge,
    /// Multiple opening (code 4)
    MultipleOpening,
    /// Inline weir / inline structure (code 5)
    InlineWeir,
    /// Lateral structure (code 6)
    LateralStructure,
}

impl StructureKind {
    /// The node type code written in the file
    pub fn code(self) -> i64 {
        match self {
            StructureKind::Culvert => 2,
            StructureKind::Bridge => 3,
            StructureKind::MultipleOpening => 4,
            StructureKind::InlineWeir => 5,
            StructureKind::LateralStructure => 6,
        }
    }

    /// Short human-readable name
    pub fn as_str(self) -> &'static str {
        match self {
            StructureKind::Culvert => "culvert",
            StructureKind::Bridge => "bridge",
            StructureKind::MultipleOpening => "multiple opening",
            StructureKind::InlineWeir => "inline weir",
            StructureKind::LateralStructure => "lateral structure",
        }
    }
}

impl TryFrom<i64> for StructureKind {
    type Error = Error;

    fn try_from(code: i64) -> Result<Self> {
        match code {
            2 => Ok(StructureKind::Culvert),
            3 => Ok(StructureKind::Bridge),
            4 => Ok(StructureKind::MultipleOpening),
            5 => Ok(StructureKind::InlineWeir),
            6 => Ok(StructureKind::LateralStructure),
            _ => Err(Error::UnsupportedStructureType {
                code,
                supported: STRUCTURE_CODES,
            }),
        }
    }
}

impl fmt::Display for StructureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hydraulic structure positioned relative to its upstream cross section
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    /// River name
    pub river: String,
    /// Reach name
    pub reach: String,
    /// River station
    pub river_station: f64,
    /// Structure kind
    pub kind: StructureKind,
    /// Distance from the upstream cross section
    pub distance: f64,
    /// Deck or weir width
    pub width: f64,
    /// Key of the nearest cross section upstream in the same reach
    pub upstream: NodeKey,
    /// Source line range in the document
    pub source: Range<usize>,
}

impl Structure {
    /// Parse a structure from its node block (header line first)
    pub(crate) fn parse(
        block: &Block<'_>,
        header: &NodeHeader,
        kind: StructureKind,
        upstream: NodeKey,
    ) -> Result<Self> {
        let (distance, width) = match kind {
            StructureKind::Culvert | StructureKind::Bridge | StructureKind::MultipleOpening => {
                dimensions(block, DECK_ANCHOR)?
            }
            StructureKind::InlineWeir => dimensions(block, INLINE_WEIR_ANCHOR)?,
            StructureKind::LateralStructure => (0.0, 0.0),
        };

        trace!(
            "Parsed {} at {} {} {} ({} from {})",
            kind,
            upstream.river,
            upstream.reach,
            header.station,
            distance,
            upstream.station
        );

        Ok(Self {
            river: upstream.river.clone(),
            reach: upstream.reach.clone(),
            river_station: header.station,
            kind,
            distance,
            width,
            upstream,
            source: block.range(),
        })
    }

    /// Key of this structure
    pub fn key(&self) -> NodeKey {
        NodeKey::new(&self.river, &self.reach, self.river_station)
    }
}

/// Distance and width from the first two fields of the record after `anchor`
fn dimensions(block: &Block<'_>, anchor: &str) -> Result<(f64, f64)> {
    let record = block.extract_by_count(anchor, 1)?;
    let line = record.first_line().unwrap_or_default();
    Ok((
        comma_float(line, 0, "structure distance")?,
        comma_float(line, 1, "structure width")?,
    ))
}
