use crate::error::{Error, Result};
use crate::text::{comma_field, comma_float, Block, KEY_TOKEN};
use geo::Point;
use std::ops::Range;
use tracing::trace;

/// A river/reach name pair as referenced by a junction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiverReachName {
    /// River name
    pub river: String,
    /// Reach name
    pub reach: String,
}

impl RiverReachName {
    fn parse(value: &str) -> Result<Self> {
        Ok(Self {
            river: comma_field(value, 0)?.to_string(),
            reach: comma_field(value, 1)?.to_string(),
        })
    }
}

/// A junction connecting the ends of several reaches
#[derive(Debug, Clone, PartialEq)]
pub struct Junction {
    /// Junction name
    pub name: String,
    /// Junction x coordinate
    pub x: f64,
    /// Junction y coordinate
    pub y: f64,
    /// Reaches flowing into the junction
    pub upstream: Vec<RiverReachName>,
    /// Reaches flowing out of the junction
    pub downstream: Vec<RiverReachName>,
    /// Junction lengths, one per `Junc L&A` record; blank lengths are `None`
    pub lengths: Vec<Option<f64>>,
    /// Source line range in the document
    pub source: Range<usize>,
}

impl Junction {
    /// Parse the junction whose `Junct Name=` value is `raw_name`
    pub(crate) fn parse(document: &Block<'_>, raw_name: &str) -> Result<Self> {
        let block = document.extract_until_blank(&format!("Junct Name={raw_name}"))?;

        let position = block.value("Junct X Y & Text X Y")?;
        let x = comma_float(position, 0, "junction x")?;
        let y = comma_float(position, 1, "junction y")?;

        let upstream = block
            .search_values("Up River,Reach", KEY_TOKEN)
            .into_iter()
            .map(RiverReachName::parse)
            .collect::<Result<Vec<_>>>()?;
        let downstream = block
            .search_values("Dn River,Reach", KEY_TOKEN)
            .into_iter()
            .map(RiverReachName::parse)
            .collect::<Result<Vec<_>>>()?;

        let lengths = block
            .search_values("Junc L&A", KEY_TOKEN)
            .into_iter()
            .map(|record| {
                let raw = comma_field(record, 0)?;
                if raw.is_empty() {
                    return Ok(None);
                }
                raw.parse::<f64>()
                    .map(Some)
                    .map_err(|_| Error::malformed_numeric("junction length", raw))
            })
            .collect::<Result<Vec<_>>>()?;

        let name = raw_name.trim().to_string();
        trace!(
            "Parsed junction {} ({} upstream, {} downstream)",
            name,
            upstream.len(),
            downstream.len()
        );

        Ok(Self {
            name,
            x,
            y,
            upstream,
            downstream,
            lengths,
            source: block.range(),
        })
    }

    /// Junction location
    pub fn point(&self) -> Point<f64> {
        Point::new(self.x, self.y)
    }

    /// Upstream river names, comma-joined
    pub fn upstream_rivers(&self) -> String {
        join(self.upstream.iter().map(|n| n.river.as_str()))
    }

    /// Upstream reach names, comma-joined
    pub fn upstream_reaches(&self) -> String {
        join(self.upstream.iter().map(|n| n.reach.as_str()))
    }

    /// Downstream river names, comma-joined
    pub fn downstream_rivers(&self) -> String {
        join(self.downstream.iter().map(|n| n.river.as_str()))
    }

    /// Downstream reach names, comma-joined
    pub fn downstream_reaches(&self) -> String {
        join(self.downstream.iter().map(|n| n.reach.as_str()))
    }

    /// Junction lengths, comma-joined; blank lengths stay blank
    pub fn junction_lengths(&self) -> String {
        self.lengths
            .iter()
            .map(|length| length.map(|l| l.to_string()).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// All reaches touching the junction, upstream first
    pub fn incident_reaches(&self) -> impl Iterator<Item = (&RiverReachName, bool)> {
        self.upstream
            .iter()
            .map(|n| (n, true))
            .chain(self.downstream.iter().map(|n| (n, false)))
    }
}

fn join<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(",")
}
