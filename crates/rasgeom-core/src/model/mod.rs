//! Hydraulic network model.
//!
//! [`NetworkModel`] owns a [`RawDocument`] and builds typed records from it
//! on demand:
//!
//! - [`Reach`]: one per `River Reach=` anchor, holding its centerline and
//!   its [`CrossSection`] and [`Structure`] nodes in file order
//! - [`Junction`]: one per `Junct Name=` anchor
//! - [`River`]: a projection grouping reaches by river name
//!
//! Every accessor is a pure function of the document. Results are cached in
//! write-once cells, so a model can be shared between threads and readers
//! never see a half-built cache.
//!
//! ## Example
//!
//! ```no_run
//! use rasgeom_core::{LengthUnit, NetworkModel};
//!
//! let mut model = NetworkModel::from_path("model.g01")?;
//! model.set_reference_system("+proj=utm +zone=15 +units=us-ft");
//!
//! for reach in model.reaches()? {
//!     println!("{}/{}: {} sections", reach.river, reach.reach, reach.cross_sections().count());
//! }
//! println!("{:.2} miles", model.total_network_length(LengthUnit::Miles)?);
//! # Ok::<(), rasgeom_core::Error>(())
//! ```

mod cross_section;
mod junction;
mod reach;
mod structure;

use crate::error::{Error, Result};
use crate::geometry::{hull_of_lines, union_all, LengthUnit, ReferenceSystem};
use crate::text::{RawDocument, KEY_TOKEN};
use chrono::NaiveDateTime;
use geo::{
    BoundingRect, Centroid, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint,
    MultiPolygon, Point, Polygon, Rect,
};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, trace};

pub use cross_section::{CrossSection, NodeKey};
pub use junction::{Junction, RiverReachName};
pub use reach::{Reach, ReachNode};
pub use structure::{Structure, StructureKind, STRUCTURE_CODES};

/// Key of the node header line, trailing space included
pub(crate) const NODE_HEADER: &str = "Type RM Length L Ch R ";

/// Key of the reach header line
pub(crate) const REACH_HEADER: &str = "River Reach";

/// Key of the junction header line
const JUNCTION_HEADER: &str = "Junct Name";

/// Prefix of the 2D flow area flag
const IS_2D_PREFIX: &str = "Storage Area Is2D=";

/// Format of `Node Last Edited Time` values
const LAST_EDITED_FORMAT: &str = "%b/%d/%Y %H:%M:%S";

/// Configuration for a network model
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Reference system of the stored coordinates
    pub reference_system: Option<ReferenceSystem>,
    /// Include junction hulls in the footprint
    pub junction_hulls: bool,
    /// Decimal places kept by [`NetworkModel::river_miles`]
    pub length_precision: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            reference_system: None,
            junction_hulls: true,
            length_precision: 2,
        }
    }
}

impl ModelConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the reference system
    pub fn reference_system(mut self, crs: impl Into<ReferenceSystem>) -> Self {
        self.reference_system = Some(crs.into());
        self
    }

    /// Sets whether junction hulls join the footprint
    pub fn junction_hulls(mut self, include: bool) -> Self {
        self.junction_hulls = include;
        self
    }

    /// Sets the decimal places kept for river miles
    pub fn length_precision(mut self, decimals: u32) -> Self {
        self.length_precision = decimals;
        self
    }
}

/// Unit system declared by the geometry file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Units {
    /// US customary units
    English,
    /// SI units
    Metric,
}

impl Units {
    /// Name as HEC-RAS prints it
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::English => "English",
            Units::Metric => "Metric",
        }
    }
}

/// Reaches sharing a river name
#[derive(Debug, Clone)]
pub struct River<'a> {
    /// River name
    pub name: &'a str,
    /// Reaches in file order
    pub reaches: Vec<&'a Reach>,
}

/// A geometry file parsed into a river network
#[derive(Debug)]
pub struct NetworkModel {
    document: RawDocument,
    config: ModelConfig,
    reaches: OnceLock<Vec<Reach>>,
    junctions: OnceLock<Vec<Junction>>,
    footprint: OnceLock<MultiPolygon<f64>>,
}

impl NetworkModel {
    /// Creates a model over a document with default configuration
    pub fn new(document: RawDocument) -> Self {
        Self::with_config(document, ModelConfig::default())
    }

    /// Creates a model over a document with custom configuration
    pub fn with_config(document: RawDocument, config: ModelConfig) -> Self {
        Self {
            document,
            config,
            reaches: OnceLock::new(),
            junctions: OnceLock::new(),
            footprint: OnceLock::new(),
        }
    }

    /// Creates a model from file text
    pub fn from_text(text: &str) -> Self {
        Self::new(RawDocument::from_text(text))
    }

    /// Creates a model from a local file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(RawDocument::from_path(path)?))
    }

    /// Assigns the reference system; required before any geometry accessor
    pub fn set_reference_system(&mut self, crs: impl Into<ReferenceSystem>) {
        self.config.reference_system = Some(crs.into());
        self.footprint = OnceLock::new();
    }

    /// Builder form of [`NetworkModel::set_reference_system`]
    pub fn with_reference_system(mut self, crs: impl Into<ReferenceSystem>) -> Self {
        self.set_reference_system(crs);
        self
    }

    /// The assigned reference system, if any
    pub fn reference_system(&self) -> Option<&ReferenceSystem> {
        self.config.reference_system.as_ref()
    }

    /// The model configuration
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// A fresh model over the same text with another configuration
    pub fn reconfigured(&self, config: ModelConfig) -> Self {
        Self::with_config(self.document.clone(), config)
    }

    /// The underlying document
    pub fn document(&self) -> &RawDocument {
        &self.document
    }

    /// Source lines of an entity's range
    pub fn source_lines(&self, range: std::ops::Range<usize>) -> &[String] {
        self.document.source(range)
    }

    fn require_reference_system(&self) -> Result<&ReferenceSystem> {
        self.config
            .reference_system
            .as_ref()
            .ok_or(Error::MissingReferenceSystem)
    }

    // ---------------------------------------------------------------------
    // Network records
    // ---------------------------------------------------------------------

    /// All reaches in file order
    pub fn reaches(&self) -> Result<&[Reach]> {
        cached(&self.reaches, || {
            let block = self.document.block();
            let reaches = block
                .search_values(REACH_HEADER, KEY_TOKEN)
                .into_iter()
                .map(|raw_name| Reach::parse(&block, raw_name))
                .collect::<Result<Vec<_>>>()?;
            debug!("Built {} reaches", reaches.len());
            Ok(reaches)
        })
        .map(Vec::as_slice)
    }

    /// All junctions in file order
    pub fn junctions(&self) -> Result<&[Junction]> {
        cached(&self.junctions, || {
            let block = self.document.block();
            let junctions = block
                .search_values(JUNCTION_HEADER, KEY_TOKEN)
                .into_iter()
                .map(|raw_name| Junction::parse(&block, raw_name))
                .collect::<Result<Vec<_>>>()?;
            debug!("Built {} junctions", junctions.len());
            Ok(junctions)
        })
        .map(Vec::as_slice)
    }

    /// Reaches grouped by river name, in order of first appearance
    pub fn rivers(&self) -> Result<Vec<River<'_>>> {
        let mut rivers: Vec<River<'_>> = Vec::new();
        for reach in self.reaches()? {
            match rivers.iter_mut().find(|river| river.name == reach.river) {
                Some(river) => river.reaches.push(reach),
                None => rivers.push(River {
                    name: &reach.river,
                    reaches: vec![reach],
                }),
            }
        }
        Ok(rivers)
    }

    /// A reach by river and reach name
    pub fn reach(&self, river: &str, reach: &str) -> Result<Option<&Reach>> {
        Ok(self
            .reaches()?
            .iter()
            .find(|r| r.river == river && r.reach == reach))
    }

    /// All cross sections, reach by reach, upstream to downstream
    pub fn cross_sections(&self) -> Result<Vec<&CrossSection>> {
        Ok(self
            .reaches()?
            .iter()
            .flat_map(Reach::cross_sections)
            .collect())
    }

    /// All structures, reach by reach, upstream to downstream
    pub fn structures(&self) -> Result<Vec<&Structure>> {
        Ok(self.reaches()?.iter().flat_map(Reach::structures).collect())
    }

    /// A cross section by key
    pub fn cross_section(&self, key: &NodeKey) -> Result<Option<&CrossSection>> {
        Ok(self
            .reach(&key.river, &key.reach)?
            .and_then(|reach| reach.cross_section(key.station)))
    }

    /// Number of reaches
    pub fn n_reaches(&self) -> Result<usize> {
        Ok(self.reaches()?.len())
    }

    /// Number of distinct rivers
    pub fn n_rivers(&self) -> Result<usize> {
        Ok(self.rivers()?.len())
    }

    /// Number of junctions
    pub fn n_junctions(&self) -> Result<usize> {
        Ok(self.junctions()?.len())
    }

    /// Number of cross sections
    pub fn n_cross_sections(&self) -> Result<usize> {
        Ok(self.cross_sections()?.len())
    }

    /// Number of structures
    pub fn n_structures(&self) -> Result<usize> {
        Ok(self.structures()?.len())
    }

    // ---------------------------------------------------------------------
    // File metadata
    // ---------------------------------------------------------------------

    /// `Geom Title` value
    pub fn title(&self) -> Result<&str> {
        Ok(self.document.block().value("Geom Title")?.trim())
    }

    /// First `Program Version` value
    pub fn program_version(&self) -> Option<&str> {
        self.document
            .block()
            .search_values("Program Version", KEY_TOKEN)
            .first()
            .map(|version| version.trim())
    }

    /// Declared unit system
    pub fn units(&self) -> Units {
        if self
            .document
            .lines()
            .iter()
            .any(|line| line.contains("English Units"))
        {
            Units::English
        } else {
            Units::Metric
        }
    }

    /// Latest `Node Last Edited Time` in the file
    pub fn last_update(&self) -> Result<Option<NaiveDateTime>> {
        let mut latest: Option<NaiveDateTime> = None;
        for raw in self
            .document
            .block()
            .search_values("Node Last Edited Time", KEY_TOKEN)
        {
            let edited = NaiveDateTime::parse_from_str(raw.trim(), LAST_EDITED_FORMAT)
                .map_err(|_| Error::malformed_numeric("Node Last Edited Time", raw))?;
            latest = latest.max(Some(edited));
        }
        Ok(latest)
    }

    /// True if any storage area is flagged as a 2D flow area
    pub fn has_2d_flow_area(&self) -> bool {
        self.document.lines().iter().any(|line| {
            let Some(flag) = line.strip_prefix(IS_2D_PREFIX) else {
                return false;
            };
            match flag.trim().parse::<i64>() {
                // HEC-RAS writes -1 for true; 1 appears in some files
                Ok(value) => value == -1 || value == 1,
                Err(_) => {
                    trace!("Ignoring unparsable 2D flag {:?}", flag);
                    false
                }
            }
        })
    }

    // ---------------------------------------------------------------------
    // Geometry
    // ---------------------------------------------------------------------

    /// Reach centerlines
    pub fn reach_line_collection(&self) -> Result<MultiLineString<f64>> {
        self.require_reference_system()?;
        Ok(MultiLineString::new(
            self.reaches()?.iter().map(Reach::line).collect(),
        ))
    }

    /// Cross-section cut lines; sections without coordinates give empty lines
    pub fn cross_section_line_collection(&self) -> Result<MultiLineString<f64>> {
        self.require_reference_system()?;
        Ok(MultiLineString::new(
            self.cross_sections()?
                .into_iter()
                .map(CrossSection::line)
                .collect(),
        ))
    }

    /// Structure lines offset from their upstream cut lines
    pub fn structure_line_collection(&self) -> Result<MultiLineString<f64>> {
        self.require_reference_system()?;
        let mut lines = Vec::new();
        for reach in self.reaches()? {
            for structure in reach.structures() {
                lines.push(reach.structure_line(structure)?);
            }
        }
        Ok(MultiLineString::new(lines))
    }

    /// Junction locations
    pub fn junction_points(&self) -> Result<MultiPoint<f64>> {
        self.require_reference_system()?;
        Ok(MultiPoint::new(
            self.junctions()?.iter().map(Junction::point).collect(),
        ))
    }

    /// Bounding box of every network component
    pub fn bounding_rect(&self) -> Result<Option<Rect<f64>>> {
        let components: Vec<Geometry<f64>> = vec![
            self.cross_section_line_collection()?.into(),
            self.reach_line_collection()?.into(),
            self.structure_line_collection()?.into(),
            self.junction_points()?.into(),
        ];
        Ok(GeometryCollection::new_from(components).bounding_rect())
    }

    /// Footprint of the surveyed network: the union of every reach ribbon
    /// and junction hull.
    ///
    /// A file without reaches has an empty footprint, 2D flow areas
    /// included.
    pub fn footprint_polygon(&self) -> Result<&MultiPolygon<f64>> {
        self.require_reference_system()?;
        cached(&self.footprint, || {
            let mut polygons: Vec<Polygon<f64>> = Vec::new();

            for river in self.rivers()? {
                let ribbons: Vec<Polygon<f64>> =
                    river.reaches.iter().filter_map(|reach| reach.ribbon()).collect();
                trace!("River {} contributes {} ribbons", river.name, ribbons.len());
                polygons.extend(ribbons);
            }

            if self.config.junction_hulls {
                for junction in self.junctions()? {
                    if let Some(hull) = self.junction_hull(junction)? {
                        polygons.push(hull);
                    }
                }
            }

            if polygons.is_empty() && self.has_2d_flow_area() {
                debug!("No 1D reaches to trace; footprint left empty for 2D-only geometry");
            }

            let footprint = union_all(&polygons);
            debug!(
                "Footprint from {} polygons has {} parts",
                polygons.len(),
                footprint.0.len()
            );
            Ok(footprint)
        })
    }

    /// Convex hull of the cut lines where a junction's reaches meet
    fn junction_hull(&self, junction: &Junction) -> Result<Option<Polygon<f64>>> {
        let mut lines: Vec<LineString<f64>> = Vec::new();
        for (name, is_upstream) in junction.incident_reaches() {
            let reach = self.reach(&name.river, &name.reach)?.ok_or_else(|| {
                Error::broken_topology(
                    &name.river,
                    &name.reach,
                    format!("reach referenced by junction {} does not exist", junction.name),
                )
            })?;
            // Upstream reaches end at the junction, downstream reaches start there
            let terminal = if is_upstream {
                reach.downstream_cut_line()
            } else {
                reach.upstream_cut_line()
            };
            lines.extend(terminal);
        }
        Ok(hull_of_lines(&lines))
    }

    /// Centroid of the footprint; `None` if the footprint is empty
    pub fn centroid(&self) -> Result<Option<Point<f64>>> {
        Ok(self.footprint_polygon()?.centroid())
    }

    /// Total centerline length of all reaches
    pub fn total_network_length(&self, unit: LengthUnit) -> Result<f64> {
        let linear_unit = self.require_reference_system()?.linear_unit()?;
        let length: f64 = self.reaches()?.iter().map(Reach::length).sum();
        Ok(linear_unit.convert(length, unit))
    }

    /// Total centerline length in miles, rounded to the configured precision
    pub fn river_miles(&self) -> Result<f64> {
        let miles = self.total_network_length(LengthUnit::Miles)?;
        let scale = 10f64.powi(self.config.length_precision as i32);
        Ok((miles * scale).round() / scale)
    }
}

/// Return the cached value, building and freezing it on first use.
///
/// Failed builds are not cached; the next call tries again from the
/// unchanged document and fails the same way.
fn cached<T>(cell: &OnceLock<T>, build: impl FnOnce() -> Result<T>) -> Result<&T> {
    if let Some(value) = cell.get() {
        return Ok(value);
    }
    let value = build()?;
    Ok(cell.get_or_init(|| value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const HEADER: &str = "Geom Title=Test Geometry\nProgram Version=6.10\nViewing Rectangle= 0 , 100 , 100 , 0 \n\n";

    #[test]
    fn test_geometry_requires_reference_system() {
        let model = NetworkModel::from_text(HEADER);
        assert!(matches!(model.footprint_polygon(), Err(Error::MissingReferenceSystem)));
        assert!(matches!(model.reach_line_collection(), Err(Error::MissingReferenceSystem)));
        assert!(matches!(model.centroid(), Err(Error::MissingReferenceSystem)));
        assert!(matches!(
            model.total_network_length(LengthUnit::Miles),
            Err(Error::MissingReferenceSystem)
        ));
    }

    #[test]
    fn test_empty_network() {
        let model = NetworkModel::from_text(HEADER).with_reference_system("+proj=utm +units=m");
        assert!(model.reaches().unwrap().is_empty());
        assert!(model.junctions().unwrap().is_empty());
        assert!(model.footprint_polygon().unwrap().0.is_empty());
        assert_eq!(model.centroid().unwrap(), None);
        assert_eq!(model.total_network_length(LengthUnit::Kilometers).unwrap(), 0.0);
    }

    #[test]
    fn test_metadata() {
        let text = format!(
            "{HEADER}Node Last Edited Time=Mar/14/2019 09:47:36\nNode Last Edited Time=Jan/02/2021 10:00:00\n"
        );
        let model = NetworkModel::from_text(&text);
        assert_eq!(model.title().unwrap(), "Test Geometry");
        assert_eq!(model.program_version(), Some("6.10"));
        assert_eq!(model.units(), Units::Metric);
        let last = model.last_update().unwrap().unwrap();
        assert_eq!(last.to_string(), "2021-01-02 10:00:00");
    }

    #[test]
    fn test_2d_flag() {
        let off = NetworkModel::from_text("Storage Area Is2D=0\n");
        assert!(!off.has_2d_flow_area());
        let on = NetworkModel::from_text("Storage Area Is2D=-1\n");
        assert!(on.has_2d_flow_area());
        let on = NetworkModel::from_text("Storage Area Is2D= 1\n");
        assert!(on.has_2d_flow_area());
    }

    #[test]
    fn test_config_builder() {
        let config = ModelConfig::new()
            .reference_system("EPSG:2277")
            .junction_hulls(false)
            .length_precision(3);
        assert_eq!(config.reference_system.as_ref().map(|c| c.descriptor()), Some("EPSG:2277"));
        assert!(!config.junction_hulls);
        assert_eq!(config.length_precision, 3);
    }

    #[test]
    fn test_reconfigured_starts_fresh() {
        let model = NetworkModel::from_text(HEADER);
        let configured = model.reconfigured(ModelConfig::new().reference_system("+units=m"));
        assert!(model.reference_system().is_none());
        assert_eq!(configured.reference_system().map(|c| c.descriptor()), Some("+units=m"));
        assert_eq!(configured.title().unwrap(), "Test Geometry");
    }

    #[test]
    fn test_model_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NetworkModel>();
    }
}
