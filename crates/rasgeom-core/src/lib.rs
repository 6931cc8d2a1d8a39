//! # rasgeom-core
//!
//! A library for reading HEC-RAS 1D geometry text files into a typed river
//! network with planar geometry.
//!
//! This crate provides the core functionality for:
//! - Locating anchored records in the line-oriented geometry format
//! - Decoding packed fixed-width coordinate and station/elevation tables
//! - Building reaches, cross sections, structures and junctions
//! - Deriving network geometry: centerlines, cut lines, structure lines,
//!   the network footprint, its centroid and total river length
//! - Classifying the files of a model directory and picking its primary
//!   plan and geometry
//!
//! ## Architecture
//!
//! - [`text`]: Anchor resolution, block extraction and packed-field decoding
//! - [`model`]: The network model and its records
//! - [`geometry`]: Planar helpers and reference system units
//! - [`project`]: Model directory roles
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use rasgeom_core::{LengthUnit, ModelConfig, NetworkModel, RawDocument};
//!
//! let document = RawDocument::from_path("./model.g01")?;
//! let config = ModelConfig::new().reference_system("EPSG:2277");
//! let model = NetworkModel::with_config(document, config);
//!
//! println!("{} reaches", model.n_reaches()?);
//! for junction in model.junctions()? {
//!     println!("{} joins {}", junction.name, junction.upstream_reaches());
//! }
//!
//! let mut model = model;
//! model.set_reference_system("+proj=utm +zone=14 +units=us-ft");
//! println!("{:.2} mi", model.total_network_length(LengthUnit::Miles)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod error;
pub mod geometry;
pub mod model;
pub mod project;
pub mod text;

// Re-export primary types for convenience
pub use error::{Error, Result};
pub use geometry::{LengthUnit, LinearUnit, ReferenceSystem};
pub use model::{
    CrossSection, Junction, ModelConfig, NetworkModel, NodeKey, Reach, ReachNode, River,
    RiverReachName, Structure, StructureKind, Units,
};
pub use project::{role_label, FileRole, ModelFile, ModelProject, PlanEntry};
pub use text::{Block, RawDocument};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
