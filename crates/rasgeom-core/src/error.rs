//! Error types for the rasgeom-core library.
//!
//! Every failure is terminal for the file being parsed. Variants carry the
//! anchor or key involved and, for count mismatches, both counts, so a caller
//! can point at the exact record that is malformed.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for rasgeom operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all rasgeom operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// No whitespace variant of an anchor line exists in the block
    #[error("anchor line '{anchor}' not found")]
    AnchorNotFound {
        /// The anchor as it was requested
        anchor: String,
    },

    /// Fewer lines follow an anchor than the record declares
    #[error("expected {expected} line(s) after '{anchor}', found {found}")]
    InsufficientLines {
        /// The anchor line
        anchor: String,
        /// Declared number of lines
        expected: usize,
        /// Lines actually available
        found: usize,
    },

    /// A fixed-width or comma-delimited numeric field did not parse
    #[error("malformed numeric field '{field}': '{value}'")]
    MalformedNumericField {
        /// Name of the field or anchor being decoded
        field: String,
        /// Raw text that failed to parse
        value: String,
    },

    /// Decoded pair count differs from the count declared in the header
    #[error("'{anchor}' declares {expected} pair(s), decoded {found}")]
    PairCountMismatch {
        /// The anchor line that declared the count
        anchor: String,
        /// Declared count
        expected: usize,
        /// Decoded count
        found: usize,
    },

    /// A key that must appear exactly once appeared zero or several times
    #[error("expected {expected} match(es) for key '{key}', found {found}")]
    AmbiguousOrMissingKey {
        /// The searched key
        key: String,
        /// Expected number of matches
        expected: usize,
        /// Actual number of matches
        found: usize,
    },

    /// A comma-delimited record is missing a required field
    #[error("record '{record}' has no field {position}")]
    MalformedRecord {
        /// The record text
        record: String,
        /// Zero-based field position
        position: usize,
    },

    /// Node header type code outside the supported set
    #[error("unsupported structure type {code}: supported structure types are {supported:?} (culvert, bridge, multiple opening, inline structure, lateral structure)")]
    UnsupportedStructureType {
        /// The type code found in the node header
        code: i64,
        /// Codes this parser understands
        supported: &'static [i64],
    },

    /// Linear unit of the reference system, or a requested length unit, is unknown
    #[error("unsupported linear unit '{unit}': expected feet or meters")]
    UnsupportedLinearUnit {
        /// The unit string
        unit: String,
    },

    /// Geometry was requested before a reference system was assigned
    #[error("no coordinate reference system assigned; geometry is unavailable")]
    MissingReferenceSystem,

    /// Station ordering or structure back-references are inconsistent
    #[error("broken topology in {river}/{reach}: {details}")]
    BrokenTopology {
        /// River name
        river: String,
        /// Reach name
        reach: String,
        /// What is inconsistent
        details: String,
    },

    /// A model directory does not contain exactly one project file
    #[error("expected one HEC-RAS project file, found {found}")]
    MissingProjectFile {
        /// Number of project files found
        found: usize,
    },

    /// A file referenced by the project or a plan is not present
    #[error("{kind} file '{name}' referenced by the model is missing")]
    MissingModelFile {
        /// What kind of file was referenced (plan, geometry)
        kind: &'static str,
        /// Extension or name that was referenced
        name: String,
    },
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new anchor-not-found error
    pub fn anchor_not_found(anchor: impl Into<String>) -> Self {
        Self::AnchorNotFound {
            anchor: anchor.into(),
        }
    }

    /// Creates a new insufficient-lines error
    pub fn insufficient_lines(anchor: impl Into<String>, expected: usize, found: usize) -> Self {
        Self::InsufficientLines {
            anchor: anchor.into(),
            expected,
            found,
        }
    }

    /// Creates a new malformed numeric field error
    pub fn malformed_numeric(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::MalformedNumericField {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Creates a new pair count mismatch error
    pub fn pair_count_mismatch(anchor: impl Into<String>, expected: usize, found: usize) -> Self {
        Self::PairCountMismatch {
            anchor: anchor.into(),
            expected,
            found,
        }
    }

    /// Creates a new ambiguous-or-missing key error
    pub fn ambiguous_key(key: impl Into<String>, expected: usize, found: usize) -> Self {
        Self::AmbiguousOrMissingKey {
            key: key.into(),
            expected,
            found,
        }
    }

    /// Creates a new malformed record error
    pub fn malformed_record(record: impl Into<String>, position: usize) -> Self {
        Self::MalformedRecord {
            record: record.into(),
            position,
        }
    }

    /// Creates a new unsupported linear unit error
    pub fn unsupported_unit(unit: impl Into<String>) -> Self {
        Self::UnsupportedLinearUnit { unit: unit.into() }
    }

    /// Creates a new broken topology error
    pub fn broken_topology(
        river: impl Into<String>,
        reach: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self::BrokenTopology {
            river: river.into(),
            reach: reach.into(),
            details: details.into(),
        }
    }

    /// Returns true if the error points at malformed file content rather
    /// than at the caller or the environment
    pub fn is_content_error(&self) -> bool {
        !matches!(
            self,
            Self::FileRead { .. }
                | Self::MissingReferenceSystem
                | Self::MissingProjectFile { .. }
                | Self::MissingModelFile { .. }
        )
    }
}
