//! HEC-RAS model directories.
//!
//! A model directory holds one project file (`.prj` whose first line is a
//! `Proj Title=` record) plus numbered companion files whose extension names
//! their role: `g01` geometry, `p01` plan, `f01` steady flow and so on. The
//! project lists its plans; each plan names the geometry it runs against.

use crate::error::{Error, Result};
use crate::model::NetworkModel;
use crate::text::{RawDocument, KEY_TOKEN};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Role of a file within a model directory, with the records that role
/// carries
#[derive(Debug)]
pub enum FileRole {
    /// The `.prj` project file
    Project {
        /// `Proj Title`
        title: String,
        /// Plan extensions in project order
        plans: Vec<String>,
        /// `Current Plan`, if recorded
        current_plan: Option<String>,
    },
    /// A `pNN` plan file
    Plan {
        /// `Plan Title`
        title: String,
        /// Extension of the geometry file the plan runs
        geometry: String,
        /// True if the plan runs an encroachment analysis
        encroached: bool,
    },
    /// A `gNN` geometry file
    Geometry {
        /// `Geom Title`
        title: String,
        /// The parsed network, without a reference system
        model: NetworkModel,
    },
    /// An `fNN` steady flow file
    SteadyFlow {
        /// `Flow Title`
        title: String,
    },
    /// Any other file, HDF companions included, labelled by kind
    Generic(&'static str),
}

/// Labels for numbered extensions, matched in order
const NUMBERED_ROLES: &[(&str, &str)] = &[
    ("g", "geometry-file"),
    ("p", "plan-file"),
    ("f", "steady-flow-file"),
    ("q", "quasi-unsteady-flow-file"),
    ("u", "unsteady-file"),
    ("r", "run-file"),
    ("x", "run-file"),
    ("hyd", "computational-level-output-file"),
    ("c", "geometric-preprocessor-output-file"),
    ("bco", "unsteady-flow-log-file"),
    ("b", "boundary-condition-file"),
    ("s", "sediment-data-file"),
    ("h", "hydraulic-design-file"),
    ("w", "water-quality-file"),
];

/// Labels for fixed extensions
const FIXED_ROLES: &[(&str, &str)] = &[
    ("prj", "projection-file"),
    ("dss", "ras-dss"),
    ("log", "ras-log"),
    ("rst", "restart-file"),
    ("sed", "sediment-output-file"),
    ("blf", "binary-log-file"),
    ("png", "thumbnail"),
    ("gpkg", "ras-geometry-gpkg"),
];

/// Label implied by an extension alone. A `.prj` is only a project file if
/// its text says so, see [`ModelFile::open`].
pub fn role_label(extension: &str) -> &'static str {
    NUMBERED_ROLES
        .iter()
        .find(|(prefix, _)| numbered(extension, prefix))
        .or_else(|| {
            FIXED_ROLES
                .iter()
                .find(|(ext, _)| ext.eq_ignore_ascii_case(extension))
        })
        .map_or("ras-file", |(_, label)| *label)
}

impl FileRole {
    /// Role label
    pub fn label(&self) -> &'static str {
        match self {
            FileRole::Project { .. } => "project-file",
            FileRole::Plan { .. } => "plan-file",
            FileRole::Geometry { .. } => "geometry-file",
            FileRole::SteadyFlow { .. } => "steady-flow-file",
            FileRole::Generic(label) => *label,
        }
    }

    /// Title record of a project, plan, geometry or steady flow file
    pub fn title(&self) -> Option<&str> {
        match self {
            FileRole::Project { title, .. }
            | FileRole::Plan { title, .. }
            | FileRole::Geometry { title, .. }
            | FileRole::SteadyFlow { title } => Some(title.as_str()),
            FileRole::Generic(_) => None,
        }
    }

    fn project(document: &RawDocument) -> Result<Self> {
        let block = document.block();
        Ok(FileRole::Project {
            title: block.value("Proj Title")?.trim().to_string(),
            plans: block
                .search_values("Plan File", KEY_TOKEN)
                .into_iter()
                .map(|plan| plan.trim().to_string())
                .collect(),
            current_plan: block
                .optional_value("Current Plan")?
                .map(|plan| plan.trim().to_string()),
        })
    }

    fn plan(document: &RawDocument) -> Result<Self> {
        let block = document.block();
        Ok(FileRole::Plan {
            title: block.value("Plan Title")?.trim().to_string(),
            geometry: block.value("Geom File")?.trim().to_string(),
            encroached: document
                .lines()
                .iter()
                .any(|line| line.contains("Encroach Node")),
        })
    }

    fn geometry(document: RawDocument) -> Result<Self> {
        let model = NetworkModel::new(document);
        let title = model.title()?.to_string();
        Ok(FileRole::Geometry { title, model })
    }

    fn steady_flow(document: &RawDocument) -> Result<Self> {
        Ok(FileRole::SteadyFlow {
            title: document.block().value("Flow Title")?.trim().to_string(),
        })
    }
}

impl fmt::Display for FileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// True if `extension` is `prefix` followed by exactly two digits
fn numbered(extension: &str, prefix: &str) -> bool {
    let Some(head) = extension.get(..prefix.len()) else {
        return false;
    };
    let digits = &extension[prefix.len()..];
    head.eq_ignore_ascii_case(prefix)
        && digits.len() == 2
        && digits.bytes().all(|b| b.is_ascii_digit())
}

/// One file of a model directory
#[derive(Debug)]
pub struct ModelFile {
    path: PathBuf,
    extension: String,
    hdf: bool,
    role: FileRole,
}

impl ModelFile {
    /// Classify a file. Project, plan, geometry and steady flow files are
    /// read and their records taken into the role; a missing title or
    /// plan geometry is an error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let (inner, hdf) = match name.strip_suffix(".hdf") {
            Some(inner) => (inner, true),
            None => (name.as_str(), false),
        };
        let extension = inner
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_string())
            .unwrap_or_default();

        let label = role_label(&extension);
        let role = match label {
            _ if hdf => FileRole::Generic(label),
            "projection-file" => {
                let document = RawDocument::from_path(path)?;
                let is_project = document
                    .lines()
                    .first()
                    .is_some_and(|line| line.contains("Proj Title"));
                if is_project {
                    FileRole::project(&document)?
                } else {
                    FileRole::Generic(label)
                }
            }
            "plan-file" => FileRole::plan(&RawDocument::from_path(path)?)?,
            "geometry-file" => FileRole::geometry(RawDocument::from_path(path)?)?,
            "steady-flow-file" => FileRole::steady_flow(&RawDocument::from_path(path)?)?,
            _ => FileRole::Generic(label),
        };

        trace!("Classified {} as {}{}", name, role, if hdf { " (hdf)" } else { "" });

        Ok(Self {
            path: path.to_path_buf(),
            extension,
            hdf,
            role,
        })
    }

    /// Path of the file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Extension that identifies the file within the project, e.g. `g01`
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Role of the file
    pub fn role(&self) -> &FileRole {
        &self.role
    }

    /// True for HDF5 companions such as `model.g01.hdf`
    pub fn is_hdf(&self) -> bool {
        self.hdf
    }

    /// Title of a project, plan, geometry or steady flow file
    pub fn title(&self) -> Option<&str> {
        self.role.title()
    }

    /// Network model of a geometry file
    pub fn model(&self) -> Option<&NetworkModel> {
        match &self.role {
            FileRole::Geometry { model, .. } => Some(model),
            _ => None,
        }
    }
}

/// The classified files of one model directory
#[derive(Debug, Default)]
pub struct ModelProject {
    files: Vec<ModelFile>,
}

impl ModelProject {
    /// Collects already classified files
    pub fn from_files(files: impl IntoIterator<Item = ModelFile>) -> Self {
        let files: Vec<ModelFile> = files.into_iter().collect();
        debug!("Model has {} files", files.len());
        Self { files }
    }

    /// All files in collection order
    pub fn files(&self) -> &[ModelFile] {
        &self.files
    }

    /// The single project file with its plan list
    pub fn project_file(&self) -> Result<(&ModelFile, &[String])> {
        let mut projects = self.files.iter().filter_map(|file| match &file.role {
            FileRole::Project { plans, .. } => Some((file, plans.as_slice())),
            _ => None,
        });
        match (projects.next(), projects.count()) {
            (Some(project), 0) => Ok(project),
            (None, _) => Err(Error::MissingProjectFile { found: 0 }),
            (Some(_), rest) => Err(Error::MissingProjectFile { found: rest + 1 }),
        }
    }

    /// The text file with the given extension
    pub fn file_by_extension(&self, extension: &str) -> Option<&ModelFile> {
        self.files
            .iter()
            .find(|file| !file.hdf && file.extension.eq_ignore_ascii_case(extension))
    }

    /// Plans listed by the project, in project order
    pub fn plans(&self) -> Result<Vec<PlanEntry<'_>>> {
        let (_, listed) = self.project_file()?;
        listed
            .iter()
            .map(|extension| {
                self.file_by_extension(extension)
                    .and_then(PlanEntry::from_file)
                    .ok_or_else(|| Error::MissingModelFile {
                        kind: "plan",
                        name: extension.clone(),
                    })
            })
            .collect()
    }

    /// The plan that best represents the model: the only plan, else the
    /// first plan without an encroachment analysis, else the first plan
    pub fn primary_plan(&self) -> Result<PlanEntry<'_>> {
        let plans = self.plans()?;
        let primary = match plans.as_slice() {
            [] => {
                return Err(Error::MissingModelFile {
                    kind: "plan",
                    name: "(none listed)".to_string(),
                })
            }
            [only] => *only,
            [first, ..] => plans
                .iter()
                .copied()
                .find(|plan| !plan.encroached)
                .unwrap_or(*first),
        };
        debug!("Primary plan is {}", primary.file.extension);
        Ok(primary)
    }

    /// The geometry file run by the primary plan
    pub fn primary_geometry(&self) -> Result<&ModelFile> {
        let extension = self.primary_plan()?.geometry;
        self.file_by_extension(extension)
            .filter(|file| file.model().is_some())
            .ok_or_else(|| Error::MissingModelFile {
                kind: "geometry",
                name: extension.to_string(),
            })
    }

    /// Network model of the primary geometry
    pub fn primary_model(&self) -> Result<&NetworkModel> {
        let geometry = self.primary_geometry()?;
        geometry.model().ok_or_else(|| Error::MissingModelFile {
            kind: "geometry",
            name: geometry.extension.clone(),
        })
    }

    /// True if any geometry text file in the directory has a 2D flow area
    pub fn has_2d_flow_area(&self) -> bool {
        self.files
            .iter()
            .filter_map(ModelFile::model)
            .any(NetworkModel::has_2d_flow_area)
    }
}

/// A plan file as listed by the project
#[derive(Debug, Clone, Copy)]
pub struct PlanEntry<'a> {
    /// The plan file
    pub file: &'a ModelFile,
    /// Extension of the geometry the plan runs
    pub geometry: &'a str,
    /// True if the plan runs an encroachment analysis
    pub encroached: bool,
}

impl<'a> PlanEntry<'a> {
    fn from_file(file: &'a ModelFile) -> Option<Self> {
        match &file.role {
            FileRole::Plan {
                geometry,
                encroached,
                ..
            } => Some(Self {
                file,
                geometry,
                encroached: *encroached,
            }),
            _ => None,
        }
    }
}
