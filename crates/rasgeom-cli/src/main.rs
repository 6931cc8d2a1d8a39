//! rasgeom - Summarize HEC-RAS geometry files and model directories
//!
//! Reads a single geometry file, or a model directory whose project file
//! selects the geometry, and reports the network it describes: counts,
//! river miles, extent, centroid and footprint.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, ValueEnum};
use geo::{Area, MultiPolygon, Point, Rect};
use rasgeom_core::{
    Error as ModelError, FileRole, ModelConfig, ModelFile, ModelProject, NetworkModel,
    RawDocument, ReferenceSystem,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Summarize HEC-RAS geometry files and model directories
#[derive(Parser, Debug)]
#[command(name = "rasgeom")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    input: InputMode,

    /// Coordinate reference system of the geometry (PROJ string or WKT)
    #[arg(long, env = "RASGEOM_CRS", conflicts_with = "crs_file")]
    crs: Option<String>,

    /// File holding the coordinate reference system (e.g. an ESRI .prj)
    #[arg(long, value_name = "PATH")]
    crs_file: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Leave junction hulls out of the footprint
    #[arg(long)]
    no_junction_hulls: bool,

    /// Decimal places for river miles
    #[arg(long, default_value = "2")]
    precision: u32,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a single geometry file (.gNN)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a model directory containing one project file
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

/// Output format for the summary
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable report
    Text,
    /// JSON document with geometries
    Json,
}

/// Everything reported for one geometry file
#[derive(Debug, Serialize)]
struct GeometrySummary {
    title: String,
    program_version: Option<String>,
    units: &'static str,
    last_update: Option<String>,
    rivers: usize,
    reaches: usize,
    junctions: usize,
    cross_sections: usize,
    structures: usize,
    has_2d: bool,
    reference_system: Option<String>,
    river_miles: Option<f64>,
    bounding_rect: Option<Rect<f64>>,
    centroid: Option<Point<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    footprint: Option<MultiPolygon<f64>>,
}

/// Project-level details for directory mode
#[derive(Debug, Serialize)]
struct ProjectSummary {
    title: Option<String>,
    primary_plan: String,
    primary_geometry: String,
    assets: Vec<AssetSummary>,
}

/// One file of a model directory
#[derive(Debug, Serialize)]
struct AssetSummary {
    name: String,
    role: &'static str,
    hdf: bool,
    title: Option<String>,
    size: u64,
    checksum: String,
}

#[derive(Debug, Serialize)]
struct Report {
    #[serde(skip_serializing_if = "Option::is_none")]
    project: Option<ProjectSummary>,
    geometry: GeometrySummary,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Dispatch based on input mode
    let report = if let Some(ref file) = cli.input.file {
        process_single_file(&cli, file)?
    } else if let Some(ref directory) = cli.input.directory {
        process_directory(&cli, directory)?
    } else {
        bail!("Either --file or --directory must be specified")
    };

    match cli.format {
        OutputFormat::Text => print!("{}", render_text(&report)),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize summary")?
        ),
    }

    Ok(())
}

/// Summarize a single geometry file
fn process_single_file(cli: &Cli, file: &Path) -> Result<Report> {
    if !file.exists() {
        bail!("Input file does not exist: {}", file.display());
    }
    if !file.is_file() {
        bail!("Input path is not a file: {}", file.display());
    }

    trace!("Reading {}", file.display());
    let document = RawDocument::from_path(file)
        .with_context(|| format!("Failed to read geometry file: {}", file.display()))?;
    debug!("Read {} lines from {}", document.len(), file.display());

    let config = model_config(cli, explicit_reference_system(cli)?);
    let model = NetworkModel::with_config(document, config);
    let geometry = summarize(&model, matches!(cli.format, OutputFormat::Json))
        .with_context(|| format!("Failed to summarize {}", file.display()))?;

    Ok(Report {
        project: None,
        geometry,
    })
}

/// Summarize the primary geometry of a model directory
fn process_directory(cli: &Cli, directory: &Path) -> Result<Report> {
    if !directory.exists() {
        bail!("Directory does not exist: {}", directory.display());
    }
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());

    let mut files = Vec::new();
    for entry in WalkDir::new(directory)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        // Skip directories
        if !path.is_file() {
            continue;
        }

        // Skip hidden files
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(false)
        {
            continue;
        }

        match ModelFile::open(path) {
            Ok(file) => files.push(file),
            // Log error but continue with other files
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }

    info!("Classified {} files", files.len());
    let project = ModelProject::from_files(files);

    let (project_file, _) = project.project_file()?;
    let plan = project.primary_plan()?;
    let geometry_file = project.primary_geometry()?;
    info!(
        "Primary plan {} runs geometry {}",
        plan.file.extension(),
        geometry_file.extension()
    );

    let crs = match explicit_reference_system(cli)? {
        Some(crs) => Some(crs),
        None => directory_reference_system(&project)?,
    };

    let model = project.primary_model()?.reconfigured(model_config(cli, crs));
    let mut geometry = summarize(&model, matches!(cli.format, OutputFormat::Json)).with_context(|| {
        format!("Failed to summarize {}", geometry_file.path().display())
    })?;
    // 2D areas may live in a geometry the primary plan does not run
    geometry.has_2d = project.has_2d_flow_area();

    let assets = project
        .files()
        .iter()
        .map(asset_summary)
        .collect::<Result<Vec<_>>>()?;

    Ok(Report {
        project: Some(ProjectSummary {
            title: project_file.title().map(str::to_string),
            primary_plan: plan.file.extension().to_string(),
            primary_geometry: geometry_file.extension().to_string(),
            assets,
        }),
        geometry,
    })
}

/// Reference system given on the command line
fn explicit_reference_system(cli: &Cli) -> Result<Option<ReferenceSystem>> {
    if let Some(ref crs) = cli.crs {
        return Ok(Some(ReferenceSystem::new(crs.trim())));
    }
    if let Some(ref path) = cli.crs_file {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read CRS file: {}", path.display()))?;
        return Ok(Some(ReferenceSystem::new(text.trim())));
    }
    Ok(None)
}

/// Reference system from the first projection file in a model directory
fn directory_reference_system(project: &ModelProject) -> Result<Option<ReferenceSystem>> {
    let Some(projection) = project
        .files()
        .iter()
        .find(|file| matches!(file.role(), FileRole::Generic("projection-file")))
    else {
        return Ok(None);
    };
    debug!("Using projection from {}", projection.path().display());
    let text = fs::read_to_string(projection.path())
        .with_context(|| format!("Failed to read {}", projection.path().display()))?;
    Ok(Some(ReferenceSystem::new(text.trim())))
}

fn model_config(cli: &Cli, crs: Option<ReferenceSystem>) -> ModelConfig {
    let mut config = ModelConfig::new()
        .junction_hulls(!cli.no_junction_hulls)
        .length_precision(cli.precision);
    config.reference_system = crs;
    config
}

/// Collect the report for one model. Geometry fields are left empty when no
/// reference system is known; river miles are left empty when its linear
/// unit cannot be determined.
fn summarize(model: &NetworkModel, include_footprint: bool) -> Result<GeometrySummary> {
    let has_crs = model.reference_system().is_some();
    if !has_crs {
        warn!("No coordinate reference system given; geometry fields are omitted");
    }

    let river_miles = if has_crs {
        match model.river_miles() {
            Ok(miles) => Some(miles),
            Err(e @ ModelError::UnsupportedLinearUnit { .. }) => {
                warn!("River miles unavailable: {}", e);
                None
            }
            Err(e) => return Err(e.into()),
        }
    } else {
        None
    };

    let (bounding_rect, centroid, footprint) = if has_crs {
        let footprint = model.footprint_polygon()?;
        debug!(
            "Footprint has {} parts, area {:.1}",
            footprint.0.len(),
            footprint.unsigned_area()
        );
        (
            model.bounding_rect()?,
            model.centroid()?,
            include_footprint.then(|| footprint.clone()),
        )
    } else {
        (None, None, None)
    };

    Ok(GeometrySummary {
        title: model.title()?.to_string(),
        program_version: model.program_version().map(str::to_string),
        units: model.units().as_str(),
        last_update: model.last_update()?.map(|t| t.to_string()),
        rivers: model.n_rivers()?,
        reaches: model.n_reaches()?,
        junctions: model.n_junctions()?,
        cross_sections: model.n_cross_sections()?,
        structures: model.n_structures()?,
        has_2d: model.has_2d_flow_area(),
        reference_system: model.reference_system().map(|crs| crs.to_string()),
        river_miles,
        bounding_rect,
        centroid,
        footprint,
    })
}

/// Compute a short hash of the content (first 16 chars of blake3)
fn content_hash(data: &[u8]) -> String {
    let hash = blake3::hash(data);
    hash.to_hex()[..16].to_string()
}

fn asset_summary(file: &ModelFile) -> Result<AssetSummary> {
    let data = fs::read(file.path())
        .with_context(|| format!("Failed to read {}", file.path().display()))?;
    Ok(AssetSummary {
        name: file
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        role: file.role().label(),
        hdf: file.is_hdf(),
        title: file.title().map(str::to_string),
        size: data.len() as u64,
        checksum: content_hash(&data),
    })
}

fn render_text(report: &Report) -> String {
    let mut out = String::new();
    let mut line = |label: &str, value: String| {
        out.push_str(&format!("{label:<16}{value}\n"));
    };

    if let Some(ref project) = report.project {
        line("Project", project.title.clone().unwrap_or_default());
        line("Primary plan", project.primary_plan.clone());
        line("Geometry", project.primary_geometry.clone());
        line("Files", project.assets.len().to_string());
    }

    let g = &report.geometry;
    line("Title", g.title.clone());
    line("Version", g.program_version.clone().unwrap_or_else(|| "-".into()));
    line("Units", g.units.to_string());
    line("Last edited", g.last_update.clone().unwrap_or_else(|| "-".into()));
    line("Rivers", g.rivers.to_string());
    line("Reaches", g.reaches.to_string());
    line("Junctions", g.junctions.to_string());
    line("Cross sections", g.cross_sections.to_string());
    line("Structures", g.structures.to_string());
    line("2D flow areas", if g.has_2d { "yes" } else { "no" }.to_string());
    line(
        "River miles",
        g.river_miles.map(|m| m.to_string()).unwrap_or_else(|| "-".into()),
    );
    line(
        "Extent",
        g.bounding_rect
            .map(|r| {
                format!(
                    "{:.3} {:.3} {:.3} {:.3}",
                    r.min().x,
                    r.min().y,
                    r.max().x,
                    r.max().y
                )
            })
            .unwrap_or_else(|| "-".into()),
    );
    line(
        "Centroid",
        g.centroid
            .map(|p| format!("{:.3} {:.3}", p.x(), p.y()))
            .unwrap_or_else(|| "-".into()),
    );

    if let Some(ref project) = report.project {
        out.push('\n');
        for asset in &project.assets {
            out.push_str(&format!(
                "{}  {:<36} {:<28} {}\n",
                asset.checksum,
                asset.name,
                asset.role,
                asset.title.as_deref().unwrap_or("")
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const GEOMETRY: &str = include_str!("../../rasgeom-core/tests/data/butte_creek.g01");

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["rasgeom"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    fn model_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        let write = |name: &str, text: &str| fs::write(dir.path().join(name), text).unwrap();
        write("demo.prj", "Proj Title=Demo\nCurrent Plan=p01\nPlan File=p01\n");
        write("demo.p01", "Plan Title=Existing\nGeom File=g01\n");
        write("demo.g01", GEOMETRY);
        write(
            "demo_projection.prj",
            "PROJCS[\"NAD_1983_StatePlane_Texas_Central_FIPS_4203_Feet\",GEOGCS[\"GCS_North_American_1983\",UNIT[\"Degree\",0.0174532925199433]],UNIT[\"Foot_US\",0.3048006096012192]]",
        );
        write(".hidden", "ignored");
        dir
    }

    #[test]
    fn test_content_hash() {
        let hash1 = content_hash(b"hello");
        let hash2 = content_hash(b"hello");
        let hash3 = content_hash(b"world");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
        assert_eq!(hash1.len(), 16);
    }

    #[test]
    fn test_single_file_without_crs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("demo.g01");
        fs::write(&path, GEOMETRY).unwrap();

        let cli = cli(&["--file", path.to_str().unwrap()]);
        let report = process_single_file(&cli, &path).unwrap();
        assert!(report.project.is_none());
        assert_eq!(report.geometry.reaches, 3);
        assert_eq!(report.geometry.river_miles, None);
        assert!(report.geometry.bounding_rect.is_none());
    }

    #[test]
    fn test_single_file_with_crs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("demo.g01");
        fs::write(&path, GEOMETRY).unwrap();

        let cli = cli(&["--file", path.to_str().unwrap(), "--crs", "+proj=utm +units=us-ft"]);
        let report = process_single_file(&cli, &path).unwrap();
        assert_eq!(report.geometry.river_miles, Some(1.0));
        assert!(report.geometry.centroid.is_some());
        assert!(report.geometry.footprint.is_none());

        let text = render_text(&report);
        assert!(text.contains("River miles     1"));
    }

    #[test]
    fn test_directory_uses_projection_file() {
        let dir = model_dir();
        let cli = cli(&["--directory", dir.path().to_str().unwrap(), "--format", "json"]);
        let report = process_directory(&cli, dir.path()).unwrap();

        let project = report.project.as_ref().unwrap();
        assert_eq!(project.title.as_deref(), Some("Demo"));
        assert_eq!(project.primary_plan, "p01");
        assert_eq!(project.primary_geometry, "g01");
        assert_eq!(project.assets.len(), 4);
        assert!(!report.geometry.has_2d);
        assert_eq!(report.geometry.river_miles, Some(1.0));
        assert!(report.geometry.footprint.is_some());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["geometry"]["reaches"], 3);
        assert_eq!(json["project"]["primary_geometry"], "g01");
    }

    #[test]
    fn test_directory_2d_flag_covers_every_geometry() {
        let dir = model_dir();
        fs::write(
            dir.path().join("demo.g02"),
            "Geom Title=Overbank\nStorage Area Is2D=-1\n",
        )
        .unwrap();
        let cli = cli(&["--directory", dir.path().to_str().unwrap()]);
        let report = process_directory(&cli, dir.path()).unwrap();

        let project = report.project.as_ref().unwrap();
        assert_eq!(project.primary_geometry, "g01");
        assert_eq!(project.assets.len(), 5);
        assert_eq!(report.geometry.title, "Butte Creek Demo");
        assert!(report.geometry.has_2d);
        assert!(render_text(&report).contains("2D flow areas   yes"));
    }

    #[test]
    fn test_directory_without_project() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("demo.g01"), GEOMETRY).unwrap();
        let cli = cli(&["--directory", dir.path().to_str().unwrap()]);
        let err = process_directory(&cli, dir.path()).unwrap_err();
        assert!(err.to_string().contains("project file"));
    }

    #[test]
    fn test_crs_flags_conflict() {
        let result = Cli::try_parse_from(["rasgeom", "-f", "a.g01", "--crs", "x", "--crs-file", "y"]);
        assert!(result.is_err());
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
