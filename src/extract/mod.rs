//! Extraction pipeline driver
//!
//! Turns an OSM PBF extract (plus an optional density file) into the
//! node-based graph artifacts the contraction tooling consumes:
//! `<out>.osrm`, `<out>.osrm.restrictions` and `<out>.osrm.names`.

pub mod containers;
pub mod osm;

pub use containers::{
    ExtractionContainers, ExtractionEdge, NoopSegmentHook, RestrictionCandidate, SegmentHook,
    WaySegmentEndpoints, WeightData,
};

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::boundary::BoundaryList;
use crate::formats::NodeGraphWriter;

pub struct ExtractConfig {
    pub input: PathBuf,
    /// Base output path; companion files derive from it
    pub output: PathBuf,
    pub density: Option<PathBuf>,
}

pub struct ExtractResult {
    pub nodes: u32,
    pub edges: u64,
    pub restrictions: u32,
    pub graph_file: PathBuf,
    pub restrictions_file: PathBuf,
    pub names_file: PathBuf,
}

pub fn restrictions_path(output: &Path) -> PathBuf {
    let mut path = output.as_os_str().to_owned();
    path.push(".restrictions");
    PathBuf::from(path)
}

pub fn names_path(output: &Path) -> PathBuf {
    let mut path = output.as_os_str().to_owned();
    path.push(".names");
    PathBuf::from(path)
}

/// Run the full pipeline
pub fn run_extract(config: &ExtractConfig, hook: &dyn SegmentHook) -> Result<ExtractResult> {
    println!("Starting extraction");
    println!("  Input:  {}", config.input.display());
    println!("  Output: {}", config.output.display());
    println!();

    let boundaries = match &config.density {
        Some(path) => {
            let list = BoundaryList::open(path)
                .with_context(|| format!("Failed to load density file {}", path.display()))?;
            println!("Loaded density trees for {} countries", list.countries().len());
            list
        }
        None => {
            println!("No density file given; every edge start counts as out of town");
            BoundaryList::default()
        }
    };

    let mut containers =
        osm::read_pbf(&config.input).context("Failed to read the input extract")?;
    println!();

    let result = write_artifacts(&mut containers, config, hook, &boundaries)?;

    println!();
    println!("Extraction complete");
    Ok(result)
}

/// Serialise prepared containers; split from `run_extract` so tests can
/// drive synthetic inputs through the identical write path
pub fn write_artifacts(
    containers: &mut ExtractionContainers,
    config: &ExtractConfig,
    hook: &dyn SegmentHook,
    boundaries: &BoundaryList,
) -> Result<ExtractResult> {
    let graph_file = config.output.clone();
    let restrictions_file = restrictions_path(&config.output);
    let names_file = names_path(&config.output);

    let mut writer = NodeGraphWriter::create(&graph_file)
        .with_context(|| format!("Failed to create {}", graph_file.display()))?;

    containers.prepare_nodes()?;
    containers.write_nodes(&mut writer)?;
    containers.prepare_edges(hook, boundaries)?;
    let edges = containers.write_edges(&mut writer)?;

    containers.prepare_restrictions();
    let restrictions = containers.write_restrictions(&restrictions_file)?;
    containers.write_names(&names_file)?;

    Ok(ExtractResult {
        nodes: containers.max_internal_node_id(),
        edges,
        restrictions,
        graph_file,
        restrictions_file,
        names_file,
    })
}
