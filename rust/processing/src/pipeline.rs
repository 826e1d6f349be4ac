// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-file processing and run driver
//!
//! Files are handled one at a time in file-name order: parse, extract,
//! assemble. The footprint registry is shared by all files so duplicate
//! detection covers the whole run. Artifacts are written once at the end.

use crate::assembler::{Assembly, AssemblyStats, BuildingAssembler, FootprintRegistry};
use crate::building::Building;
use crate::config::PipelineConfig;
use crate::container::write_glb;
use crate::error::{Error, Result};
use crate::footprints::write_footprints;
use crate::spatial_index::build_index;
use citymesh_core::{Document, ExtractionStats, GeometryExtractor, ParseOptions};
use citymesh_geometry::Reprojector;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

pub const FOOTPRINTS_FILE: &str = "footprints.geojson";
pub const INDEX_FILE: &str = "index.bin";
pub const INDEX_IDS_FILE: &str = "index_ids.json";
pub const CONTAINER_FILE: &str = "buildings.glb";

/// What happened to one input file
#[derive(Debug, Clone)]
pub enum FileOutcome {
    Processed {
        path: PathBuf,
        buildings: usize,
        extraction: ExtractionStats,
        assembly: AssemblyStats,
    },
    /// Parsed fine but yielded no buildings
    Empty { path: PathBuf },
    Failed { path: PathBuf, error: String },
}

/// Totals for a whole run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub outcomes: Vec<FileOutcome>,
    pub buildings: usize,
    pub with_mesh: usize,
    pub extraction: ExtractionStats,
    pub assembly: AssemblyStats,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, FileOutcome::Failed { .. }))
            .count()
    }

    pub fn empty(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, FileOutcome::Empty { .. }))
            .count()
    }
}

/// Result of processing one file
#[derive(Debug, Clone, Default)]
pub struct FileResult {
    pub assembly: Assembly,
    pub extraction: ExtractionStats,
}

fn is_document(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map_or(false, |ext| {
            ext.eq_ignore_ascii_case("gml") || ext.eq_ignore_ascii_case("xml")
        })
}

/// The input file itself, or the `.gml`/`.xml` files directly inside a
/// directory, sorted by file name
pub fn collect_inputs(input: &Path) -> Result<Vec<PathBuf>> {
    if !input.is_dir() {
        // Surface a missing path as an I/O error
        fs::metadata(input)?;
        return Ok(vec![input.to_path_buf()]);
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(input)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if entry.file_type().is_file() && is_document(entry.path()) {
            paths.push(entry.into_path());
        }
    }
    Ok(paths)
}

/// Identity scope for synthesized ids of one file
fn file_scope(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Parse, extract and assemble a single document
pub fn process_file(
    path: &Path,
    reprojector: &Reprojector,
    config: &PipelineConfig,
    registry: &mut FootprintRegistry,
) -> Result<FileResult> {
    let document = Document::from_path(path)?;
    process_document(&document, &file_scope(path), reprojector, config, registry)
}

/// Extract and assemble an already parsed document
pub fn process_document(
    document: &Document,
    scope: &str,
    reprojector: &Reprojector,
    config: &PipelineConfig,
    registry: &mut FootprintRegistry,
) -> Result<FileResult> {
    let extraction = extract(document, config.parse)?;

    let mut assembler = BuildingAssembler::new(scope, reprojector, config.mode);
    for group in extraction.groups {
        assembler.push(group);
    }
    let assembly = assembler.finish(registry)?;

    Ok(FileResult {
        assembly,
        extraction: extraction.stats,
    })
}

fn extract(document: &Document, options: ParseOptions) -> Result<citymesh_core::Extraction> {
    Ok(GeometryExtractor::new(options).extract(document)?)
}

/// Process every input and write the artifacts
pub fn run(config: &PipelineConfig) -> Result<RunSummary> {
    let start = Instant::now();
    let reprojector = Reprojector::new(&config.projection)?;
    let inputs = collect_inputs(&config.input)?;
    tracing::info!(files = inputs.len(), input = %config.input.display(), mode = ?config.mode, "Starting run");

    let mut registry = FootprintRegistry::new();
    let mut summary = RunSummary::default();
    let mut buildings: Vec<Building> = Vec::new();

    for path in &inputs {
        let file_start = Instant::now();
        match process_file(path, &reprojector, config, &mut registry) {
            Ok(result) => {
                let count = result.assembly.buildings.len();
                summary.extraction.merge(&result.extraction);
                summary.assembly.merge(&result.assembly.stats);

                if count == 0 {
                    tracing::warn!(path = %path.display(), "No buildings extracted from file");
                    summary.outcomes.push(FileOutcome::Empty { path: path.clone() });
                } else {
                    let stats = result.assembly.stats;
                    tracing::info!(
                        path = %path.display(),
                        buildings = count,
                        polygons = result.extraction.polygons,
                        invalid_rings = result.extraction.invalid_rings,
                        truncated = result.extraction.truncated_position_lists,
                        duplicates = stats.duplicates,
                        renamed = stats.renamed,
                        degenerate_fragments = stats.degenerate_fragments,
                        time_ms = file_start.elapsed().as_millis(),
                        "File processed"
                    );
                    summary.outcomes.push(FileOutcome::Processed {
                        path: path.clone(),
                        buildings: count,
                        extraction: result.extraction,
                        assembly: stats,
                    });
                }
                buildings.extend(result.assembly.buildings);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to process file");
                summary.outcomes.push(FileOutcome::Failed {
                    path: path.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    if buildings.is_empty() {
        return Err(Error::NoBuildings {
            files: inputs.len(),
        });
    }

    write_artifacts(&config.output_dir, &buildings, config.node_size)?;

    summary.buildings = buildings.len();
    summary.with_mesh = buildings.iter().filter(|b| b.mesh.is_some()).count();
    tracing::info!(
        buildings = summary.buildings,
        with_mesh = summary.with_mesh,
        duplicates = summary.assembly.duplicates,
        renamed = summary.assembly.renamed,
        failed_files = summary.failed(),
        empty_files = summary.empty(),
        total_time_ms = start.elapsed().as_millis(),
        "Run complete"
    );
    Ok(summary)
}

/// Write footprints, spatial index, id list and GLB into `output_dir`
pub fn write_artifacts(output_dir: &Path, buildings: &[Building], node_size: u16) -> Result<()> {
    fs::create_dir_all(output_dir)?;

    let mut footprints = BufWriter::new(File::create(output_dir.join(FOOTPRINTS_FILE))?);
    write_footprints(&mut footprints, buildings)?;
    footprints.flush()?;

    let (index, ids) = build_index(buildings, node_size)?;
    fs::write(output_dir.join(INDEX_FILE), index.to_bytes())?;
    fs::write(output_dir.join(INDEX_IDS_FILE), serde_json::to_vec(&ids)?)?;

    let glb = write_glb(buildings)?;
    fs::write(output_dir.join(CONTAINER_FILE), &glb)?;

    tracing::info!(
        output_dir = %output_dir.display(),
        buildings = buildings.len(),
        index_items = index.num_items(),
        glb_bytes = glb.len(),
        "Artifacts written"
    );
    Ok(())
}
