// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CityMesh command line entry.
//!
//! Every option also reads a `CITYMESH_*` environment variable; log
//! filtering comes from `RUST_LOG`.

use std::path::PathBuf;
use std::process::ExitCode;

use citymesh_geometry::ProjectionConfig;
use citymesh_processing::config::{DEFAULT_SOURCE_EPSG, DEFAULT_TARGET_EPSG};
use citymesh_processing::spatial_index::DEFAULT_NODE_SIZE;
use citymesh_processing::{parse_recenter, resolve_crs, run, MeshMode, PipelineConfig, Result};
use clap::Parser;

/// Convert CityGML building documents into footprints, a spatial index and a GLB
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Input document or directory of documents
    input: PathBuf,

    /// Directory the artifacts are written to
    output_dir: PathBuf,

    /// Mesh generation mode
    #[arg(long, value_enum, default_value_t = MeshMode::Massing, env = "CITYMESH_MODE")]
    mode: MeshMode,

    /// EPSG code of the source coordinates
    #[arg(long, default_value_t = DEFAULT_SOURCE_EPSG, env = "CITYMESH_SOURCE_EPSG")]
    source_epsg: u32,

    /// EPSG code of the output coordinates
    #[arg(long, default_value_t = DEFAULT_TARGET_EPSG, env = "CITYMESH_TARGET_EPSG")]
    target_epsg: u32,

    /// PROJ definition of the source CRS, overrides --source-epsg
    #[arg(long, env = "CITYMESH_SOURCE_PROJ")]
    source_proj: Option<String>,

    /// PROJ definition of the target CRS, overrides --target-epsg
    #[arg(long, env = "CITYMESH_TARGET_PROJ")]
    target_proj: Option<String>,

    /// Source point ("x,y") moved to the target origin
    #[arg(long, value_parser = parse_recenter, env = "CITYMESH_RECENTER")]
    recenter: Option<(f64, f64)>,

    /// Reject position lists whose length is not a multiple of the dimension
    #[arg(
        long,
        env = "CITYMESH_STRICT_POSITIONS",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    strict_positions: bool,

    /// Spatial index node size
    #[arg(
        long,
        default_value_t = DEFAULT_NODE_SIZE,
        env = "CITYMESH_NODE_SIZE",
        value_parser = clap::value_parser!(u16).range(2..)
    )]
    node_size: u16,
}

impl Cli {
    fn into_config(self) -> Result<PipelineConfig> {
        let source = resolve_crs(self.source_epsg, self.source_proj.as_deref())?;
        let target = resolve_crs(self.target_epsg, self.target_proj.as_deref())?;
        let mut projection = ProjectionConfig::new(source, target);
        if let Some((x, y)) = self.recenter {
            projection = projection.with_recenter(x, y);
        }

        PipelineConfig::new(self.input, self.output_dir, self.mode)?
            .with_projection(projection)
            .with_strict_positions(self.strict_positions)
            .with_node_size(self.node_size)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()))
        .init();

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::from(2);
        }
    };

    match run(&config) {
        Ok(summary) => {
            tracing::info!(
                buildings = summary.buildings,
                failed_files = summary.failed(),
                "Done"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Run failed");
            ExitCode::FAILURE
        }
    }
}
