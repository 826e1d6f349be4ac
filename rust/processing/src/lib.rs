// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # CityMesh Processing
//!
//! Turns extracted building geometry into web-ready artifacts:
//!
//! - **Assembly**: fragments are grouped into buildings, measured, and
//!   deduplicated by exact footprint ([`BuildingAssembler`])
//! - **Spatial index**: a sealed packed Hilbert R-tree over footprint
//!   bounds plus an id list in the same order ([`PackedRTree`])
//! - **Mesh container**: one GLB with a node per building ([`write_glb`])
//! - **Footprints**: a GeoJSON FeatureCollection ([`write_footprints`])
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use citymesh_processing::{run, MeshMode, PipelineConfig};
//!
//! let config = PipelineConfig::from_env("data/", "out/", MeshMode::Massing)?;
//! let summary = run(&config)?;
//! println!("{} buildings", summary.buildings);
//! ```

pub mod assembler;
pub mod building;
pub mod config;
pub mod container;
pub mod error;
pub mod footprints;
pub mod pipeline;
pub mod spatial_index;

pub use assembler::{Assembly, AssemblyStats, BuildingAssembler, FootprintRegistry};
pub use building::{Aabb, Building};
pub use config::{parse_recenter, resolve_crs, MeshMode, PipelineConfig};
pub use container::{read_glb_header, write_glb, BufferRegion, BufferWriter, GlbHeader};
pub use error::{Error, Result};
pub use footprints::write_footprints;
pub use pipeline::{
    collect_inputs, process_document, process_file, run, write_artifacts, FileOutcome,
    FileResult, RunSummary,
};
pub use spatial_index::{build_index, PackedRTree, PackedRTreeBuilder};
