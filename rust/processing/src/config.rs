// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pipeline configuration.
//!
//! The command line fills a [`PipelineConfig`] through clap (flags with
//! `CITYMESH_*` environment fallbacks); library callers can use
//! [`PipelineConfig::from_env`] or the builder methods directly.

use crate::error::{Error, Result};
use crate::spatial_index::DEFAULT_NODE_SIZE;
use citymesh_core::ParseOptions;
use citymesh_geometry::{CrsDefinition, ProjectionConfig};
use clap::ValueEnum;
use std::path::PathBuf;

pub const DEFAULT_SOURCE_EPSG: u32 = 2263;
pub const DEFAULT_TARGET_EPSG: u32 = 32618;

/// How building meshes are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum MeshMode {
    /// Triangulate every roof, wall and ground surface
    Detailed,
    /// Extrude the footprint to the building height
    #[default]
    Massing,
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Input document or directory of documents.
    pub input: PathBuf,
    /// Directory the artifacts are written to.
    pub output_dir: PathBuf,
    pub mode: MeshMode,
    /// Source/target projections and optional recenter point.
    pub projection: ProjectionConfig,
    pub parse: ParseOptions,
    /// Spatial index node size.
    pub node_size: u16,
}

impl PipelineConfig {
    /// Build a configuration with default projections and options.
    pub fn new(input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>, mode: MeshMode) -> Result<Self> {
        Ok(Self {
            input: input.into(),
            output_dir: output_dir.into(),
            mode,
            projection: ProjectionConfig::from_epsg(DEFAULT_SOURCE_EPSG, DEFAULT_TARGET_EPSG)?,
            parse: ParseOptions::default(),
            node_size: DEFAULT_NODE_SIZE,
        })
    }

    pub fn with_projection(mut self, projection: ProjectionConfig) -> Self {
        self.projection = projection;
        self
    }

    pub fn with_strict_positions(mut self, strict: bool) -> Self {
        self.parse.strict_positions = strict;
        self
    }

    /// Set the spatial index node size (at least 2)
    pub fn with_node_size(mut self, node_size: u16) -> Result<Self> {
        if node_size < 2 {
            return Err(Error::InvalidConfig(format!(
                "node size must be at least 2, got {}",
                node_size
            )));
        }
        self.node_size = node_size;
        Ok(self)
    }

    /// Load configuration from environment variables.
    pub fn from_env(input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>, mode: MeshMode) -> Result<Self> {
        Self::from_lookup(input, output_dir, mode, |key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(
        input: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        mode: MeshMode,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let source_epsg: u32 = parse_var(&lookup, "CITYMESH_SOURCE_EPSG")?.unwrap_or(DEFAULT_SOURCE_EPSG);
        let target_epsg: u32 = parse_var(&lookup, "CITYMESH_TARGET_EPSG")?.unwrap_or(DEFAULT_TARGET_EPSG);
        let source = resolve_crs(source_epsg, lookup("CITYMESH_SOURCE_PROJ").as_deref())?;
        let target = resolve_crs(target_epsg, lookup("CITYMESH_TARGET_PROJ").as_deref())?;

        let mut projection = ProjectionConfig::new(source, target);
        if let Some(value) = lookup("CITYMESH_RECENTER") {
            let (x, y) = parse_recenter(&value).map_err(Error::InvalidConfig)?;
            projection = projection.with_recenter(x, y);
        }

        let strict_positions = lookup("CITYMESH_STRICT_POSITIONS")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);
        let node_size: u16 = parse_var(&lookup, "CITYMESH_NODE_SIZE")?.unwrap_or(DEFAULT_NODE_SIZE);

        Self::new(input, output_dir, mode)?
            .with_projection(projection)
            .with_strict_positions(strict_positions)
            .with_node_size(node_size)
    }
}

/// A PROJ definition when given, otherwise the EPSG code
pub fn resolve_crs(epsg: u32, definition: Option<&str>) -> Result<CrsDefinition> {
    match definition {
        Some(definition) => CrsDefinition::from_proj_string(definition),
        None => CrsDefinition::from_epsg(epsg),
    }
    .map_err(|e| Error::InvalidConfig(e.to_string()))
}

/// Parse an `x,y` recenter point in source units
pub fn parse_recenter(value: &str) -> std::result::Result<(f64, f64), String> {
    let invalid = || format!("recenter point must be \"x,y\", got {:?}", value);
    let (x, y) = value.split_once(',').ok_or_else(invalid)?;
    let x: f64 = x.trim().parse().map_err(|_| invalid())?;
    let y: f64 = y.trim().parse().map_err(|_| invalid())?;
    if !(x.is_finite() && y.is_finite()) {
        return Err(invalid());
    }
    Ok((x, y))
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::InvalidConfig(format!("{} has invalid value {:?}", key, value))),
    }
}
