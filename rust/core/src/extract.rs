// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometry extraction
//!
//! Walks a [`Document`] depth-first and recovers polygon rings no matter
//! which structural variant the source uses:
//!
//! - `Polygon` → `exterior` → `LinearRing` → `posList`
//! - `Polygon` → `exterior` → `LinearRing` → `pos`, `pos`, ...
//! - `Polygon` → `posList` (no ring wrapper)
//!
//! Every `Building` subtree becomes one [`ExtractedGroup`]. Polygons found
//! outside any building become a group of their own.

use nalgebra::Point3;
use smallvec::SmallVec;
use tracing::debug;

use crate::document::{Document, Node, NodeKind, SurfaceKind};
use crate::error::Result;
use crate::positions::group_points;
use crate::ring::{RawRing, SurfaceFragment, SurfaceRole};

/// Options controlling how tolerant extraction is
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Reject position lists whose length is not a multiple of their
    /// dimension instead of silently dropping the partial tuple
    pub strict_positions: bool,
}

/// Where a group's identity comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    /// Fragments found inside a `Building` element, with its `gml:id`
    Building(Option<String>),
    /// A lone polygon outside any building, with its own `gml:id`
    Fragment(Option<String>),
}

/// Geometry recovered from one subtree
#[derive(Debug, Clone, Default)]
pub struct ExtractedGeometry {
    pub fragments: Vec<SurfaceFragment>,
    /// First valid footprint ring supplied by the source, if any
    pub hint_footprint: Option<RawRing>,
}

impl ExtractedGeometry {
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty() && self.hint_footprint.is_none()
    }
}

/// Geometry plus the identity it was found under
#[derive(Debug, Clone)]
pub struct ExtractedGroup {
    pub owner: Owner,
    pub geometry: ExtractedGeometry,
}

/// Counters for recoverable problems met during extraction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub polygons: usize,
    pub fragments: usize,
    pub invalid_rings: usize,
    pub dropped_fragments: usize,
    pub truncated_position_lists: usize,
}

impl ExtractionStats {
    pub fn merge(&mut self, other: &ExtractionStats) {
        self.polygons += other.polygons;
        self.fragments += other.fragments;
        self.invalid_rings += other.invalid_rings;
        self.dropped_fragments += other.dropped_fragments;
        self.truncated_position_lists += other.truncated_position_lists;
    }
}

/// Extraction result for a whole document
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub groups: Vec<ExtractedGroup>,
    pub stats: ExtractionStats,
}

/// Role context inherited from the nearest enclosing surface element
#[derive(Clone, Copy)]
struct Context<'a> {
    role: SurfaceRole,
    surface_id: Option<&'a str>,
}

const ROOT_CONTEXT: Context<'static> = Context {
    role: SurfaceRole::Untyped,
    surface_id: None,
};

fn role_of(kind: SurfaceKind) -> SurfaceRole {
    match kind {
        SurfaceKind::Roof => SurfaceRole::Roof,
        SurfaceKind::Wall => SurfaceRole::Wall,
        SurfaceKind::Ground => SurfaceRole::Ground,
        SurfaceKind::Footprint => SurfaceRole::FootprintHint,
    }
}

/// Depth-first extractor over the typed document tree
#[derive(Debug, Default)]
pub struct GeometryExtractor {
    options: ParseOptions,
    stats: ExtractionStats,
}

impl GeometryExtractor {
    pub fn new(options: ParseOptions) -> Self {
        Self {
            options,
            stats: ExtractionStats::default(),
        }
    }

    pub fn stats(&self) -> ExtractionStats {
        self.stats
    }

    /// Extract every building and loose polygon in document order
    pub fn extract(mut self, document: &Document) -> Result<Extraction> {
        let mut groups = Vec::new();
        self.visit_document(&document.root, ROOT_CONTEXT, &mut groups)?;
        Ok(Extraction {
            groups,
            stats: self.stats,
        })
    }

    fn visit_document<'a>(
        &mut self,
        node: &'a Node,
        ctx: Context<'a>,
        groups: &mut Vec<ExtractedGroup>,
    ) -> Result<()> {
        match &node.kind {
            NodeKind::Building => {
                let geometry = self.extract_subtree(node)?;
                if !geometry.is_empty() {
                    groups.push(ExtractedGroup {
                        owner: Owner::Building(node.id.clone()),
                        geometry,
                    });
                }
            }
            NodeKind::Polygon => {
                let mut geometry = ExtractedGeometry::default();
                self.collect_polygon(node, ctx, &mut geometry)?;
                if !geometry.is_empty() {
                    let id = geometry.fragments.first().and_then(|f| f.id.clone());
                    groups.push(ExtractedGroup {
                        owner: Owner::Fragment(id),
                        geometry,
                    });
                }
            }
            NodeKind::Surface(kind) => {
                let ctx = Context {
                    role: role_of(*kind),
                    surface_id: node.id.as_deref(),
                };
                for child in &node.children {
                    self.visit_document(child, ctx, groups)?;
                }
            }
            _ => {
                for child in &node.children {
                    self.visit_document(child, ctx, groups)?;
                }
            }
        }
        Ok(())
    }

    /// Collect every fragment below `node` plus the first usable footprint hint
    pub fn extract_subtree(&mut self, node: &Node) -> Result<ExtractedGeometry> {
        let mut geometry = ExtractedGeometry::default();
        self.visit_subtree(node, ROOT_CONTEXT, &mut geometry)?;
        Ok(geometry)
    }

    fn visit_subtree<'a>(
        &mut self,
        node: &'a Node,
        ctx: Context<'a>,
        out: &mut ExtractedGeometry,
    ) -> Result<()> {
        match &node.kind {
            NodeKind::Polygon => self.collect_polygon(node, ctx, out),
            NodeKind::Surface(kind) => {
                let ctx = Context {
                    role: role_of(*kind),
                    surface_id: node.id.as_deref(),
                };
                node.children
                    .iter()
                    .try_for_each(|child| self.visit_subtree(child, ctx, out))
            }
            _ => node
                .children
                .iter()
                .try_for_each(|child| self.visit_subtree(child, ctx, out)),
        }
    }

    fn collect_polygon(
        &mut self,
        polygon: &Node,
        ctx: Context<'_>,
        out: &mut ExtractedGeometry,
    ) -> Result<()> {
        self.stats.polygons += 1;

        let id = polygon
            .id
            .clone()
            .or_else(|| ctx.surface_id.map(str::to_string));

        let exterior = RawRing::from_points(self.exterior_points(polygon)?);
        if !exterior.is_valid() {
            self.stats.invalid_rings += 1;
            self.stats.dropped_fragments += 1;
            debug!(
                polygon = id.as_deref().unwrap_or("<anonymous>"),
                points = exterior.len(),
                "dropping fragment with degenerate exterior ring"
            );
            return Ok(());
        }

        let mut interiors: SmallVec<[RawRing; 2]> = SmallVec::new();
        for boundary in polygon
            .children
            .iter()
            .filter(|c| c.kind == NodeKind::Interior)
        {
            let mut points = Vec::new();
            self.collect_points(boundary, &mut points)?;
            let ring = RawRing::from_points(points);
            if ring.is_valid() {
                interiors.push(ring);
            } else {
                self.stats.invalid_rings += 1;
                debug!(
                    polygon = id.as_deref().unwrap_or("<anonymous>"),
                    "skipping degenerate interior ring"
                );
            }
        }

        if ctx.role == SurfaceRole::FootprintHint && out.hint_footprint.is_none() {
            out.hint_footprint = Some(exterior.clone());
        }

        self.stats.fragments += 1;
        out.fragments.push(SurfaceFragment {
            exterior,
            interiors,
            role: ctx.role,
            id,
        });
        Ok(())
    }

    /// Exterior boundary, falling back to a position list attached directly
    /// to the polygon
    fn exterior_points(&mut self, polygon: &Node) -> Result<Vec<Point3<f64>>> {
        let mut points = Vec::new();
        if let Some(exterior) = polygon.child_where(|k| *k == NodeKind::Exterior) {
            self.collect_points(exterior, &mut points)?;
        }
        if points.is_empty() {
            for list in polygon.children.iter().filter(|c| c.positions().is_some()) {
                self.collect_points(list, &mut points)?;
            }
        }
        Ok(points)
    }

    /// Append all positions below `node` in document order
    fn collect_points(&mut self, node: &Node, out: &mut Vec<Point3<f64>>) -> Result<()> {
        if let Some(list) = node.positions() {
            let (points, truncated) =
                group_points(&list.values, list.dimension, self.options.strict_positions)?;
            if truncated {
                self.stats.truncated_position_lists += 1;
                debug!(
                    values = list.values.len(),
                    dimension = list.dimension,
                    "discarding partial trailing tuple in position list"
                );
            }
            out.extend(points);
            return Ok(());
        }
        for child in &node.children {
            self.collect_points(child, out)?;
        }
        Ok(())
    }
}
