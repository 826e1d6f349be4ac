// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Building assembly and footprint deduplication
//!
//! Extracted groups are merged by resolved identity, in document order:
//!
//! 1. the `gml:id` of the enclosing building
//! 2. the polygon or surface `gml:id` of a loose fragment
//! 3. a synthesized `{file_scope}#{counter}` id
//!
//! `#` cannot occur in an XML id, so synthesized ids never meet a source id.
//! Each merged group yields height, footprint and (after dedup) a mesh.

use crate::building::{
    footprint_area, footprint_key, is_usable_footprint, open_ring, round_centimeters, Building,
};
use crate::config::MeshMode;
use crate::error::Result;
use citymesh_core::{ExtractedGeometry, ExtractedGroup, Owner, RawRing, SurfaceFragment, SurfaceRole};
use citymesh_geometry::{
    extrude_footprint, triangulate_polygon_3d, Mesh, Point2, Point3, Reprojector, Vector3,
};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

/// Footprint keys and building ids already emitted, shared by every file of
/// a run
#[derive(Debug, Default)]
pub struct FootprintRegistry {
    kept: FxHashMap<String, String>,
    ids: FxHashSet<String>,
}

impl FootprintRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a building with footprint `key`.
    ///
    /// Returns the id it is emitted under, or the id of the building that
    /// already owns the footprint. An id emitted earlier in the run is
    /// qualified with `scope` (`{scope}:{id}`); `:` cannot occur in an XML
    /// id, so the result never shadows a source id.
    pub fn admit(&mut self, key: String, id: &str, scope: &str) -> std::result::Result<String, &str> {
        if self.kept.contains_key(&key) {
            return Err(self.kept.get(&key).map_or("", String::as_str));
        }
        let id = self.unique_id(id, scope);
        self.kept.insert(key, id.clone());
        Ok(id)
    }

    fn unique_id(&mut self, id: &str, scope: &str) -> String {
        let mut candidate = id.to_string();
        let mut attempt = 0u64;
        while self.ids.contains(&candidate) {
            candidate = match attempt {
                0 => format!("{}:{}", scope, id),
                n => format!("{}:{}#{}", scope, id, n),
            };
            attempt += 1;
        }
        self.ids.insert(candidate.clone());
        candidate
    }

    pub fn len(&self) -> usize {
        self.kept.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}

/// Fragments collected under one identity
#[derive(Debug, Clone)]
struct BuildingGroup {
    id: String,
    fragments: Vec<SurfaceFragment>,
    hint: Option<RawRing>,
    z_range: Option<(f64, f64)>,
}

impl BuildingGroup {
    fn new(id: String) -> Self {
        Self {
            id,
            fragments: Vec::new(),
            hint: None,
            z_range: None,
        }
    }

    fn absorb(&mut self, geometry: ExtractedGeometry) {
        let ranges = geometry
            .fragments
            .iter()
            .filter_map(SurfaceFragment::z_range)
            .chain(geometry.hint_footprint.as_ref().and_then(RawRing::z_range));
        for (lo, hi) in ranges {
            self.z_range = Some(match self.z_range {
                None => (lo, hi),
                Some((a, b)) => (a.min(lo), b.max(hi)),
            });
        }

        if self.hint.is_none() {
            self.hint = geometry.hint_footprint;
        }
        self.fragments.extend(geometry.fragments);
    }
}

/// Counters for one assembler run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyStats {
    pub groups: usize,
    pub buildings: usize,
    pub duplicates: usize,
    /// Buildings whose id was already emitted by an earlier file
    pub renamed: usize,
    pub without_footprint: usize,
    pub degenerate_fragments: usize,
    pub buildings_without_mesh: usize,
}

impl AssemblyStats {
    pub fn merge(&mut self, other: &AssemblyStats) {
        self.groups += other.groups;
        self.buildings += other.buildings;
        self.duplicates += other.duplicates;
        self.renamed += other.renamed;
        self.without_footprint += other.without_footprint;
        self.degenerate_fragments += other.degenerate_fragments;
        self.buildings_without_mesh += other.buildings_without_mesh;
    }
}

/// Buildings emitted from one file
#[derive(Debug, Clone, Default)]
pub struct Assembly {
    pub buildings: Vec<Building>,
    pub stats: AssemblyStats,
}

/// A group that survived dedup, waiting for its mesh
struct Accepted {
    id: String,
    group: BuildingGroup,
    footprint: Vec<Point2<f64>>,
    height_m: f64,
}

/// Groups extracted fragments into buildings for one input file
pub struct BuildingAssembler<'a> {
    file_scope: String,
    reprojector: &'a Reprojector,
    mode: MeshMode,
    groups: Vec<BuildingGroup>,
    by_id: FxHashMap<String, usize>,
    next_synthetic: u64,
}

impl<'a> BuildingAssembler<'a> {
    pub fn new(file_scope: impl Into<String>, reprojector: &'a Reprojector, mode: MeshMode) -> Self {
        Self {
            file_scope: file_scope.into(),
            reprojector,
            mode,
            groups: Vec::new(),
            by_id: FxHashMap::default(),
            next_synthetic: 0,
        }
    }

    /// Add one extracted group; groups resolving to the same id merge
    pub fn push(&mut self, group: ExtractedGroup) {
        let id = match group.owner {
            Owner::Building(Some(id)) | Owner::Fragment(Some(id)) => id,
            Owner::Building(None) | Owner::Fragment(None) => self.synthesize_id(),
        };

        let index = match self.by_id.get(&id) {
            Some(&index) => index,
            None => {
                let index = self.groups.len();
                self.by_id.insert(id.clone(), index);
                self.groups.push(BuildingGroup::new(id));
                index
            }
        };
        self.groups[index].absorb(group.geometry);
    }

    fn synthesize_id(&mut self) -> String {
        let id = format!("{}#{}", self.file_scope, self.next_synthetic);
        self.next_synthetic += 1;
        id
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Resolve footprints and heights, drop duplicates, then build meshes
    pub fn finish(self, registry: &mut FootprintRegistry) -> Result<Assembly> {
        let mut stats = AssemblyStats {
            groups: self.groups.len(),
            ..AssemblyStats::default()
        };
        let reprojector = self.reprojector;
        let mode = self.mode;

        let mut accepted = Vec::with_capacity(self.groups.len());
        for group in self.groups {
            let Some(footprint) = select_footprint(&group, reprojector) else {
                debug!(id = %group.id, "no usable footprint, skipping building");
                stats.without_footprint += 1;
                continue;
            };

            let key = footprint_key(&footprint)?;
            let id = match registry.admit(key, &group.id, &self.file_scope) {
                Ok(id) => id,
                Err(kept) => {
                    warn!(kept = %kept, dropped = %group.id, "duplicate footprint, dropping building");
                    stats.duplicates += 1;
                    continue;
                }
            };
            if id != group.id {
                warn!(id = %group.id, renamed = %id, "building id already emitted, renaming");
                stats.renamed += 1;
            }

            let height_m = group
                .z_range
                .map(|(lo, hi)| reprojector.z_to_meters(hi - lo).max(0.0))
                .map_or(0.0, round_centimeters);

            accepted.push(Accepted {
                id,
                group,
                footprint,
                height_m,
            });
        }

        let built: Vec<(Building, usize)> = accepted
            .into_par_iter()
            .map(|a| {
                let (mesh, degenerate) = build_mesh(&a, reprojector, mode);
                let building = Building {
                    id: a.id,
                    footprint: a.footprint,
                    height_m: a.height_m,
                    mesh,
                };
                (building, degenerate)
            })
            .collect();

        let mut buildings = Vec::with_capacity(built.len());
        for (building, degenerate) in built {
            stats.degenerate_fragments += degenerate;
            if building.mesh.is_none() {
                stats.buildings_without_mesh += 1;
            }
            buildings.push(building);
        }
        stats.buildings = buildings.len();

        Ok(Assembly { buildings, stats })
    }
}

/// Ring in target coordinates, `None` when a point does not reproject
fn reproject_ring(ring: &RawRing, reprojector: &Reprojector) -> Option<Vec<Point2<f64>>> {
    let points: citymesh_geometry::Result<Vec<Point2<f64>>> = ring
        .points()
        .iter()
        .map(|p| reprojector.project_point2(&Point2::new(p.x, p.y)))
        .collect();
    match points {
        Ok(points) => Some(open_ring(points)),
        Err(e) => {
            debug!(error = %e, "ring does not reproject");
            None
        }
    }
}

/// The hint when usable, otherwise the largest reprojected exterior ring
fn select_footprint(group: &BuildingGroup, reprojector: &Reprojector) -> Option<Vec<Point2<f64>>> {
    if let Some(footprint) = group
        .hint
        .as_ref()
        .and_then(|hint| reproject_ring(hint, reprojector))
        .filter(|footprint| is_usable_footprint(footprint))
    {
        return Some(footprint);
    }

    let mut best: Option<(f64, Vec<Point2<f64>>)> = None;
    for fragment in &group.fragments {
        let Some(ring) = reproject_ring(&fragment.exterior, reprojector) else {
            continue;
        };
        if !is_usable_footprint(&ring) {
            continue;
        }
        let area = footprint_area(&ring);
        if best.as_ref().map_or(true, |(best_area, _)| area > *best_area) {
            best = Some((area, ring));
        }
    }
    best.map(|(_, ring)| ring)
}

/// One fragment's rings in target coordinates
struct ProjectedFragment<'f> {
    fragment: &'f SurfaceFragment,
    exterior: Vec<Point3<f64>>,
    holes: Vec<Vec<Point3<f64>>>,
}

/// Mesh for one accepted building plus the number of fragments it had to skip
fn build_mesh(accepted: &Accepted, reprojector: &Reprojector, mode: MeshMode) -> (Option<Mesh>, usize) {
    let detailed: Vec<&SurfaceFragment> = match mode {
        MeshMode::Detailed => accepted
            .group
            .fragments
            .iter()
            .filter(|f| f.role != SurfaceRole::FootprintHint)
            .collect(),
        MeshMode::Massing => Vec::new(),
    };

    // Massing, or detailed input that only carries a footprint
    if detailed.is_empty() {
        let height = accepted.height_m / reprojector.target_unit();
        return match extrude_footprint(&accepted.footprint, height) {
            Ok(mesh) => (Some(mesh), 0),
            Err(e) => {
                debug!(id = %accepted.id, error = %e, "massing extrusion failed");
                (None, 0)
            }
        };
    }

    let mut degenerate = 0;
    let mut projected = Vec::with_capacity(detailed.len());
    for fragment in detailed {
        let rings = project_ring_3d(&fragment.exterior, reprojector).and_then(|exterior| {
            let holes = fragment
                .interiors
                .iter()
                .map(|ring| project_ring_3d(ring, reprojector))
                .collect::<citymesh_geometry::Result<Vec<_>>>()?;
            Ok((exterior, holes))
        });
        match rings {
            Ok((exterior, holes)) => projected.push(ProjectedFragment {
                fragment,
                exterior,
                holes,
            }),
            Err(e) => {
                debug!(id = %accepted.id, fragment = ?fragment.id, error = %e, "skipping fragment that does not reproject");
                degenerate += 1;
            }
        }
    }

    let center = vertex_center(projected.iter().flat_map(|p| p.exterior.iter()));
    let mut mesh = Mesh::new();
    for part in &projected {
        match triangulate_polygon_3d(&part.exterior, &part.holes) {
            Ok(mut surface) => {
                orient_outward(&mut surface, part.fragment.role, &center);
                mesh.merge(&surface);
            }
            Err(e) => {
                debug!(id = %accepted.id, fragment = ?part.fragment.id, error = %e, "skipping degenerate fragment");
                degenerate += 1;
            }
        }
    }

    if mesh.is_empty() {
        (None, degenerate)
    } else {
        (Some(mesh), degenerate)
    }
}

fn project_ring_3d(ring: &RawRing, reprojector: &Reprojector) -> citymesh_geometry::Result<Vec<Point3<f64>>> {
    ring.points()
        .iter()
        .map(|p| reprojector.project_point3(p))
        .collect()
}

/// Mean of the given points, the origin when there are none
fn vertex_center<'p>(points: impl Iterator<Item = &'p Point3<f64>>) -> Point3<f64> {
    let (sum, count) = points.fold((Vector3::zeros(), 0usize), |(sum, n), p| (sum + p.coords, n + 1));
    if count == 0 {
        Point3::origin()
    } else {
        Point3::from(sum / count as f64)
    }
}

/// Flip a surface whose normal points into the building.
///
/// Roofs face up, ground surfaces face down and walls face away from the
/// building's vertex center. Untyped surfaces keep the source orientation.
fn orient_outward(surface: &mut Mesh, role: SurfaceRole, center: &Point3<f64>) {
    let outward = match role {
        SurfaceRole::Roof => Vector3::z(),
        SurfaceRole::Ground => -Vector3::z(),
        SurfaceRole::Wall => {
            let d = surface.centroid() - center;
            Vector3::new(d.x, d.y, 0.0)
        }
        SurfaceRole::FootprintHint | SurfaceRole::Untyped => return,
    };
    if surface.area_normal().dot(&outward) < 0.0 {
        surface.flip_winding();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citymesh_geometry::ProjectionConfig;

    /// Feet in, feet out: footprints stay numerically recognisable
    fn identity() -> Reprojector {
        Reprojector::new(&ProjectionConfig::from_epsg(2263, 2263).unwrap()).unwrap()
    }

    fn ring(coords: &[(f64, f64, f64)]) -> RawRing {
        RawRing::from_points(coords.iter().map(|&(x, y, z)| Point3::new(x, y, z)).collect())
    }

    fn fragment(role: SurfaceRole, coords: &[(f64, f64, f64)]) -> SurfaceFragment {
        SurfaceFragment {
            exterior: ring(coords),
            interiors: Default::default(),
            role,
            id: None,
        }
    }

    fn square_at(x: f64, y: f64, z: f64) -> Vec<(f64, f64, f64)> {
        vec![
            (x, y, z),
            (x + 100.0, y, z),
            (x + 100.0, y + 100.0, z),
            (x, y + 100.0, z),
            (x, y, z),
        ]
    }

    fn group(owner: Owner, fragments: Vec<SurfaceFragment>) -> ExtractedGroup {
        ExtractedGroup {
            owner,
            geometry: ExtractedGeometry {
                fragments,
                hint_footprint: None,
            },
        }
    }

    fn box_building(owner: Owner, x: f64, y: f64) -> ExtractedGroup {
        group(
            owner,
            vec![
                fragment(SurfaceRole::Ground, &square_at(x, y, 0.0)),
                fragment(SurfaceRole::Roof, &square_at(x, y, 32.8)),
                fragment(
                    SurfaceRole::Wall,
                    &[(x, y, 0.0), (x + 100.0, y, 0.0), (x + 100.0, y, 32.8), (x, y, 32.8)],
                ),
            ],
        )
    }

    fn origin() -> (f64, f64) {
        (988_000.0, 212_000.0)
    }

    #[test]
    fn test_identical_footprints_are_deduplicated() {
        let (x, y) = origin();
        let reprojector = identity();
        let mut assembler = BuildingAssembler::new("file", &reprojector, MeshMode::Massing);
        assembler.push(box_building(Owner::Building(None), x, y));
        assembler.push(box_building(Owner::Building(None), x, y));
        assert_eq!(assembler.group_count(), 2);

        let mut registry = FootprintRegistry::new();
        let assembly = assembler.finish(&mut registry).unwrap();
        assert_eq!(assembly.buildings.len(), 1);
        assert_eq!(assembly.buildings[0].id, "file#0");
        assert_eq!(assembly.stats.duplicates, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_spans_assemblers() {
        let (x, y) = origin();
        let reprojector = identity();
        let mut registry = FootprintRegistry::new();

        let mut first = BuildingAssembler::new("a", &reprojector, MeshMode::Massing);
        first.push(box_building(Owner::Building(Some("B1".into())), x, y));
        assert_eq!(first.finish(&mut registry).unwrap().buildings.len(), 1);

        let mut second = BuildingAssembler::new("b", &reprojector, MeshMode::Massing);
        second.push(box_building(Owner::Building(Some("B1-copy".into())), x, y));
        second.push(box_building(Owner::Building(Some("B2".into())), x + 500.0, y));
        let assembly = second.finish(&mut registry).unwrap();
        let ids: Vec<&str> = assembly.buildings.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["B2"]);
    }

    #[test]
    fn test_registry_admit_reports_owner() {
        let mut registry = FootprintRegistry::new();
        assert_eq!(registry.admit("k".to_string(), "first", "a"), Ok("first".to_string()));
        assert_eq!(registry.admit("k".to_string(), "second", "b"), Err("first"));
    }

    #[test]
    fn test_registry_qualifies_repeated_ids() {
        let mut registry = FootprintRegistry::new();
        assert_eq!(registry.admit("k1".to_string(), "B1", "b").unwrap(), "B1");
        assert_eq!(registry.admit("k2".to_string(), "B1", "b").unwrap(), "b:B1");
        assert_eq!(registry.admit("k3".to_string(), "B1", "b").unwrap(), "b:B1#1");
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_same_id_in_two_files_stays_distinct() {
        let (x, y) = origin();
        let reprojector = identity();
        let mut registry = FootprintRegistry::new();

        let mut first = BuildingAssembler::new("a", &reprojector, MeshMode::Massing);
        first.push(box_building(Owner::Building(Some("B1".into())), x, y));
        let first = first.finish(&mut registry).unwrap();

        let mut second = BuildingAssembler::new("b", &reprojector, MeshMode::Massing);
        second.push(box_building(Owner::Building(Some("B1".into())), x + 500.0, y));
        let second = second.finish(&mut registry).unwrap();

        assert_eq!(first.buildings[0].id, "B1");
        assert_eq!(second.buildings[0].id, "b:B1");
        assert_eq!(second.stats.renamed, 1);
        assert_eq!(second.stats.duplicates, 0);
    }

    #[test]
    fn test_height_and_largest_footprint() {
        let (x, y) = origin();
        let reprojector = identity();
        let mut assembler = BuildingAssembler::new("file", &reprojector, MeshMode::Massing);
        assembler.push(box_building(Owner::Building(Some("B1".into())), x, y));
        let assembly = assembler.finish(&mut FootprintRegistry::new()).unwrap();

        let building = &assembly.buildings[0];
        // 32.8 ftUS
        assert_eq!(building.height_m, 10.0);
        assert_eq!(building.footprint.len(), 4);
        assert!((footprint_area(&building.footprint) - 10_000.0).abs() < 1e-3);
        assert_ne!(building.footprint.first(), building.footprint.last());

        let mesh = building.mesh.as_ref().unwrap();
        assert_eq!(mesh.triangle_count(), 12);
        assert_eq!(mesh.vertex_count(), 8);
    }

    #[test]
    fn test_hint_footprint_preferred() {
        let (x, y) = origin();
        let reprojector = identity();
        let mut extracted = box_building(Owner::Building(Some("B1".into())), x, y);
        let hint = ring(&[(x, y, 0.0), (x + 50.0, y, 0.0), (x + 50.0, y + 50.0, 0.0)]);
        extracted.geometry.hint_footprint = Some(hint);

        let mut assembler = BuildingAssembler::new("file", &reprojector, MeshMode::Massing);
        assembler.push(extracted);
        let assembly = assembler.finish(&mut FootprintRegistry::new()).unwrap();
        assert_eq!(assembly.buildings[0].footprint.len(), 3);
    }

    #[test]
    fn test_groups_merge_by_id() {
        let (x, y) = origin();
        let reprojector = identity();
        let mut assembler = BuildingAssembler::new("file", &reprojector, MeshMode::Massing);
        assembler.push(group(
            Owner::Fragment(Some("S1".into())),
            vec![fragment(SurfaceRole::Ground, &square_at(x, y, 0.0))],
        ));
        assembler.push(group(
            Owner::Fragment(Some("S1".into())),
            vec![fragment(SurfaceRole::Roof, &square_at(x, y, 65.6168))],
        ));
        assert_eq!(assembler.group_count(), 1);

        let assembly = assembler.finish(&mut FootprintRegistry::new()).unwrap();
        assert_eq!(assembly.buildings.len(), 1);
        assert_eq!(assembly.buildings[0].height_m, 20.0);
    }

    #[test]
    fn test_synthesized_ids_never_meet_source_ids() {
        let (x, y) = origin();
        let reprojector = identity();
        let mut assembler = BuildingAssembler::new("f", &reprojector, MeshMode::Massing);
        assembler.push(box_building(Owner::Building(None), x, y));
        assembler.push(box_building(Owner::Building(Some("f-0".into())), x + 500.0, y));
        assembler.push(box_building(Owner::Building(Some("f#0x".into())), x + 1000.0, y));
        assembler.push(box_building(Owner::Fragment(None), x + 1500.0, y));
        assert_eq!(assembler.group_count(), 4);

        let assembly = assembler.finish(&mut FootprintRegistry::new()).unwrap();
        let ids: Vec<&str> = assembly.buildings.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["f#0", "f-0", "f#0x", "f#1"]);
    }

    #[test]
    fn test_detailed_heights_use_target_units() {
        let (x, y) = origin();
        let reprojector = identity();
        let mut assembler = BuildingAssembler::new("file", &reprojector, MeshMode::Detailed);
        assembler.push(box_building(Owner::Building(Some("B1".into())), x, y));
        let assembly = assembler.finish(&mut FootprintRegistry::new()).unwrap();

        let building = &assembly.buildings[0];
        assert_eq!(building.height_m, 10.0);
        let (min, max) = building.mesh.as_ref().unwrap().bounds();
        // Same foot scale as the 100 ft footprint, not meters
        assert!((max.x - min.x - 100.0).abs() < 1e-3);
        assert!((max.z - min.z - 32.8).abs() < 1e-6);
    }

    #[test]
    fn test_detailed_surfaces_face_outward() {
        let (x, y) = origin();
        let reprojector = identity();
        let reversed = |mut ring: Vec<(f64, f64, f64)>| {
            ring.reverse();
            ring
        };
        // Roof wound clockwise from above, ground counter-clockwise and the
        // south wall wound to face north: all three point into the box
        let extracted = group(
            Owner::Building(Some("B1".into())),
            vec![
                fragment(SurfaceRole::Ground, &square_at(x, y, 0.0)),
                fragment(SurfaceRole::Roof, &reversed(square_at(x, y, 32.8))),
                fragment(
                    SurfaceRole::Wall,
                    &[(x, y, 0.0), (x, y, 32.8), (x + 100.0, y, 32.8), (x + 100.0, y, 0.0)],
                ),
                fragment(
                    SurfaceRole::Wall,
                    &[
                        (x, y + 100.0, 0.0),
                        (x, y + 100.0, 32.8),
                        (x + 100.0, y + 100.0, 32.8),
                        (x + 100.0, y + 100.0, 0.0),
                    ],
                ),
            ],
        );

        let mut assembler = BuildingAssembler::new("file", &reprojector, MeshMode::Detailed);
        assembler.push(extracted);
        let assembly = assembler.finish(&mut FootprintRegistry::new()).unwrap();
        let mesh = assembly.buildings[0].mesh.as_ref().unwrap();
        assert_eq!(mesh.triangle_count(), 8);

        for t in 0..mesh.triangle_count() {
            let corners = &mesh.indices[t * 3..t * 3 + 3];
            let center = corners
                .iter()
                .map(|&i| mesh.vertex(i as usize).coords)
                .sum::<Vector3<f64>>()
                / 3.0;
            let normal = mesh.triangle_normal(t);
            if (center.z - 32.8).abs() < 1e-6 {
                assert!(normal.z > 0.0, "roof triangle {} faces down", t);
            } else if center.z.abs() < 1e-6 {
                assert!(normal.z < 0.0, "ground triangle {} faces up", t);
            } else if (center.y - y).abs() < 1e-6 {
                assert!(normal.y < 0.0, "south wall triangle {} faces in", t);
            } else {
                assert!(normal.y > 0.0, "north wall triangle {} faces in", t);
            }
        }
    }

    #[test]
    fn test_detailed_mesh_skips_degenerate_fragments() {
        let (x, y) = origin();
        let reprojector = identity();
        let mut extracted = box_building(Owner::Building(Some("B1".into())), x, y);
        // Colinear ring survives extraction but cannot be triangulated
        extracted.geometry.fragments.push(fragment(
            SurfaceRole::Wall,
            &[(x, y, 0.0), (x + 10.0, y, 0.0), (x + 20.0, y, 0.0)],
        ));

        let mut assembler = BuildingAssembler::new("file", &reprojector, MeshMode::Detailed);
        assembler.push(extracted);
        let assembly = assembler.finish(&mut FootprintRegistry::new()).unwrap();

        assert_eq!(assembly.stats.degenerate_fragments, 1);
        let mesh = assembly.buildings[0].mesh.as_ref().unwrap();
        // Ground, roof and wall quads: two triangles each
        assert_eq!(mesh.triangle_count(), 6);
        assert!(mesh.is_well_formed());
    }

    #[test]
    fn test_detailed_without_surfaces_falls_back_to_massing() {
        let (x, y) = origin();
        let reprojector = identity();
        let mut assembler = BuildingAssembler::new("file", &reprojector, MeshMode::Detailed);
        assembler.push(group(
            Owner::Building(Some("B1".into())),
            vec![fragment(SurfaceRole::FootprintHint, &square_at(x, y, 0.0))],
        ));
        let mut extracted = group(Owner::Building(Some("B1".into())), Vec::new());
        extracted.geometry.hint_footprint = Some(ring(&square_at(x, y, 32.8)));
        assembler.push(extracted);

        let assembly = assembler.finish(&mut FootprintRegistry::new()).unwrap();
        let building = &assembly.buildings[0];
        assert_eq!(building.height_m, 10.0);
        assert_eq!(building.mesh.as_ref().unwrap().triangle_count(), 12);
    }

    #[test]
    fn test_flat_building_has_no_mesh() {
        let (x, y) = origin();
        let reprojector = identity();
        let mut assembler = BuildingAssembler::new("file", &reprojector, MeshMode::Massing);
        assembler.push(group(
            Owner::Building(Some("FLAT".into())),
            vec![fragment(SurfaceRole::Ground, &square_at(x, y, 5.0))],
        ));
        let assembly = assembler.finish(&mut FootprintRegistry::new()).unwrap();
        assert_eq!(assembly.buildings.len(), 1);
        assert_eq!(assembly.buildings[0].height_m, 0.0);
        assert!(assembly.buildings[0].mesh.is_none());
        assert_eq!(assembly.stats.buildings_without_mesh, 1);
    }
}
