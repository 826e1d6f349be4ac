// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Rings and surface fragments recovered from building documents

use nalgebra::Point3;
use smallvec::SmallVec;

/// Points closer than this (in source units) are treated as coincident
const COINCIDENT_EPSILON: f64 = 1e-9;

#[inline]
fn coincident(a: &Point3<f64>, b: &Point3<f64>) -> bool {
    (a.x - b.x).abs() <= COINCIDENT_EPSILON
        && (a.y - b.y).abs() <= COINCIDENT_EPSILON
        && (a.z - b.z).abs() <= COINCIDENT_EPSILON
}

/// Ordered, open ring of 3D points in source units.
///
/// Construction drops consecutive duplicates and the closing point, so the
/// first and last points are never coincident.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRing {
    points: Vec<Point3<f64>>,
}

impl RawRing {
    /// Build a ring, removing the closing point and repeated vertices
    pub fn from_points(points: Vec<Point3<f64>>) -> Self {
        let mut deduped: Vec<Point3<f64>> = Vec::with_capacity(points.len());
        for p in points {
            if deduped.last().map_or(true, |last| !coincident(last, &p)) {
                deduped.push(p);
            }
        }
        while deduped.len() > 1 && coincident(&deduped[0], &deduped[deduped.len() - 1]) {
            deduped.pop();
        }
        Self { points: deduped }
    }

    #[inline]
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// A ring needs at least 3 distinct points
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.points.len() >= 3
    }

    /// Minimum and maximum z over the ring, `None` when empty
    pub fn z_range(&self) -> Option<(f64, f64)> {
        self.points.iter().fold(None, |acc, p| match acc {
            None => Some((p.z, p.z)),
            Some((lo, hi)) => Some((lo.min(p.z), hi.max(p.z))),
        })
    }

    pub fn into_points(self) -> Vec<Point3<f64>> {
        self.points
    }
}

/// Structural role a fragment was found under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceRole {
    Roof,
    Wall,
    Ground,
    /// Coarse footprint supplied by the source (e.g. `lod0FootPrint`)
    FootprintHint,
    Untyped,
}

/// One polygon's boundary: an outer ring plus holes
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceFragment {
    pub exterior: RawRing,
    pub interiors: SmallVec<[RawRing; 2]>,
    pub role: SurfaceRole,
    /// `gml:id` of the polygon or its surface, when present
    pub id: Option<String>,
}

impl SurfaceFragment {
    /// All rings, exterior first
    pub fn rings(&self) -> impl Iterator<Item = &RawRing> {
        std::iter::once(&self.exterior).chain(self.interiors.iter())
    }

    /// Minimum and maximum z over every ring
    pub fn z_range(&self) -> Option<(f64, f64)> {
        self.rings()
            .filter_map(RawRing::z_range)
            .fold(None, |acc, (lo, hi)| match acc {
                None => Some((lo, hi)),
                Some((a, b)) => Some((a.min(lo), b.max(hi))),
            })
    }
}
