// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Emitted building records and footprint helpers

use crate::error::Result;
use citymesh_geometry::{signed_area, Mesh, Point2};

/// Points closer than this are treated as the same vertex
const COINCIDENT_EPSILON: f64 = 1e-9;

/// One logical building, immutable once emitted
#[derive(Debug, Clone)]
pub struct Building {
    pub id: String,
    /// Open ring in target units, at least 3 points
    pub footprint: Vec<Point2<f64>>,
    /// Height in meters, rounded to centimeters
    pub height_m: f64,
    pub mesh: Option<Mesh>,
}

impl Building {
    /// Bounding box of the footprint
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(&self.footprint)
    }

    /// Exact-match key used for duplicate detection
    pub fn footprint_key(&self) -> Result<String> {
        footprint_key(&self.footprint)
    }
}

/// Axis-aligned 2D bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Aabb {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// An inverted box that any `expand` call replaces
    pub fn empty() -> Self {
        Self::new(
            f64::INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
        )
    }

    pub fn from_points(points: &[Point2<f64>]) -> Self {
        let mut aabb = Self::empty();
        for p in points {
            aabb.min_x = aabb.min_x.min(p.x);
            aabb.min_y = aabb.min_y.min(p.y);
            aabb.max_x = aabb.max_x.max(p.x);
            aabb.max_y = aabb.max_y.max(p.y);
        }
        aabb
    }

    #[inline]
    pub fn expand(&mut self, other: &Aabb) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    #[inline]
    pub fn intersects(&self, other: &Aabb) -> bool {
        !(other.max_x < self.min_x
            || other.max_y < self.min_y
            || other.min_x > self.max_x
            || other.min_y > self.max_y)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Collapse consecutive duplicates and drop the closing point
///
/// Applying it to its own output returns the same ring.
pub fn open_ring(points: impl IntoIterator<Item = Point2<f64>>) -> Vec<Point2<f64>> {
    let mut ring: Vec<Point2<f64>> = Vec::new();
    for p in points {
        if ring.last().map_or(true, |last| !coincident(&p, last)) {
            ring.push(p);
        }
    }
    while ring.len() > 1 {
        let closes = match (ring.first(), ring.last()) {
            (Some(first), Some(last)) => coincident(first, last),
            _ => false,
        };
        if !closes {
            break;
        }
        ring.pop();
    }
    ring
}

#[inline]
fn coincident(a: &Point2<f64>, b: &Point2<f64>) -> bool {
    (a - b).norm() <= COINCIDENT_EPSILON
}

/// Absolute shoelace area
#[inline]
pub fn footprint_area(points: &[Point2<f64>]) -> f64 {
    signed_area(points).abs()
}

/// A footprint is usable with at least 3 finite points
pub fn is_usable_footprint(points: &[Point2<f64>]) -> bool {
    points.len() >= 3 && points.iter().all(|p| p.x.is_finite() && p.y.is_finite())
}

/// Serialize the exact coordinate sequence
pub fn footprint_key(points: &[Point2<f64>]) -> Result<String> {
    let coords: Vec<[f64; 2]> = points.iter().map(|p| [p.x, p.y]).collect();
    Ok(serde_json::to_string(&coords)?)
}

/// Round to two decimals
#[inline]
pub fn round_centimeters(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
