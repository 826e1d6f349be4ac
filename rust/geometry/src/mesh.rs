// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh data structures

use nalgebra::{Point3, Vector3};

/// Coordinate shift for RTC (Relative-to-Center) output
/// Stores the offset subtracted from coordinates to improve Float32 precision
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CoordinateShift {
    /// X offset (subtracted from all X coordinates)
    pub x: f64,
    /// Y offset (subtracted from all Y coordinates)
    pub y: f64,
    /// Z offset (subtracted from all Z coordinates)
    pub z: f64,
}

impl CoordinateShift {
    /// Create a new coordinate shift
    #[inline]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Create shift from a Point3
    #[inline]
    pub fn from_point(point: Point3<f64>) -> Self {
        Self {
            x: point.x,
            y: point.y,
            z: point.z,
        }
    }

    #[inline]
    pub fn to_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// Indexed triangle mesh in world coordinates.
///
/// Positions stay in f64 until they are re-expressed relative to a
/// [`CoordinateShift`] and narrowed for output.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    /// Vertex positions (x, y, z)
    pub positions: Vec<f64>,
    /// Triangle indices (i0, i1, i2)
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self {
            positions: Vec::new(),
            indices: Vec::new(),
        }
    }

    /// Create a mesh with capacity
    pub fn with_capacity(vertex_count: usize, index_count: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertex_count * 3),
            indices: Vec::with_capacity(index_count),
        }
    }

    /// Add a vertex, returning its index
    #[inline]
    pub fn add_vertex(&mut self, position: Point3<f64>) -> u32 {
        let index = self.vertex_count() as u32;
        self.positions.push(position.x);
        self.positions.push(position.y);
        self.positions.push(position.z);
        index
    }

    /// Add a triangle
    #[inline]
    pub fn add_triangle(&mut self, i0: u32, i1: u32, i2: u32) {
        self.indices.push(i0);
        self.indices.push(i1);
        self.indices.push(i2);
    }

    /// Vertex `i` as a point
    #[inline]
    pub fn vertex(&self, i: usize) -> Point3<f64> {
        Point3::new(
            self.positions[i * 3],
            self.positions[i * 3 + 1],
            self.positions[i * 3 + 2],
        )
    }

    /// Unnormalized normal of triangle `t` (right-hand rule)
    #[inline]
    pub fn triangle_normal(&self, t: usize) -> Vector3<f64> {
        let a = self.vertex(self.indices[t * 3] as usize);
        let b = self.vertex(self.indices[t * 3 + 1] as usize);
        let c = self.vertex(self.indices[t * 3 + 2] as usize);
        (b - a).cross(&(c - a))
    }

    /// Merge another mesh into this one
    #[inline]
    pub fn merge(&mut self, other: &Mesh) {
        if other.is_empty() {
            return;
        }

        let vertex_offset = (self.positions.len() / 3) as u32;

        self.positions.reserve(other.positions.len());
        self.indices.reserve(other.indices.len());

        self.positions.extend_from_slice(&other.positions);
        self.indices
            .extend(other.indices.iter().map(|&i| i + vertex_offset));
    }

    /// Get vertex count
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Get triangle count
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Check if mesh is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Check the index buffer invariants: whole triangles, all in range
    pub fn is_well_formed(&self) -> bool {
        let n = self.vertex_count() as u32;
        self.positions.len() % 3 == 0
            && self.indices.len() % 3 == 0
            && self.indices.iter().all(|&i| i < n)
    }

    /// Calculate bounds (min, max)
    #[inline]
    pub fn bounds(&self) -> (Point3<f64>, Point3<f64>) {
        if self.is_empty() {
            return (Point3::origin(), Point3::origin());
        }

        let mut min = Point3::new(f64::MAX, f64::MAX, f64::MAX);
        let mut max = Point3::new(f64::MIN, f64::MIN, f64::MIN);

        self.positions.chunks_exact(3).for_each(|chunk| {
            min.x = min.x.min(chunk[0]);
            min.y = min.y.min(chunk[1]);
            min.z = min.z.min(chunk[2]);
            max.x = max.x.max(chunk[0]);
            max.y = max.y.max(chunk[1]);
            max.z = max.z.max(chunk[2]);
        });

        (min, max)
    }

    /// Average of all vertex positions
    #[inline]
    pub fn centroid(&self) -> Point3<f64> {
        if self.is_empty() {
            return Point3::origin();
        }

        let mut sum = Point3::new(0.0f64, 0.0f64, 0.0f64);
        let count = self.vertex_count() as f64;

        self.positions.chunks_exact(3).for_each(|chunk| {
            sum.x += chunk[0];
            sum.y += chunk[1];
            sum.z += chunk[2];
        });

        Point3::new(sum.x / count, sum.y / count, sum.z / count)
    }

    /// Sum of unnormalized triangle normals (twice the area vector)
    pub fn area_normal(&self) -> Vector3<f64> {
        (0..self.triangle_count()).fold(Vector3::zeros(), |acc, t| acc + self.triangle_normal(t))
    }

    /// Reverse the winding of every triangle
    pub fn flip_winding(&mut self) {
        for tri in self.indices.chunks_exact_mut(3) {
            tri.swap(1, 2);
        }
    }

    /// Positions relative to `shift`, narrowed to f32.
    ///
    /// The subtraction happens in f64 before the conversion.
    pub fn shifted_positions_f32(&self, shift: &CoordinateShift) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.positions.len());
        for chunk in self.positions.chunks_exact(3) {
            out.push((chunk[0] - shift.x) as f32);
            out.push((chunk[1] - shift.y) as f32);
            out.push((chunk[2] - shift.z) as f32);
        }
        out
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}
