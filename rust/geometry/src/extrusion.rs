// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Extrusion operations - converting 2D footprints to massing prisms

use crate::error::{Error, Result};
use crate::mesh::Mesh;
use crate::triangulation::{signed_area, triangulate_polygon};
use nalgebra::{Point2, Point3};

/// Footprints with less area than this cannot be extruded
const MIN_FOOTPRINT_AREA: f64 = 1e-9;

/// Extrude a 2D footprint from z = 0 to z = `height`.
///
/// The result is a closed prism sharing one vertex ring per level (2n
/// vertices): top cap, bottom cap and two triangles per footprint edge, all
/// wound to face outward regardless of the input ring's orientation.
#[inline]
pub fn extrude_footprint(footprint: &[Point2<f64>], height: f64) -> Result<Mesh> {
    if !(height > 0.0) || !height.is_finite() {
        return Err(Error::InvalidExtrusion(format!(
            "Height must be positive, got {}",
            height
        )));
    }

    let n = footprint.len();
    if n < 3 {
        return Err(Error::DegeneratePolygon(format!(
            "footprint has {} point(s)",
            n
        )));
    }

    let area = signed_area(footprint);
    if area.abs() < MIN_FOOTPRINT_AREA {
        return Err(Error::DegeneratePolygon("footprint has no area".to_string()));
    }

    // Work on a counter-clockwise ring so "original winding" faces up
    let ring: Vec<Point2<f64>> = if area > 0.0 {
        footprint.to_vec()
    } else {
        footprint.iter().rev().copied().collect()
    };

    let cap = triangulate_polygon(&ring)?;
    if cap.is_empty() {
        return Err(Error::TriangulationError(
            "footprint triangulation is empty".to_string(),
        ));
    }

    let mut mesh = Mesh::with_capacity(n * 2, cap.len() * 2 + n * 6);

    for p in &ring {
        mesh.add_vertex(Point3::new(p.x, p.y, 0.0));
    }
    for p in &ring {
        mesh.add_vertex(Point3::new(p.x, p.y, height));
    }

    create_caps(&ring, &cap, &mut mesh);
    create_side_walls(n as u32, &mut mesh);

    Ok(mesh)
}

/// Top cap at the upper ring, bottom cap reversed at the lower ring
#[inline]
fn create_caps(ring: &[Point2<f64>], cap: &[usize], mesh: &mut Mesh) {
    let top = ring.len() as u32;

    for tri in cap.chunks_exact(3) {
        let (mut a, mut b, c) = (tri[0], tri[1], tri[2]);
        // earcut does not promise an orientation
        if signed_area(&[ring[a], ring[b], ring[c]]) < 0.0 {
            std::mem::swap(&mut a, &mut b);
        }
        let (a, b, c) = (a as u32, b as u32, c as u32);

        mesh.add_triangle(top + a, top + b, top + c);
        mesh.add_triangle(a, c, b);
    }
}

/// Two triangles per edge between the lower ring `[0, n)` and the upper
/// ring `[n, 2n)`; outward for a counter-clockwise ring
#[inline]
fn create_side_walls(n: u32, mesh: &mut Mesh) {
    for i in 0..n {
        let j = (i + 1) % n;
        mesh.add_triangle(i, j, n + j);
        mesh.add_triangle(i, n + j, n + i);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn directed_edges(mesh: &Mesh) -> HashMap<(u32, u32), usize> {
        let mut edges = HashMap::new();
        for tri in mesh.indices.chunks_exact(3) {
            for k in 0..3 {
                *edges.entry((tri[k], tri[(k + 1) % 3])).or_insert(0) += 1;
            }
        }
        edges
    }

    fn square() -> Vec<Point2<f64>> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
        ]
    }

    fn l_shape() -> Vec<Point2<f64>> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(6.0, 0.0),
            Point2::new(6.0, 2.0),
            Point2::new(2.0, 2.0),
            Point2::new(2.0, 6.0),
            Point2::new(0.0, 6.0),
        ]
    }

    fn assert_closed_manifold(mesh: &Mesh) {
        let edges = directed_edges(mesh);
        for (&(a, b), &count) in &edges {
            assert_eq!(count, 1, "edge {}->{} used {} times", a, b, count);
            assert_eq!(edges.get(&(b, a)), Some(&1), "edge {}->{} has no twin", a, b);
        }
    }

    #[test]
    fn test_square_prism_counts() {
        let mesh = extrude_footprint(&square(), 5.0).unwrap();
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.triangle_count(), 12);
        assert!(mesh.is_well_formed());
    }

    #[test]
    fn test_triangle_count_formula() {
        for footprint in [square(), l_shape()] {
            let n = footprint.len();
            let mesh = extrude_footprint(&footprint, 3.0).unwrap();
            assert_eq!(mesh.triangle_count(), 2 * n + 2 * (n - 2));
            assert_eq!(mesh.vertex_count(), 2 * n);
        }
    }

    #[test]
    fn test_prism_is_closed_manifold() {
        assert_closed_manifold(&extrude_footprint(&square(), 5.0).unwrap());
        assert_closed_manifold(&extrude_footprint(&l_shape(), 5.0).unwrap());
    }

    #[test]
    fn test_normals_face_outward_for_either_input_orientation() {
        let mut clockwise = square();
        clockwise.reverse();

        for footprint in [square(), clockwise] {
            let mesh = extrude_footprint(&footprint, 5.0).unwrap();
            let center = mesh.centroid();
            for t in 0..mesh.triangle_count() {
                let tri = &mesh.indices[t * 3..t * 3 + 3];
                let mid = (mesh.vertex(tri[0] as usize).coords
                    + mesh.vertex(tri[1] as usize).coords
                    + mesh.vertex(tri[2] as usize).coords)
                    / 3.0;
                let outward = mid - center.coords;
                assert!(
                    mesh.triangle_normal(t).dot(&outward) > 0.0,
                    "triangle {} faces inward",
                    t
                );
            }
        }
    }

    #[test]
    fn test_caps_face_up_and_down() {
        let mesh = extrude_footprint(&l_shape(), 4.0).unwrap();
        let n = 6u32;
        for t in 0..mesh.triangle_count() {
            let tri = &mesh.indices[t * 3..t * 3 + 3];
            let normal = mesh.triangle_normal(t);
            if tri.iter().all(|&i| i >= n) {
                assert!(normal.z > 0.0);
            } else if tri.iter().all(|&i| i < n) {
                assert!(normal.z < 0.0);
            }
        }
    }

    #[test]
    fn test_invalid_height() {
        assert!(extrude_footprint(&square(), 0.0).is_err());
        assert!(extrude_footprint(&square(), -1.0).is_err());
        assert!(extrude_footprint(&square(), f64::NAN).is_err());
    }

    #[test]
    fn test_degenerate_footprint() {
        let colinear = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(2.0, 0.0),
        ];
        assert!(extrude_footprint(&colinear, 5.0).is_err());
        assert!(extrude_footprint(&[Point2::new(0.0, 0.0)], 5.0).is_err());
    }
}
