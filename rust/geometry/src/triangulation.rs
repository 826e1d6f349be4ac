// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polygon triangulation utilities
//!
//! Wrapper around earcutr for 2D polygon triangulation, plus fitting of a
//! working plane so arbitrary-orientation 3D rings (walls, pitched roofs)
//! can be triangulated in 2D and lifted back.

use crate::mesh::Mesh;
use crate::{Error, Point2, Point3, Result, Vector3};
use smallvec::SmallVec;

/// Edges shorter than this are treated as degenerate
const MIN_EDGE_LENGTH: f64 = 1e-9;

/// Minimum sine of the angle between two vectors to call them non-colinear
const MIN_SINE: f64 = 1e-6;

/// Check if a polygon is convex (all cross products have same sign)
#[inline]
fn is_convex(points: &[Point2<f64>]) -> bool {
    if points.len() < 3 {
        return false;
    }

    let n = points.len();
    let mut sign = 0i8;

    for i in 0..n {
        let p0 = &points[i];
        let p1 = &points[(i + 1) % n];
        let p2 = &points[(i + 2) % n];

        // Cross product of edges
        let cross = (p1.x - p0.x) * (p2.y - p1.y) - (p1.y - p0.y) * (p2.x - p1.x);

        if cross.abs() > 1e-10 {
            let current_sign = if cross > 0.0 { 1i8 } else { -1i8 };
            if sign == 0 {
                sign = current_sign;
            } else if sign != current_sign {
                return false; // Sign changed - not convex
            }
        }
    }

    sign != 0
}

/// Simple fan triangulation for convex polygons
#[inline]
fn fan_triangulate(n: usize) -> Vec<usize> {
    let mut indices = Vec::with_capacity((n - 2) * 3);
    for i in 1..n - 1 {
        indices.push(0);
        indices.push(i);
        indices.push(i + 1);
    }
    indices
}

/// Signed area of a 2D ring (shoelace formula), positive when counter-clockwise
#[inline]
pub fn signed_area(points: &[Point2<f64>]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0;
    for i in 0..n {
        let p = &points[i];
        let q = &points[(i + 1) % n];
        twice_area += p.x * q.y - q.x * p.y;
    }
    twice_area * 0.5
}

/// Triangulate a simple polygon (no holes)
/// Returns triangle indices into the input points
#[inline]
pub fn triangulate_polygon(points: &[Point2<f64>]) -> Result<Vec<usize>> {
    let n = points.len();

    if n < 3 {
        return Err(Error::TriangulationError(
            "Need at least 3 points to triangulate".to_string(),
        ));
    }

    // FAST PATH: Triangle - no triangulation needed
    if n == 3 {
        return Ok(vec![0, 1, 2]);
    }

    // FAST PATH: Convex polygon - use fan triangulation
    if n <= 8 && is_convex(points) {
        return Ok(fan_triangulate(n));
    }

    // Flatten points for earcutr
    let mut vertices = Vec::with_capacity(n * 2);
    for p in points {
        vertices.push(p.x);
        vertices.push(p.y);
    }

    let indices = earcutr::earcut(&vertices, &[], 2)
        .map_err(|e| Error::TriangulationError(format!("{:?}", e)))?;

    Ok(indices)
}

/// Triangulate a polygon with holes
/// Returns triangle indices into the combined vertex array (outer + all holes)
#[inline]
pub fn triangulate_polygon_with_holes(
    outer: &[Point2<f64>],
    holes: &[Vec<Point2<f64>>],
) -> Result<Vec<usize>> {
    if outer.len() < 3 {
        return Err(Error::TriangulationError(
            "Need at least 3 points in outer boundary".to_string(),
        ));
    }

    // FAST PATH: No holes - use optimized simple triangulation
    // Filter out empty or invalid holes
    let valid_holes: SmallVec<[&Vec<Point2<f64>>; 4]> =
        holes.iter().filter(|h| h.len() >= 3).collect();

    if valid_holes.is_empty() {
        return triangulate_polygon(outer);
    }

    // Flatten vertices for earcutr
    let total_points: usize = outer.len() + valid_holes.iter().map(|h| h.len()).sum::<usize>();
    let mut vertices = Vec::with_capacity(total_points * 2);

    // Add outer boundary
    for p in outer {
        vertices.push(p.x);
        vertices.push(p.y);
    }

    // Add holes and track their start indices
    let mut hole_indices = Vec::with_capacity(valid_holes.len());
    for hole in valid_holes {
        hole_indices.push(vertices.len() / 2);
        for p in hole {
            vertices.push(p.x);
            vertices.push(p.y);
        }
    }

    let indices = earcutr::earcut(&vertices, &hole_indices, 2)
        .map_err(|e| Error::TriangulationError(format!("{:?}", e)))?;

    Ok(indices)
}

/// Local 2D working plane of a 3D ring
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneBasis {
    pub origin: Point3<f64>,
    pub u_axis: Vector3<f64>,
    pub v_axis: Vector3<f64>,
    pub normal: Vector3<f64>,
}

impl PlaneBasis {
    /// Fit a plane to a ring.
    ///
    /// The first axis follows the first non-degenerate edge. The normal is
    /// the cross product of that axis with the vector to the first vertex
    /// that is not colinear with it; the second axis completes the
    /// right-handed frame. Returns `None` for rings that are a single point
    /// or colinear.
    pub fn fit(points: &[Point3<f64>]) -> Option<Self> {
        let n = points.len();
        if n < 3 {
            return None;
        }
        let origin = points[0];

        let u_axis = (0..n).find_map(|i| {
            let edge = points[(i + 1) % n] - points[i];
            let len = edge.norm();
            (len > MIN_EDGE_LENGTH).then(|| edge / len)
        })?;

        let normal = points[1..].iter().find_map(|p| {
            let v = p - origin;
            let len = v.norm();
            if len <= MIN_EDGE_LENGTH {
                return None;
            }
            let cross = u_axis.cross(&v);
            (cross.norm() / len > MIN_SINE).then(|| cross.normalize())
        })?;

        let v_axis = normal.cross(&u_axis);

        Some(Self {
            origin,
            u_axis,
            v_axis,
            normal,
        })
    }

    /// Project 3D points into the plane's 2D coordinates
    #[inline]
    pub fn project(&self, points: &[Point3<f64>]) -> Vec<Point2<f64>> {
        points
            .iter()
            .map(|p| {
                let v = p - self.origin;
                Point2::new(v.dot(&self.u_axis), v.dot(&self.v_axis))
            })
            .collect()
    }

    /// Lift a 2D plane coordinate back into 3D
    #[inline]
    pub fn lift(&self, p: &Point2<f64>) -> Point3<f64> {
        self.origin + self.u_axis * p.x + self.v_axis * p.y
    }
}

/// Calculate the normal of a polygon from its vertices
/// Uses a single cross product for triangles and Newell's method otherwise
#[inline]
pub fn calculate_polygon_normal(points: &[Point3<f64>]) -> Vector3<f64> {
    let n = points.len();

    if n < 3 {
        return Vector3::new(0.0, 0.0, 1.0);
    }

    // FAST PATH: Triangle - use simple cross product
    if n == 3 {
        let v1 = points[1] - points[0];
        let v2 = points[2] - points[0];
        let normal = v1.cross(&v2);
        let len = normal.norm();
        if len > 1e-10 {
            return normal / len;
        }
        return Vector3::new(0.0, 0.0, 1.0);
    }

    // Newell's method is robust for concave polygons
    let mut normal = Vector3::<f64>::zeros();

    for i in 0..n {
        let current = &points[i];
        let next = &points[(i + 1) % n];

        normal.x += (current.y - next.y) * (current.z + next.z);
        normal.y += (current.z - next.z) * (current.x + next.x);
        normal.z += (current.x - next.x) * (current.y + next.y);
    }

    let len = normal.norm();
    if len > 1e-10 {
        normal / len
    } else {
        Vector3::new(0.0, 0.0, 1.0)
    }
}

/// Triangulate a planar 3D polygon with holes.
///
/// The ring is projected into its fitted [`PlaneBasis`], triangulated with
/// earcut, and lifted back through the same basis. Triangles are then wound
/// so that their normals agree with the exterior ring's own orientation,
/// which for building boundary surfaces is the outward direction.
pub fn triangulate_polygon_3d(
    exterior: &[Point3<f64>],
    holes: &[Vec<Point3<f64>>],
) -> Result<Mesh> {
    if exterior.len() < 3 {
        return Err(Error::DegeneratePolygon(format!(
            "exterior ring has {} point(s)",
            exterior.len()
        )));
    }

    let basis = PlaneBasis::fit(exterior)
        .ok_or_else(|| Error::DegeneratePolygon("exterior ring is colinear".to_string()))?;
    let outward = calculate_polygon_normal(exterior);

    let outer_2d = basis.project(exterior);
    if signed_area(&outer_2d).abs() < MIN_EDGE_LENGTH {
        return Err(Error::DegeneratePolygon("exterior ring has no area".to_string()));
    }

    let valid_holes: Vec<&Vec<Point3<f64>>> = holes.iter().filter(|h| h.len() >= 3).collect();
    let holes_2d: Vec<Vec<Point2<f64>>> = valid_holes.iter().map(|h| basis.project(h)).collect();

    let indices = triangulate_polygon_with_holes(&outer_2d, &holes_2d)?;
    if indices.is_empty() {
        return Err(Error::TriangulationError(
            "earcut produced no triangles".to_string(),
        ));
    }

    let vertex_count = outer_2d.len() + holes_2d.iter().map(Vec::len).sum::<usize>();
    let mut mesh = Mesh::with_capacity(vertex_count, indices.len());
    for p in outer_2d.iter().chain(holes_2d.iter().flatten()) {
        mesh.add_vertex(basis.lift(p));
    }

    for tri in indices.chunks_exact(3) {
        let (a, b, c) = (tri[0] as u32, tri[1] as u32, tri[2] as u32);
        let t = mesh.triangle_count();
        mesh.add_triangle(a, b, c);
        if mesh.triangle_normal(t).dot(&outward) < 0.0 {
            mesh.indices.swap(t * 3 + 1, t * 3 + 2);
        }
    }

    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangulate_square() {
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];

        let indices = triangulate_polygon(&points).unwrap();

        // Square should be split into 2 triangles = 6 indices
        assert_eq!(indices.len(), 6);
    }

    #[test]
    fn test_triangulate_concave_quad() {
        // Arrow-head quad: the fan from vertex 0 would cover the notch
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 1.0),
            Point2::new(4.0, 0.0),
            Point2::new(2.0, 4.0),
        ];

        let indices = triangulate_polygon(&points).unwrap();
        assert_eq!(indices.len(), 6);
        let total: f64 = indices
            .chunks_exact(3)
            .map(|t| signed_area(&[points[t[0]], points[t[1]], points[t[2]]]).abs())
            .sum();
        assert!((total - signed_area(&points).abs()).abs() < 1e-9);
    }

    #[test]
    fn test_triangulate_insufficient_points() {
        let points = vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)];

        let result = triangulate_polygon(&points);
        assert!(result.is_err());
    }

    #[test]
    fn test_triangulate_square_with_hole() {
        let outer = vec![
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
        ];

        let hole = vec![
            Point2::new(3.0, 3.0),
            Point2::new(7.0, 3.0),
            Point2::new(7.0, 7.0),
            Point2::new(3.0, 7.0),
        ];

        let indices = triangulate_polygon_with_holes(&outer, &[hole]).unwrap();

        assert!(indices.len() > 6);
        assert_eq!(indices.len() % 3, 0);
        assert!(indices.iter().all(|&i| i < 8));
    }

    #[test]
    fn test_signed_area_orientation() {
        let ccw = [
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 3.0),
            Point2::new(0.0, 3.0),
        ];
        assert!((signed_area(&ccw) - 6.0).abs() < 1e-12);

        let mut cw = ccw;
        cw.reverse();
        assert!((signed_area(&cw) + 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_plane_basis_is_orthonormal() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(4.0, 0.0, 0.0),
            Point3::new(4.0, 0.0, 3.0),
            Point3::new(0.0, 0.0, 3.0),
        ];
        let basis = PlaneBasis::fit(&points).unwrap();

        assert!((basis.u_axis.norm() - 1.0).abs() < 1e-12);
        assert!((basis.v_axis.norm() - 1.0).abs() < 1e-12);
        assert!(basis.u_axis.dot(&basis.v_axis).abs() < 1e-12);
        assert!(basis.normal.dot(&basis.u_axis).abs() < 1e-12);
        // Wall lies in the XZ plane
        assert!((basis.normal.y.abs() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_plane_basis_round_trip() {
        let points = vec![
            Point3::new(1.0, 2.0, 3.0),
            Point3::new(5.0, 2.0, 6.0),
            Point3::new(5.0, 7.0, 6.0),
            Point3::new(1.0, 7.0, 3.0),
        ];
        let basis = PlaneBasis::fit(&points).unwrap();
        for (p, q) in points.iter().zip(basis.project(&points)) {
            assert!((basis.lift(&q) - p).norm() < 1e-9);
        }
    }

    #[test]
    fn test_plane_basis_skips_repeated_first_vertex() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ];
        let basis = PlaneBasis::fit(&points).unwrap();
        assert!((basis.u_axis.x - 1.0).abs() < 1e-12);
        assert!((basis.normal.z.abs() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_plane_basis_degenerate() {
        let single = vec![Point3::new(1.0, 1.0, 1.0); 4];
        assert!(PlaneBasis::fit(&single).is_none());

        let colinear = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(2.0, 2.0, 2.0),
        ];
        assert!(PlaneBasis::fit(&colinear).is_none());
    }

    #[test]
    fn test_calculate_polygon_normal() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];

        let normal = calculate_polygon_normal(&points);
        assert!((normal.z - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_triangulate_3d_with_hole_indices_in_range() {
        let exterior = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 10.0),
            Point3::new(0.0, 0.0, 10.0),
        ];
        let hole = vec![
            Point3::new(3.0, 0.0, 3.0),
            Point3::new(3.0, 0.0, 7.0),
            Point3::new(7.0, 0.0, 7.0),
            Point3::new(7.0, 0.0, 3.0),
        ];

        let mesh = triangulate_polygon_3d(&exterior, &[hole]).unwrap();
        assert_eq!(mesh.vertex_count(), 8);
        assert!(mesh.triangle_count() >= 8);
        assert!(mesh.is_well_formed());
    }

    #[test]
    fn test_triangulate_3d_lifts_back_onto_plane() {
        // Pitched roof plane z = 0.5 * y + 10
        let exterior = vec![
            Point3::new(0.0, 0.0, 10.0),
            Point3::new(8.0, 0.0, 10.0),
            Point3::new(8.0, 6.0, 13.0),
            Point3::new(0.0, 6.0, 13.0),
        ];
        let mesh = triangulate_polygon_3d(&exterior, &[]).unwrap();
        for i in 0..mesh.vertex_count() {
            let p = mesh.vertex(i);
            assert!((p.z - (0.5 * p.y + 10.0)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_winding_follows_ring_orientation() {
        // South wall seen from outside (-Y) is counter-clockwise: outward normal -Y
        let south_wall = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 5.0),
            Point3::new(0.0, 0.0, 5.0),
        ];
        let mesh = triangulate_polygon_3d(&south_wall, &[]).unwrap();
        for t in 0..mesh.triangle_count() {
            assert!(mesh.triangle_normal(t).y < 0.0, "triangle {} faces inward", t);
        }

        // Flat roof, counter-clockwise from above: +Z
        let roof = vec![
            Point3::new(0.0, 0.0, 5.0),
            Point3::new(10.0, 0.0, 5.0),
            Point3::new(10.0, 10.0, 5.0),
            Point3::new(0.0, 10.0, 5.0),
        ];
        let mesh = triangulate_polygon_3d(&roof, &[]).unwrap();
        assert!((0..mesh.triangle_count()).all(|t| mesh.triangle_normal(t).z > 0.0));

        // Ground, clockwise from above: -Z
        let mut ground = roof.clone();
        ground.reverse();
        let mesh = triangulate_polygon_3d(&ground, &[]).unwrap();
        assert!((0..mesh.triangle_count()).all(|t| mesh.triangle_normal(t).z < 0.0));
    }

    #[test]
    fn test_triangulate_3d_degenerate_is_error_not_panic() {
        let point = vec![Point3::new(0.0, 0.0, 0.0); 3];
        assert!(triangulate_polygon_3d(&point, &[]).is_err());

        let colinear = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
        ];
        assert!(triangulate_polygon_3d(&colinear, &[]).is_err());

        assert!(triangulate_polygon_3d(&[], &[]).is_err());
    }
}
