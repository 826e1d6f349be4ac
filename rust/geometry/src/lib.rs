// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CityMesh Geometry Processing
//!
//! Reprojection, triangulation and massing for building surfaces, using
//! proj4rs for coordinate transforms, earcutr for polygon triangulation and
//! nalgebra for points and vectors.

pub mod error;
pub mod extrusion;
pub mod mesh;
pub mod reproject;
pub mod triangulation;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point2, Point3, Vector2, Vector3};

pub use error::{Error, Result};
pub use extrusion::extrude_footprint;
pub use mesh::{CoordinateShift, Mesh};
pub use reproject::{CrsDefinition, ProjectionConfig, Reprojector, US_SURVEY_FOOT};
pub use triangulation::{
    calculate_polygon_normal, signed_area, triangulate_polygon, triangulate_polygon_3d,
    triangulate_polygon_with_holes, PlaneBasis,
};
