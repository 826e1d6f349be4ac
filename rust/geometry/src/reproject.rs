// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reprojection between coordinate reference systems
//!
//! Systems are described by PROJ strings and evaluated with
//! [proj4rs](https://docs.rs/proj4rs). A handful of EPSG codes common in
//! city models resolve to built-in definitions.
//!
//! Points travel source plane -> target plane, then an optional recentering
//! offset is subtracted from the result. Geographic systems (`+proj=longlat`)
//! take and return radians.

use crate::{Error, Point2, Point3, Result};
use proj4rs::proj::Proj;
use proj4rs::transform::transform;

/// US survey foot in meters
pub const US_SURVEY_FOOT: f64 = 1200.0 / 3937.0;

/// International foot in meters
const INTERNATIONAL_FOOT: f64 = 0.3048;

/// NAD83 / New York Long Island (ftUS)
const EPSG_2263: &str = "+proj=lcc +lat_1=41.03333333333333 +lat_2=40.66666666666666 \
     +lat_0=40.16666666666666 +lon_0=-74 +x_0=300000.0000000001 +y_0=0 \
     +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=us-ft +no_defs";

/// Meters per unit for a PROJ `+units=` name
fn unit_factor(name: &str) -> Option<f64> {
    match name {
        "m" => Some(1.0),
        "km" => Some(1000.0),
        "ft" => Some(INTERNATIONAL_FOOT),
        "us-ft" => Some(US_SURVEY_FOOT),
        _ => None,
    }
}

/// A coordinate reference system given as a PROJ string
#[derive(Debug, Clone, PartialEq)]
pub struct CrsDefinition {
    definition: String,
    /// Meters per coordinate unit
    unit: f64,
}

impl CrsDefinition {
    /// Validate a PROJ string and read its linear unit
    pub fn from_proj_string(definition: impl Into<String>) -> Result<Self> {
        let definition = definition.into();
        Proj::from_proj_string(&definition)
            .map_err(|e| Error::Projection(format!("invalid definition {:?}: {}", definition, e)))?;

        let mut unit = 1.0;
        for token in definition.split_whitespace() {
            let token = token.trim_start_matches('+');
            match token.split_once('=') {
                Some(("units", name)) => {
                    unit = unit_factor(name).ok_or_else(|| {
                        Error::Projection(format!("unsupported unit {:?}", name))
                    })?;
                }
                Some(("to_meter", value)) => {
                    unit = value
                        .parse()
                        .ok()
                        .filter(|v: &f64| v.is_finite() && *v > 0.0)
                        .ok_or_else(|| Error::Projection(format!("invalid to_meter {:?}", value)))?;
                }
                _ => {}
            }
        }

        Ok(Self { definition, unit })
    }

    /// Built-in definition for an EPSG code
    ///
    /// Supported: 2263 (NAD83 / New York Long Island, ftUS), 326zz
    /// (WGS 84 / UTM zone zz N) and 269zz (NAD83 / UTM zone zz N).
    pub fn from_epsg(code: u32) -> Result<Self> {
        let definition = match code {
            2263 => EPSG_2263.to_string(),
            32601..=32660 => format!(
                "+proj=utm +zone={} +datum=WGS84 +units=m +no_defs",
                code - 32600
            ),
            26901..=26923 => format!(
                "+proj=utm +zone={} +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs",
                code - 26900
            ),
            _ => return Err(Error::Projection(format!("unsupported EPSG code {}", code))),
        };
        Self::from_proj_string(definition)
    }

    pub fn definition(&self) -> &str {
        &self.definition
    }

    /// Meters per unit of this system's coordinates
    #[inline]
    pub fn unit(&self) -> f64 {
        self.unit
    }
}

/// Source/target pair plus optional recentering reference
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionConfig {
    pub source: CrsDefinition,
    pub target: CrsDefinition,
    /// Reference point in source coordinates; its reprojection is
    /// subtracted from every output point
    pub recenter: Option<(f64, f64)>,
}

impl ProjectionConfig {
    pub fn new(source: CrsDefinition, target: CrsDefinition) -> Self {
        Self {
            source,
            target,
            recenter: None,
        }
    }

    pub fn from_epsg(source: u32, target: u32) -> Result<Self> {
        Ok(Self::new(
            CrsDefinition::from_epsg(source)?,
            CrsDefinition::from_epsg(target)?,
        ))
    }

    pub fn with_recenter(mut self, x: f64, y: f64) -> Self {
        self.recenter = Some((x, y));
        self
    }
}

/// Transforms points from the source system into the target system
pub struct Reprojector {
    source: Proj,
    target: Proj,
    source_unit: f64,
    target_unit: f64,
    offset: (f64, f64),
}

impl Reprojector {
    pub fn new(config: &ProjectionConfig) -> Result<Self> {
        let mut reprojector = Self {
            source: build(&config.source)?,
            target: build(&config.target)?,
            source_unit: config.source.unit(),
            target_unit: config.target.unit(),
            offset: (0.0, 0.0),
        };

        if let Some((x, y)) = config.recenter {
            let (ox, oy) = reprojector.project(x, y)?;
            reprojector.offset = (ox, oy);
        }

        Ok(reprojector)
    }

    /// Offset subtracted from every projected point
    #[inline]
    pub fn offset(&self) -> (f64, f64) {
        self.offset
    }

    /// Reproject a source (x, y) into target coordinates
    pub fn project(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let (tx, ty) = convert(&self.source, &self.target, x, y)?;
        Ok((tx - self.offset.0, ty - self.offset.1))
    }

    /// Map a target (x, y) back into source coordinates
    pub fn inverse(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        convert(
            &self.target,
            &self.source,
            x + self.offset.0,
            y + self.offset.1,
        )
    }

    #[inline]
    pub fn project_point2(&self, p: &Point2<f64>) -> Result<Point2<f64>> {
        let (x, y) = self.project(p.x, p.y)?;
        Ok(Point2::new(x, y))
    }

    /// Reproject x/y and rescale z into target units
    #[inline]
    pub fn project_point3(&self, p: &Point3<f64>) -> Result<Point3<f64>> {
        let (x, y) = self.project(p.x, p.y)?;
        Ok(Point3::new(x, y, self.z_to_target(p.z)))
    }

    /// Convert a source-unit vertical value to meters
    #[inline]
    pub fn z_to_meters(&self, z: f64) -> f64 {
        z * self.source_unit
    }

    /// Convert a source-unit vertical value to target units
    #[inline]
    pub fn z_to_target(&self, z: f64) -> f64 {
        self.z_to_meters(z) / self.target_unit
    }

    /// Meters per unit of the target system
    #[inline]
    pub fn target_unit(&self) -> f64 {
        self.target_unit
    }
}

fn build(crs: &CrsDefinition) -> Result<Proj> {
    Proj::from_proj_string(crs.definition())
        .map_err(|e| Error::Projection(format!("invalid definition {:?}: {}", crs.definition(), e)))
}

fn convert(from: &Proj, to: &Proj, x: f64, y: f64) -> Result<(f64, f64)> {
    let mut point = (x, y, 0.0);
    transform(from, to, &mut point)
        .map_err(|e| Error::Projection(format!("cannot transform ({}, {}): {}", x, y, e)))?;
    if !point.0.is_finite() || !point.1.is_finite() {
        return Err(Error::Projection(format!(
            "({}, {}) has no finite image",
            x, y
        )));
    }
    Ok((point.0, point.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const GEOGRAPHIC_GRS80: &str = "+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +no_defs";

    fn nyc_to_utm() -> Reprojector {
        Reprojector::new(&ProjectionConfig::from_epsg(2263, 32618).unwrap()).unwrap()
    }

    fn from_geographic(target: u32) -> Reprojector {
        Reprojector::new(&ProjectionConfig::new(
            CrsDefinition::from_proj_string(GEOGRAPHIC_GRS80).unwrap(),
            CrsDefinition::from_epsg(target).unwrap(),
        ))
        .unwrap()
    }

    #[test]
    fn test_lambert_false_origin() {
        let r = from_geographic(2263);
        let lat0 = (40.0f64 + 10.0 / 60.0).to_radians();
        let (x, y) = r.project((-74.0f64).to_radians(), lat0).unwrap();
        assert!((x - 984_250.0).abs() < 1e-3, "easting {}", x);
        assert!(y.abs() < 1e-3, "northing {}", y);
    }

    #[test]
    fn test_utm_central_meridian_on_equator() {
        let r = from_geographic(32618);
        let (x, y) = r.project((-75.0f64).to_radians(), 0.0).unwrap();
        assert!((x - 500_000.0).abs() < 1e-3, "easting {}", x);
        assert!(y.abs() < 1e-3, "northing {}", y);
    }

    #[test]
    fn test_midtown_to_utm() {
        let r = from_geographic(32618);
        let (x, y) = r
            .project((-73.985428f64).to_radians(), 40.748817f64.to_radians())
            .unwrap();
        assert!((x - 585_650.84).abs() < 1.0, "easting {}", x);
        assert!((y - 4_511_369.00).abs() < 1.0, "northing {}", y);
    }

    #[test]
    fn test_reprojection_round_trip_within_thousandth() {
        let r = nyc_to_utm();
        for &(x, y) in &[(988_000.0, 212_000.0), (1_000_500.5, 190_000.25), (975_000.0, 240_000.0)] {
            let (tx, ty) = r.project(x, y).unwrap();
            let (bx, by) = r.inverse(tx, ty).unwrap();
            assert!((bx - x).abs() < 1e-3, "x {} -> {}", x, bx);
            assert!((by - y).abs() < 1e-3, "y {} -> {}", y, by);
        }
    }

    #[test]
    fn test_recenter_moves_reference_to_origin() {
        let config = ProjectionConfig::from_epsg(2263, 32618)
            .unwrap()
            .with_recenter(988_000.0, 212_000.0);
        let r = Reprojector::new(&config).unwrap();
        let (x, y) = r.project(988_000.0, 212_000.0).unwrap();
        assert_relative_eq!(x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(y, 0.0, epsilon = 1e-6);

        // Roughly 328 ft east lands roughly 100 m east
        let (x, _) = r.project(988_328.0, 212_000.0).unwrap();
        assert!((x - 100.0).abs() < 1.0, "easting {}", x);

        let (bx, by) = r.inverse(0.0, 0.0).unwrap();
        assert!((bx - 988_000.0).abs() < 1e-3);
        assert!((by - 212_000.0).abs() < 1e-3);
    }

    #[test]
    fn test_z_follows_target_units() {
        let r = nyc_to_utm();
        let p = r.project_point3(&Point3::new(988_000.0, 212_000.0, 100.0)).unwrap();
        assert_relative_eq!(p.z, 30.480061, epsilon = 1e-6);
        assert_relative_eq!(r.z_to_meters(100.0), 30.480061, epsilon = 1e-6);

        // Feet in, feet out: z keeps the same scale as x and y
        let feet = Reprojector::new(&ProjectionConfig::from_epsg(2263, 2263).unwrap()).unwrap();
        let p = feet.project_point3(&Point3::new(988_000.0, 212_000.0, 100.0)).unwrap();
        assert_relative_eq!(p.z, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_units_read_from_definition() {
        assert_relative_eq!(CrsDefinition::from_epsg(2263).unwrap().unit(), US_SURVEY_FOOT);
        assert_relative_eq!(CrsDefinition::from_epsg(32618).unwrap().unit(), 1.0);
        let custom =
            CrsDefinition::from_proj_string("+proj=utm +zone=18 +ellps=GRS80 +to_meter=0.3048 +no_defs")
                .unwrap();
        assert_relative_eq!(custom.unit(), 0.3048);
    }

    #[test]
    fn test_unsupported_definitions() {
        assert!(CrsDefinition::from_epsg(9999).is_err());
        assert!(ProjectionConfig::from_epsg(2263, 3857).is_err());
        assert!(CrsDefinition::from_proj_string("+proj=nonsense +no_defs").is_err());
    }

    #[test]
    fn test_utm_zone_lookup() {
        let nad83 = CrsDefinition::from_epsg(26918).unwrap();
        assert!(nad83.definition().contains("+zone=18"));
        let wgs84 = CrsDefinition::from_epsg(32601).unwrap();
        assert!(wgs84.definition().contains("+zone=1 "));
    }
}
