// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fast position-list parsing
//!
//! Parses whitespace separated coordinate text such as the body of a
//! `gml:posList` or `gml:pos` element straight from raw bytes, without going
//! through `str::parse`.

use crate::error::{Error, Result};
use nalgebra::Point3;

/// Check if byte is a digit, sign, or decimal point (start of number)
#[inline(always)]
fn is_number_start(b: u8) -> bool {
    b.is_ascii_digit() || b == b'-' || b == b'+' || b == b'.'
}

/// Estimate number of floats in coordinate text
#[inline]
fn estimate_float_count(bytes: &[u8]) -> usize {
    // ~12 bytes per value for projected coordinates in feet
    bytes.len() / 12
}

/// Parse coordinate text directly from raw bytes to `Vec<f64>`
///
/// Anything that is not a number is treated as a separator, so both
/// `"1 2 3"` and `"1,2,3"` yield `[1.0, 2.0, 3.0]`.
#[inline]
pub fn parse_positions(bytes: &[u8]) -> Vec<f64> {
    let mut result = Vec::with_capacity(estimate_float_count(bytes));
    extend_positions(&mut result, bytes);
    result
}

/// Append the numbers found in `bytes` to `out`
#[inline]
pub fn extend_positions(out: &mut Vec<f64>, bytes: &[u8]) {
    let mut pos = 0;
    let len = bytes.len();

    while pos < len {
        while pos < len && !is_number_start(bytes[pos]) {
            pos += 1;
        }
        if pos >= len {
            break;
        }

        match fast_float::parse_partial::<f64, _>(&bytes[pos..]) {
            Ok((value, consumed)) if consumed > 0 => {
                out.push(value);
                pos += consumed;
            }
            _ => {
                // Skip this character and continue
                pos += 1;
            }
        }
    }
}

/// Parse an `srsDimension` attribute value
pub fn parse_dimension(value: &str) -> Result<usize> {
    match value.trim() {
        "2" => Ok(2),
        "3" => Ok(3),
        other => Err(Error::UnsupportedDimension(other.to_string())),
    }
}

/// Group a flat value list into 3D points.
///
/// 2D tuples get `z = 0`. Trailing values that do not form a full tuple are
/// discarded unless `strict` is set, in which case they are an error.
/// The returned flag reports whether anything was discarded.
pub fn group_points(
    values: &[f64],
    dimension: usize,
    strict: bool,
) -> Result<(Vec<Point3<f64>>, bool)> {
    if !(2..=3).contains(&dimension) {
        return Err(Error::UnsupportedDimension(dimension.to_string()));
    }
    let remainder = values.len() % dimension;
    if remainder != 0 && strict {
        return Err(Error::MalformedPositionList {
            len: values.len(),
            dimension,
        });
    }

    let points = values
        .chunks_exact(dimension)
        .map(|c| match dimension {
            2 => Point3::new(c[0], c[1], 0.0),
            _ => Point3::new(c[0], c[1], c[2]),
        })
        .collect();

    Ok((points, remainder != 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_positions() {
        let values = parse_positions(b"985000.5 195000.25 10\n  985010 195000.25 10.5");
        assert_eq!(values, vec![985000.5, 195000.25, 10.0, 985010.0, 195000.25, 10.5]);
    }

    #[test]
    fn test_parse_positions_scientific() {
        let values = parse_positions(b"-1.5e2 2E1 0.5");
        assert_eq!(values, vec![-150.0, 20.0, 0.5]);
    }

    #[test]
    fn test_parse_positions_empty() {
        assert!(parse_positions(b"   \n\t").is_empty());
    }

    #[test]
    fn test_group_points_truncates_partial_tuple() {
        let (points, truncated) = group_points(&[1.0, 2.0, 3.0, 4.0, 5.0], 3, false).unwrap();
        assert_eq!(points.len(), 1);
        assert!(truncated);
        assert_eq!(points[0], Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_group_points_strict_rejects_partial_tuple() {
        let result = group_points(&[1.0, 2.0, 3.0, 4.0], 3, true);
        assert!(matches!(
            result,
            Err(Error::MalformedPositionList { len: 4, dimension: 3 })
        ));
    }

    #[test]
    fn test_group_points_2d() {
        let (points, truncated) = group_points(&[1.0, 2.0, 3.0, 4.0], 2, true).unwrap();
        assert!(!truncated);
        assert_eq!(points, vec![Point3::new(1.0, 2.0, 0.0), Point3::new(3.0, 4.0, 0.0)]);
    }

    #[test]
    fn test_parse_dimension() {
        assert_eq!(parse_dimension("3").unwrap(), 3);
        assert_eq!(parse_dimension(" 2 ").unwrap(), 2);
        assert!(parse_dimension("4").is_err());
    }
}
