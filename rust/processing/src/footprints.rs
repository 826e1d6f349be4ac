// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! GeoJSON footprint collection, one Polygon feature per building

use crate::building::Building;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct FeatureCollection<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    features: Vec<Feature<'a>>,
}

#[derive(Serialize)]
struct Feature<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    properties: Properties<'a>,
    geometry: Polygon,
}

#[derive(Serialize)]
struct Properties<'a> {
    id: &'a str,
    height: f64,
}

#[derive(Serialize)]
struct Polygon {
    #[serde(rename = "type")]
    kind: &'static str,
    coordinates: Vec<Vec<[f64; 2]>>,
}

fn feature(building: &Building) -> Feature<'_> {
    // GeoJSON rings repeat the first position at the end
    let mut ring: Vec<[f64; 2]> = building.footprint.iter().map(|p| [p.x, p.y]).collect();
    if let Some(&first) = ring.first() {
        ring.push(first);
    }

    Feature {
        kind: "Feature",
        properties: Properties {
            id: &building.id,
            height: building.height_m,
        },
        geometry: Polygon {
            kind: "Polygon",
            coordinates: vec![ring],
        },
    }
}

/// Write every building's footprint as a FeatureCollection
pub fn write_footprints<W: Write>(writer: W, buildings: &[Building]) -> Result<()> {
    let collection = FeatureCollection {
        kind: "FeatureCollection",
        features: buildings.iter().map(feature).collect(),
    };
    serde_json::to_writer(writer, &collection)?;
    Ok(())
}
