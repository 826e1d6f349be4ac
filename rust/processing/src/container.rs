// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Binary glTF (GLB) container for building meshes
//!
//! Layout: a 12-byte header (`glTF`, version 2, total length), a JSON chunk
//! describing one node/mesh per building, and a BIN chunk holding each
//! building's positions and indices back-to-back. Positions are stored
//! relative to the mesh centroid; the centroid becomes the node translation.

use crate::building::Building;
use crate::error::{Error, Result};
use citymesh_geometry::{CoordinateShift, Mesh};
use serde::Serialize;

pub const GLB_MAGIC: u32 = 0x4654_6C67;
pub const GLB_VERSION: u32 = 2;
pub const CHUNK_JSON: u32 = 0x4E4F_534A;
pub const CHUNK_BIN: u32 = 0x004E_4942;
pub const HEADER_SIZE: usize = 12;
pub const CHUNK_HEADER_SIZE: usize = 8;

const COMPONENT_FLOAT: u32 = 5126;
const COMPONENT_UNSIGNED_INT: u32 = 5125;
const TARGET_ARRAY_BUFFER: u32 = 34962;
const TARGET_ELEMENT_ARRAY_BUFFER: u32 = 34963;
const MODE_TRIANGLES: u32 = 4;

#[inline]
fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

/// Byte range of one region inside the binary buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferRegion {
    pub offset: usize,
    pub length: usize,
}

/// Growing binary buffer that hands out 4-byte aligned regions
#[derive(Debug, Default)]
pub struct BufferWriter {
    bytes: Vec<u8>,
}

impl BufferWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_f32s(&mut self, values: &[f32]) -> BufferRegion {
        self.begin();
        let offset = self.bytes.len();
        for v in values {
            self.bytes.extend_from_slice(&v.to_le_bytes());
        }
        BufferRegion {
            offset,
            length: self.bytes.len() - offset,
        }
    }

    pub fn write_u32s(&mut self, values: &[u32]) -> BufferRegion {
        self.begin();
        let offset = self.bytes.len();
        for v in values {
            self.bytes.extend_from_slice(&v.to_le_bytes());
        }
        BufferRegion {
            offset,
            length: self.bytes.len() - offset,
        }
    }

    /// Zero-pad so the next region starts on a 4-byte boundary
    fn begin(&mut self) {
        self.bytes.resize(padded_len(self.bytes.len()), 0);
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Gltf {
    asset: Asset,
    scene: usize,
    scenes: Vec<Scene>,
    nodes: Vec<GltfNode>,
    meshes: Vec<GltfMesh>,
    accessors: Vec<Accessor>,
    buffer_views: Vec<BufferView>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    buffers: Vec<Buffer>,
}

#[derive(Serialize)]
struct Asset {
    version: &'static str,
    generator: &'static str,
}

#[derive(Serialize)]
struct Scene {
    nodes: Vec<usize>,
}

#[derive(Serialize)]
struct GltfNode {
    name: String,
    mesh: usize,
    translation: [f64; 3],
}

#[derive(Serialize)]
struct GltfMesh {
    name: String,
    primitives: Vec<Primitive>,
}

#[derive(Serialize)]
struct Primitive {
    attributes: Attributes,
    indices: usize,
    mode: u32,
}

#[derive(Serialize)]
struct Attributes {
    #[serde(rename = "POSITION")]
    position: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Accessor {
    buffer_view: usize,
    component_type: u32,
    count: usize,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    min: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max: Option<[f32; 3]>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BufferView {
    buffer: usize,
    byte_offset: usize,
    byte_length: usize,
    target: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Buffer {
    byte_length: usize,
}

fn position_bounds(positions: &[f32]) -> ([f32; 3], [f32; 3]) {
    let mut min = [f32::INFINITY; 3];
    let mut max = [f32::NEG_INFINITY; 3];
    for p in positions.chunks_exact(3) {
        for k in 0..3 {
            min[k] = min[k].min(p[k]);
            max[k] = max[k].max(p[k]);
        }
    }
    (min, max)
}

fn usable(mesh: &Mesh) -> bool {
    !mesh.is_empty() && mesh.is_well_formed()
}

/// Serialize every building that has a mesh into one GLB
pub fn write_glb(buildings: &[Building]) -> Result<Vec<u8>> {
    let mut gltf = Gltf {
        asset: Asset {
            version: "2.0",
            generator: concat!("citymesh ", env!("CARGO_PKG_VERSION")),
        },
        scene: 0,
        scenes: vec![Scene { nodes: Vec::new() }],
        nodes: Vec::new(),
        meshes: Vec::new(),
        accessors: Vec::new(),
        buffer_views: Vec::new(),
        buffers: Vec::new(),
    };
    let mut writer = BufferWriter::new();

    for building in buildings {
        let Some(mesh) = building.mesh.as_ref().filter(|m| usable(m)) else {
            continue;
        };

        let centroid = mesh.centroid();
        let shift = CoordinateShift::from_point(centroid);
        let positions = mesh.shifted_positions_f32(&shift);
        let (min, max) = position_bounds(&positions);

        let position_region = writer.write_f32s(&positions);
        let index_region = writer.write_u32s(&mesh.indices);

        let view = gltf.buffer_views.len();
        gltf.buffer_views.push(BufferView {
            buffer: 0,
            byte_offset: position_region.offset,
            byte_length: position_region.length,
            target: TARGET_ARRAY_BUFFER,
        });
        gltf.buffer_views.push(BufferView {
            buffer: 0,
            byte_offset: index_region.offset,
            byte_length: index_region.length,
            target: TARGET_ELEMENT_ARRAY_BUFFER,
        });

        let accessor = gltf.accessors.len();
        gltf.accessors.push(Accessor {
            buffer_view: view,
            component_type: COMPONENT_FLOAT,
            count: mesh.vertex_count(),
            kind: "VEC3",
            min: Some(min),
            max: Some(max),
        });
        gltf.accessors.push(Accessor {
            buffer_view: view + 1,
            component_type: COMPONENT_UNSIGNED_INT,
            count: mesh.indices.len(),
            kind: "SCALAR",
            min: None,
            max: None,
        });

        let mesh_index = gltf.meshes.len();
        gltf.meshes.push(GltfMesh {
            name: building.id.clone(),
            primitives: vec![Primitive {
                attributes: Attributes { position: accessor },
                indices: accessor + 1,
                mode: MODE_TRIANGLES,
            }],
        });

        let node = gltf.nodes.len();
        gltf.nodes.push(GltfNode {
            name: building.id.clone(),
            mesh: mesh_index,
            translation: shift.to_array(),
        });
        gltf.scenes[0].nodes.push(node);
    }

    let bin = writer.into_bytes();
    if !bin.is_empty() {
        gltf.buffers.push(Buffer {
            byte_length: bin.len(),
        });
    }

    let json = serde_json::to_vec(&gltf)?;
    Ok(assemble(json, bin))
}

/// Frame the JSON and BIN chunks behind the GLB header
fn assemble(mut json: Vec<u8>, mut bin: Vec<u8>) -> Vec<u8> {
    json.resize(padded_len(json.len()), b' ');
    bin.resize(padded_len(bin.len()), 0);

    let bin_chunk = if bin.is_empty() {
        0
    } else {
        CHUNK_HEADER_SIZE + bin.len()
    };
    let total = HEADER_SIZE + CHUNK_HEADER_SIZE + json.len() + bin_chunk;

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    out.extend_from_slice(&GLB_VERSION.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());

    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&json);

    if !bin.is_empty() {
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
        out.extend_from_slice(&bin);
    }

    out
}

/// Parsed GLB header and chunk table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlbHeader {
    pub version: u32,
    pub total_length: usize,
    pub json: BufferRegion,
    pub bin: Option<BufferRegion>,
}

fn read_u32(bytes: &[u8], at: usize) -> Result<u32> {
    bytes
        .get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| Error::InvalidContainer(format!("truncated at byte {}", at)))
}

/// Validate a GLB header and locate its chunks; regions are absolute
pub fn read_glb_header(bytes: &[u8]) -> Result<GlbHeader> {
    if read_u32(bytes, 0)? != GLB_MAGIC {
        return Err(Error::InvalidContainer("missing glTF magic".to_string()));
    }
    let version = read_u32(bytes, 4)?;
    let total_length = read_u32(bytes, 8)? as usize;
    if total_length != bytes.len() {
        return Err(Error::InvalidContainer(format!(
            "header declares {} bytes, buffer has {}",
            total_length,
            bytes.len()
        )));
    }

    let json_length = read_u32(bytes, HEADER_SIZE)? as usize;
    if read_u32(bytes, HEADER_SIZE + 4)? != CHUNK_JSON {
        return Err(Error::InvalidContainer(
            "first chunk is not JSON".to_string(),
        ));
    }
    let json = BufferRegion {
        offset: HEADER_SIZE + CHUNK_HEADER_SIZE,
        length: json_length,
    };

    let mut cursor = json.offset + json_length;
    let mut bin = None;
    if cursor < total_length {
        let bin_length = read_u32(bytes, cursor)? as usize;
        if read_u32(bytes, cursor + 4)? != CHUNK_BIN {
            return Err(Error::InvalidContainer(
                "second chunk is not BIN".to_string(),
            ));
        }
        bin = Some(BufferRegion {
            offset: cursor + CHUNK_HEADER_SIZE,
            length: bin_length,
        });
        cursor += CHUNK_HEADER_SIZE + bin_length;
    }

    if cursor != total_length {
        return Err(Error::InvalidContainer(format!(
            "chunks end at {}, container is {} bytes",
            cursor, total_length
        )));
    }

    Ok(GlbHeader {
        version,
        total_length,
        json,
        bin,
    })
}
