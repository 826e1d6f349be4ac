// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static packed Hilbert R-tree over building footprints
//!
//! Capacity is fixed at construction. Boxes are bulk-loaded in Hilbert order
//! when the tree is sealed, and the result serializes to the Flatbush v3
//! binary layout:
//!
//! ```text
//! [0xfb][version << 4 | array type][node size: u16][item count: u32]
//! [boxes: f64 x 4 x node count][indices: u16 or u32 x node count]
//! ```
//!
//! Leaf indices are insertion positions, so a query hit `k` joins to the
//! `k`-th entry of the id list written alongside the index.

use crate::building::{Aabb, Building};
use crate::error::{Error, Result};

const MAGIC: u8 = 0xfb;
const VERSION: u8 = 3;
/// Float64Array in the Flatbush array type table
const ARRAY_TYPE_F64: u8 = 8;
const HEADER_SIZE: usize = 8;
const HILBERT_MAX: f64 = 65535.0;
/// Above this many nodes indices no longer fit in u16
const U16_NODE_LIMIT: usize = 16384;

pub const DEFAULT_NODE_SIZE: u16 = 16;

/// Level boundaries in box-array units (4 values per node)
fn level_bounds(num_items: usize, node_size: usize) -> (Vec<usize>, usize) {
    let mut n = num_items;
    let mut num_nodes = n;
    let mut bounds = vec![n * 4];
    loop {
        n = n.div_ceil(node_size);
        num_nodes += n;
        bounds.push(num_nodes * 4);
        if n == 1 {
            break;
        }
    }
    (bounds, num_nodes)
}

fn clamp_node_size(node_size: u16) -> usize {
    node_size.max(2) as usize
}

/// Accepts exactly `capacity` boxes, then seals into a [`PackedRTree`]
#[derive(Debug)]
pub struct PackedRTreeBuilder {
    num_items: usize,
    node_size: usize,
    level_bounds: Vec<usize>,
    boxes: Vec<f64>,
    indices: Vec<u32>,
    pos: usize,
    bounds: Aabb,
}

impl PackedRTreeBuilder {
    /// Add one box; returns its insertion position
    pub fn add(&mut self, aabb: Aabb) -> Result<usize> {
        let index = self.pos / 4;
        if index >= self.num_items {
            return Err(Error::IndexFull {
                capacity: self.num_items,
            });
        }
        self.indices[index] = index as u32;
        self.boxes[self.pos..self.pos + 4]
            .copy_from_slice(&[aabb.min_x, aabb.min_y, aabb.max_x, aabb.max_y]);
        self.pos += 4;
        self.bounds.expand(&aabb);
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.pos / 4
    }

    pub fn is_empty(&self) -> bool {
        self.pos == 0
    }

    /// Sort leaves along the Hilbert curve and build the parent levels
    pub fn finish(mut self) -> Result<PackedRTree> {
        let added = self.pos / 4;
        if added != self.num_items {
            return Err(Error::IndexIncomplete {
                expected: self.num_items,
                added,
            });
        }

        let bounds = self.bounds;
        if self.num_items <= self.node_size {
            // One leaf node: root box only
            self.write_node(0, bounds);
            return Ok(self.seal());
        }

        self.hilbert_sort();

        let mut pos = 0;
        for level in 0..self.level_bounds.len() - 1 {
            let end = self.level_bounds[level];
            while pos < end {
                let node_index = pos;
                let mut node = Aabb::empty();
                let mut j = 0;
                while j < self.node_size && pos < end {
                    node.expand(&Aabb::new(
                        self.boxes[pos],
                        self.boxes[pos + 1],
                        self.boxes[pos + 2],
                        self.boxes[pos + 3],
                    ));
                    pos += 4;
                    j += 1;
                }
                self.write_node(node_index as u32, node);
            }
        }

        Ok(self.seal())
    }

    fn write_node(&mut self, child_pos: u32, aabb: Aabb) {
        self.indices[self.pos / 4] = child_pos;
        self.boxes[self.pos..self.pos + 4]
            .copy_from_slice(&[aabb.min_x, aabb.min_y, aabb.max_x, aabb.max_y]);
        self.pos += 4;
    }

    fn hilbert_sort(&mut self) {
        let bounds = self.bounds;
        let width = if bounds.width() > 0.0 { bounds.width() } else { 1.0 };
        let height = if bounds.height() > 0.0 { bounds.height() } else { 1.0 };

        let keys: Vec<u32> = (0..self.num_items)
            .map(|i| {
                let b = &self.boxes[i * 4..i * 4 + 4];
                let cx = (b[0] + b[2]) / 2.0;
                let cy = (b[1] + b[3]) / 2.0;
                let x = (HILBERT_MAX * (cx - bounds.min_x) / width).floor() as u32;
                let y = (HILBERT_MAX * (cy - bounds.min_y) / height).floor() as u32;
                hilbert(x, y)
            })
            .collect();

        let mut order: Vec<usize> = (0..self.num_items).collect();
        order.sort_by_key(|&i| keys[i]);

        let boxes: Vec<f64> = order
            .iter()
            .flat_map(|&i| self.boxes[i * 4..i * 4 + 4].iter().copied())
            .collect();
        self.boxes[..self.num_items * 4].copy_from_slice(&boxes);
        let indices: Vec<u32> = order.iter().map(|&i| self.indices[i]).collect();
        self.indices[..self.num_items].copy_from_slice(&indices);
    }

    fn seal(self) -> PackedRTree {
        PackedRTree {
            num_items: self.num_items,
            node_size: self.node_size,
            level_bounds: self.level_bounds,
            boxes: self.boxes,
            indices: self.indices,
        }
    }
}

/// Sealed, read-only spatial index
#[derive(Debug, Clone, PartialEq)]
pub struct PackedRTree {
    num_items: usize,
    node_size: usize,
    level_bounds: Vec<usize>,
    boxes: Vec<f64>,
    indices: Vec<u32>,
}

impl PackedRTree {
    /// Start a tree with room for exactly `num_items` boxes
    pub fn builder(num_items: usize, node_size: u16) -> Result<PackedRTreeBuilder> {
        if num_items == 0 {
            return Err(Error::InvalidIndex(
                "index needs at least one item".to_string(),
            ));
        }
        if num_items > u32::MAX as usize {
            return Err(Error::InvalidIndex(format!(
                "{} items exceed the u32 item count",
                num_items
            )));
        }
        let node_size = clamp_node_size(node_size);
        let (level_bounds, num_nodes) = level_bounds(num_items, node_size);
        Ok(PackedRTreeBuilder {
            num_items,
            node_size,
            level_bounds,
            boxes: vec![0.0; num_nodes * 4],
            indices: vec![0; num_nodes],
            pos: 0,
            bounds: Aabb::empty(),
        })
    }

    pub fn num_items(&self) -> usize {
        self.num_items
    }

    pub fn node_size(&self) -> usize {
        self.node_size
    }

    /// Bounds of everything in the tree
    pub fn bounds(&self) -> Aabb {
        let n = self.boxes.len();
        Aabb::new(
            self.boxes[n - 4],
            self.boxes[n - 3],
            self.boxes[n - 2],
            self.boxes[n - 1],
        )
    }

    /// Insertion positions of every box intersecting `query`
    pub fn search(&self, query: &Aabb) -> Vec<usize> {
        let mut results = Vec::new();
        let mut queue = Vec::new();
        let mut node_index = Some(self.boxes.len() - 4);

        while let Some(node) = node_index {
            let end = (node + self.node_size * 4).min(upper_bound(node, &self.level_bounds));
            let is_leaf = node < self.num_items * 4;

            for pos in (node..end).step_by(4) {
                let aabb = Aabb::new(
                    self.boxes[pos],
                    self.boxes[pos + 1],
                    self.boxes[pos + 2],
                    self.boxes[pos + 3],
                );
                if !query.intersects(&aabb) {
                    continue;
                }
                let index = self.indices[pos / 4] as usize;
                if is_leaf {
                    results.push(index);
                } else {
                    queue.push(index);
                }
            }

            node_index = queue.pop();
        }

        results
    }

    /// Serialize to the Flatbush v3 layout
    pub fn to_bytes(&self) -> Vec<u8> {
        let num_nodes = self.indices.len();
        let wide = num_nodes >= U16_NODE_LIMIT;
        let index_width = if wide { 4 } else { 2 };
        let mut out = Vec::with_capacity(HEADER_SIZE + num_nodes * (32 + index_width));

        out.push(MAGIC);
        out.push((VERSION << 4) | ARRAY_TYPE_F64);
        out.extend_from_slice(&(self.node_size as u16).to_le_bytes());
        out.extend_from_slice(&(self.num_items as u32).to_le_bytes());

        for value in &self.boxes {
            out.extend_from_slice(&value.to_le_bytes());
        }
        for &index in &self.indices {
            if wide {
                out.extend_from_slice(&index.to_le_bytes());
            } else {
                out.extend_from_slice(&(index as u16).to_le_bytes());
            }
        }
        out
    }

    /// Read back a tree written by [`PackedRTree::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::InvalidIndex("truncated header".to_string()));
        }
        if bytes[0] != MAGIC {
            return Err(Error::InvalidIndex(format!("bad magic 0x{:02x}", bytes[0])));
        }
        if bytes[1] >> 4 != VERSION {
            return Err(Error::InvalidIndex(format!(
                "unsupported version {}",
                bytes[1] >> 4
            )));
        }
        if bytes[1] & 0x0f != ARRAY_TYPE_F64 {
            return Err(Error::InvalidIndex(format!(
                "unsupported array type {}",
                bytes[1] & 0x0f
            )));
        }

        let node_size = u16::from_le_bytes([bytes[2], bytes[3]]) as usize;
        let num_items = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        if node_size < 2 || num_items == 0 {
            return Err(Error::InvalidIndex(format!(
                "node size {} with {} items",
                node_size, num_items
            )));
        }

        let (level_bounds, num_nodes) = level_bounds(num_items, node_size);
        let wide = num_nodes >= U16_NODE_LIMIT;
        let index_width = if wide { 4 } else { 2 };
        let boxes_len = num_nodes * 4 * 8;
        let expected = HEADER_SIZE + boxes_len + num_nodes * index_width;
        if bytes.len() < expected {
            return Err(Error::InvalidIndex(format!(
                "expected {} bytes, got {}",
                expected,
                bytes.len()
            )));
        }

        let box_bytes = &bytes[HEADER_SIZE..HEADER_SIZE + boxes_len];
        let boxes = box_bytes
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect();

        let index_bytes = &bytes[HEADER_SIZE + boxes_len..expected];
        let indices = if wide {
            index_bytes
                .chunks_exact(4)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect()
        } else {
            index_bytes
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]) as u32)
                .collect()
        };

        Ok(Self {
            num_items,
            node_size,
            level_bounds,
            boxes,
            indices,
        })
    }
}

/// First level bound strictly greater than `value`
fn upper_bound(value: usize, bounds: &[usize]) -> usize {
    let i = bounds.partition_point(|&b| b <= value);
    bounds.get(i).copied().unwrap_or(bounds[bounds.len() - 1])
}

/// Index every building footprint, keeping index position and id position
/// in lock-step
pub fn build_index(buildings: &[Building], node_size: u16) -> Result<(PackedRTree, Vec<String>)> {
    let mut builder = PackedRTree::builder(buildings.len(), node_size)?;
    let mut ids = Vec::with_capacity(buildings.len());
    for building in buildings {
        let position = builder.add(building.bounds())?;
        debug_assert_eq!(position, ids.len());
        ids.push(building.id.clone());
    }
    Ok((builder.finish()?, ids))
}

/// Map a point on a 65536 x 65536 grid to its Hilbert curve distance
fn hilbert(x: u32, y: u32) -> u32 {
    let mut a = x ^ y;
    let mut b = 0xFFFF ^ a;
    let mut c = 0xFFFF ^ (x | y);
    let mut d = x & (y ^ 0xFFFF);

    let mut aa = a | (b >> 1);
    let mut bb = (a >> 1) ^ a;
    let mut cc = ((c >> 1) ^ (b & (d >> 1))) ^ c;
    let mut dd = ((a & (c >> 1)) ^ (d >> 1)) ^ d;

    a = aa;
    b = bb;
    c = cc;
    d = dd;
    aa = (a & (a >> 2)) ^ (b & (b >> 2));
    bb = (a & (b >> 2)) ^ (b & ((a ^ b) >> 2));
    cc ^= (a & (c >> 2)) ^ (b & (d >> 2));
    dd ^= (b & (c >> 2)) ^ ((a ^ b) & (d >> 2));

    a = aa;
    b = bb;
    c = cc;
    d = dd;
    aa = (a & (a >> 4)) ^ (b & (b >> 4));
    bb = (a & (b >> 4)) ^ (b & ((a ^ b) >> 4));
    cc ^= (a & (c >> 4)) ^ (b & (d >> 4));
    dd ^= (b & (c >> 4)) ^ ((a ^ b) & (d >> 4));

    a = aa;
    b = bb;
    c = cc;
    d = dd;
    cc ^= (a & (c >> 8)) ^ (b & (d >> 8));
    dd ^= (b & (c >> 8)) ^ ((a ^ b) & (d >> 8));

    a = cc ^ (cc >> 1);
    b = dd ^ (dd >> 1);

    let mut i0 = x ^ y;
    let mut i1 = b | (0xFFFF ^ (i0 | a));

    i0 = (i0 | (i0 << 8)) & 0x00FF00FF;
    i0 = (i0 | (i0 << 4)) & 0x0F0F0F0F;
    i0 = (i0 | (i0 << 2)) & 0x33333333;
    i0 = (i0 | (i0 << 1)) & 0x55555555;

    i1 = (i1 | (i1 << 8)) & 0x00FF00FF;
    i1 = (i1 | (i1 << 4)) & 0x0F0F0F0F;
    i1 = (i1 | (i1 << 2)) & 0x33333333;
    i1 = (i1 | (i1 << 1)) & 0x55555555;

    (i1 << 1) | i0
}
