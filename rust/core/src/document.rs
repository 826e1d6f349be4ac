// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed document model
//!
//! A single pass over the XML token stream classifies every element by its
//! local name (namespace prefixes are ignored) into a [`NodeKind`]. Elements
//! that carry no geometry and have no geometry-carrying descendants are
//! pruned when they close, so a multi-gigabyte document only keeps the
//! structure the extractor needs.

use std::borrow::Cow;
use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};
use crate::positions::{extend_positions, parse_dimension};

/// Semantic surface element kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    Roof,
    Wall,
    Ground,
    Footprint,
}

/// Raw coordinate values with their tuple size
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PositionList {
    pub values: Vec<f64>,
    /// Values per point, from `srsDimension` (defaults to 3)
    pub dimension: usize,
}

/// Classified element
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Building,
    Polygon,
    Surface(SurfaceKind),
    Exterior,
    Interior,
    LinearRing,
    Positions(PositionList),
    Other,
}

impl NodeKind {
    /// Classify an element by its local name
    pub fn classify(local_name: &[u8]) -> Self {
        match local_name {
            b"Building" => NodeKind::Building,
            b"Polygon" => NodeKind::Polygon,
            b"RoofSurface" => NodeKind::Surface(SurfaceKind::Roof),
            b"WallSurface" => NodeKind::Surface(SurfaceKind::Wall),
            b"GroundSurface" => NodeKind::Surface(SurfaceKind::Ground),
            b"lod0FootPrint" | b"lod0Footprint" | b"FootPrint" | b"Footprint" => {
                NodeKind::Surface(SurfaceKind::Footprint)
            }
            b"exterior" | b"outerBoundaryIs" => NodeKind::Exterior,
            b"interior" | b"innerBoundaryIs" => NodeKind::Interior,
            b"LinearRing" => NodeKind::LinearRing,
            b"posList" | b"pos" | b"coordinates" => NodeKind::Positions(PositionList {
                values: Vec::new(),
                dimension: 3,
            }),
            _ => NodeKind::Other,
        }
    }
}

/// Element of the typed tree
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    /// `gml:id` attribute
    pub id: Option<String>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            id: None,
            children: Vec::new(),
        }
    }

    /// Builder-style child append, mostly useful for constructing trees in tests
    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Nodes worth keeping in the tree
    #[inline]
    fn is_retained(&self) -> bool {
        match self.kind {
            NodeKind::Other | NodeKind::Building => !self.children.is_empty(),
            _ => true,
        }
    }

    /// Position list payload, if this is a position element
    #[inline]
    pub fn positions(&self) -> Option<&PositionList> {
        match &self.kind {
            NodeKind::Positions(list) => Some(list),
            _ => None,
        }
    }

    /// First direct child of the given kind discriminant
    pub fn child_where(&self, pred: impl Fn(&NodeKind) -> bool) -> Option<&Node> {
        self.children.iter().find(|c| pred(&c.kind))
    }
}

/// Parsed building document
#[derive(Debug, Clone)]
pub struct Document {
    /// Synthetic root holding the retained top-level structure
    pub root: Node,
    /// Number of elements seen in the source, retained or not
    pub element_count: usize,
}

impl Document {
    /// Parse a document held in memory
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(bytes);
        reader.trim_text(true);

        let mut buf = Vec::new();
        let mut stack: Vec<Node> = vec![Node::new(NodeKind::Other)];
        let mut element_count = 0usize;

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|source| Error::Xml {
                    position: reader.buffer_position(),
                    source,
                })?;

            match event {
                Event::Start(e) => {
                    element_count += 1;
                    stack.push(open_element(&e, reader.buffer_position())?);
                }
                Event::Empty(e) => {
                    element_count += 1;
                    let node = open_element(&e, reader.buffer_position())?;
                    attach(&mut stack, node)?;
                }
                Event::Text(text) => {
                    if let Some(NodeKind::Positions(list)) = stack.last_mut().map(|n| &mut n.kind) {
                        extend_positions(&mut list.values, &text);
                    }
                }
                Event::End(_) => {
                    let node = stack
                        .pop()
                        .ok_or_else(|| Error::Unbalanced("closing tag without opening tag".into()))?;
                    attach(&mut stack, node)?;
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if stack.len() != 1 {
            return Err(Error::Unbalanced(format!(
                "{} element(s) left open at end of document",
                stack.len() - 1
            )));
        }
        let root = stack.pop().unwrap_or_else(|| Node::new(NodeKind::Other));

        tracing::debug!(element_count, retained = root.children.len(), "parsed document");

        Ok(Self {
            root,
            element_count,
        })
    }

    /// Parse a document from disk through a read-only memory map
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        if file.metadata()?.len() == 0 {
            return Self::parse(&[]);
        }
        // SAFETY: the map is read-only and dropped before this function
        // returns; the input file is not expected to change during the run.
        let map = unsafe { Mmap::map(&file)? };
        Self::parse(&map[..])
    }
}

/// Classify a start tag and capture its `gml:id` / `srsDimension` attributes
fn open_element(e: &BytesStart<'_>, position: usize) -> Result<Node> {
    let xml_err = |source: quick_xml::Error| Error::Xml { position, source };
    let mut node = Node::new(NodeKind::classify(e.local_name().as_ref()));

    for attr in e.attributes() {
        let attr = attr.map_err(|err| xml_err(err.into()))?;
        match attr.key.local_name().as_ref() {
            b"id" => {
                let value: Cow<'_, str> = attr.unescape_value().map_err(xml_err)?;
                node.id = Some(value.into_owned());
            }
            b"srsDimension" => {
                if let NodeKind::Positions(list) = &mut node.kind {
                    let value = attr.unescape_value().map_err(xml_err)?;
                    list.dimension = parse_dimension(&value)?;
                }
            }
            _ => {}
        }
    }

    Ok(node)
}

/// Hand a closed node to its parent, dropping it if it carries nothing
fn attach(stack: &mut [Node], node: Node) -> Result<()> {
    let parent = stack
        .last_mut()
        .ok_or_else(|| Error::Unbalanced("closing tag without opening tag".into()))?;
    if node.is_retained() {
        parent.children.push(node);
    }
    Ok(())
}
