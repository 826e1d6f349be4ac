// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # CityMesh Core
//!
//! Typed document model and geometry extraction for CityGML-style building
//! datasets.
//!
//! ## Overview
//!
//! - **Normalization**: one pass over the XML token stream builds a typed
//!   tree ([`Document`]) whose nodes are classified by local element name
//! - **Position parsing**: coordinate text is parsed straight from bytes with
//!   [fast-float](https://docs.rs/fast-float)
//! - **Extraction**: [`GeometryExtractor`] recovers polygon rings, holes and
//!   footprint hints per building
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use citymesh_core::{Document, GeometryExtractor, ParseOptions};
//!
//! let document = Document::from_path("buildings.gml")?;
//! let extraction = GeometryExtractor::new(ParseOptions::default()).extract(&document)?;
//!
//! for group in &extraction.groups {
//!     println!("{:?}: {} fragments", group.owner, group.geometry.fragments.len());
//! }
//! ```

pub mod document;
pub mod error;
pub mod extract;
pub mod positions;
pub mod ring;

pub use document::{Document, Node, NodeKind, PositionList, SurfaceKind};
pub use error::{Error, Result};
pub use extract::{
    ExtractedGeometry, ExtractedGroup, Extraction, ExtractionStats, GeometryExtractor, Owner,
    ParseOptions,
};
pub use positions::{extend_positions, group_points, parse_positions};
pub use ring::{RawRing, SurfaceFragment, SurfaceRole};
