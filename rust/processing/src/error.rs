// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while assembling and writing building artifacts
#[derive(Error, Debug)]
pub enum Error {
    #[error("Document error: {0}")]
    Document(#[from] citymesh_core::Error),

    #[error("Geometry error: {0}")]
    Geometry(#[from] citymesh_geometry::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No buildings extracted from {files} input file(s)")]
    NoBuildings { files: usize },

    #[error("Spatial index is full: capacity {capacity}")]
    IndexFull { capacity: usize },

    #[error("Spatial index expects {expected} items, got {added}")]
    IndexIncomplete { expected: usize, added: usize },

    #[error("Invalid spatial index data: {0}")]
    InvalidIndex(String),

    #[error("Invalid container data: {0}")]
    InvalidContainer(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
