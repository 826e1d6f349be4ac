// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for document parsing and extraction
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading a building document
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error at byte {position}: {source}")]
    Xml {
        position: usize,
        #[source]
        source: quick_xml::Error,
    },

    #[error("Unbalanced document: {0}")]
    Unbalanced(String),

    #[error("Position list has {len} values, not a multiple of {dimension}")]
    MalformedPositionList { len: usize, dimension: usize },

    #[error("Unsupported srsDimension: {0}")]
    UnsupportedDimension(String),
}
