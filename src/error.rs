// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for starting-tree I/O and construction.
//!
//! All parser and engine errors use [`Error`], with variants for each
//! failure mode. No external error crates — zero-dependency error type.

use std::fmt;
use std::path::PathBuf;

/// Errors produced by the distance-matrix loaders and tree engines.
#[derive(Debug)]
pub enum Error {
    /// File I/O error with path context.
    Io {
        /// Path that caused the error.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// PHYLIP distance-matrix parsing error (sovereign parser).
    Phylip(String),
    /// Invalid input parameters (dimensions, ranges, constraints).
    InvalidInput(String),
    /// Allocation failure while sizing a matrix; payload is the
    /// requested element count.
    OutOfMemory(usize),
    /// Structural invariant violated (cluster-tree cycle, no finite
    /// row minimum, non-finite merge weight). Indicates a logic error
    /// or NaN-contaminated input, never a recoverable condition.
    Invariant(String),
    /// Tree-builder factory lookup failed.
    UnknownBuilder(String),
}

/// Result type alias for starting-tree operations.
pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Phylip(msg) => write!(f, "PHYLIP parse error: {msg}"),
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::OutOfMemory(count) => {
                write!(f, "out of memory: failed to allocate {count} matrix elements")
            }
            Self::Invariant(msg) => write!(f, "invariant violation: {msg}"),
            Self::UnknownBuilder(name) => write!(f, "unknown tree builder: {name:?}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Phylip(_)
            | Self::InvalidInput(_)
            | Self::OutOfMemory(_)
            | Self::Invariant(_)
            | Self::UnknownBuilder(_) => None,
        }
    }
}
