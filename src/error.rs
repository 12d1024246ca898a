//! Centralized error types for mailgraph.

use std::path::PathBuf;
use thiserror::Error;

use crate::graph::StoreError;

/// Why a single mail file could not be normalized.
///
/// These are recoverable: the corpus walker counts them by their `Display`
/// text and moves on to the next file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The file has no bytes at all.
    #[error("empty file")]
    Empty,

    /// No `Name: value` line was found before the first blank line.
    #[error("no header block found")]
    NoHeaders,

    /// The message carries no `From` header.
    #[error("no From header")]
    MissingFrom,

    /// The `From` header exists but holds nothing that looks like an address.
    #[error("From header has no usable address: {0}")]
    InvalidSender(String),

    /// The file could not be read.
    #[error("unreadable file: {0}")]
    Unreadable(String),
}

/// All fatal errors produced by the mailgraph library.
#[derive(Error, Debug)]
pub enum IngestError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A mailbox root passed to the walker does not exist.
    #[error("Mailbox root not found: {0}")]
    RootNotFound(PathBuf),

    /// An interchange file is missing or malformed.
    #[error("Invalid interchange data in '{path}': {reason}")]
    DataIntegrity { path: PathBuf, reason: String },

    /// The graph store did not answer the connectivity probe.
    #[error("Graph store unreachable at {target}: {source}")]
    Connectivity { target: String, source: StoreError },

    /// A batch write or existence probe failed mid-run.
    #[error("Graph store error during {stage} (batch {batch}): {source}")]
    Store {
        stage: &'static str,
        batch: usize,
        source: StoreError,
    },

    /// The requested batch size cannot be used.
    #[error("Invalid batch size: {0}")]
    InvalidBatchSize(usize),
}

/// Convenience alias for `Result<T, IngestError>`.
pub type Result<T> = std::result::Result<T, IngestError>;

impl IngestError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a `DataIntegrity` variant for an interchange file.
    pub fn integrity(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::DataIntegrity {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
