use std::path::PathBuf;

use cask_types::{BlobType, Identifier, TypeError};

/// Errors from blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested blob does not exist.
    #[error("{kind} blob not found: {id}")]
    NotFound { kind: BlobType, id: Identifier },

    /// Operation attempted outside its valid lifecycle.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// Malformed identifier text or type name.
    #[error("parse error: {0}")]
    Parse(#[from] TypeError),

    /// A repository already exists at the target location.
    #[error("a repository already exists at {0}")]
    StoreExists(PathBuf),

    /// No repository marker was found at the target location.
    #[error("no repository found at {0}")]
    StoreNotFound(PathBuf),

    /// The backend instance was destroyed with `delete`.
    #[error("store at {0} has been deleted")]
    StoreDeleted(String),

    /// Stored content does not hash to its identifier (data corruption).
    #[error("hash mismatch for {kind} blob {id}: content hashes to {computed}")]
    HashMismatch {
        kind: BlobType,
        id: Identifier,
        computed: Identifier,
    },

    /// No stored identifier starts with the given prefix.
    #[error("no {kind} blob matches prefix {prefix:?}")]
    NoPrefixMatch { kind: BlobType, prefix: String },

    /// More than one stored identifier starts with the given prefix.
    #[error("prefix {prefix:?} matches {count} {kind} blobs")]
    AmbiguousPrefix {
        kind: BlobType,
        prefix: String,
        count: usize,
    },

    /// Repository marker or configuration document is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// I/O error from the underlying storage medium.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Returns `true` for [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
