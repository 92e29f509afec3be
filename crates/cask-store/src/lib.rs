//! Content-addressed blob storage for cask.
//!
//! A store holds immutable blobs in five namespaces ([`BlobType`]). Each blob
//! is identified by the SHA-256 digest of its content, computed while it is
//! written: callers open a [`WriteHandle`], stream bytes into it and learn the
//! [`Identifier`] only when they close it.
//!
//! # Storage Backends
//!
//! All backends implement the [`Backend`] trait:
//!
//! - [`LocalBackend`] -- one file per blob under a local directory tree
//! - [`InMemoryBackend`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Blobs are immutable; storing the same content twice is a no-op that
//!    reports [`CreateOutcome::AlreadyPresent`].
//! 2. Stage-then-publish: bytes are hashed into a private staging area and
//!    become visible under their id in one atomic step.
//! 3. Concurrent reads are always safe, including against in-flight creates.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod config;
pub mod error;
pub mod handle;
pub mod local;
pub mod memory;
pub mod traits;

#[cfg(test)]
pub(crate) mod testsuite;

pub use cask_types::{BlobType, Identifier};
pub use config::{RepoConfig, StoreConfig, REPO_VERSION};
pub use error::{StoreError, StoreResult};
pub use handle::{CommitStatus, CreateOutcome, StagedBlob, WriteHandle};
pub use local::{LocalBackend, CONFIG_FILE, TMP_DIR};
pub use memory::InMemoryBackend;
pub use traits::{Backend, MIN_PREFIX_LENGTH};
