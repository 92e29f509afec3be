//! Foundation types for the cask blob store.
//!
//! Every other cask crate depends on `cask-types`.
//!
//! # Key Types
//!
//! - [`Identifier`] -- SHA-256 content address of a blob
//! - [`BlobType`] -- namespace a blob is stored under (data, key, lock, snapshot, tree)

pub mod blob_type;
pub mod error;
pub mod identifier;

pub use blob_type::BlobType;
pub use error::TypeError;
pub use identifier::{Identifier, ID_SIZE};
