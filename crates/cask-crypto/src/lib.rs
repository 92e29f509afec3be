//! Streaming digest primitives for cask.
//!
//! - [`HashingReader`] / [`HashingWriter`] -- tee a byte stream through a
//!   running digest, passing bytes through unchanged
//! - [`HashAppendReader`] / [`HashAppendWriter`] -- self-verifying streams that
//!   carry the digest of their data as a trailer
//!
//! All wrappers are generic over any [`Digest`]; the store itself uses
//! [`Sha256`], re-exported here as [`DefaultDigest`].

pub mod append;
pub mod hashing;

pub use append::{HashAppendReader, HashAppendWriter};
pub use hashing::{HashingReader, HashingWriter};
pub use sha2::digest::Digest;
pub use sha2::Sha256;

/// Digest algorithm used for blob identifiers.
pub type DefaultDigest = Sha256;

/// Name recorded in repository metadata for [`DefaultDigest`].
pub const DEFAULT_DIGEST_NAME: &str = "sha256";

#[cfg(test)]
pub(crate) mod test_util {
    use rand::RngCore;

    /// Below one buffer, above one buffer, and a multiple of a large block.
    pub const TEST_SIZES: [usize; 4] = [5, 23, (2 << 18) + 23, 1 << 20];

    pub fn random_bytes(len: usize) -> Vec<u8> {
        let mut data = vec![0u8; len];
        rand::thread_rng().fill_bytes(&mut data);
        data
    }
}
