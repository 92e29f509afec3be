use std::io::{self, Read, Write};

use cask_crypto::{DefaultDigest, HashingReader};
use cask_types::{BlobType, Identifier, ID_SIZE};

use crate::error::{StoreError, StoreResult};
use crate::handle::{CreateOutcome, WriteHandle};

/// Shortest hex prefix [`Backend::prefix_length`] will report.
pub const MIN_PREFIX_LENGTH: usize = 8;

/// Content-addressed blob store, keyed by (`BlobType`, `Identifier`).
///
/// All implementations must satisfy these invariants:
/// - For every created blob, the SHA-256 of its content equals its id.
/// - Blobs are immutable once created; creating identical content again
///   yields [`CreateOutcome::AlreadyPresent`], never an overwrite.
/// - A partially written blob is never visible under any id.
/// - Reads are safe concurrently with each other and with creates.
/// - All I/O errors are propagated, never silently ignored.
pub trait Backend: Send + Sync {
    /// Open a write handle for a new blob in namespace `kind`.
    fn create(&self, kind: BlobType) -> StoreResult<WriteHandle>;

    /// Read a blob's full content.
    ///
    /// The default implementation drains [`get_reader`](Self::get_reader).
    fn get(&self, kind: BlobType, id: &Identifier) -> StoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.get_reader(kind, id)?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Stream a blob's content.
    fn get_reader(&self, kind: BlobType, id: &Identifier) -> StoreResult<Box<dyn Read + Send>>;

    /// Check whether a blob exists without reading it.
    fn test(&self, kind: BlobType, id: &Identifier) -> StoreResult<bool>;

    /// Remove one blob. Fails with `NotFound` if it does not exist.
    fn remove(&self, kind: BlobType, id: &Identifier) -> StoreResult<()>;

    /// All ids stored under `kind`, sorted ascending.
    fn list(&self, kind: BlobType) -> StoreResult<Vec<Identifier>>;

    /// Human-readable description of where this store lives.
    fn location(&self) -> String;

    /// Irreversibly destroy the store and every blob in it.
    fn delete(&self) -> StoreResult<()>;

    /// Store an in-memory buffer: create, write, close.
    fn save(&self, kind: BlobType, data: &[u8]) -> StoreResult<CreateOutcome> {
        let mut handle = self.create(kind)?;
        handle.write_all(data)?;
        handle.close()
    }

    /// Re-hash a stored blob and check it against its id.
    fn verify(&self, kind: BlobType, id: &Identifier) -> StoreResult<()> {
        let mut reader = HashingReader::<_, DefaultDigest>::new(self.get_reader(kind, id)?);
        io::copy(&mut reader, &mut io::sink())?;
        let (_, digest) = reader.finalize();
        let computed = Identifier::from_slice(&digest)?;
        if computed != *id {
            return Err(StoreError::HashMismatch {
                kind,
                id: *id,
                computed,
            });
        }
        Ok(())
    }

    /// Resolve a hex prefix to the single stored id it names.
    fn find(&self, kind: BlobType, prefix: &str) -> StoreResult<Identifier> {
        let mut matches = self
            .list(kind)?
            .into_iter()
            .filter(|id| id.has_hex_prefix(prefix));
        match (matches.next(), matches.count()) {
            (Some(id), 0) => Ok(id),
            (None, _) => Err(StoreError::NoPrefixMatch {
                kind,
                prefix: prefix.to_string(),
            }),
            (Some(_), rest) => Err(StoreError::AmbiguousPrefix {
                kind,
                prefix: prefix.to_string(),
                count: rest + 1,
            }),
        }
    }

    /// Shortest hex prefix length that distinguishes every id under `kind`.
    fn prefix_length(&self, kind: BlobType) -> StoreResult<usize> {
        let hexes: Vec<String> = self.list(kind)?.iter().map(|id| id.to_hex()).collect();
        // Sorted input: any shared prefix shows up between neighbours.
        let shortest = (MIN_PREFIX_LENGTH..ID_SIZE * 2).find(|&len| {
            hexes
                .windows(2)
                .all(|pair| pair[0][..len] != pair[1][..len])
        });
        Ok(shortest.unwrap_or(ID_SIZE * 2))
    }
}
