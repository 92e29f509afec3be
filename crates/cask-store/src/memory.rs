use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use cask_types::{BlobType, Identifier};

use crate::error::{StoreError, StoreResult};
use crate::handle::{CommitStatus, StagedBlob, WriteHandle};
use crate::traits::Backend;

type BlobMap = HashMap<(BlobType, Identifier), Arc<[u8]>>;

struct Shared {
    blobs: RwLock<BlobMap>,
    deleted: AtomicBool,
}

/// In-memory, HashMap-based blob store.
///
/// Intended for tests and embedding. Blobs are held behind a `RwLock`;
/// readers share the stored buffer instead of copying it.
pub struct InMemoryBackend {
    shared: Arc<Shared>,
}

impl InMemoryBackend {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                blobs: RwLock::new(HashMap::new()),
                deleted: AtomicBool::new(false),
            }),
        }
    }

    /// Number of blobs currently stored, across all types.
    pub fn len(&self) -> usize {
        self.shared.blobs.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.shared.blobs.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored blobs.
    pub fn total_bytes(&self) -> u64 {
        self.shared
            .blobs
            .read()
            .expect("lock poisoned")
            .values()
            .map(|data| data.len() as u64)
            .sum()
    }

    fn ensure_live(&self) -> StoreResult<()> {
        self.shared.ensure_live()
    }

    fn lookup(&self, kind: BlobType, id: &Identifier) -> StoreResult<Arc<[u8]>> {
        self.ensure_live()?;
        let blobs = self.shared.blobs.read().expect("lock poisoned");
        blobs
            .get(&(kind, *id))
            .cloned()
            .ok_or(StoreError::NotFound { kind, id: *id })
    }
}

impl Shared {
    fn ensure_live(&self) -> StoreResult<()> {
        if self.deleted.load(Ordering::Acquire) {
            return Err(StoreError::StoreDeleted("memory".into()));
        }
        Ok(())
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for InMemoryBackend {
    fn create(&self, kind: BlobType) -> StoreResult<WriteHandle> {
        self.ensure_live()?;
        let staged = MemoryStagedBlob {
            kind,
            buf: Vec::new(),
            shared: Arc::clone(&self.shared),
        };
        Ok(WriteHandle::new(kind, Box::new(staged)))
    }

    fn get(&self, kind: BlobType, id: &Identifier) -> StoreResult<Vec<u8>> {
        Ok(self.lookup(kind, id)?.to_vec())
    }

    fn get_reader(&self, kind: BlobType, id: &Identifier) -> StoreResult<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.lookup(kind, id)?)))
    }

    fn test(&self, kind: BlobType, id: &Identifier) -> StoreResult<bool> {
        self.ensure_live()?;
        let blobs = self.shared.blobs.read().expect("lock poisoned");
        Ok(blobs.contains_key(&(kind, *id)))
    }

    fn remove(&self, kind: BlobType, id: &Identifier) -> StoreResult<()> {
        self.ensure_live()?;
        let mut blobs = self.shared.blobs.write().expect("lock poisoned");
        blobs
            .remove(&(kind, *id))
            .map(|_| ())
            .ok_or(StoreError::NotFound { kind, id: *id })
    }

    fn list(&self, kind: BlobType) -> StoreResult<Vec<Identifier>> {
        self.ensure_live()?;
        let blobs = self.shared.blobs.read().expect("lock poisoned");
        let mut ids: Vec<Identifier> = blobs
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, id)| *id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn location(&self) -> String {
        "memory".to_string()
    }

    fn delete(&self) -> StoreResult<()> {
        if self.shared.deleted.swap(true, Ordering::AcqRel) {
            return Err(StoreError::StoreDeleted(self.location()));
        }
        self.shared.blobs.write().expect("lock poisoned").clear();
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len();
        f.debug_struct("InMemoryBackend")
            .field("blob_count", &count)
            .finish()
    }
}

struct MemoryStagedBlob {
    kind: BlobType,
    buf: Vec<u8>,
    shared: Arc<Shared>,
}

impl Write for MemoryStagedBlob {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl StagedBlob for MemoryStagedBlob {
    fn commit(self: Box<Self>, id: &Identifier) -> StoreResult<CommitStatus> {
        let MemoryStagedBlob { kind, buf, shared } = *self;
        shared.ensure_live()?;
        let mut blobs = shared.blobs.write().expect("lock poisoned");
        match blobs.entry((kind, *id)) {
            Entry::Occupied(_) => Ok(CommitStatus::AlreadyPresent),
            Entry::Vacant(slot) => {
                slot.insert(buf.into());
                Ok(CommitStatus::Created)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsuite;

    #[test]
    fn conformance_suite() {
        testsuite::init_tracing();
        testsuite::run_all(&InMemoryBackend::new());
    }

    #[test]
    fn len_and_total_bytes() {
        let store = InMemoryBackend::new();
        assert!(store.is_empty());
        store.save(BlobType::Data, b"12345").unwrap();
        store.save(BlobType::Tree, b"123456789").unwrap();
        store.save(BlobType::Tree, b"123456789").unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.total_bytes(), 14);
    }

    #[test]
    fn delete_invalidates_store() {
        let store = InMemoryBackend::new();
        let id = store.save(BlobType::Key, b"key").unwrap().id();
        let mut pending = store.create(BlobType::Key).unwrap();
        pending.write_all(b"late").unwrap();

        store.delete().unwrap();
        assert!(store.is_empty());
        assert!(matches!(
            store.get(BlobType::Key, &id),
            Err(StoreError::StoreDeleted(_))
        ));
        assert!(matches!(pending.close(), Err(StoreError::StoreDeleted(_))));
        assert!(store.delete().is_err());
    }

    #[test]
    fn default_creates_empty_store() {
        let store = InMemoryBackend::default();
        assert!(store.is_empty());
        assert_eq!(store.location(), "memory");
    }

    #[test]
    fn debug_format() {
        let store = InMemoryBackend::new();
        store.save(BlobType::Data, b"x").unwrap();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryBackend"));
        assert!(debug.contains("blob_count"));
    }
}
