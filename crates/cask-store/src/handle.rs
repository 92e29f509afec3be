use std::fmt;
use std::io::{self, Write};

use cask_crypto::{DefaultDigest, HashingWriter};
use cask_types::{BlobType, Identifier};
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Result of finalizing a [`WriteHandle`].
///
/// Both variants are success: `AlreadyPresent` means identical content was
/// already stored under this identifier and the new copy was discarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(Identifier),
    AlreadyPresent(Identifier),
}

impl CreateOutcome {
    pub fn id(&self) -> Identifier {
        match self {
            Self::Created(id) | Self::AlreadyPresent(id) => *id,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// What a driver's commit primitive did with staged content.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitStatus {
    Created,
    AlreadyPresent,
}

/// Driver-private storage for bytes of a blob whose identifier is not yet known.
///
/// A staged blob must never be visible to readers. `commit` makes it visible
/// under `id` in one atomic step, or reports that a blob with that id already
/// exists. Dropping an uncommitted staged blob abandons it.
pub trait StagedBlob: Write + Send {
    fn commit(self: Box<Self>, id: &Identifier) -> StoreResult<CommitStatus>;
}

enum HandleState {
    Open(HashingWriter<Box<dyn StagedBlob>, DefaultDigest>),
    Closed(CreateOutcome),
    /// Finalization failed; the staged content has been released.
    Failed,
}

/// Write handle implementing the content-addressed create protocol.
///
/// Bytes written are hashed and staged by the driver. [`close`](Self::close)
/// derives the identifier from the digest and asks the driver to commit the
/// staged content under it. The identifier is only available after a
/// successful close.
pub struct WriteHandle {
    kind: BlobType,
    state: HandleState,
}

impl WriteHandle {
    pub fn new(kind: BlobType, staged: Box<dyn StagedBlob>) -> Self {
        Self {
            kind,
            state: HandleState::Open(HashingWriter::new(staged)),
        }
    }

    pub fn kind(&self) -> BlobType {
        self.kind
    }

    /// Bytes accepted so far. Zero once the handle is no longer open.
    pub fn size(&self) -> u64 {
        match &self.state {
            HandleState::Open(w) => w.size(),
            _ => 0,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, HandleState::Open(_))
    }

    /// Finalize the blob.
    ///
    /// On error the staged content is discarded and the handle is unusable;
    /// no blob becomes visible.
    pub fn close(&mut self) -> StoreResult<CreateOutcome> {
        let writer = match std::mem::replace(&mut self.state, HandleState::Failed) {
            HandleState::Open(writer) => writer,
            HandleState::Closed(outcome) => {
                self.state = HandleState::Closed(outcome);
                return Err(StoreError::InvalidState("blob already closed"));
            }
            HandleState::Failed => {
                return Err(StoreError::InvalidState("blob finalization already failed"))
            }
        };

        let size = writer.size();
        let (mut staged, digest) = writer.finalize();
        staged.flush()?;
        let id = Identifier::from_slice(&digest)?;

        let outcome = match staged.commit(&id)? {
            CommitStatus::Created => CreateOutcome::Created(id),
            CommitStatus::AlreadyPresent => CreateOutcome::AlreadyPresent(id),
        };
        debug!(
            kind = %self.kind,
            id = %id.short_hex(),
            size,
            created = outcome.is_created(),
            "blob finalized"
        );
        self.state = HandleState::Closed(outcome);
        Ok(outcome)
    }

    /// Identifier of the finalized blob.
    pub fn id(&self) -> StoreResult<Identifier> {
        self.outcome()
            .map(|o| o.id())
            .ok_or(StoreError::InvalidState("blob not finalized"))
    }

    pub fn outcome(&self) -> Option<CreateOutcome> {
        match self.state {
            HandleState::Closed(outcome) => Some(outcome),
            _ => None,
        }
    }
}

impl Write for WriteHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.state {
            HandleState::Open(w) => w.write(buf),
            _ => Err(io::Error::other(StoreError::InvalidState(
                "write after close",
            ))),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.state {
            HandleState::Open(w) => w.flush(),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for WriteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            HandleState::Open(_) => "open",
            HandleState::Closed(_) => "closed",
            HandleState::Failed => "failed",
        };
        f.debug_struct("WriteHandle")
            .field("kind", &self.kind)
            .field("state", &state)
            .field("size", &self.size())
            .finish()
    }
}
