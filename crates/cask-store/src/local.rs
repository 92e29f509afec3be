use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use cask_types::{BlobType, Identifier};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::{RepoConfig, StoreConfig};
use crate::error::{StoreError, StoreResult};
use crate::handle::{CommitStatus, StagedBlob, WriteHandle};
use crate::traits::Backend;

/// Name of the repository marker file at the store root.
pub const CONFIG_FILE: &str = "config";

/// Staging directory for in-flight writes, on the same filesystem as the blobs.
pub const TMP_DIR: &str = "tmp";

/// Blob store over a local directory tree.
///
/// Layout:
/// ```text
/// <root>/
///   config                  repository marker (JSON)
///   data/<hex id>           one directory per BlobType
///   keys/ locks/ snapshots/ trees/
///   tmp/                    staged writes
/// ```
///
/// Creating a blob writes a temporary file under `tmp/` and links it into
/// place with create-exclusive semantics, so concurrent writers of the same
/// content race safely without any in-process locking and a torn write is
/// never visible.
pub struct LocalBackend {
    root: PathBuf,
    config: StoreConfig,
    repo: RepoConfig,
    deleted: AtomicBool,
}

impl LocalBackend {
    /// Create a new repository at `path` with default settings.
    pub fn init(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::init_with_config(path, StoreConfig::default())
    }

    /// Create a new repository at `path`.
    ///
    /// Fails with `StoreExists` if a repository marker is already present.
    /// The directory itself may exist.
    pub fn init_with_config(path: impl AsRef<Path>, config: StoreConfig) -> StoreResult<Self> {
        let root = path.as_ref().to_path_buf();
        let marker = root.join(CONFIG_FILE);
        if marker_exists(&marker)? {
            return Err(StoreError::StoreExists(root));
        }

        fs::create_dir_all(&root)?;
        for kind in BlobType::ALL {
            fs::create_dir_all(root.join(kind.dir_name()))?;
        }
        fs::create_dir_all(root.join(TMP_DIR))?;

        // The marker is published the same way blobs are, so two processes
        // initializing one directory cannot both succeed.
        let repo = RepoConfig::new();
        let mut tmp = NamedTempFile::new_in(root.join(TMP_DIR))?;
        tmp.write_all(&repo.to_json()?)?;
        if config.sync_on_commit {
            tmp.as_file().sync_all()?;
        }
        if let Err(e) = tmp.persist_noclobber(&marker) {
            if e.error.kind() == io::ErrorKind::AlreadyExists {
                return Err(StoreError::StoreExists(root));
            }
            return Err(e.error.into());
        }
        if config.sync_on_commit {
            sync_dir(&root)?;
        }

        info!(root = %root.display(), repo_id = %repo.id, "created repository");
        Ok(Self {
            root,
            config,
            repo,
            deleted: AtomicBool::new(false),
        })
    }

    /// Open an existing repository at `path` with default settings.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with_config(path, StoreConfig::default())
    }

    /// Open an existing repository at `path`.
    ///
    /// Fails with `StoreNotFound` if there is no marker (including when the
    /// path does not exist) and with `Config` if the marker or layout is
    /// invalid.
    pub fn open_with_config(path: impl AsRef<Path>, config: StoreConfig) -> StoreResult<Self> {
        let root = path.as_ref().to_path_buf();
        let data = match fs::read(root.join(CONFIG_FILE)) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::StoreNotFound(root));
            }
            Err(e) => return Err(e.into()),
        };
        let repo = RepoConfig::from_json(&data)?;

        let dirs = BlobType::ALL.iter().map(|t| t.dir_name()).chain([TMP_DIR]);
        for dir in dirs {
            if !root.join(dir).is_dir() {
                return Err(StoreError::Config(format!(
                    "repository at {} is missing directory {dir:?}",
                    root.display()
                )));
            }
        }

        info!(root = %root.display(), repo_id = %repo.id, "opened repository");
        Ok(Self {
            root,
            config,
            repo,
            deleted: AtomicBool::new(false),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn repo_config(&self) -> &RepoConfig {
        &self.repo
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Path a blob is stored at, whether or not it exists.
    pub fn blob_path(&self, kind: BlobType, id: &Identifier) -> PathBuf {
        self.root.join(kind.dir_name()).join(id.to_hex())
    }

    fn ensure_live(&self) -> StoreResult<()> {
        if self.deleted.load(Ordering::Acquire) {
            return Err(StoreError::StoreDeleted(self.location()));
        }
        Ok(())
    }

    /// Marker first: once it is gone the location is no longer a repository.
    fn remove_contents(&self) -> io::Result<()> {
        ignore_not_found(fs::remove_file(self.root.join(CONFIG_FILE)))?;
        let dirs = BlobType::ALL.iter().map(|t| t.dir_name()).chain([TMP_DIR]);
        for dir in dirs {
            ignore_not_found(fs::remove_dir_all(self.root.join(dir)))?;
        }
        Ok(())
    }
}

impl Backend for LocalBackend {
    fn create(&self, kind: BlobType) -> StoreResult<WriteHandle> {
        self.ensure_live()?;
        let tmp = tempfile::Builder::new()
            .prefix(kind.as_str())
            .tempfile_in(self.root.join(TMP_DIR))?;
        let staged = LocalStagedBlob {
            file: BufWriter::with_capacity(self.config.write_buffer_size, tmp),
            dir: self.root.join(kind.dir_name()),
            sync: self.config.sync_on_commit,
        };
        Ok(WriteHandle::new(kind, Box::new(staged)))
    }

    fn get(&self, kind: BlobType, id: &Identifier) -> StoreResult<Vec<u8>> {
        self.ensure_live()?;
        fs::read(self.blob_path(kind, id)).map_err(|e| not_found_or_io(e, kind, id))
    }

    fn get_reader(&self, kind: BlobType, id: &Identifier) -> StoreResult<Box<dyn Read + Send>> {
        self.ensure_live()?;
        let file = File::open(self.blob_path(kind, id)).map_err(|e| not_found_or_io(e, kind, id))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn test(&self, kind: BlobType, id: &Identifier) -> StoreResult<bool> {
        self.ensure_live()?;
        match fs::metadata(self.blob_path(kind, id)) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, kind: BlobType, id: &Identifier) -> StoreResult<()> {
        self.ensure_live()?;
        fs::remove_file(self.blob_path(kind, id)).map_err(|e| not_found_or_io(e, kind, id))?;
        debug!(kind = %kind, id = %id.short_hex(), "blob removed");
        Ok(())
    }

    fn list(&self, kind: BlobType) -> StoreResult<Vec<Identifier>> {
        self.ensure_live()?;
        let dir = self.root.join(kind.dir_name());
        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let is_file = entry.file_type()?.is_file();
            let name = entry.file_name();
            let parsed = name
                .to_str()
                .and_then(|n| Identifier::from_hex(n).ok().filter(|id| id.to_hex() == n));
            match parsed {
                Some(id) if is_file => ids.push(id),
                _ => warn!(
                    kind = %kind,
                    entry = %entry.path().display(),
                    "skipping unexpected entry in blob directory"
                ),
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }

    /// Remove the marker, every blob and the staging area.
    ///
    /// The marker goes first, so a partially failed delete leaves a location
    /// that is no longer a repository and can be deleted again or re-created.
    /// The root directory itself is only removed when nothing else is left
    /// in it; unrelated files placed there are not touched.
    fn delete(&self) -> StoreResult<()> {
        if self.deleted.swap(true, Ordering::AcqRel) {
            return Err(StoreError::StoreDeleted(self.location()));
        }
        if let Err(e) = self.remove_contents() {
            self.deleted.store(false, Ordering::Release);
            warn!(root = %self.root.display(), error = %e, "repository delete failed");
            return Err(e.into());
        }

        match fs::remove_dir(&self.root) {
            Ok(()) => info!(root = %self.root.display(), "deleted repository"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                root = %self.root.display(),
                error = %e,
                "deleted repository contents; root directory left in place"
            ),
        }
        Ok(())
    }
}

impl fmt::Debug for LocalBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalBackend")
            .field("root", &self.root)
            .field("repo_id", &self.repo.id)
            .field("deleted", &self.deleted.load(Ordering::Relaxed))
            .finish()
    }
}

/// Temporary file holding a blob until its id is known.
///
/// Dropped without commit, the temporary file is removed.
struct LocalStagedBlob {
    file: BufWriter<NamedTempFile>,
    /// Namespace directory the blob is published into.
    dir: PathBuf,
    sync: bool,
}

impl Write for LocalStagedBlob {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl StagedBlob for LocalStagedBlob {
    fn commit(self: Box<Self>, id: &Identifier) -> StoreResult<CommitStatus> {
        let LocalStagedBlob { file, dir, sync } = *self;
        let tmp = file.into_inner().map_err(|e| e.into_error())?;
        if sync {
            tmp.as_file().sync_all()?;
        }

        // Hard-link style publish: fails instead of replacing an existing blob.
        match tmp.persist_noclobber(dir.join(id.to_hex())) {
            Ok(_) => {
                if sync {
                    sync_published(&dir, id);
                }
                Ok(CommitStatus::Created)
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                // Dropping `e.file` removes the temporary copy.
                Ok(CommitStatus::AlreadyPresent)
            }
            Err(e) => Err(e.error.into()),
        }
    }
}

fn not_found_or_io(e: io::Error, kind: BlobType, id: &Identifier) -> StoreError {
    if e.kind() == io::ErrorKind::NotFound {
        StoreError::NotFound { kind, id: *id }
    } else {
        StoreError::Io(e)
    }
}

fn ignore_not_found(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn marker_exists(marker: &Path) -> StoreResult<bool> {
    match fs::symlink_metadata(marker) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Flush the directory entry of a just-published blob.
///
/// The blob is already visible under `id`, so a failure here is logged and
/// the create still reports `Created`.
fn sync_published(dir: &Path, id: &Identifier) {
    if let Err(e) = sync_dir(dir) {
        warn!(
            dir = %dir.display(),
            id = %id.short_hex(),
            error = %e,
            "blob published but directory sync failed"
        );
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
