use std::path::Path;

use cask_crypto::DEFAULT_DIGEST_NAME;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

/// On-disk format version written into new repository markers.
pub const REPO_VERSION: u32 = 1;

/// Runtime tuning for a store instance.
///
/// Not persisted in the repository; every process opening a store picks its
/// own. Can be loaded from a TOML document:
///
/// ```toml
/// sync_on_commit = false
/// write_buffer_size = 1048576
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// `fsync` staged files and their directory before a blob becomes visible.
    pub sync_on_commit: bool,
    /// Buffer size in front of each staged file (default: 64 KiB).
    pub write_buffer_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sync_on_commit: true,
            write_buffer_size: 64 * 1024,
        }
    }
}

impl StoreConfig {
    /// Fastest settings, for tests and scratch repositories.
    pub fn unsynced() -> Self {
        Self {
            sync_on_commit: false,
            ..Default::default()
        }
    }

    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| StoreError::Config(e.to_string()))?;
        if config.write_buffer_size == 0 {
            return Err(StoreError::Config("write_buffer_size must be non-zero".into()));
        }
        Ok(config)
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: &Path) -> StoreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

/// Repository marker persisted at the store root.
///
/// Its presence is what distinguishes a repository from an arbitrary
/// directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    pub version: u32,
    /// Unique id of this repository, assigned at creation.
    pub id: Uuid,
    /// Digest algorithm that produced every identifier in the store.
    pub hash: String,
}

impl RepoConfig {
    pub fn new() -> Self {
        Self {
            version: REPO_VERSION,
            id: Uuid::now_v7(),
            hash: DEFAULT_DIGEST_NAME.to_string(),
        }
    }

    pub fn to_json(&self) -> StoreResult<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Parse and validate a marker document.
    pub fn from_json(data: &[u8]) -> StoreResult<Self> {
        let config: Self =
            serde_json::from_slice(data).map_err(|e| StoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.version != REPO_VERSION {
            return Err(StoreError::Config(format!(
                "unsupported repository version {} (expected {REPO_VERSION})",
                self.version
            )));
        }
        if self.hash != DEFAULT_DIGEST_NAME {
            return Err(StoreError::Config(format!(
                "unsupported digest algorithm {:?}",
                self.hash
            )));
        }
        Ok(())
    }
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self::new()
    }
}
