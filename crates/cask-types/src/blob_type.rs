use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Namespace partitioning the identifier space.
///
/// The same [`Identifier`](crate::Identifier) stored under two different
/// types names two independent blobs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobType {
    /// Raw (encrypted) data chunks.
    Data,
    /// Key material.
    Key,
    /// Repository locks.
    Lock,
    /// Snapshot descriptors.
    Snapshot,
    /// Tree metadata.
    Tree,
}

impl BlobType {
    /// Every namespace, in layout order.
    pub const ALL: [BlobType; 5] = [
        BlobType::Data,
        BlobType::Key,
        BlobType::Lock,
        BlobType::Snapshot,
        BlobType::Tree,
    ];

    /// Short lowercase name used in log output and configuration.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Key => "key",
            Self::Lock => "lock",
            Self::Snapshot => "snapshot",
            Self::Tree => "tree",
        }
    }

    /// Directory holding this namespace inside a repository root.
    pub const fn dir_name(&self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Key => "keys",
            Self::Lock => "locks",
            Self::Snapshot => "snapshots",
            Self::Tree => "trees",
        }
    }
}

impl fmt::Display for BlobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlobType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s || t.dir_name() == s)
            .ok_or_else(|| TypeError::UnknownBlobType(s.to_string()))
    }
}
