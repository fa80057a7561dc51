//! Cache entry records
//!
//! An entry is the compiled dependency closure for one
//! (fingerprint, platform) pair. Entries are written once through a
//! staging directory and never modified afterwards.

use crate::cache::fingerprint::Fingerprint;
use crate::task::Platform;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Metadata file name inside an entry directory
pub const METADATA_FILE: &str = "entry.json";

/// Artifact directory name inside an entry directory
pub const ARTIFACT_DIR: &str = "artifact";

/// Format bytes as human-readable size (e.g., "1.5 GB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Cache key: fingerprint plus platform
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub fingerprint: Fingerprint,
    pub platform: Platform,
}

impl CacheKey {
    pub fn new(fingerprint: Fingerprint, platform: Platform) -> Self {
        Self {
            fingerprint,
            platform,
        }
    }

    /// Directory of this entry relative to the cache root
    pub fn relative_dir(&self) -> PathBuf {
        Path::new(&self.platform.path_component()).join(self.fingerprint.to_hex())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.fingerprint.short(), self.platform)
    }
}

/// State of an entry on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    /// No entry exists
    Miss,
    /// Directory exists without a finalized record (crashed build)
    Incomplete,
    /// Finalized and immutable
    Complete,
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Miss => write!(f, "miss"),
            Self::Incomplete => write!(f, "incomplete"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

/// Metadata persisted alongside each artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub fingerprint: Fingerprint,
    pub platform: Platform,
    /// Toolchain name (e.g. "cargo")
    pub toolchain: String,
    /// Toolchain version string as reported by the toolchain
    pub toolchain_version: String,
    pub created_at: DateTime<Utc>,
    pub state: CacheState,
}

impl EntryMetadata {
    pub fn key(&self) -> CacheKey {
        CacheKey::new(self.fingerprint, self.platform.clone())
    }
}

/// A finalized dependency artifact. Read-only once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactCacheEntry {
    metadata: EntryMetadata,
    dir: PathBuf,
}

impl ArtifactCacheEntry {
    pub(crate) fn new(metadata: EntryMetadata, dir: PathBuf) -> Self {
        Self { metadata, dir }
    }

    pub fn metadata(&self) -> &EntryMetadata {
        &self.metadata
    }

    pub fn key(&self) -> CacheKey {
        self.metadata.key()
    }

    /// Entry directory (holds metadata and artifact)
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Directory containing the compiled dependency closure
    pub fn artifact_path(&self) -> PathBuf {
        self.dir.join(ARTIFACT_DIR)
    }
}
