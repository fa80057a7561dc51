//! Dependency artifact store
//!
//! Maps (fingerprint, platform) to a compiled dependency closure on disk.
//! `get_or_build` pays the build cost once per key: concurrent callers for
//! a missing key share one in-flight build, failed builds leave nothing
//! behind, and finished entries are published with an atomic rename.

use crate::cache::entry::{
    ArtifactCacheEntry, CacheKey, CacheState, EntryMetadata, ARTIFACT_DIR, METADATA_FILE,
};
use crate::error::{BuildFailure, PreflightError, PreflightResult};
use chrono::Utc;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Identity of the toolchain producing an entry, recorded as metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub toolchain: String,
    pub toolchain_version: String,
}

/// How a `get_or_build` call obtained its entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Entry already existed (in memory or on disk)
    Hit,
    /// This call ran the build
    Built,
    /// Another caller's in-flight build was awaited
    Joined,
}

impl Resolution {
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit)
    }
}

/// Result of a successful `get_or_build`
#[derive(Debug, Clone)]
pub struct Resolved {
    pub entry: Arc<ArtifactCacheEntry>,
    pub resolution: Resolution,
}

/// A complete entry found while scanning the store
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub metadata: EntryMetadata,
    pub dir: PathBuf,
    pub size_bytes: u64,
}

type BuildOutput = Result<(Arc<ArtifactCacheEntry>, bool), BuildFailure>;
type SharedBuild = Shared<BoxFuture<'static, BuildOutput>>;

#[derive(Default)]
struct Slots {
    ready: HashMap<CacheKey, Arc<ArtifactCacheEntry>>,
    in_flight: HashMap<CacheKey, SharedBuild>,
}

fn lock(slots: &Mutex<Slots>) -> MutexGuard<'_, Slots> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Content-addressed store of dependency artifacts
///
/// Constructed once per process and passed by reference to whatever needs
/// it. Entries are never removed by this type.
pub struct DependencyCache {
    root: PathBuf,
    slots: Arc<Mutex<Slots>>,
}

impl DependencyCache {
    /// Open a store rooted at `root` (created lazily on first build)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            slots: Arc::new(Mutex::new(Slots::default())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory an entry for `key` lives in
    pub fn entry_dir(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.relative_dir())
    }

    /// Return the entry for `key`, building it with `build` on a miss.
    ///
    /// `build` receives the directory it must populate. It runs on its own
    /// task, so dropping the calling future never cancels a shared build;
    /// every concurrent caller observes the same outcome. A failed build
    /// is not remembered and the next call builds again.
    pub async fn get_or_build<F, Fut>(
        &self,
        key: CacheKey,
        info: BuildInfo,
        build: F,
    ) -> Result<Resolved, BuildFailure>
    where
        F: FnOnce(PathBuf) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BuildFailure>> + Send + 'static,
    {
        let (shared, owner) = {
            let mut slots = lock(&self.slots);

            if let Some(entry) = slots.ready.get(&key) {
                debug!("Cache hit (memory): {}", key);
                return Ok(Resolved {
                    entry: entry.clone(),
                    resolution: Resolution::Hit,
                });
            }

            if let Some(shared) = slots.in_flight.get(&key) {
                debug!("Joining in-flight build: {}", key);
                (shared.clone(), false)
            } else {
                let shared = self.spawn_build(key.clone(), info, build);
                slots.in_flight.insert(key.clone(), shared.clone());
                (shared, true)
            }
        };

        let (entry, built) = shared.await?;
        let resolution = match (owner, built) {
            (true, true) => Resolution::Built,
            (true, false) => Resolution::Hit,
            (false, _) => Resolution::Joined,
        };

        Ok(Resolved { entry, resolution })
    }

    fn spawn_build<F, Fut>(&self, key: CacheKey, info: BuildInfo, build: F) -> SharedBuild
    where
        F: FnOnce(PathBuf) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BuildFailure>> + Send + 'static,
    {
        let root = self.root.clone();
        let slots = Arc::clone(&self.slots);
        let toolchain = info.toolchain.clone();
        let task_key = key.clone();

        let handle = tokio::spawn(async move {
            let result = resolve_entry(&root, &task_key, info, build).await;

            let mut slots = lock(&slots);
            slots.in_flight.remove(&task_key);
            if let Ok((entry, _)) = &result {
                slots.ready.insert(task_key.clone(), entry.clone());
            }
            result
        });

        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(BuildFailure::new(toolchain, format!("build task aborted: {}", e))),
            }
        }
        .boxed()
        .shared()
    }

    /// Return an existing complete entry without ever building
    pub async fn lookup(&self, key: &CacheKey) -> Option<Arc<ArtifactCacheEntry>> {
        if let Some(entry) = lock(&self.slots).ready.get(key) {
            return Some(entry.clone());
        }

        let dir = self.entry_dir(key);
        let metadata = read_metadata(&dir).await?;
        (metadata.key() == *key).then(|| Arc::new(ArtifactCacheEntry::new(metadata, dir)))
    }

    /// On-disk state of the entry for `key`
    pub async fn state(&self, key: &CacheKey) -> CacheState {
        if self.lookup(key).await.is_some() {
            CacheState::Complete
        } else if tokio::fs::try_exists(self.entry_dir(key)).await.unwrap_or(false) {
            CacheState::Incomplete
        } else {
            CacheState::Miss
        }
    }

    /// Scan the store for complete entries, newest first
    pub fn list(&self) -> PreflightResult<Vec<StoredEntry>> {
        let mut entries = Vec::new();

        let platforms = match std::fs::read_dir(&self.root) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => {
                return Err(PreflightError::io(
                    format!("reading cache directory {}", self.root.display()),
                    e,
                ))
            }
        };

        for platform_dir in platforms.filter_map(Result::ok) {
            let Ok(children) = std::fs::read_dir(platform_dir.path()) else {
                continue;
            };
            for child in children.filter_map(Result::ok) {
                let dir = child.path();
                let Some(metadata) = read_metadata_sync(&dir) else {
                    continue;
                };
                let size_bytes = dir_size(&dir.join(ARTIFACT_DIR));
                entries.push(StoredEntry {
                    metadata,
                    dir,
                    size_bytes,
                });
            }
        }

        entries.sort_by(|a, b| b.metadata.created_at.cmp(&a.metadata.created_at));
        Ok(entries)
    }
}

/// Find a complete entry on disk or build and publish a new one.
/// Returns the entry and whether a build ran.
async fn resolve_entry<F, Fut>(
    root: &Path,
    key: &CacheKey,
    info: BuildInfo,
    build: F,
) -> BuildOutput
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = Result<(), BuildFailure>>,
{
    let entry_dir = root.join(key.relative_dir());
    if let Some(metadata) = read_metadata(&entry_dir).await {
        if metadata.key() == *key {
            debug!("Cache hit (disk): {}", key);
            return Ok((Arc::new(ArtifactCacheEntry::new(metadata, entry_dir)), false));
        }
    }

    let store_failure = |what: &str, e: std::io::Error| {
        BuildFailure::new(info.toolchain.clone(), format!("{}: {}", what, e))
    };

    let platform_dir = root.join(key.platform.path_component());
    let staging = platform_dir.join(format!(".staging-{}", uuid::Uuid::new_v4()));
    let artifact_dir = staging.join(ARTIFACT_DIR);
    tokio::fs::create_dir_all(&artifact_dir)
        .await
        .map_err(|e| store_failure("creating staging directory", e))?;

    info!("Building dependencies for {}", key);
    if let Err(failure) = build(artifact_dir).await {
        warn!("Dependency build failed for {}: {}", key, failure.reason);
        let _ = tokio::fs::remove_dir_all(&staging).await;
        return Err(failure);
    }

    let metadata = EntryMetadata {
        fingerprint: key.fingerprint,
        platform: key.platform.clone(),
        toolchain: info.toolchain.clone(),
        toolchain_version: info.toolchain_version.clone(),
        created_at: Utc::now(),
        state: CacheState::Complete,
    };

    let published = publish(&staging, &entry_dir, &metadata).await;
    if let Err(e) = published {
        let _ = tokio::fs::remove_dir_all(&staging).await;
        // Another process may have published the same key first
        if let Some(existing) = read_metadata(&entry_dir).await {
            if existing.key() == *key {
                return Ok((Arc::new(ArtifactCacheEntry::new(existing, entry_dir)), false));
            }
        }
        return Err(store_failure("publishing cache entry", e));
    }

    debug!("Published cache entry {}", entry_dir.display());
    Ok((Arc::new(ArtifactCacheEntry::new(metadata, entry_dir)), true))
}

async fn publish(staging: &Path, entry_dir: &Path, metadata: &EntryMetadata) -> std::io::Result<()> {
    let json = serde_json::to_vec_pretty(metadata)?;
    tokio::fs::write(staging.join(METADATA_FILE), json).await?;

    // Leftover from a crashed build: no complete record, safe to replace
    if tokio::fs::try_exists(entry_dir).await? {
        warn!("Replacing incomplete cache entry {}", entry_dir.display());
        tokio::fs::remove_dir_all(entry_dir).await?;
    }

    tokio::fs::rename(staging, entry_dir).await
}

async fn read_metadata(dir: &Path) -> Option<EntryMetadata> {
    let bytes = tokio::fs::read(dir.join(METADATA_FILE)).await.ok()?;
    parse_metadata(dir, &bytes)
}

fn read_metadata_sync(dir: &Path) -> Option<EntryMetadata> {
    let bytes = std::fs::read(dir.join(METADATA_FILE)).ok()?;
    parse_metadata(dir, &bytes)
}

fn parse_metadata(dir: &Path, bytes: &[u8]) -> Option<EntryMetadata> {
    match serde_json::from_slice::<EntryMetadata>(bytes) {
        Ok(metadata) if metadata.state == CacheState::Complete => Some(metadata),
        Ok(_) => None,
        Err(e) => {
            warn!("Ignoring unreadable cache metadata in {}: {}", dir.display(), e);
            None
        }
    }
}

fn dir_size(path: &Path) -> u64 {
    let Ok(entries) = std::fs::read_dir(path) else {
        return 0;
    };
    entries
        .filter_map(Result::ok)
        .map(|entry| match entry.file_type() {
            Ok(ft) if ft.is_dir() => dir_size(&entry.path()),
            Ok(ft) if ft.is_file() => entry.metadata().map(|m| m.len()).unwrap_or(0),
            _ => 0,
        })
        .sum()
}
