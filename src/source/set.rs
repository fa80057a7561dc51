//! Deterministic, ordered view of project files
//!
//! A `SourceSet` maps relative `/`-separated paths to file contents.
//! Ordering comes from the map, never from directory traversal, so the
//! same files always iterate (and fingerprint) identically.

use crate::error::{FilterError, PreflightError, PreflightResult};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Directory names never included in a loaded source tree
pub const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "target",
    "result",
    ".direnv",
    "node_modules",
    ".preflight",
];

/// Ordered collection of (path, contents) pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSet {
    files: BTreeMap<String, Arc<[u8]>>,
}

impl SourceSet {
    /// Create an empty source set
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a source set from in-memory pairs; later duplicates win
    pub fn from_pairs<I, P, C>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: AsRef<[u8]>,
    {
        let mut set = Self::new();
        for (path, contents) in pairs {
            set.insert(path, contents.as_ref());
        }
        set
    }

    /// Load every file under `root`, skipping the fixed denylist.
    ///
    /// Symlinked directories are not followed.
    pub fn load(root: &Path) -> Result<Self, FilterError> {
        let mut set = Self::new();
        load_dir(root, root, &mut set)?;
        debug!("Loaded {} source files from {}", set.len(), root.display());
        Ok(set)
    }

    /// Insert or replace a file
    pub fn insert(&mut self, path: impl Into<String>, contents: &[u8]) {
        self.files.insert(normalize(&path.into()), Arc::from(contents));
    }

    pub(crate) fn insert_shared(&mut self, path: &str, contents: Arc<[u8]>) {
        self.files.insert(path.to_string(), contents);
    }

    /// Contents of a file, if present
    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(|c| c.as_ref())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Total size of all file contents in bytes
    pub fn total_bytes(&self) -> u64 {
        self.files.values().map(|c| c.len() as u64).sum()
    }

    /// Iterate files in path order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files.iter().map(|(p, c)| (p.as_str(), c.as_ref()))
    }

    pub(crate) fn iter_shared(&self) -> impl Iterator<Item = (&String, &Arc<[u8]>)> {
        self.files.iter()
    }

    /// Return a copy with placeholder files added where no file exists yet
    pub fn with_stubs<'a, I>(&self, stubs: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut set = self.clone();
        for (path, contents) in stubs {
            let path = normalize(path);
            if !set.files.contains_key(&path) {
                set.files.insert(path, Arc::from(contents.as_bytes()));
            }
        }
        set
    }

    /// Write the source set into `dir`, creating parent directories
    pub async fn materialize(&self, dir: &Path) -> PreflightResult<()> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| PreflightError::io(format!("creating {}", dir.display()), e))?;

        for (path, contents) in &self.files {
            let target = dir.join(path);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    PreflightError::io(format!("creating {}", parent.display()), e)
                })?;
            }
            tokio::fs::write(&target, contents)
                .await
                .map_err(|e| PreflightError::io(format!("writing {}", target.display()), e))?;
        }

        Ok(())
    }
}

fn load_dir(root: &Path, dir: &Path, set: &mut SourceSet) -> Result<(), FilterError> {
    let unreadable = |path: &Path, source| FilterError::Unreadable {
        path: path.to_path_buf(),
        source,
    };

    let entries = fs::read_dir(dir).map_err(|e| unreadable(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| unreadable(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| unreadable(&path, e))?;
        let name = entry.file_name();

        if file_type.is_dir() {
            if EXCLUDED_DIRS.iter().any(|d| name == *d) {
                continue;
            }
            load_dir(root, &path, set)?;
        } else if file_type.is_file() || (file_type.is_symlink() && path.is_file()) {
            let relative = path.strip_prefix(root).unwrap_or(&path);
            // Lossy names could collide and silently drop a file
            let Some(relative) = relative.to_str() else {
                return Err(unreadable(
                    &path,
                    io::Error::new(io::ErrorKind::InvalidData, "path is not valid UTF-8"),
                ));
            };
            let contents = fs::read(&path).map_err(|e| unreadable(&path, e))?;
            set.insert(relative, &contents);
        }
    }
    Ok(())
}

/// Normalize a relative path to `/` separators without leading `./` or `/`
fn normalize(path: &str) -> String {
    let unified = path.replace('\\', "/");
    unified
        .split('/')
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .collect::<Vec<_>>()
        .join("/")
}
