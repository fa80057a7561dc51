//! Lockfile detection for dependency fingerprints
//!
//! Detects package manager lockfiles at the root of a source set. Their
//! bytes become the lock section of the dependency fingerprint: same
//! lockfile = same cache.

use crate::source::SourceSet;
use std::fmt;
use tracing::debug;

/// Supported package ecosystems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Ecosystem {
    /// Cargo/Rust (Cargo.lock)
    Cargo,
    /// npm (package-lock.json, npm-shrinkwrap.json)
    Npm,
    /// Yarn (yarn.lock)
    Yarn,
    /// pnpm (pnpm-lock.yaml)
    Pnpm,
    /// pip/Python (requirements.txt, Pipfile.lock)
    Pip,
    /// Poetry/Python (poetry.lock)
    Poetry,
    /// Go modules (go.sum)
    Go,
}

impl Ecosystem {
    /// Get the lockfile patterns for this ecosystem
    fn lockfile_patterns(&self) -> &'static [&'static str] {
        match self {
            Self::Cargo => &["Cargo.lock"],
            Self::Npm => &["package-lock.json", "npm-shrinkwrap.json"],
            Self::Yarn => &["yarn.lock"],
            Self::Pnpm => &["pnpm-lock.yaml"],
            Self::Pip => &["requirements.txt", "Pipfile.lock"],
            Self::Poetry => &["poetry.lock"],
            Self::Go => &["go.sum"],
        }
    }

    /// All ecosystems in detection priority order
    pub fn all() -> &'static [Self] {
        &[
            Self::Cargo,
            Self::Npm,
            Self::Yarn,
            Self::Pnpm,
            Self::Pip,
            Self::Poetry,
            Self::Go,
        ]
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cargo => "cargo",
            Self::Npm => "npm",
            Self::Yarn => "yarn",
            Self::Pnpm => "pnpm",
            Self::Pip => "pip",
            Self::Poetry => "poetry",
            Self::Go => "go",
        };
        write!(f, "{}", name)
    }
}

/// A detected lockfile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lockfile {
    /// The ecosystem this lockfile belongs to
    pub ecosystem: Ecosystem,
    /// Path relative to the project root
    pub path: String,
    /// Raw lockfile contents
    pub contents: Vec<u8>,
}

/// Lock state of a project: every detected lockfile in priority order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockState {
    pub lockfiles: Vec<Lockfile>,
}

impl LockState {
    pub fn is_empty(&self) -> bool {
        self.lockfiles.is_empty()
    }

    /// Ecosystems present, in priority order
    pub fn ecosystems(&self) -> Vec<Ecosystem> {
        self.lockfiles.iter().map(|l| l.ecosystem).collect()
    }
}

/// Detect root-level lockfiles in a source set
///
/// Only the first matching lockfile per ecosystem is used.
pub fn detect_lockfiles(sources: &SourceSet) -> LockState {
    let mut lockfiles = Vec::new();

    for ecosystem in Ecosystem::all() {
        for pattern in ecosystem.lockfile_patterns() {
            if let Some(contents) = sources.get(pattern) {
                debug!("Found {} lockfile: {}", ecosystem, pattern);
                lockfiles.push(Lockfile {
                    ecosystem: *ecosystem,
                    path: pattern.to_string(),
                    contents: contents.to_vec(),
                });
                break;
            }
        }
    }

    debug!("Detected {} lockfiles", lockfiles.len());
    LockState { lockfiles }
}
