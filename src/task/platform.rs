//! Platform tags
//!
//! A platform is an opaque tag such as `x86_64-linux`. Matching is exact
//! string equality; no structure is assumed beyond that.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Opaque platform identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Platform(String);

impl Platform {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Detect the current platform as `<arch>-<os>`
    pub fn current() -> Self {
        Self(format!("{}-{}", std::env::consts::ARCH, current_os()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Tag reduced to characters safe for a single path component
    pub fn path_component(&self) -> String {
        self.0
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

fn current_os() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Platform {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

/// Set of platforms a task applies to
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlatformSet {
    /// Every platform
    #[default]
    All,
    /// Only the listed platforms
    Only(BTreeSet<Platform>),
}

impl PlatformSet {
    pub fn only<I, P>(platforms: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Platform>,
    {
        Self::Only(platforms.into_iter().map(Into::into).collect())
    }

    /// Pure applicability predicate
    pub fn contains(&self, platform: &Platform) -> bool {
        match self {
            Self::All => true,
            Self::Only(set) => set.contains(platform),
        }
    }
}

impl fmt::Display for PlatformSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Only(set) => {
                let tags: Vec<&str> = set.iter().map(Platform::as_str).collect();
                write!(f, "{}", tags.join(", "))
            }
        }
    }
}
