//! Declarative source predicates
//!
//! A task names the part of the project it actually reads, so changes to
//! unrelated files leave its fingerprint alone. Predicates have a small
//! textual form used in configuration:
//!
//! | Text | Meaning |
//! |------|---------|
//! | `all` | every file |
//! | `manifests` | manifest and lock files (any ecosystem) |
//! | `ext:rs,toml` | files with one of the extensions |
//! | `name:deny.toml` | files with one of the exact file names |
//! | `dir:src` | files under a directory prefix |
//!
//! Terms are combined with `+` (union), e.g. `manifests+ext:rs`.

use crate::error::FilterError;
use crate::source::set::SourceSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// File names treated as dependency declarations or lock state
pub const MANIFEST_NAMES: &[&str] = &[
    "Cargo.toml",
    "Cargo.lock",
    "rust-toolchain",
    "rust-toolchain.toml",
    "package.json",
    "package-lock.json",
    "npm-shrinkwrap.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "requirements.txt",
    "Pipfile",
    "Pipfile.lock",
    "pyproject.toml",
    "poetry.lock",
    "go.mod",
    "go.sum",
];

/// Paths treated as manifests regardless of file name
const MANIFEST_PATHS: &[&str] = &[".cargo/config.toml", ".cargo/config"];

/// A pure predicate over source paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SourceFilter {
    All,
    Manifests,
    Extensions(BTreeSet<String>),
    FileNames(BTreeSet<String>),
    Directory(String),
    AnyOf(Vec<SourceFilter>),
}

impl SourceFilter {
    /// Manifests plus Rust and TOML sources
    pub fn cargo_sources() -> Self {
        Self::AnyOf(vec![Self::Manifests, Self::extensions(["rs", "toml"])])
    }

    pub fn extensions<I, S>(exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Extensions(exts.into_iter().map(Into::into).collect())
    }

    pub fn file_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::FileNames(names.into_iter().map(Into::into).collect())
    }

    /// Whether a relative path is selected
    pub fn matches(&self, path: &str) -> bool {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        match self {
            Self::All => true,
            Self::Manifests => {
                MANIFEST_NAMES.contains(&file_name) || MANIFEST_PATHS.contains(&path)
            }
            Self::Extensions(exts) => file_name
                .rsplit_once('.')
                .is_some_and(|(stem, ext)| !stem.is_empty() && exts.contains(ext)),
            Self::FileNames(names) => names.contains(file_name),
            Self::Directory(prefix) => path
                .strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.starts_with('/')),
            Self::AnyOf(filters) => filters.iter().any(|f| f.matches(path)),
        }
    }

    /// Select the matching subset of `full`. Total: never fails.
    pub fn apply(&self, full: &SourceSet) -> SourceSet {
        let mut filtered = SourceSet::new();
        for (path, contents) in full.iter_shared() {
            if self.matches(path) {
                filtered.insert_shared(path, contents.clone());
            }
        }
        filtered
    }

    fn parse_term(spec: &str, term: &str) -> Result<Self, FilterError> {
        let malformed = |reason: &str| FilterError::Malformed {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };

        match term {
            "all" => return Ok(Self::All),
            "manifests" => return Ok(Self::Manifests),
            _ => {}
        }

        let (kind, args) = term
            .split_once(':')
            .ok_or_else(|| malformed(&format!("unknown term '{}'", term)))?;

        let items: BTreeSet<String> = args
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if items.is_empty() {
            return Err(malformed(&format!("'{}' needs at least one value", kind)));
        }

        match kind {
            "ext" => Ok(Self::Extensions(
                items
                    .into_iter()
                    .map(|e| e.trim_start_matches('.').to_string())
                    .collect(),
            )),
            "name" => Ok(Self::FileNames(items)),
            "dir" => {
                if items.len() > 1 {
                    return Err(malformed("'dir' takes a single prefix"));
                }
                let prefix = items.into_iter().next().unwrap_or_default();
                let prefix = prefix.trim_matches('/').to_string();
                if prefix.is_empty() {
                    return Err(malformed("'dir' prefix is empty"));
                }
                Ok(Self::Directory(prefix))
            }
            other => Err(malformed(&format!("unknown kind '{}'", other))),
        }
    }
}

/// Apply a predicate to the full source tree
pub fn filter(full: &SourceSet, predicate: &SourceFilter) -> SourceSet {
    predicate.apply(full)
}

impl FromStr for SourceFilter {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let spec = s.trim();
        if spec.is_empty() {
            return Err(FilterError::Malformed {
                spec: s.to_string(),
                reason: "empty filter".to_string(),
            });
        }

        let mut terms = spec
            .split('+')
            .map(|term| Self::parse_term(spec, term.trim()))
            .collect::<Result<Vec<_>, _>>()?;

        if terms.len() == 1 {
            Ok(terms.remove(0))
        } else {
            Ok(Self::AnyOf(terms))
        }
    }
}

impl TryFrom<String> for SourceFilter {
    type Error = FilterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SourceFilter> for String {
    fn from(filter: SourceFilter) -> Self {
        filter.to_string()
    }
}

impl fmt::Display for SourceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |items: &BTreeSet<String>| items.iter().cloned().collect::<Vec<_>>().join(",");
        match self {
            Self::All => write!(f, "all"),
            Self::Manifests => write!(f, "manifests"),
            Self::Extensions(exts) => write!(f, "ext:{}", join(exts)),
            Self::FileNames(names) => write!(f, "name:{}", join(names)),
            Self::Directory(prefix) => write!(f, "dir:{}", prefix),
            Self::AnyOf(filters) => {
                let parts: Vec<String> = filters.iter().map(ToString::to_string).collect();
                write!(f, "{}", parts.join("+"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> SourceSet {
        SourceSet::from_pairs([
            ("Cargo.toml", "[package]"),
            ("Cargo.lock", "version = 3"),
            ("README.md", "# readme"),
            ("deny.toml", "[licenses]"),
            ("src/main.rs", "fn main() {}"),
            ("src/bin/tool.rs", "fn main() {}"),
            ("crates/core/Cargo.toml", "[package]"),
            (".cargo/config.toml", "[build]"),
            (".rs", "not an extension"),
        ])
    }

    fn paths(set: &SourceSet) -> Vec<String> {
        set.iter().map(|(p, _)| p.to_string()).collect()
    }

    #[test]
    fn manifests_select_declarations_at_any_depth() {
        let set = filter(&project(), &SourceFilter::Manifests);
        assert_eq!(
            paths(&set),
            vec![".cargo/config.toml", "Cargo.lock", "Cargo.toml", "crates/core/Cargo.toml"]
        );
    }

    #[test]
    fn extension_requires_a_stem() {
        let set = filter(&project(), &SourceFilter::extensions(["rs"]));
        assert_eq!(paths(&set), vec!["src/bin/tool.rs", "src/main.rs"]);
    }

    #[test]
    fn directory_matches_only_whole_segments() {
        let full = SourceSet::from_pairs([("src/a.rs", ""), ("srcx/b.rs", ""), ("src", "")]);
        let set = filter(&full, &"dir:src/".parse().unwrap());
        assert_eq!(paths(&set), vec!["src/a.rs"]);
    }

    #[test]
    fn empty_result_is_valid() {
        let set = filter(&project(), &"ext:py".parse().unwrap());
        assert!(set.is_empty());
    }

    #[test]
    fn union_parses_and_displays() {
        let parsed: SourceFilter = "manifests + name:deny.toml".parse().unwrap();
        assert_eq!(parsed.to_string(), "manifests+name:deny.toml");

        let set = filter(&project(), &parsed);
        assert!(set.contains("deny.toml"));
        assert!(set.contains("Cargo.lock"));
        assert!(!set.contains("src/main.rs"));
    }

    #[test]
    fn cargo_sources_skip_docs() {
        let set = filter(&project(), &SourceFilter::cargo_sources());
        assert!(set.contains("src/main.rs"));
        assert!(set.contains("deny.toml"));
        assert!(!set.contains("README.md"));
    }

    #[test]
    fn malformed_filters_are_rejected() {
        for bad in ["", "everything", "ext:", "ext: , ", "dir:/", "dir:a,b", "size:10", "all+"] {
            let result: Result<SourceFilter, _> = bad.parse();
            assert!(
                matches!(result, Err(FilterError::Malformed { .. })),
                "expected '{}' to be rejected",
                bad
            );
        }
    }

    #[test]
    fn extensions_ignore_leading_dot() {
        let parsed: SourceFilter = "ext:.rs".parse().unwrap();
        assert_eq!(parsed, SourceFilter::extensions(["rs"]));
    }

    #[test]
    fn deserializes_from_toml_string() {
        #[derive(Deserialize)]
        struct Wrapper {
            sources: SourceFilter,
        }
        let w: Wrapper = toml::from_str(r#"sources = "ext:md""#).unwrap();
        assert_eq!(w.sources, SourceFilter::extensions(["md"]));

        let bad: Result<Wrapper, _> = toml::from_str(r#"sources = "bogus""#);
        assert!(bad.is_err());
    }
}
