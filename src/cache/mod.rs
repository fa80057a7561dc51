//! Persistent cache for compiled dependencies
//!
//! Provides content-addressed caching keyed by a fingerprint of the
//! dependency-only source view (manifests + lock state) and the platform.
//! Entries are immutable once finalized.
//!
//! # Entry States
//!
//! | State | Description |
//! |-------|-------------|
//! | Miss | No entry exists, next run builds |
//! | Incomplete | Directory without finalized record (crash), rebuilt |
//! | Complete | Finalized, immutable, shared by every task |

pub mod entry;
pub mod fingerprint;
pub mod lockfile;
pub mod store;

pub use entry::{format_bytes, ArtifactCacheEntry, CacheKey, CacheState, EntryMetadata};
pub use fingerprint::{fingerprint, fingerprint_salted, Fingerprint};
pub use lockfile::{detect_lockfiles, Ecosystem, LockState, Lockfile};
pub use store::{BuildInfo, DependencyCache, Resolution, Resolved, StoredEntry};
