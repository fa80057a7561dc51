//! Project source views
//!
//! Loads the project tree into a deterministic `SourceSet` and narrows it
//! per task with declarative `SourceFilter` predicates.

pub mod filter;
pub mod set;

pub use filter::{filter, SourceFilter, MANIFEST_NAMES};
pub use set::{SourceSet, EXCLUDED_DIRS};
