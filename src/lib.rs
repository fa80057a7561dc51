//! Preflight - layered build-and-verification pipeline
//!
//! Compiles a project's dependency closure once per (lock state, platform),
//! caches it on disk, and runs every verification task against the shared
//! artifact.

pub mod cache;
pub mod cli;
pub mod config;
pub mod environment;
pub mod error;
pub mod history;
pub mod pipeline;
pub mod source;
pub mod task;
pub mod toolchain;
pub mod ui;

pub use error::{PreflightError, PreflightResult};
