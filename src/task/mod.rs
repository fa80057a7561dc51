//! Verification tasks and the registry that offers them per platform

pub mod platform;
pub mod registry;
pub mod spec;

pub use platform::{Platform, PlatformSet};
pub use registry::TaskRegistry;
pub use spec::{TaskCommand, TaskSpec};
