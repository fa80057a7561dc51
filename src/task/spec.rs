//! Declarative task records

use crate::source::SourceFilter;
use crate::task::platform::{Platform, PlatformSet};
use std::fmt;

/// External command a task invokes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl TaskCommand {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Build from a full argv; `None` when empty
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        if program.trim().is_empty() {
            return None;
        }
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl fmt::Display for TaskCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {:?}", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// A verification task. Immutable once the registry is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub name: String,
    pub description: String,
    /// Part of the project the task reads
    pub sources: SourceFilter,
    /// Whether the task borrows the shared dependency artifact
    pub uses_dependency_cache: bool,
    pub platforms: PlatformSet,
    pub command: TaskCommand,
}

impl TaskSpec {
    pub fn new(name: impl Into<String>, command: TaskCommand) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            sources: SourceFilter::All,
            uses_dependency_cache: false,
            platforms: PlatformSet::All,
            command,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn reads(mut self, sources: SourceFilter) -> Self {
        self.sources = sources;
        self
    }

    pub fn uses_dependency_cache(mut self) -> Self {
        self.uses_dependency_cache = true;
        self
    }

    pub fn only_on(mut self, platforms: PlatformSet) -> Self {
        self.platforms = platforms;
        self
    }

    pub fn applies_to(&self, platform: &Platform) -> bool {
        self.platforms.contains(platform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_display_quotes_spaces() {
        let cmd = TaskCommand::new("sh", &["-c", "exit 1"]);
        assert_eq!(cmd.to_string(), "sh -c \"exit 1\"");
    }

    #[test]
    fn from_argv_rejects_empty() {
        assert!(TaskCommand::from_argv(&[]).is_none());
        assert!(TaskCommand::from_argv(&[" ".to_string()]).is_none());

        let cmd = TaskCommand::from_argv(&["cargo".to_string(), "fmt".to_string()]).unwrap();
        assert_eq!(cmd.program, "cargo");
        assert_eq!(cmd.args, vec!["fmt"]);
    }

    #[test]
    fn builder_sets_fields() {
        let spec = TaskSpec::new("lint", TaskCommand::new("cargo", &["clippy"]))
            .reads(SourceFilter::cargo_sources())
            .uses_dependency_cache()
            .only_on(PlatformSet::only(["x86_64-linux"]));

        assert!(spec.uses_dependency_cache);
        assert!(spec.applies_to(&Platform::new("x86_64-linux")));
        assert!(!spec.applies_to(&Platform::new("aarch64-darwin")));
    }
}
