//! Development environment description
//!
//! Describes a shell that shares the pipeline's dependency cache and the
//! tools its tasks need. Composing never builds or runs anything: the
//! cache is only looked up, so `present` may be false until a pipeline
//! run has populated it.

use crate::cache::{DependencyCache, Fingerprint};
use crate::pipeline::{plan_dependencies, DEPS_DIR_ENV, PLATFORM_ENV};
use crate::source::SourceSet;
use crate::task::{Platform, TaskRegistry};
use crate::toolchain::Toolchain;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Handle on the dependency entry a shell would share
#[derive(Debug, Clone, Serialize)]
pub struct CacheHandle {
    pub fingerprint: Fingerprint,
    /// Artifact directory of the entry (existing or future)
    pub path: PathBuf,
    /// Whether a complete entry exists right now
    pub present: bool,
}

/// Assembled environment for one platform
#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentSpec {
    pub platform: Platform,
    pub dependency_cache: CacheHandle,
    /// Programs the toolchain and the applicable tasks invoke, sorted
    pub tools: Vec<String>,
    pub env: BTreeMap<String, String>,
    /// Applicable task names in declared order
    pub tasks: Vec<String>,
}

impl EnvironmentSpec {
    /// `export KEY='value'` lines for a POSIX shell
    pub fn to_shell(&self) -> String {
        self.env
            .iter()
            .map(|(key, value)| format!("export {}={}\n", key, shell_quote(value)))
            .collect()
    }
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Builds `EnvironmentSpec`s from the same collaborators the pipeline uses
pub struct EnvironmentComposer {
    cache: Arc<DependencyCache>,
    registry: Arc<TaskRegistry>,
    toolchain: Arc<dyn Toolchain>,
    stubs: BTreeMap<String, String>,
    artifact_env: String,
}

impl EnvironmentComposer {
    pub fn new(
        cache: Arc<DependencyCache>,
        registry: Arc<TaskRegistry>,
        toolchain: Arc<dyn Toolchain>,
        stubs: BTreeMap<String, String>,
        artifact_env: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            registry,
            toolchain,
            stubs,
            artifact_env: artifact_env.into(),
        }
    }

    pub async fn compose(&self, project: &SourceSet, platform: &Platform) -> EnvironmentSpec {
        let plan = plan_dependencies(project, platform, &self.stubs, self.toolchain.as_ref());
        let entry = self.cache.lookup(&plan.key).await;
        debug!("Environment cache entry {} present: {}", plan.key, entry.is_some());

        let path = match &entry {
            Some(entry) => entry.artifact_path(),
            None => self
                .cache
                .entry_dir(&plan.key)
                .join(crate::cache::entry::ARTIFACT_DIR),
        };

        let tasks = self.registry.applicable_tasks(platform);
        let tools: BTreeSet<String> = tasks
            .iter()
            .map(|t| t.command.program.clone())
            .chain(std::iter::once(self.toolchain.program().to_string()))
            .collect();

        let mut env = BTreeMap::new();
        env.insert(PLATFORM_ENV.to_string(), platform.to_string());
        if entry.is_some() {
            let dir = path.display().to_string();
            env.insert(self.artifact_env.clone(), dir.clone());
            env.insert(DEPS_DIR_ENV.to_string(), dir);
        }

        EnvironmentSpec {
            platform: platform.clone(),
            dependency_cache: CacheHandle {
                fingerprint: plan.key.fingerprint,
                path,
                present: entry.is_some(),
            },
            tools: tools.into_iter().collect(),
            env,
            tasks: tasks.iter().map(|t| t.name.clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::BuildInfo;
    use crate::error::BuildFailure;
    use crate::task::{PlatformSet, TaskCommand, TaskSpec};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingToolchain {
        builds: AtomicUsize,
    }

    #[async_trait]
    impl Toolchain for CountingToolchain {
        fn name(&self) -> &str {
            "cargo"
        }

        fn version(&self) -> &str {
            "cargo 1.85.0"
        }

        fn program(&self) -> &str {
            "cargo"
        }

        async fn build_dependencies(
            &self,
            _sources: &SourceSet,
            _platform: &Platform,
            _out_dir: &Path,
        ) -> Result<(), BuildFailure> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn registry() -> Arc<TaskRegistry> {
        Arc::new(
            TaskRegistry::from_tasks(vec![
                TaskSpec::new("fmt", TaskCommand::new("cargo", &["fmt"])),
                TaskSpec::new("spell", TaskCommand::new("typos", &[])),
                TaskSpec::new("cov", TaskCommand::new("grcov", &[])).only_on(PlatformSet::only(["x86_64-linux"])),
            ])
            .unwrap(),
        )
    }

    fn composer(dir: &Path, toolchain: Arc<CountingToolchain>) -> (Arc<DependencyCache>, EnvironmentComposer) {
        let cache = Arc::new(DependencyCache::new(dir));
        let composer = EnvironmentComposer::new(
            Arc::clone(&cache),
            registry(),
            toolchain,
            BTreeMap::new(),
            "CARGO_TARGET_DIR",
        );
        (cache, composer)
    }

    #[tokio::test]
    async fn compose_never_builds() {
        let dir = TempDir::new().unwrap();
        let toolchain = Arc::new(CountingToolchain::default());
        let (_, composer) = composer(dir.path(), toolchain.clone());

        let spec = composer
            .compose(&SourceSet::from_pairs([("Cargo.lock", "v1")]), &Platform::new("aarch64-darwin"))
            .await;

        assert_eq!(toolchain.builds.load(Ordering::SeqCst), 0);
        assert!(!spec.dependency_cache.present);
        assert_eq!(spec.tools, vec!["cargo", "typos"]);
        assert_eq!(spec.tasks, vec!["fmt", "spell"]);
        assert!(!spec.env.contains_key(DEPS_DIR_ENV));
        assert_eq!(spec.env[PLATFORM_ENV], "aarch64-darwin");
    }

    #[tokio::test]
    async fn compose_shares_the_pipeline_entry() {
        let dir = TempDir::new().unwrap();
        let toolchain = Arc::new(CountingToolchain::default());
        let (cache, composer) = composer(dir.path(), toolchain.clone());
        let project = SourceSet::from_pairs([("Cargo.lock", "v1"), ("src/main.rs", "fn main() {}")]);
        let platform = Platform::new("x86_64-linux");

        let plan = plan_dependencies(&project, &platform, &BTreeMap::new(), toolchain.as_ref());
        let info = BuildInfo {
            toolchain: "cargo".to_string(),
            toolchain_version: "cargo 1.85.0".to_string(),
        };
        let built = cache
            .get_or_build(plan.key, info, |_dir: PathBuf| async { Ok(()) })
            .await
            .unwrap();

        let spec = composer.compose(&project, &platform).await;

        assert!(spec.dependency_cache.present);
        assert_eq!(spec.dependency_cache.path, built.entry.artifact_path());
        assert_eq!(spec.tools, vec!["cargo", "grcov", "typos"]);
        assert_eq!(
            spec.env[DEPS_DIR_ENV],
            built.entry.artifact_path().display().to_string()
        );
        assert!(spec.env.contains_key("CARGO_TARGET_DIR"));
    }

    #[test]
    fn shell_exports_are_quoted() {
        assert_eq!(shell_quote("/tmp/a b"), "'/tmp/a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }
}
