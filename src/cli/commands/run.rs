//! Run command - execute the verification pipeline

use super::{load_sources, project_dir, resolve_platform};
use crate::cache::{format_bytes, DependencyCache};
use crate::cli::args::{ReportFormat, RunArgs};
use crate::config::schema::resolve_jobs;
use crate::config::{Config, ConfigManager};
use crate::error::{PreflightError, PreflightResult};
use crate::history::RunHistory;
use crate::pipeline::{
    CancelSignal, Orchestrator, PipelineOptions, PipelineReport, ProcessExecutor, TaskObserver,
    TaskResult, TaskStatus,
};
use crate::task::TaskRegistry;
use crate::toolchain::{CommandToolchain, Toolchain};
use crate::ui::{self, RunProgress, TaskSpinner, UiContext};
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::debug;

/// Execute the run command, returning the process exit code
pub async fn execute(args: RunArgs, config: &Config, cancel: CancelSignal) -> PreflightResult<u8> {
    let ctx = UiContext::detect().with_quiet(args.format == ReportFormat::Json);

    // Registry problems are fatal before anything runs
    let registry = Arc::new(TaskRegistry::from_config(&config.tasks)?);
    let platform = resolve_platform(args.platform);
    let project = project_dir(args.project)?;

    ui::intro(&ctx, "preflight run");

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start("Loading project sources...");
    let sources = match load_sources(project.clone()).await {
        Ok(sources) => sources,
        Err(e) => {
            spinner.stop_error("Failed to load project sources");
            return Err(e);
        }
    };
    spinner.stop(&format!(
        "Loaded {} file(s), {} from {}",
        sources.len(),
        format_bytes(sources.total_bytes()),
        project.display()
    ));

    let toolchain = CommandToolchain::detect(&config.toolchain).await;
    debug!("Toolchain identity: {}", toolchain.identity());

    let cache = Arc::new(DependencyCache::new(ConfigManager::cache_dir(config)));
    let executor = ProcessExecutor::new(config.toolchain.artifact_env.clone());
    let options = PipelineOptions {
        jobs: pipeline_jobs(args.jobs, config),
        stubs: config.toolchain.stubs.clone(),
    };

    let total = registry.applicable_tasks(&platform).len();
    let progress = Arc::new(RunProgress::new(&ctx, total));
    let observer: TaskObserver = {
        let progress = Arc::clone(&progress);
        Arc::new(move |result: &TaskResult| progress.on_task(result))
    };

    ui::key_value(&ctx, "Platform", platform.as_str());
    ui::key_value(&ctx, "Jobs", &options.jobs.to_string());

    let orchestrator = Orchestrator::new(
        cache,
        registry,
        Arc::new(toolchain),
        Arc::new(executor),
        options,
    )
    .with_observer(observer);

    let report = orchestrator.run(&sources, &platform, &cancel).await;
    progress.finish();

    RunHistory::new(config).record(&report).await;

    if let Some(ref path) = args.report {
        write_report(&report, path).await?;
        ui::remark(&ctx, &format!("Report written to {}", path.display()));
    }

    match args.format {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        ReportFormat::Text => print_report(&ctx, &report, config.pipeline.excerpt_lines),
    }

    Ok(report.exit_code())
}

/// `--jobs` overrides `pipeline.jobs`; both treat 0 as one per CPU
fn pipeline_jobs(requested: Option<usize>, config: &Config) -> usize {
    match requested {
        Some(jobs) => resolve_jobs(jobs),
        None => config.pipeline.effective_jobs(),
    }
}

async fn write_report(report: &PipelineReport, path: &Path) -> PreflightResult<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json)
        .await
        .map_err(|e| PreflightError::io(format!("writing report {}", path.display()), e))?;
    debug!("Report written to {}", path.display());
    Ok(())
}

fn print_report(ctx: &UiContext, report: &PipelineReport, excerpt_lines: usize) {
    ui::section(ctx, "Results");

    if let Some(fingerprint) = &report.dependency_fingerprint {
        let cache = match report.cache_hit {
            Some(true) => "hit",
            Some(false) => "built",
            None => "unavailable",
        };
        ui::key_value(ctx, "Dependencies", &format!("{} ({})", fingerprint.short(), cache));
    }

    for result in &report.results {
        ui::task_result(ctx, result, excerpt_lines);
    }

    let passed = report.count(TaskStatus::is_success);
    let failed = report.count(TaskStatus::is_failure);
    let skipped = report.count(TaskStatus::is_skipped);
    let summary = format!(
        "{} passed, {} failed, {} skipped in {}",
        passed,
        failed,
        skipped,
        ui::format_duration(report.elapsed)
    );

    if report.cancelled {
        ui::outro_warn(ctx, &format!("Interrupted: {}", summary));
    } else if report.is_success() {
        ui::outro_success(ctx, &summary);
    } else {
        ui::outro_error(ctx, &summary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Platform;
    use chrono::Utc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn report() -> PipelineReport {
        PipelineReport::new(
            Platform::new("x86_64-linux"),
            Utc::now(),
            Duration::from_millis(12),
            None,
            None,
            false,
            vec![
                TaskResult::new("fmt", TaskStatus::Success, String::new(), Duration::from_millis(5)),
                TaskResult::new(
                    "lint",
                    TaskStatus::failure("exit 1"),
                    "warning: unused".to_string(),
                    Duration::from_millis(7),
                ),
            ],
        )
    }

    #[tokio::test]
    async fn report_file_is_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("report.json");

        write_report(&report(), &path).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["overall"], "failure");
        assert_eq!(value["results"][1]["name"], "lint");
    }

    #[test]
    fn jobs_flag_zero_uses_every_cpu() {
        let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        let mut config = Config::default();
        config.pipeline.jobs = 2;

        assert_eq!(pipeline_jobs(Some(0), &config), cpus);
        assert_eq!(pipeline_jobs(Some(5), &config), 5);
        assert_eq!(pipeline_jobs(None, &config), 2);
    }

    #[test]
    fn print_report_non_interactive() {
        let ctx = UiContext::non_interactive();
        print_report(&ctx, &report(), 5);
    }
}
