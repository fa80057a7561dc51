//! Tasks command - list the task registry

use super::resolve_platform;
use crate::cli::args::TasksArgs;
use crate::config::Config;
use crate::error::PreflightResult;
use crate::task::{Platform, TaskRegistry, TaskSpec};
use console::style;

/// Execute the tasks command
pub async fn execute(args: TasksArgs, config: &Config) -> PreflightResult<()> {
    let registry = TaskRegistry::from_config(&config.tasks)?;
    let platform = resolve_platform(args.platform);

    let tasks: Vec<&TaskSpec> = if args.all {
        registry.tasks().iter().collect()
    } else {
        registry.applicable_tasks(&platform)
    };

    if tasks.is_empty() {
        println!("No tasks apply to {}.", platform);
        return Ok(());
    }

    print_task_table(&tasks, &platform, args.all);
    Ok(())
}

fn print_task_table(tasks: &[&TaskSpec], platform: &Platform, show_applicability: bool) {
    println!(
        "{:<12} {:<6} {:<28} {:<30} COMMAND",
        "NAME", "DEPS", "PLATFORMS", "SOURCES"
    );
    println!("{}", "-".repeat(110));

    for task in tasks {
        let name = if show_applicability && !task.applies_to(platform) {
            style(format!("{:<12}", task.name)).dim().to_string()
        } else {
            format!("{:<12}", task.name)
        };
        let deps = if task.uses_dependency_cache { "yes" } else { "no" };

        println!(
            "{} {:<6} {:<28} {:<30} {}",
            name,
            deps,
            task.platforms.to_string(),
            task.sources.to_string(),
            task.command
        );
    }

    println!();
    if show_applicability {
        let applicable = tasks.iter().filter(|t| t.applies_to(platform)).count();
        println!(
            "Total: {} task(s), {} applicable on {}",
            tasks.len(),
            applicable,
            platform
        );
    } else {
        println!("Total: {} task(s) on {}", tasks.len(), platform);
    }
}
