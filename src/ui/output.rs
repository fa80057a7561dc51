//! Output functions for consistent CLI formatting
//!
//! Every function is a no-op when the context is quiet, so machine
//! formats (JSON on stdout) stay clean.

use super::context::UiContext;
use super::theme::Tone;
use crate::pipeline::{excerpt, TaskResult, TaskStatus};
use console::style;
use std::time::Duration;

/// Display intro banner
pub fn intro(ctx: &UiContext, title: &str) {
    if ctx.is_quiet() {
        return;
    }
    if ctx.use_fancy_output() {
        cliclack::intro(style(title).blue().bold()).ok();
    } else {
        println!("{}", style(title).blue().bold());
        println!();
    }
}

/// Display success outro
pub fn outro_success(ctx: &UiContext, message: &str) {
    if ctx.is_quiet() {
        return;
    }
    if ctx.use_fancy_output() {
        cliclack::outro(Tone::Passed.style().bold().apply_to(message)).ok();
    } else {
        println!();
        println!("{} {}", Tone::Passed.marker(), message);
    }
}

/// Display error outro
pub fn outro_error(ctx: &UiContext, message: &str) {
    if ctx.is_quiet() {
        return;
    }
    if ctx.use_fancy_output() {
        cliclack::outro(Tone::Failed.style().bold().apply_to(message)).ok();
    } else {
        println!();
        println!("{} {}", Tone::Failed.marker(), message);
    }
}

/// Display warning outro
pub fn outro_warn(ctx: &UiContext, message: &str) {
    if ctx.is_quiet() {
        return;
    }
    if ctx.use_fancy_output() {
        cliclack::outro(Tone::Skipped.style().bold().apply_to(message)).ok();
    } else {
        println!();
        println!("{} {}", Tone::Skipped.marker(), message);
    }
}

/// Display a section header
pub fn section(ctx: &UiContext, title: &str) {
    if ctx.is_quiet() {
        return;
    }
    println!();
    if ctx.use_fancy_output() {
        cliclack::log::info(style(title).bold()).ok();
    } else {
        println!("{}", style(title).bold());
    }
}

/// Display an info step
pub fn step_info(ctx: &UiContext, message: &str) {
    if ctx.is_quiet() {
        return;
    }
    if ctx.use_fancy_output() {
        cliclack::log::info(message).ok();
    } else {
        println!("  {} {}", style("[INFO]").cyan(), message);
    }
}

/// Display a remark/hint
pub fn remark(ctx: &UiContext, message: &str) {
    if ctx.is_quiet() {
        return;
    }
    if ctx.use_fancy_output() {
        cliclack::log::remark(message).ok();
    } else {
        println!("  {}", style(message).dim());
    }
}

/// Print styled key-value pair
pub fn key_value(ctx: &UiContext, key: &str, value: &str) {
    if ctx.is_quiet() {
        return;
    }
    if ctx.use_fancy_output() {
        println!("  {}: {}", style(key).dim(), value);
    } else {
        println!("  {}: {}", key, value);
    }
}

/// Format a duration as `1.2s` / `340ms`
pub fn format_duration(duration: Duration) -> String {
    if duration.as_millis() >= 1000 {
        format!("{:.1}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// One report line per task, with a diagnostic excerpt for failures
pub fn task_result(ctx: &UiContext, result: &TaskResult, excerpt_lines: usize) {
    if ctx.is_quiet() {
        return;
    }
    let duration = format_duration(result.duration);

    let tone = Tone::of(&result.status);

    match &result.status {
        TaskStatus::Success => {
            let line = format!("{} ({})", result.name, style(&duration).dim());
            if ctx.use_fancy_output() {
                cliclack::log::success(line).ok();
            } else {
                println!("  {} {}", tone.marker(), line);
            }
        }
        TaskStatus::Skipped { reason } => {
            let line = format!("{} - {}", style(&result.name).dim(), tone.style().apply_to(reason));
            if ctx.use_fancy_output() {
                cliclack::log::remark(line).ok();
            } else {
                println!("  {} {}", tone.marker(), line);
            }
        }
        TaskStatus::Failure { reason } => {
            let line = format!("{} ({}): {}", result.name, duration, tone.style().apply_to(reason));
            let tail = excerpt(&result.diagnostics, excerpt_lines);
            if ctx.use_fancy_output() {
                cliclack::log::error(line).ok();
            } else {
                println!("  {} {}", tone.marker(), line);
            }
            for diagnostic in tail.lines() {
                println!("      {}", style(diagnostic).dim());
            }
        }
    }
}
