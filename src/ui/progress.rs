//! Progress indicators with CI fallback

use super::context::UiContext;
use super::theme::Tone;
use crate::pipeline::TaskResult;
use indicatif::{ProgressBar, ProgressStyle};

/// A spinner for short preparatory steps
pub struct TaskSpinner {
    spinner: Option<cliclack::ProgressBar>,
    interactive: bool,
    quiet: bool,
}

impl TaskSpinner {
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            spinner: None,
            interactive: ctx.use_fancy_output(),
            quiet: ctx.is_quiet(),
        }
    }

    /// Start the spinner with a message
    pub fn start(&mut self, message: &str) {
        if self.quiet {
            return;
        }
        if self.interactive {
            let spinner = cliclack::spinner();
            spinner.start(message);
            self.spinner = Some(spinner);
        } else {
            println!("{} {}", Tone::Working.marker(), message);
        }
    }

    /// Stop with success message
    pub fn stop(&mut self, message: &str) {
        if self.quiet {
            return;
        }
        if let Some(spinner) = self.spinner.take() {
            spinner.stop(message);
        } else {
            println!("{} {}", Tone::Passed.marker(), message);
        }
    }

    /// Stop with error message
    pub fn stop_error(&mut self, message: &str) {
        if self.quiet {
            return;
        }
        if let Some(spinner) = self.spinner.take() {
            spinner.error(message);
        } else {
            println!("{} {}", Tone::Failed.marker(), message);
        }
    }
}

/// Task counter shown while a pipeline runs.
///
/// An indicatif bar in interactive mode; one plain line per finished task
/// in CI.
pub struct RunProgress {
    bar: Option<ProgressBar>,
    quiet: bool,
}

impl RunProgress {
    pub fn new(ctx: &UiContext, total: usize) -> Self {
        let bar = if ctx.use_fancy_output() && total > 0 {
            let bar = ProgressBar::new(total as u64);
            if let Ok(template) = ProgressStyle::default_bar().template(
                "  {spinner:.blue} Running tasks  {bar:20.blue/dim} {pos}/{len} {msg:.dim}  {elapsed:.dim}",
            ) {
                bar.set_style(template.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ").progress_chars("━╸─"));
            }
            bar.enable_steady_tick(std::time::Duration::from_millis(120));
            Some(bar)
        } else {
            None
        };
        Self {
            bar,
            quiet: ctx.is_quiet(),
        }
    }

    /// Record a finished task
    pub fn on_task(&self, result: &TaskResult) {
        if let Some(ref bar) = self.bar {
            bar.inc(1);
            bar.set_message(result.name.clone());
        } else if !self.quiet {
            let tone = Tone::of(&result.status);
            println!("  {} {} {}", tone.marker(), result.name, tone.style().apply_to(result.status.label()));
        }
    }

    /// Finish and clear the bar
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.disable_steady_tick();
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::TaskStatus;
    use std::time::Duration;

    #[test]
    fn spinner_non_interactive() {
        let ctx = UiContext::non_interactive();
        let mut spinner = TaskSpinner::new(&ctx);
        spinner.start("Loading project...");
        spinner.stop("Loaded");
        // Should not panic
    }

    #[test]
    fn run_progress_without_terminal_has_no_bar() {
        let ctx = UiContext::non_interactive();
        let progress = RunProgress::new(&ctx, 3);
        assert!(progress.bar.is_none());
        progress.on_task(&TaskResult::new("fmt", TaskStatus::Success, String::new(), Duration::ZERO));
        progress.finish();
    }
}
