//! Terminal output with an interactive and a plain (CI) rendering
//!
//! Uses `cliclack` for interactive output with automatic fallback to plain
//! lines in CI/non-interactive environments. A quiet context suppresses
//! everything so `--format json` output stays machine-readable.
//!
//! # Example
//!
//! ```rust,ignore
//! use preflight::ui::{self, UiContext, RunProgress};
//!
//! let ctx = UiContext::detect();
//! ui::intro(&ctx, "preflight run");
//!
//! let progress = RunProgress::new(&ctx, tasks.len());
//! // ... progress.on_task(&result) as tasks finish ...
//! progress.finish();
//!
//! ui::outro_success(&ctx, "All checks passed");
//! ```

mod context;
mod output;
mod progress;
mod theme;

pub use context::UiContext;
pub use output::{
    format_duration, intro, key_value, outro_error, outro_success, outro_warn,
    remark, section, step_info, task_result,
};
pub use progress::{RunProgress, TaskSpinner};
pub use theme::{init_theme, PreflightTheme, Tone};
