//! Run-status colors shared by plain output and the cliclack theme

use crate::pipeline::TaskStatus;
use cliclack::ThemeState;
use console::{Style, StyledObject};

/// Visual tone of a run or task outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Working,
    Passed,
    Failed,
    Skipped,
}

impl Tone {
    pub fn of(status: &TaskStatus) -> Self {
        match status {
            TaskStatus::Success => Self::Passed,
            TaskStatus::Failure { .. } => Self::Failed,
            TaskStatus::Skipped { .. } => Self::Skipped,
        }
    }

    pub fn style(self) -> Style {
        match self {
            Self::Working => Style::new().blue(),
            Self::Passed => Style::new().green(),
            Self::Failed => Style::new().red(),
            Self::Skipped => Style::new().yellow().dim(),
        }
    }

    /// Bracketed marker for plain (CI) output
    pub fn marker(self) -> StyledObject<&'static str> {
        let text = match self {
            Self::Working => "...",
            Self::Passed => "[OK]",
            Self::Failed => "[FAIL]",
            Self::Skipped => "[-]",
        };
        self.style().apply_to(text)
    }

    fn of_state(state: &ThemeState) -> Self {
        match state {
            ThemeState::Active => Self::Working,
            ThemeState::Submit => Self::Passed,
            ThemeState::Error(_) => Self::Failed,
            ThemeState::Cancel => Self::Skipped,
        }
    }
}

/// cliclack theme: the bar stays blue until a step settles, then takes
/// the outcome's tone
#[derive(Debug, Clone, Default)]
pub struct PreflightTheme;

impl cliclack::Theme for PreflightTheme {
    fn bar_color(&self, state: &ThemeState) -> Style {
        match Tone::of_state(state) {
            Tone::Passed => Tone::Working.style().dim(),
            tone => tone.style(),
        }
    }

    fn state_symbol_color(&self, state: &ThemeState) -> Style {
        Tone::of_state(state).style()
    }
}

/// Initialize the global theme
pub fn init_theme() {
    cliclack::set_theme(PreflightTheme);
}

#[cfg(test)]
mod tests {
    use super::*;
    use cliclack::Theme;

    #[test]
    fn task_status_maps_to_tone() {
        assert_eq!(Tone::of(&TaskStatus::Success), Tone::Passed);
        assert_eq!(Tone::of(&TaskStatus::failure("exit 1")), Tone::Failed);
        assert_eq!(Tone::of(&TaskStatus::skipped("cancelled")), Tone::Skipped);
    }

    #[test]
    fn theme_follows_tones() {
        let theme = PreflightTheme;
        assert_eq!(theme.bar_color(&ThemeState::Error(String::new())), Tone::Failed.style());
        assert_eq!(theme.state_symbol_color(&ThemeState::Submit), Tone::Passed.style());
        assert_eq!(theme.bar_color(&ThemeState::Submit), Style::new().blue().dim());
    }
}
