//! Console message formatting for execution output

use std::time::Duration;

use anstyle::{AnsiColor, Color, RgbColor, Style};

use crate::exec::pipeline::RunOutcome;

const ACCENT: Style =
    Style::new().fg_color(Some(Color::Rgb(RgbColor(94, 129, 172))));
const SUCCESS: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green)));
const FAILURE: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red)));
const DIM: Style = Style::new().dimmed();
const BOLD: Style = Style::new().bold();

/// Styled message rendering; escape codes are only emitted when enabled, so
/// piped output stays clean.
pub struct Palette {
    enabled: bool,
}

impl Palette {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Palette { enabled }
    }

    fn paint(&self, style: Style, text: &str) -> String {
        if self.enabled {
            format!("{style}{text}{}", anstyle::Reset)
        } else {
            text.to_string()
        }
    }

    #[must_use]
    pub fn step_header(&self, index: usize, total: usize, name: &str, command: &str) -> String {
        let counter_width = total.to_string().len();
        let prefix = format!("[{:>counter_width$}/{total}]", index + 1);
        format!(
            "{} {} {} {}",
            self.paint(BOLD, &prefix),
            name,
            self.paint(ACCENT, "❱"),
            self.paint(DIM, command)
        )
    }

    #[must_use]
    pub fn success_line(&self, duration: Duration) -> String {
        format!(
            "{} Command succeeded {}",
            self.paint(SUCCESS, "✓"),
            self.paint(DIM, &format!("({})", format_duration(duration)))
        )
    }

    #[must_use]
    pub fn failure_line(&self, exit_code: i32, duration: Duration) -> String {
        format!(
            "{} Command failed (exit code {exit_code}) {}",
            self.paint(FAILURE, "✘"),
            self.paint(DIM, &format!("({})", format_duration(duration)))
        )
    }

    #[must_use]
    pub fn spawn_failure_line(&self, message: &str) -> String {
        format!("{} {message}", self.paint(FAILURE, "✘"))
    }

    /// Dimmed hint line, used under error reports
    #[must_use]
    pub fn hint(&self, text: &str) -> String {
        self.paint(DIM, &format!("hint: {text}"))
    }

    /// Final one-line report for a finished run
    #[must_use]
    pub fn summary(&self, outcome: &RunOutcome, total: usize) -> String {
        match outcome {
            RunOutcome::Completed => self.paint(
                SUCCESS,
                &format!("{total} commands: all passed"),
            ),
            RunOutcome::StoppedOnError {
                index,
                exit_code,
                unexecuted,
            } => self.paint(
                FAILURE,
                &format!(
                    "Step {} failed with code {exit_code}; {unexecuted} commands not run",
                    index + 1
                ),
            ),
            RunOutcome::StoppedByUser { unexecuted } => self.paint(
                FAILURE,
                &format!("Stopped by user; {unexecuted} commands not run"),
            ),
        }
    }
}

fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let tenths = d.subsec_millis() / 100;
    if total_secs < 60 {
        format!("{total_secs}.{tenths}s")
    } else {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        format!("{mins}m {secs}.{tenths}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_output_has_no_escapes() {
        let palette = Palette::new(false);
        let header = palette.step_header(0, 3, "compile", "make all");
        assert_eq!(header, "[1/3] compile ❱ make all");
        assert!(!header.contains('\x1b'));
    }

    #[test]
    fn test_colored_output_has_escapes() {
        let palette = Palette::new(true);
        assert!(palette.success_line(Duration::from_millis(1200)).contains('\x1b'));
    }

    #[test]
    fn test_summary_counts_unexecuted() {
        let palette = Palette::new(false);
        let summary = palette.summary(
            &RunOutcome::StoppedOnError {
                index: 1,
                exit_code: 7,
                unexecuted: 1,
            },
            3,
        );
        assert_eq!(summary, "Step 2 failed with code 7; 1 commands not run");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(1234)), "1.2s");
        assert_eq!(format_duration(Duration::from_secs(75)), "1m 15.0s");
    }
}
