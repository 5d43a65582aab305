//! Terminal output helpers for the CLI.
//!
//! Colored status lines, source icons and a spinner shown while a review runs.

use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::time::Duration;

/// Check if stdout is a terminal.
pub fn is_terminal() -> bool {
    std::io::stdout().is_terminal()
}

/// Check if stderr is a terminal.
pub fn stderr_is_terminal() -> bool {
    std::io::stderr().is_terminal()
}

/// Icon for a metadata source id.
pub fn source_icon(source: &str) -> &'static str {
    match source.to_lowercase().as_str() {
        "crossref" => "🔗",
        "scopus" => "📚",
        "wos" | "web of science" => "🌐",
        "openalex" => "📖",
        "semantic" | "semantic scholar" => "🧠",
        _ => "📄",
    }
}

/// Status types for colored output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Error,
    Warning,
    Info,
}

/// Status icons for different outcomes.
pub fn status_icon(status: Status) -> &'static str {
    match status {
        Status::Success => "✓",
        Status::Error => "✗",
        Status::Warning => "⚠",
        Status::Info => "ℹ",
    }
}

/// Print a styled status line to stderr.
pub fn print_status(status: Status, msg: &str) {
    let icon = status_icon(status);
    match status {
        Status::Success => eprintln!("{} {}", icon.green().bold(), msg),
        Status::Error => eprintln!("{} {}", icon.red().bold(), msg),
        Status::Warning => eprintln!("{} {}", icon.yellow().bold(), msg),
        Status::Info => eprintln!("{} {}", icon.cyan().bold(), msg),
    }
}

/// Print a section header.
pub fn print_section(title: &str) {
    println!();
    println!("{}", format!("━━━ {} ━━━", title).bold().cyan());
}

/// Truncate text to at most `max_chars` characters, ending in `...` when cut.
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if max_chars <= 3 {
        return "...".to_string();
    }
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars - 3).collect();
    format!("{}...", kept.trim_end())
}

/// Spinner shown on stderr while a long operation runs.
pub struct Spinner {
    pb: indicatif::ProgressBar,
}

impl Spinner {
    /// Create a new spinner with the given message.
    ///
    /// Hidden when stderr is not a terminal.
    pub fn new(msg: &str) -> Self {
        let pb = if stderr_is_terminal() {
            indicatif::ProgressBar::new_spinner()
        } else {
            indicatif::ProgressBar::hidden()
        };
        if let Ok(style) = indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            pb.set_style(style.tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "));
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        Self { pb }
    }

    /// Finish with success message.
    pub fn finish_with_success(&self, msg: &str) {
        self.finish_styled("{spinner:.green} {msg}", format!("✓ {}", msg));
    }

    /// Finish with error message.
    pub fn finish_with_error(&self, msg: &str) {
        self.finish_styled("{spinner:.red} {msg}", format!("✗ {}", msg));
    }

    /// Remove the spinner without leaving a line behind.
    pub fn clear(&self) {
        self.pb.finish_and_clear();
    }

    fn finish_styled(&self, template: &str, msg: String) {
        if let Ok(style) = indicatif::ProgressStyle::with_template(template) {
            self.pb.set_style(style);
        }
        self.pb.finish_with_message(msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_icon() {
        assert_eq!(source_icon("crossref"), "🔗");
        assert_eq!(source_icon("Semantic Scholar"), "🧠");
        assert_eq!(source_icon("unknown"), "📄");
    }

    #[test]
    fn test_status_icon() {
        assert_eq!(status_icon(Status::Success), "✓");
        assert_eq!(status_icon(Status::Error), "✗");
    }

    #[test]
    fn test_truncate_with_ellipsis() {
        assert_eq!(truncate_with_ellipsis("Hello", 10), "Hello");
        assert_eq!(truncate_with_ellipsis("Hello World", 8), "Hello...");
        assert_eq!(truncate_with_ellipsis("", 10), "");
        assert_eq!(truncate_with_ellipsis("Hello", 3), "...");
        assert_eq!(truncate_with_ellipsis("Müller über", 6), "Mül...");
    }
}
