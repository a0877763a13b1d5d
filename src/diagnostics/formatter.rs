//! Formatting reports for different output formats

use super::diagnostic::UnifiedError;
#[cfg(feature = "terminal")]
use super::diagnostic::Severity;
use crate::pipeline::{RunStatus, ValidationReport};
use serde::Serialize;
use std::str::FromStr;

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Human-readable text format
    Text,
    /// JSON format
    Json,
    /// Compact single-line format
    Compact,
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Format::Text),
            "json" => Ok(Format::Json),
            "compact" => Ok(Format::Compact),
            other => Err(format!("unknown format '{other}', expected text, json or compact")),
        }
    }
}

/// Formatter for errors and reports
pub struct ReportFormatter {
    format: Format,
    show_code: bool,
    show_breadcrumbs: bool,
    #[cfg(feature = "terminal")]
    use_color: bool,
}

impl ReportFormatter {
    /// Create a new formatter
    pub fn new(format: Format) -> Self {
        Self {
            format,
            show_code: true,
            show_breadcrumbs: true,
            #[cfg(feature = "terminal")]
            use_color: true,
        }
    }

    /// Set whether to show error codes
    pub fn with_code(mut self, show: bool) -> Self {
        self.show_code = show;
        self
    }

    /// Set whether to show breadcrumbs
    pub fn with_breadcrumbs(mut self, show: bool) -> Self {
        self.show_breadcrumbs = show;
        self
    }

    /// Set whether to use color (terminal feature only)
    #[cfg(feature = "terminal")]
    pub fn with_color(mut self, use_color: bool) -> Self {
        self.use_color = use_color;
        self
    }

    /// Format one error
    pub fn format_error(&self, error: &UnifiedError) -> String {
        match self.format {
            Format::Text => self.format_text(error),
            Format::Json => to_json(error),
            Format::Compact => self.format_compact(error),
        }
    }

    /// Format a whole report
    pub fn format_report(&self, report: &ValidationReport) -> String {
        match self.format {
            Format::Json => to_json(report),
            Format::Text => {
                let mut out = self.format_status(report);
                for error in &report.errors {
                    out.push_str("\n\n");
                    out.push_str(&self.format_text(error));
                }
                out
            }
            Format::Compact => {
                let mut lines = vec![self.format_status(report)];
                lines.extend(report.errors.iter().map(|e| self.format_compact(e)));
                lines.join("\n")
            }
        }
    }

    fn format_status(&self, report: &ValidationReport) -> String {
        if let Some(terminal) = &report.terminal_error {
            return if self.show_code {
                format!("aborted: {} [{}]", terminal.message, terminal.error_code)
            } else {
                format!("aborted: {}", terminal.message)
            };
        }
        let state = match report.status {
            RunStatus::Completed => "completed",
            RunStatus::Aborted => "aborted",
        };
        let by_source: Vec<String> = report
            .summary
            .by_source
            .iter()
            .map(|(source, n)| format!("{source} {n}"))
            .collect();
        let by_severity: Vec<String> = report
            .summary
            .by_severity
            .iter()
            .map(|(severity, n)| format!("{severity} {n}"))
            .collect();
        if report.summary.total == 0 {
            format!("{state}: no errors")
        } else {
            format!(
                "{state}: {} error(s) ({}; {})",
                report.summary.total,
                by_source.join(", "),
                by_severity.join(", ")
            )
        }
    }

    fn format_text(&self, error: &UnifiedError) -> String {
        let mut result = String::new();

        // Header line
        #[cfg(feature = "terminal")]
        if self.use_color {
            use colored::Colorize;
            let severity_str = match error.severity {
                Severity::Error => "error".red().bold(),
                Severity::Warning => "warning".yellow().bold(),
                Severity::Information => "information".blue().bold(),
            };
            result.push_str(&format!("{}: {}", severity_str, error.message.bold()));
        } else {
            result.push_str(&format!("{}: {}", error.severity, error.message));
        }

        #[cfg(not(feature = "terminal"))]
        result.push_str(&format!("{}: {}", error.severity, error.message));

        if self.show_code {
            result.push_str(&format!(" [{}]", error.error_code));
        }
        result.push('\n');

        // Location
        match &error.json_pointer {
            Some(pointer) => {
                let pointer = if pointer.is_empty() { "/" } else { pointer.as_str() };
                result.push_str(&format!(" --> {pointer}"));
                if self.show_breadcrumbs && !error.breadcrumbs.is_empty() {
                    result.push_str(&format!(" ({})", error.breadcrumbs.join(" > ")));
                }
                result.push('\n');
            }
            None => result.push_str(" --> (unresolved)\n"),
        }
        if !error.path.is_empty() {
            result.push_str(&format!("     path: {}\n", error.path));
        }
        if !error.missing_parents.is_empty() {
            result.push_str(&format!("     missing: {}\n", error.missing_parents.join(", ")));
        }

        result
    }

    fn format_compact(&self, error: &UnifiedError) -> String {
        let code = if self.show_code {
            format!("[{}] ", error.error_code)
        } else {
            String::new()
        };
        let location = error
            .json_pointer
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(if error.path.is_empty() { "-" } else { error.path.as_str() });

        format!(
            "{}: {}: {}: {}{}",
            location, error.source, error.severity, code, error.message
        )
    }
}

impl Default for ReportFormatter {
    fn default() -> Self {
        Self::new(Format::Text)
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"formatError\": {:?}}}", e.to_string()))
}
