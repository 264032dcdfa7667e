//! Human-readable text output formatter

use super::{FileReport, OutputFormatter};
use crate::diagnostic::Diagnosis;
use colored::*;
use std::time::Duration;

/// Text formatter with optional color support
pub struct TextFormatter {
    /// Enable colored output
    pub colored: bool,

    /// Show explanations under each diagnosis
    pub show_explanation: bool,

    /// Show statistics
    pub show_stats: bool,
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self {
            colored: true,
            show_explanation: true,
            show_stats: true,
        }
    }
}

impl TextFormatter {
    /// Create a new text formatter
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable colors
    pub fn without_color(mut self) -> Self {
        self.colored = false;
        self
    }

    fn paint(&self, text: String, style: fn(ColoredString) -> ColoredString) -> String {
        if self.colored {
            style(text.normal()).to_string()
        } else {
            text
        }
    }

    fn plural(count: usize, one: &str, many: &str) -> String {
        format!("{} {}", count, if count == 1 { one } else { many })
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, reports: &[FileReport]) -> String {
        let mut output = String::new();

        for file in reports {
            output.push_str(&self.paint(file.source.clone(), |s| s.underline()));
            output.push('\n');

            if file.report.diagnoses.is_empty() {
                output.push_str(&self.paint(
                    "No common problems found.".to_string(),
                    |s| s.green(),
                ));
                output.push('\n');
            }

            for (i, diagnosis) in file.report.diagnoses.iter().enumerate() {
                output.push_str(&self.format_diagnosis(i + 1, diagnosis));
            }

            for condition in &file.report.unresolved {
                output.push_str(&format!(
                    "   {} unknown condition '{}' was skipped\n",
                    self.paint("=".to_string(), |s| s.yellow()),
                    condition
                ));
            }
            output.push('\n');
        }

        if self.show_stats {
            let problems: usize = reports.iter().map(|f| f.report.diagnoses.len()).sum();
            let duration: Duration = reports.iter().map(|f| f.report.duration).sum();

            output.push_str(&Self::plural(reports.len(), "snippet", "snippets"));
            output.push_str(" diagnosed");
            if problems > 0 {
                output.push_str(": ");
                output.push_str(&self.paint(
                    Self::plural(problems, "problem", "problems"),
                    |s| s.red(),
                ));
            }
            output.push('\n');

            output.push_str(&format!("Finished in {:.2}s\n", duration.as_secs_f64()));
        }

        output
    }

    fn format_diagnosis(&self, index: usize, diagnosis: &Diagnosis) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{} {} (ID: {})\n",
            self.paint(format!("Problem #{}:", index), |s| s.red().bold()),
            diagnosis.name,
            self.paint(diagnosis.error_id.clone(), |s| s.cyan())
        ));
        output.push_str(&format!("   message: {}\n", diagnosis.message));

        if self.show_explanation {
            output.push_str(&format!(
                "   {} {}\n",
                self.paint("= help:".to_string(), |s| s.blue()),
                diagnosis.explanation
            ));
        }

        output
    }
}
