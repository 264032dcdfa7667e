//! Output formatters for diagnosis reports

mod json;
mod text;

pub use json::JsonFormatter;
pub use text::TextFormatter;

use crate::diagnostic::Diagnosis;
use crate::engine::DiagnosisReport;

/// Diagnosis report for one input (a file, or `-` for stdin)
#[derive(Debug)]
pub struct FileReport {
    /// Display name of the input
    pub source: String,
    /// Engine report
    pub report: DiagnosisReport,
}

impl FileReport {
    pub fn new(source: impl Into<String>, report: DiagnosisReport) -> Self {
        Self {
            source: source.into(),
            report,
        }
    }
}

/// Output formatter trait
pub trait OutputFormatter: Send + Sync {
    /// Format reports for every input
    fn format(&self, reports: &[FileReport]) -> String;

    /// Format a single diagnosis
    fn format_diagnosis(&self, index: usize, diagnosis: &Diagnosis) -> String;
}
