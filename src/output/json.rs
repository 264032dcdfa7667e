//! JSON output formatter

use super::{FileReport, OutputFormatter};
use crate::diagnostic::Diagnosis;
use serde::Serialize;

/// JSON formatter for machine-readable output
#[derive(Default)]
pub struct JsonFormatter {
    /// Pretty print with indentation
    pub pretty: bool,
}

impl JsonFormatter {
    /// Create a new JSON formatter
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable pretty printing
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    fn render<T: Serialize>(&self, value: &T) -> String {
        if self.pretty {
            serde_json::to_string_pretty(value).unwrap_or_default()
        } else {
            serde_json::to_string(value).unwrap_or_default()
        }
    }
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    files: Vec<JsonFile<'a>>,
    summary: JsonSummary,
}

#[derive(Serialize)]
struct JsonFile<'a> {
    source: &'a str,
    diagnoses: &'a [Diagnosis],
    #[serde(skip_serializing_if = "is_empty")]
    unresolved: &'a [String],
    #[serde(skip_serializing_if = "is_empty")]
    detector_faults: &'a [String],
    executions: usize,
    duration_ms: u128,
}

fn is_empty(names: &&[String]) -> bool {
    names.is_empty()
}

#[derive(Serialize)]
struct JsonSummary {
    snippets: usize,
    snippets_with_problems: usize,
    problem_count: usize,
    duration_ms: u128,
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, reports: &[FileReport]) -> String {
        let files: Vec<JsonFile> = reports
            .iter()
            .map(|f| JsonFile {
                source: &f.source,
                diagnoses: &f.report.diagnoses,
                unresolved: &f.report.unresolved,
                detector_faults: &f.report.detector_faults,
                executions: f.report.executions,
                duration_ms: f.report.duration.as_millis(),
            })
            .collect();

        let output = JsonOutput {
            summary: JsonSummary {
                snippets: reports.len(),
                snippets_with_problems: reports
                    .iter()
                    .filter(|f| f.report.has_diagnoses())
                    .count(),
                problem_count: reports.iter().map(|f| f.report.diagnoses.len()).sum(),
                duration_ms: reports.iter().map(|f| f.report.duration.as_millis()).sum(),
            },
            files,
        };

        self.render(&output)
    }

    fn format_diagnosis(&self, _index: usize, diagnosis: &Diagnosis) -> String {
        self.render(diagnosis)
    }
}
