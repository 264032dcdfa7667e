//! Pysleuth - Python Snippet Diagnostician
//!
//! Diagnoses a snippet of Python code against an ordered catalog of error
//! patterns and returns human-readable diagnoses. Each rule names a
//! condition; conditions resolve to detectors that either inspect the parsed
//! snippet or run it in a sandboxed interpreter and classify the fault it
//! raises.
//!
//! # Architecture
//!
//! ```text
//! CLI/API -> Engine -> RuleCatalog -> DetectorRegistry -> Detector
//!                                                           |-> syntax (tree-sitter + layout scan)
//!                                                           '-> sandbox (isolated interpreter)
//! ```
//!
//! # Rule catalogs
//!
//! A catalog is a JSON or YAML list of rules (or a `{version, rules}` file):
//!
//! ```json
//! [
//!   {
//!     "id": "E008",
//!     "name": "ZeroDivisionError",
//!     "condition": "check_zero_division",
//!     "message": "Division by zero",
//!     "explanation": "The right-hand side of a division evaluated to zero."
//!   }
//! ]
//! ```
//!
//! # Example
//!
//! ```no_run
//! use pysleuth::{Config, Engine};
//!
//! let engine = Engine::from_config(&Config::default());
//! for diagnosis in engine.diagnose("def f(x=[]):\n    return x\n") {
//!     println!("{} ({}): {}", diagnosis.name, diagnosis.error_id, diagnosis.message);
//! }
//! ```

pub mod config;
pub mod detectors;
pub mod diagnostic;
pub mod engine;
pub mod output;
pub mod rule;
pub mod sandbox;
pub mod syntax;

// Re-export main types
pub use config::{Config, ConfigError, ExecutionStrategy, SandboxConfig};
pub use detectors::{Detector, DetectorKind, DetectorRegistry, Snippet};
pub use diagnostic::Diagnosis;
pub use engine::{DiagnosisReport, Engine, RuleTiming};
pub use output::{FileReport, JsonFormatter, OutputFormatter, TextFormatter};
pub use rule::{Rule, RuleCatalog};
pub use sandbox::{ExecutionOutcome, FaultKind, Sandbox, SandboxError};
pub use syntax::{parse, ParseOutcome, SyntaxError, SyntaxFault, SyntaxTree};
