//! Detector registry
//!
//! A detector is a named check over a snippet. Rules reference detectors by
//! condition name; the registry maps those names to statically typed check
//! functions and is built once when the engine is constructed.

pub mod runtime;
pub mod static_checks;

use crate::config::ExecutionStrategy;
use crate::sandbox::{ExecutionOutcome, Sandbox};
use crate::syntax::{self, ParseOutcome, SyntaxTree};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

/// Signature of a detector check
pub type CheckFn = fn(&Snippet<'_>) -> bool;

/// How a detector inspects the snippet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    /// Inspects the parse outcome only
    Static,
    /// Executes the snippet in the sandbox
    Dynamic,
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectorKind::Static => write!(f, "static"),
            DetectorKind::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// A named check that rules resolve to
#[derive(Clone, Copy)]
pub struct Detector {
    /// Condition name rules use to reference this detector
    pub name: &'static str,
    pub kind: DetectorKind,
    pub description: &'static str,
    check: CheckFn,
}

impl Detector {
    pub fn new(
        name: &'static str,
        kind: DetectorKind,
        description: &'static str,
        check: CheckFn,
    ) -> Self {
        Self {
            name,
            kind,
            description,
            check,
        }
    }

    /// Run the check
    pub fn check(&self, snippet: &Snippet<'_>) -> bool {
        (self.check)(snippet)
    }
}

impl fmt::Debug for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Detector")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Closed mapping from condition names to detectors
#[derive(Debug, Clone, Default)]
pub struct DetectorRegistry {
    detectors: Vec<Detector>,
    index: HashMap<&'static str, usize>,
}

impl DetectorRegistry {
    /// Registry with no detectors
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in detector
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        static_checks::register(&mut registry);
        runtime::register(&mut registry);
        registry
    }

    /// Add a detector, replacing any detector with the same name
    pub fn register(&mut self, detector: Detector) {
        match self.index.get(detector.name) {
            Some(&i) => self.detectors[i] = detector,
            None => {
                self.index.insert(detector.name, self.detectors.len());
                self.detectors.push(detector);
            }
        }
    }

    /// Look up a detector by condition name
    pub fn resolve(&self, name: &str) -> Option<&Detector> {
        self.index.get(name).map(|&i| &self.detectors[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Detectors in registration order
    pub fn iter(&self) -> std::slice::Iter<'_, Detector> {
        self.detectors.iter()
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }
}

/// Per-call view of the code under diagnosis
///
/// The snippet is parsed once on construction and the outcome is shared by
/// every static detector. Dynamic detectors obtain executions through
/// [`Snippet::execution`], which either reuses one execution for the whole
/// call or starts a fresh one per detector, depending on the strategy.
pub struct Snippet<'a> {
    code: &'a str,
    parse: Option<ParseOutcome>,
    sandbox: &'a Sandbox,
    strategy: ExecutionStrategy,
    shared: OnceLock<Option<ExecutionOutcome>>,
    executions: AtomicUsize,
}

impl<'a> Snippet<'a> {
    pub fn new(code: &'a str, sandbox: &'a Sandbox, strategy: ExecutionStrategy) -> Self {
        let parse = match syntax::parse(code) {
            Ok(outcome) => {
                log::debug!("parsed snippet: {}", outcome.summary());
                Some(outcome)
            }
            Err(e) => {
                log::error!("parser failure: {}", e);
                None
            }
        };

        Self {
            code,
            parse,
            sandbox,
            strategy,
            shared: OnceLock::new(),
            executions: AtomicUsize::new(0),
        }
    }

    pub fn code(&self) -> &str {
        self.code
    }

    /// Parse outcome, or `None` when the parser itself failed
    pub fn parse_outcome(&self) -> Option<&ParseOutcome> {
        self.parse.as_ref()
    }

    /// Tree of a successful parse
    pub fn tree(&self) -> Option<&SyntaxTree> {
        self.parse.as_ref().and_then(ParseOutcome::tree)
    }

    /// Outcome of executing the snippet, or `None` when the sandbox failed
    pub fn execution(&self) -> Option<ExecutionOutcome> {
        match self.strategy {
            ExecutionStrategy::Shared => self.shared.get_or_init(|| self.execute()).clone(),
            ExecutionStrategy::PerDetector => self.execute(),
        }
    }

    /// Number of sandboxed executions started so far
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::Relaxed)
    }

    fn execute(&self) -> Option<ExecutionOutcome> {
        self.executions.fetch_add(1, Ordering::Relaxed);

        match self.sandbox.execute(self.code) {
            Ok(ExecutionOutcome::TimedOut) => {
                log::warn!(
                    "snippet execution timed out after {} ms",
                    self.sandbox.config().timeout_ms
                );
                Some(ExecutionOutcome::TimedOut)
            }
            Ok(outcome) => Some(outcome),
            Err(e) => {
                log::error!("sandbox failure: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SandboxConfig;
    use crate::sandbox::require_interpreter;

    fn always(_: &Snippet<'_>) -> bool {
        true
    }

    fn never(_: &Snippet<'_>) -> bool {
        false
    }

    #[test]
    fn test_builtin_registry() {
        let registry = DetectorRegistry::builtin();
        assert_eq!(registry.len(), 10);

        for name in [
            "check_syntax",
            "check_indentation",
            "check_eval_usage",
            "check_mutable_default",
            "check_name_error",
            "check_type_error",
            "check_index_error",
            "check_key_error",
            "check_attribute_error",
            "check_zero_division",
        ] {
            assert!(registry.contains(name), "missing {}", name);
        }
        assert!(registry.resolve("check_nothing").is_none());
    }

    #[test]
    fn test_builtin_kinds() {
        let registry = DetectorRegistry::builtin();
        let dynamic = registry
            .iter()
            .filter(|d| d.kind == DetectorKind::Dynamic)
            .count();
        assert_eq!(dynamic, 6);
        assert_eq!(
            registry.resolve("check_syntax").unwrap().kind,
            DetectorKind::Static
        );
    }

    #[test]
    fn test_register_replaces_by_name() {
        let mut registry = DetectorRegistry::new();
        registry.register(Detector::new("a", DetectorKind::Static, "first", never));
        registry.register(Detector::new("b", DetectorKind::Static, "second", never));
        registry.register(Detector::new("a", DetectorKind::Static, "replaced", always));

        assert_eq!(registry.len(), 2);
        let names: Vec<_> = registry.iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(registry.resolve("a").unwrap().description, "replaced");

        let sandbox = Sandbox::new(SandboxConfig::default());
        let snippet = Snippet::new("x = 1", &sandbox, ExecutionStrategy::Shared);
        assert!(registry.resolve("a").unwrap().check(&snippet));
    }

    #[test]
    fn test_snippet_parses_once_up_front() {
        let sandbox = Sandbox::new(SandboxConfig::default());
        let snippet = Snippet::new("def f(:", &sandbox, ExecutionStrategy::Shared);

        assert_eq!(snippet.code(), "def f(:");
        assert!(snippet.parse_outcome().unwrap().is_other_syntax_failure());
        assert!(snippet.tree().is_none());
        assert_eq!(snippet.executions(), 0);
    }

    #[test]
    fn test_sandbox_failure_yields_no_outcome() {
        let sandbox = Sandbox::new(SandboxConfig {
            python: "/nonexistent/pysleuth-python".to_string(),
            ..SandboxConfig::default()
        });
        let snippet = Snippet::new("1/0", &sandbox, ExecutionStrategy::Shared);
        assert_eq!(snippet.execution(), None);
    }

    #[test]
    fn test_shared_strategy_executes_once() {
        let sandbox = Sandbox::new(SandboxConfig::default());
        if !require_interpreter(&sandbox) {
            return;
        }

        let snippet = Snippet::new("1/0", &sandbox, ExecutionStrategy::Shared);
        let first = snippet.execution();
        let second = snippet.execution();
        assert_eq!(first, second);
        assert_eq!(snippet.executions(), 1);
    }

    #[test]
    fn test_per_detector_strategy_executes_every_time() {
        let sandbox = Sandbox::new(SandboxConfig::default());
        if !require_interpreter(&sandbox) {
            return;
        }

        let snippet = Snippet::new("x = 1", &sandbox, ExecutionStrategy::PerDetector);
        snippet.execution();
        snippet.execution();
        snippet.execution();
        assert_eq!(snippet.executions(), 3);
    }
}
