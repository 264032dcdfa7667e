//! Diagnostic engine
//!
//! The engine folds a snippet over the rule catalog: each rule's condition
//! is resolved against the detector registry, the detector is run, and every
//! match becomes a diagnosis. Output always follows catalog order, whether
//! rules are evaluated sequentially or on the thread pool.

use crate::config::Config;
use crate::detectors::{DetectorRegistry, Snippet};
use crate::diagnostic::Diagnosis;
use crate::rule::{Rule, RuleCatalog};
use crate::sandbox::Sandbox;
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

/// Timing of one rule evaluation
#[derive(Debug, Clone)]
pub struct RuleTiming {
    /// Rule ID (`N/A` when the rule has none)
    pub rule_id: String,
    /// Condition the rule resolved to
    pub condition: String,
    /// Time spent in the detector
    pub elapsed: Duration,
    /// Whether the detector matched
    pub matched: bool,
}

/// Result of diagnosing one snippet
#[derive(Debug, Default)]
pub struct DiagnosisReport {
    /// Diagnoses in catalog order
    pub diagnoses: Vec<Diagnosis>,

    /// Rules whose detector ran
    pub rules_evaluated: usize,

    /// Condition names that did not resolve, in catalog order
    pub unresolved: Vec<String>,

    /// Conditions whose detector panicked
    pub detector_faults: Vec<String>,

    /// Sandboxed executions started
    pub executions: usize,

    /// Processing duration
    pub duration: Duration,

    /// Per-rule timings in catalog order
    pub rule_timings: Vec<RuleTiming>,
}

impl DiagnosisReport {
    pub fn has_diagnoses(&self) -> bool {
        !self.diagnoses.is_empty()
    }

    /// Get exit code (0 = clean, 1 = diagnoses found)
    pub fn exit_code(&self) -> i32 {
        if self.has_diagnoses() {
            1
        } else {
            0
        }
    }

    /// Get rule timings sorted by elapsed time (descending)
    pub fn sorted_timings(&self) -> Vec<&RuleTiming> {
        let mut timings: Vec<_> = self.rule_timings.iter().collect();
        timings.sort_by(|a, b| b.elapsed.cmp(&a.elapsed));
        timings
    }

    /// Format timing statistics as a string
    pub fn format_timings(&self) -> String {
        let timings = self.sorted_timings();

        if timings.is_empty() {
            return "No timing data available".to_string();
        }

        let mut output = String::new();
        output.push_str("Rule Timing Statistics:\n");
        output.push_str(&format!(
            "{:<10} {:<28} {:>12} {:>8}\n",
            "Rule ID", "Condition", "Time", "Matched"
        ));
        output.push_str(&"-".repeat(61));
        output.push('\n');

        for timing in timings {
            let ms = timing.elapsed.as_secs_f64() * 1000.0;
            output.push_str(&format!(
                "{:<10} {:<28} {:>10.2}ms {:>8}\n",
                timing.rule_id,
                timing.condition,
                ms,
                if timing.matched { "yes" } else { "no" }
            ));
        }

        output
    }
}

/// What happened to a single rule
enum Evaluation {
    Unresolved,
    Faulted(Duration),
    Checked { matched: bool, elapsed: Duration },
}

/// The diagnostic engine
pub struct Engine {
    config: Config,
    catalog: RuleCatalog,
    registry: DetectorRegistry,
    sandbox: Sandbox,
    pool: Option<rayon::ThreadPool>,
}

impl Engine {
    /// Create an engine over a catalog with the built-in detectors
    pub fn new(config: Config, catalog: RuleCatalog) -> Self {
        Self::with_registry(config, catalog, DetectorRegistry::builtin())
    }

    /// Create an engine from configuration
    ///
    /// A configured catalog that cannot be loaded leaves the engine with no
    /// rules; without a configured catalog the built-in one is used.
    pub fn from_config(config: &Config) -> Self {
        let catalog = match &config.catalog {
            Some(path) => RuleCatalog::load_or_empty(path),
            None => RuleCatalog::builtin(),
        };
        Self::new(config.clone(), catalog)
    }

    /// Create an engine with a custom detector registry
    pub fn with_registry(config: Config, catalog: RuleCatalog, registry: DetectorRegistry) -> Self {
        let pool = if config.engine.parallel {
            build_pool(config.engine.jobs)
        } else {
            None
        };

        Self {
            sandbox: Sandbox::new(config.sandbox.clone()),
            config,
            catalog,
            registry,
            pool,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    pub fn registry(&self) -> &DetectorRegistry {
        &self.registry
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// Diagnose a snippet
    pub fn diagnose(&self, code: &str) -> Vec<Diagnosis> {
        self.diagnose_with_report(code).diagnoses
    }

    /// Diagnose a snippet and keep evaluation details
    pub fn diagnose_with_report(&self, code: &str) -> DiagnosisReport {
        let start = Instant::now();
        let snippet = Snippet::new(code, &self.sandbox, self.config.sandbox.strategy);
        let rules = self.catalog.rules();

        let evaluations: Vec<Evaluation> = match &self.pool {
            Some(pool) => pool.install(|| {
                rules
                    .par_iter()
                    .map(|rule| self.evaluate_rule(rule, &snippet))
                    .collect()
            }),
            None => rules
                .iter()
                .map(|rule| self.evaluate_rule(rule, &snippet))
                .collect(),
        };

        let mut report = DiagnosisReport::default();
        for (rule, evaluation) in rules.iter().zip(evaluations) {
            match evaluation {
                Evaluation::Unresolved => {
                    log::warn!(
                        "rule {} references unknown condition '{}'; skipped",
                        rule.error_id(),
                        rule.condition
                    );
                    report.unresolved.push(rule.condition.clone());
                }
                Evaluation::Faulted(elapsed) => {
                    report.rules_evaluated += 1;
                    report.detector_faults.push(rule.condition.clone());
                    report.rule_timings.push(timing(rule, elapsed, false));
                }
                Evaluation::Checked { matched, elapsed } => {
                    report.rules_evaluated += 1;
                    report.rule_timings.push(timing(rule, elapsed, matched));
                    if matched {
                        report.diagnoses.push(Diagnosis::from_rule(rule));
                    }
                }
            }
        }

        report.executions = snippet.executions();
        report.duration = start.elapsed();
        log::debug!(
            "{} rules evaluated, {} diagnoses, {} executions in {:?}",
            report.rules_evaluated,
            report.diagnoses.len(),
            report.executions,
            report.duration
        );
        report
    }

    /// Run one rule's detector, containing any panic
    fn evaluate_rule(&self, rule: &Rule, snippet: &Snippet<'_>) -> Evaluation {
        let Some(detector) = self.registry.resolve(&rule.condition) else {
            return Evaluation::Unresolved;
        };

        let start = Instant::now();
        let result = panic::catch_unwind(AssertUnwindSafe(|| detector.check(snippet)));
        let elapsed = start.elapsed();

        match result {
            Ok(matched) => Evaluation::Checked { matched, elapsed },
            Err(payload) => {
                log::error!(
                    "detector '{}' failed on rule {}: {}",
                    detector.name,
                    rule.error_id(),
                    panic_message(payload.as_ref())
                );
                Evaluation::Faulted(elapsed)
            }
        }
    }
}

fn timing(rule: &Rule, elapsed: Duration, matched: bool) -> RuleTiming {
    RuleTiming {
        rule_id: rule.error_id().to_string(),
        condition: rule.condition.clone(),
        elapsed,
        matched,
    }
}

fn build_pool(jobs: usize) -> Option<rayon::ThreadPool> {
    let threads = if jobs > 0 { jobs } else { num_cpus::get() };

    match rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("pysleuth-rule-{}", i))
        .build()
    {
        Ok(pool) => Some(pool),
        Err(e) => {
            log::warn!("failed to start thread pool ({}); evaluating rules sequentially", e);
            None
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutionStrategy;
    use crate::detectors::{Detector, DetectorKind};
    use crate::sandbox::require_interpreter;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn always(_: &Snippet<'_>) -> bool {
        true
    }

    fn never(_: &Snippet<'_>) -> bool {
        false
    }

    fn explode(_: &Snippet<'_>) -> bool {
        panic!("detector bug")
    }

    fn test_registry() -> DetectorRegistry {
        let mut registry = DetectorRegistry::new();
        // Registration order differs from catalog order on purpose
        registry.register(Detector::new("second", DetectorKind::Static, "", always));
        registry.register(Detector::new("first", DetectorKind::Static, "", always));
        registry.register(Detector::new("never", DetectorKind::Static, "", never));
        registry.register(Detector::new("explode", DetectorKind::Static, "", explode));
        registry
    }

    fn rule(id: &str, condition: &str) -> Rule {
        Rule::new(Some(id), id, condition, "message", "explanation")
    }

    fn ids(diagnoses: &[Diagnosis]) -> Vec<&str> {
        diagnoses.iter().map(|d| d.error_id.as_str()).collect()
    }

    fn configs() -> Vec<Config> {
        let parallel = Config::new();
        let mut sequential = Config::new();
        sequential.engine.parallel = false;
        vec![parallel, sequential]
    }

    #[test]
    fn test_catalog_order_is_output_order() {
        let catalog = RuleCatalog::new(vec![
            rule("R1", "first"),
            rule("R2", "second"),
            rule("R3", "never"),
            rule("R4", "first"),
        ]);

        for config in configs() {
            let engine = Engine::with_registry(config, catalog.clone(), test_registry());
            assert_eq!(ids(&engine.diagnose("x = 1")), vec!["R1", "R2", "R4"]);
        }
    }

    #[test]
    fn test_unresolved_condition_is_skipped() {
        let catalog = RuleCatalog::new(vec![
            rule("R1", "no_such_check"),
            rule("R2", "first"),
        ]);

        for config in configs() {
            let engine = Engine::with_registry(config, catalog.clone(), test_registry());
            let report = engine.diagnose_with_report("x = 1");
            assert_eq!(ids(&report.diagnoses), vec!["R2"]);
            assert_eq!(report.unresolved, vec!["no_such_check".to_string()]);
            assert_eq!(report.rules_evaluated, 1);
        }
    }

    #[test]
    fn test_panicking_detector_does_not_block_others() {
        let catalog = RuleCatalog::new(vec![
            rule("R1", "explode"),
            rule("R2", "first"),
            rule("R3", "explode"),
            rule("R4", "second"),
        ]);

        for config in configs() {
            let engine = Engine::with_registry(config, catalog.clone(), test_registry());
            let report = engine.diagnose_with_report("x = 1");
            assert_eq!(ids(&report.diagnoses), vec!["R2", "R4"]);
            assert_eq!(
                report.detector_faults,
                vec!["explode".to_string(), "explode".to_string()]
            );
        }
    }

    #[test]
    fn test_duplicates_and_missing_ids_are_kept() {
        let catalog = RuleCatalog::new(vec![
            Rule::new(None, "anon", "first", "m", "e"),
            rule("R1", "first"),
            rule("R1", "first"),
        ]);
        let engine = Engine::with_registry(Config::new(), catalog, test_registry());
        assert_eq!(ids(&engine.diagnose("")), vec!["N/A", "R1", "R1"]);
    }

    #[test]
    fn test_empty_catalog() {
        let engine = Engine::new(Config::new(), RuleCatalog::empty());
        let report = engine.diagnose_with_report("1/0");
        assert!(report.diagnoses.is_empty());
        assert_eq!(report.executions, 0);
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_from_config_fails_open_on_missing_catalog() {
        let mut config = Config::new();
        config.catalog = Some(PathBuf::from("/nonexistent/pysleuth/rules.json"));

        let engine = Engine::from_config(&config);
        assert!(engine.catalog().is_empty());
        assert!(engine.diagnose("def f(:").is_empty());
    }

    #[test]
    fn test_from_config_uses_builtin_catalog() {
        let engine = Engine::from_config(&Config::new());
        assert_eq!(engine.catalog().len(), 10);
        assert_eq!(engine.registry().len(), 10);
    }

    #[test]
    fn test_builtin_static_rules() {
        let engine = Engine::from_config(&Config::new());

        assert_eq!(ids(&engine.diagnose("def f(:")), vec!["E001"]);
        assert_eq!(ids(&engine.diagnose("x = 1\n    y = 2")), vec!["E002"]);
        assert_eq!(ids(&engine.diagnose("def f(x=[]):\n    return x\n")), vec!["E010"]);
    }

    #[test]
    fn test_code_that_does_not_compile_is_a_syntax_fault() {
        let engine = Engine::from_config(&Config::new());

        for code in ["def f(x=[], y): pass", "f(x=1, 2)", "del f()", "x = 0777", "a, b += 1"] {
            assert_eq!(ids(&engine.diagnose(code)), vec!["E001"], "code: {}", code);
        }
    }

    #[test]
    fn test_indentation_failure_hides_mutable_default() {
        let engine = Engine::from_config(&Config::new());
        assert_eq!(ids(&engine.diagnose("def f(x=[]):\nreturn x")), vec!["E002"]);
    }

    #[test]
    fn test_empty_snippet_has_no_diagnoses() {
        let engine = Engine::from_config(&Config::new());
        assert!(engine.diagnose("").is_empty());
        assert!(engine.diagnose("  \n\t\n").is_empty());
    }

    #[test]
    fn test_static_and_dynamic_rules_combine() {
        let engine = Engine::from_config(&Config::new());
        if !require_interpreter(engine.sandbox()) {
            return;
        }

        assert_eq!(ids(&engine.diagnose("eval(undefined_name)")), vec!["E003", "E009"]);
        assert_eq!(
            ids(&engine.diagnose("def f(x=[]):\n    return x[1]\nf()")),
            vec!["E005", "E010"]
        );
    }

    #[test]
    fn test_division_by_zero_only() {
        let engine = Engine::from_config(&Config::new());
        if !require_interpreter(engine.sandbox()) {
            return;
        }

        assert_eq!(ids(&engine.diagnose("1/0")), vec!["E008"]);
    }

    #[test]
    fn test_repeated_diagnosis_is_identical() {
        let engine = Engine::from_config(&Config::new());
        let code = "d = {}\nprint(d['k'])";

        let first = engine.diagnose(code);
        let second = engine.diagnose(code);
        assert_eq!(first, second);
    }

    #[test]
    fn test_execution_strategies() {
        let mut config = Config::new();
        let shared = Engine::from_config(&config);
        if !require_interpreter(shared.sandbox()) {
            return;
        }

        let report = shared.diagnose_with_report("1/0");
        assert_eq!(report.executions, 1);

        config.sandbox.strategy = ExecutionStrategy::PerDetector;
        let per_detector = Engine::from_config(&config);
        let isolated = per_detector.diagnose_with_report("1/0");
        assert_eq!(isolated.executions, 6);
        assert_eq!(isolated.diagnoses, report.diagnoses);
    }

    #[test]
    fn test_static_only_catalog_never_executes() {
        let catalog = RuleCatalog::new(vec![
            rule("E001", "check_syntax"),
            rule("E009", "check_eval_usage"),
        ]);
        let engine = Engine::new(Config::new(), catalog);
        let report = engine.diagnose_with_report("eval('1')");
        assert_eq!(ids(&report.diagnoses), vec!["E009"]);
        assert_eq!(report.executions, 0);
    }

    #[test]
    fn test_report_timings() {
        let catalog = RuleCatalog::new(vec![rule("R1", "first"), rule("R2", "never")]);
        let engine = Engine::with_registry(Config::new(), catalog, test_registry());
        let report = engine.diagnose_with_report("x = 1");

        assert_eq!(report.rule_timings.len(), 2);
        assert!(report.rule_timings[0].matched);
        assert!(!report.rule_timings[1].matched);
        assert_eq!(report.exit_code(), 1);

        let table = report.format_timings();
        assert!(table.contains("Rule Timing Statistics"));
        assert!(table.contains("R2"));
        assert_eq!(
            DiagnosisReport::default().format_timings(),
            "No timing data available"
        );
    }
}
