//! Sandboxed snippet execution
//!
//! Every execution runs in a fresh interpreter process driven by a small
//! embedded harness. The harness silences the snippet's standard streams,
//! applies resource limits, runs the code in an empty namespace and reports
//! a one-line verdict on a private copy of its original stdout. Each run
//! passes a fresh nonce ahead of the snippet on stdin and accepts only the
//! verdict line carrying it. The engine side enforces a wall-clock deadline
//! and kills the process when it expires.

use crate::config::SandboxConfig;
use serde::Serialize;
use std::fmt;
use std::io::{Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Interpreter-side harness
const HARNESS: &str = include_str!("harness.py");

/// Prefix of the verdict line written by the harness
const VERDICT_MARKER: &str = "@@pysleuth-verdict@@";

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Environment variables passed through to the interpreter
const PASSTHROUGH_ENV: &[&str] = &["PATH", "SYSTEMROOT"];

/// Sandbox failure (an engine-side problem, not a fault in the snippet)
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to start interpreter '{interpreter}': {source}")]
    Spawn {
        interpreter: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("interpreter {0} pipe was not captured")]
    MissingPipe(&'static str),

    #[error("{0} pipe worker panicked")]
    Worker(&'static str),
}

/// Classification of a runtime exception
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    Name,
    Type,
    Index,
    Key,
    Attribute,
    DivisionByZero,
    Other,
}

impl FaultKind {
    /// The six kinds detectors can target
    pub const NAMED: [FaultKind; 6] = [
        FaultKind::Name,
        FaultKind::Type,
        FaultKind::Index,
        FaultKind::Key,
        FaultKind::Attribute,
        FaultKind::DivisionByZero,
    ];

    /// Tag used by the harness
    pub fn tag(&self) -> &'static str {
        match self {
            FaultKind::Name => "name",
            FaultKind::Type => "type",
            FaultKind::Index => "index",
            FaultKind::Key => "key",
            FaultKind::Attribute => "attribute",
            FaultKind::DivisionByZero => "zero_division",
            FaultKind::Other => "other",
        }
    }

    /// Parse a harness tag; unknown tags are `Other`
    pub fn from_tag(tag: &str) -> Self {
        Self::NAMED
            .into_iter()
            .find(|k| k.tag() == tag)
            .unwrap_or(FaultKind::Other)
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FaultKind::Name => "NameFault",
            FaultKind::Type => "TypeFault",
            FaultKind::Index => "IndexFault",
            FaultKind::Key => "KeyFault",
            FaultKind::Attribute => "AttributeFault",
            FaultKind::DivisionByZero => "DivisionByZeroFault",
            FaultKind::Other => "OtherFault",
        };
        write!(f, "{}", name)
    }
}

/// Result of running a snippet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The snippet ran to the end
    CompletedNormally,
    /// The snippet raised an exception
    RaisedFault(FaultKind),
    /// The snippet ended without a classifiable exception
    /// (`SystemExit`, `KeyboardInterrupt`, hard exit, killed by a limit)
    Suppressed { reason: String },
    /// The deadline expired and the process was killed
    TimedOut,
}

impl ExecutionOutcome {
    /// Fault kind, if the snippet raised one
    pub fn fault(&self) -> Option<FaultKind> {
        match self {
            ExecutionOutcome::RaisedFault(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Whether the snippet raised exactly this kind of fault
    pub fn raised(&self, kind: FaultKind) -> bool {
        self.fault() == Some(kind)
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionOutcome::CompletedNormally => write!(f, "completed normally"),
            ExecutionOutcome::RaisedFault(kind) => write!(f, "raised {}", kind),
            ExecutionOutcome::Suppressed { reason } => write!(f, "suppressed ({})", reason),
            ExecutionOutcome::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Runs snippets in isolated interpreter processes
#[derive(Debug, Clone)]
pub struct Sandbox {
    config: SandboxConfig,
}

impl Sandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Whether the configured interpreter can be started
    pub fn is_available(&self) -> bool {
        Command::new(&self.config.python)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Execute a snippet once in a fresh process
    pub fn execute(&self, code: &str) -> Result<ExecutionOutcome, SandboxError> {
        let workdir = tempfile::Builder::new().prefix("pysleuth-").tempdir()?;

        let mut command = Command::new(&self.config.python);
        command
            .arg("-I")
            .arg("-c")
            .arg(HARNESS)
            .arg(self.config.memory_limit_bytes().to_string())
            .arg(self.config.cpu_seconds.to_string())
            .current_dir(workdir.path())
            .env_clear()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        for key in PASSTHROUGH_ENV {
            if let Some(value) = std::env::var_os(key) {
                command.env(key, value);
            }
        }

        let started = Instant::now();
        let mut child = command.spawn().map_err(|source| SandboxError::Spawn {
            interpreter: self.config.python.clone(),
            source,
        })?;

        let mut stdin = child.stdin.take().ok_or(SandboxError::MissingPipe("stdin"))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or(SandboxError::MissingPipe("stdout"))?;

        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let mut payload = Vec::with_capacity(nonce.len() + 1 + code.len());
        payload.extend_from_slice(nonce.as_bytes());
        payload.push(b'\n');
        payload.extend_from_slice(code.as_bytes());
        let writer = thread::spawn(move || {
            // The harness may die before reading everything
            let _ = stdin.write_all(&payload);
        });
        let reader = thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stdout.read_to_end(&mut buf);
            buf
        });

        let deadline = started + self.config.timeout();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                log::debug!(
                    "snippet killed after {:?} (deadline {:?})",
                    started.elapsed(),
                    self.config.timeout()
                );
                // Pipe workers finish on their own once the process is gone
                return Ok(ExecutionOutcome::TimedOut);
            }
            thread::sleep(POLL_INTERVAL);
        };

        writer.join().map_err(|_| SandboxError::Worker("stdin"))?;
        let output = reader.join().map_err(|_| SandboxError::Worker("stdout"))?;
        let output = String::from_utf8_lossy(&output);

        let outcome =
            parse_verdict(&output, &nonce).unwrap_or_else(|| ExecutionOutcome::Suppressed {
                reason: describe_exit(status),
            });
        log::debug!("snippet {} in {:?}", outcome, started.elapsed());

        Ok(outcome)
    }
}

fn describe_exit(status: ExitStatus) -> String {
    format!("no verdict, {}", status)
}

/// Read the last verdict line written by the harness for this run
fn parse_verdict(output: &str, nonce: &str) -> Option<ExecutionOutcome> {
    let verdict = output.lines().rev().find_map(|line| {
        line.strip_prefix(VERDICT_MARKER)?
            .strip_prefix(' ')?
            .strip_prefix(nonce)?
            .strip_prefix(' ')
    })?;
    let mut parts = verdict.split_whitespace();

    match parts.next()? {
        "completed" => Some(ExecutionOutcome::CompletedNormally),
        "fault" => Some(ExecutionOutcome::RaisedFault(FaultKind::from_tag(
            parts.next()?,
        ))),
        "suppressed" => Some(ExecutionOutcome::Suppressed {
            reason: parts.next().unwrap_or("BaseException").to_string(),
        }),
        _ => None,
    }
}

/// Opt-out for interpreter-backed tests on hosts without an interpreter
#[cfg(test)]
pub(crate) const SKIP_INTERPRETER_TESTS: &str = "PYSLEUTH_SKIP_INTERPRETER_TESTS";

/// Gate for tests that execute snippets
///
/// Panics when the interpreter is missing unless the opt-out variable is
/// set, so a host without one cannot silently pass the runtime tests.
#[cfg(test)]
pub(crate) fn require_interpreter(sandbox: &Sandbox) -> bool {
    interpreter_gate(sandbox, std::env::var_os(SKIP_INTERPRETER_TESTS).is_some())
}

#[cfg(test)]
fn interpreter_gate(sandbox: &Sandbox, skip: bool) -> bool {
    if sandbox.is_available() {
        return true;
    }
    if skip {
        eprintln!(
            "'{}' not available, skipping ({} is set)",
            sandbox.config().python,
            SKIP_INTERPRETER_TESTS
        );
        return false;
    }
    panic!(
        "interpreter '{}' is required for this test; install it or set {}=1 to skip",
        sandbox.config().python,
        SKIP_INTERPRETER_TESTS
    );
}
