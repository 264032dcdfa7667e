//! Configuration system for the diagnostic engine
//!
//! Reads configuration from:
//! - `.pysleuth.yaml` / `.pysleuth.json` (project-level)
//! - `~/.pysleuth.yaml` (user-level)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration error (also raised when a rule catalog cannot be loaded)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Evaluate rules in parallel
    pub parallel: bool,

    /// Number of worker threads (0 = one per CPU)
    pub jobs: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            jobs: 0,
        }
    }
}

/// How dynamic detectors obtain an execution of the snippet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionStrategy {
    /// Run the snippet once per diagnosis and share the outcome
    #[default]
    Shared,
    /// Run the snippet once for every dynamic detector
    PerDetector,
}

impl std::str::FromStr for ExecutionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "shared" | "once" => Ok(ExecutionStrategy::Shared),
            "per-detector" | "per_detector" | "isolated" => Ok(ExecutionStrategy::PerDetector),
            _ => Err(format!("Unknown execution strategy: {}", s)),
        }
    }
}

impl std::fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStrategy::Shared => write!(f, "shared"),
            ExecutionStrategy::PerDetector => write!(f, "per-detector"),
        }
    }
}

/// Sandboxed execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Python interpreter used to run snippets
    pub python: String,

    /// Wall-clock deadline per execution, in milliseconds
    pub timeout_ms: u64,

    /// Address space ceiling per execution, in MiB (0 = unlimited)
    pub memory_limit_mb: u64,

    /// CPU time ceiling per execution, in seconds (0 = unlimited)
    pub cpu_seconds: u64,

    /// Execution strategy for dynamic detectors
    pub strategy: ExecutionStrategy,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            timeout_ms: 5000,
            memory_limit_mb: 512,
            cpu_seconds: 5,
            strategy: ExecutionStrategy::Shared,
        }
    }
}

impl SandboxConfig {
    /// Deadline as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Address space ceiling in bytes (0 = unlimited)
    pub fn memory_limit_bytes(&self) -> u64 {
        self.memory_limit_mb.saturating_mul(1024 * 1024)
    }
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format
    pub format: OutputFormat,

    /// Color mode
    pub color: ColorMode,

    /// Show per-rule timing statistics
    pub timing: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            color: ColorMode::Auto,
            timing: false,
        }
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Color mode options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Rule catalog file (None = built-in catalog)
    pub catalog: Option<PathBuf>,

    /// Engine settings
    pub engine: EngineConfig,

    /// Sandbox settings
    pub sandbox: SandboxConfig,

    /// Output settings
    pub output: OutputConfig,
}

impl Config {
    /// Create default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let mut config: Self = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "Unknown config file format: {}",
                    ext
                )))
            }
        };

        // Catalog paths are relative to the config file
        if let Some(catalog) = &config.catalog {
            if catalog.is_relative() {
                let base_dir = path.parent().unwrap_or(Path::new("."));
                config.catalog = Some(base_dir.join(catalog));
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the sandbox cannot honor
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sandbox.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "sandbox.timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.sandbox.python.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "sandbox.python must name an interpreter".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration from default locations
    pub fn load_default() -> Result<Self, ConfigError> {
        let config_names = [
            ".pysleuth.yaml",
            ".pysleuth.yml",
            ".pysleuth.json",
            "pysleuth.yaml",
            "pysleuth.json",
        ];

        // Check current directory
        for name in &config_names {
            let path = PathBuf::from(name);
            if path.exists() {
                return Self::load(&path);
            }
        }

        // Check home directory
        if let Some(home) = dirs::home_dir() {
            for name in &config_names {
                let path = home.join(name);
                if path.exists() {
                    return Self::load(&path);
                }
            }
        }

        Ok(Self::default())
    }

    /// Merge CLI arguments into configuration
    pub fn merge_cli(
        &mut self,
        catalog: Option<PathBuf>,
        format: Option<OutputFormat>,
        jobs: Option<usize>,
        sequential: bool,
        timeout_ms: Option<u64>,
        strategy: Option<ExecutionStrategy>,
    ) {
        if let Some(c) = catalog {
            self.catalog = Some(c);
        }
        if let Some(f) = format {
            self.output.format = f;
        }
        if let Some(j) = jobs {
            self.engine.jobs = j;
        }
        if sequential {
            self.engine.parallel = false;
        }
        if let Some(t) = timeout_ms {
            self.sandbox.timeout_ms = t;
        }
        if let Some(s) = strategy {
            self.sandbox.strategy = s;
        }
    }
}
