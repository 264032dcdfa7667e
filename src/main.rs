//! Pysleuth CLI - Python Snippet Diagnostician
//!
//! Diagnoses Python files, glob patterns or stdin against a rule catalog.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use glob::glob;
use pysleuth::config::{ColorMode, Config, ExecutionStrategy, OutputFormat};
use pysleuth::engine::Engine;
use pysleuth::output::{FileReport, JsonFormatter, OutputFormatter, TextFormatter};
use pysleuth::rule::Rule;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Exit code for usage, configuration and I/O errors
const EXIT_ERROR: i32 = 2;

#[derive(Parser)]
#[command(
    name = "pysleuth",
    version,
    about = "Python snippet diagnostician",
    long_about = "Diagnoses Python snippets with static checks and sandboxed execution, \
                  driven by a rule catalog."
)]
struct Cli {
    /// Files or glob patterns to diagnose ('-' reads stdin)
    files: Vec<String>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Rule catalog file (JSON or YAML)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<Format>,

    /// Deadline per sandboxed execution, in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// How runtime checks execute the snippet
    #[arg(long, value_enum)]
    strategy: Option<Strategy>,

    /// Evaluate rules one at a time
    #[arg(long)]
    sequential: bool,

    /// Number of parallel jobs (0 = auto)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Show per-rule timing statistics
    #[arg(long)]
    timing: bool,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the rules in the catalog
    Rules,
    /// List the registered conditions
    Conditions,
    /// Show detailed information about a rule
    Explain {
        /// Rule ID to explain
        rule_id: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum Strategy {
    Shared,
    PerDetector,
}

/// Print the catalog with each rule's resolution
fn list_rules(engine: &Engine) {
    println!("{} ({} rules)", "Rule catalog".bold(), engine.catalog().len());

    for rule in engine.catalog() {
        let resolution = if engine.registry().contains(&rule.condition) {
            rule.condition.normal()
        } else {
            format!("{} (unresolved)", rule.condition).yellow()
        };
        println!("    {} {} -> {}", rule.error_id().cyan(), rule.name, resolution);
    }
}

/// Print the registered detectors
fn list_conditions(engine: &Engine) {
    println!("{}", "Registered conditions".bold());

    for detector in engine.registry().iter() {
        println!("    {} [{}]", detector.name.cyan(), detector.kind);
        println!("      {}", detector.description);
    }
}

/// Print detailed rule explanation
fn explain_rule(rule: &Rule, engine: &Engine) {
    println!("{}", "Rule Details".bold());
    println!();
    println!("  {}: {}", "ID".bold(), rule.error_id().cyan());
    println!("  {}: {}", "Name".bold(), rule.name);

    match engine.registry().resolve(&rule.condition) {
        Some(detector) => println!(
            "  {}: {} ({}, {})",
            "Condition".bold(),
            rule.condition,
            detector.kind,
            detector.description
        ),
        None => println!(
            "  {}: {} {}",
            "Condition".bold(),
            rule.condition,
            "(unresolved, never matches)".yellow()
        ),
    }

    println!();
    println!("  {}", "Message".bold());
    println!("  {}", rule.message);
    println!();
    println!("  {}", "Explanation".bold());
    println!("  {}", rule.explanation);
}

/// Handle the explain command
fn handle_explain(rule_id: &str, engine: &Engine) {
    match engine.catalog().find(rule_id) {
        Some(rule) => explain_rule(rule, engine),
        None => {
            eprintln!("{}: Rule '{}' not found", "error".red().bold(), rule_id);
            eprintln!();
            eprintln!("Use {} to see all available rules", "pysleuth rules".cyan());
            std::process::exit(EXIT_ERROR);
        }
    }
}

/// Expand file arguments and glob patterns
fn expand_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        if pattern == "-" {
            files.push(PathBuf::from("-"));
            continue;
        }

        match glob(pattern) {
            Ok(paths) => {
                let before = files.len();
                for entry in paths.flatten() {
                    if entry.is_file() {
                        files.push(entry);
                    }
                }
                if files.len() == before {
                    // Let the read report a missing literal path
                    files.push(PathBuf::from(pattern));
                }
            }
            Err(e) => {
                eprintln!(
                    "{}: Invalid pattern '{}': {}",
                    "error".red().bold(),
                    pattern,
                    e
                );
                std::process::exit(EXIT_ERROR);
            }
        }
    }

    files
}

/// Read a snippet from a file or stdin
fn read_source(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut code = String::new();
        std::io::stdin()
            .read_to_string(&mut code)
            .context("failed to read stdin")?;
        return Ok(code);
    }

    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn main() {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        Config::load(config_path).unwrap_or_else(|e| {
            eprintln!("{}: Failed to load config: {}", "error".red().bold(), e);
            std::process::exit(EXIT_ERROR);
        })
    } else {
        Config::load_default().unwrap_or_else(|e| {
            log::warn!("ignoring configuration file: {}", e);
            Config::default()
        })
    };

    // Merge CLI arguments
    let format = cli.format.map(|f| match f {
        Format::Text => OutputFormat::Text,
        Format::Json => OutputFormat::Json,
    });
    let strategy = cli.strategy.map(|s| match s {
        Strategy::Shared => ExecutionStrategy::Shared,
        Strategy::PerDetector => ExecutionStrategy::PerDetector,
    });

    config.merge_cli(
        cli.catalog.clone(),
        format,
        cli.jobs,
        cli.sequential,
        cli.timeout_ms,
        strategy,
    );
    if cli.timing {
        config.output.timing = true;
    }
    if cli.no_color {
        config.output.color = ColorMode::Never;
    }
    if let Err(e) = config.validate() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(EXIT_ERROR);
    }

    match config.output.color {
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Auto => {}
    }

    let engine = Engine::from_config(&config);

    // Handle subcommands
    if let Some(cmd) = &cli.command {
        match cmd {
            Commands::Rules => list_rules(&engine),
            Commands::Conditions => list_conditions(&engine),
            Commands::Explain { rule_id } => handle_explain(rule_id, &engine),
        }
        return;
    }

    if cli.files.is_empty() {
        eprintln!(
            "{}: No input given. Pass files, glob patterns or '-' for stdin.",
            "error".red().bold()
        );
        std::process::exit(EXIT_ERROR);
    }

    let inputs = expand_inputs(&cli.files);

    let mut reports = Vec::new();
    let mut had_errors = false;
    for input in &inputs {
        match read_source(input) {
            Ok(code) => {
                let report = engine.diagnose_with_report(&code);
                reports.push(FileReport::new(input.display().to_string(), report));
            }
            Err(e) => {
                eprintln!("{}: {:#}", "error".red().bold(), e);
                had_errors = true;
            }
        }
    }

    let formatter: Box<dyn OutputFormatter> = match config.output.format {
        OutputFormat::Text => {
            let text = TextFormatter::new();
            if matches!(config.output.color, ColorMode::Never) {
                Box::new(text.without_color())
            } else {
                Box::new(text)
            }
        }
        OutputFormat::Json => Box::new(JsonFormatter::new().pretty()),
    };
    print!("{}", formatter.format(&reports));

    if config.output.timing {
        for file in &reports {
            eprintln!("{}", file.source.bold());
            eprintln!("{}", file.report.format_timings());
        }
    }

    let exit_code = if had_errors {
        EXIT_ERROR
    } else {
        reports
            .iter()
            .map(|f| f.report.exit_code())
            .max()
            .unwrap_or(0)
    };
    std::process::exit(exit_code);
}
