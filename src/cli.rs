//! Command-line interface for the Flux future runtime
//!
//! Runs the built-in scenarios against a configurable event loop.

use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;

use crate::config::RuntimeConfig;
use crate::error::{FluxError, FluxResult};
use crate::scenarios::{self, Scenario, ScenarioReport};

/// Flux future runtime
#[derive(Parser)]
#[command(name = "flux-future")]
#[command(about = "Run behavioural scenarios against the Flux future runtime")]
#[command(version = "0.1.0")]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Runtime configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// List the built-in scenarios
    List,

    /// Run scenarios (all of them when no name is given)
    Run {
        /// Scenario names
        names: Vec<String>,

        /// Nesting depth for the deep-thenable scenario
        #[arg(long)]
        depth: Option<usize>,

        /// Task budget per scenario event loop
        #[arg(long)]
        budget: Option<usize>,
    },
}

#[derive(Clone)]
pub struct CliContext {
    pub verbose: bool,
    pub quiet: bool,
    pub start_time: Instant,
}

impl CliContext {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            verbose,
            quiet,
            start_time: Instant::now(),
        }
    }

    /// Print info message if not quiet
    pub fn info(&self, message: &str) {
        if !self.quiet {
            println!("{}", message);
        }
    }

    /// Print verbose message if verbose mode enabled
    pub fn verbose(&self, message: &str) {
        if self.verbose && !self.quiet {
            println!("{} {}", "verbose:".dimmed(), message.dimmed());
        }
    }

    /// Print warning message
    pub fn warn(&self, message: &str) {
        if !self.quiet {
            eprintln!("{} {}", "warning:".yellow().bold(), message);
        }
    }

    /// Print error message
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "error:".red().bold(), message);
    }

    /// Print success message
    pub fn success(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", "success:".green().bold(), message);
        }
    }

    /// Create a progress bar
    pub fn progress_bar(&self, len: u64, message: &str) -> Option<ProgressBar> {
        if self.quiet || !self.verbose {
            return None;
        }

        let pb = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(message.to_string());
        Some(pb)
    }

    /// Get elapsed time since CLI started
    pub fn elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }
}

/// Summary of a `run` command
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub reports: Vec<ScenarioReport>,
}

impl RunSummary {
    pub fn passed(&self) -> usize {
        self.reports.iter().filter(|r| r.passed).count()
    }

    pub fn failed(&self) -> usize {
        self.reports.len() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }
}

/// Executes CLI commands against a loaded configuration
pub struct ScenarioDriver {
    context: CliContext,
    config: RuntimeConfig,
}

impl ScenarioDriver {
    pub fn new(context: CliContext, config: RuntimeConfig) -> Self {
        Self { context, config }
    }

    /// Load the configuration named on the command line, or the defaults
    pub fn load_config(path: Option<&PathBuf>) -> FluxResult<RuntimeConfig> {
        match path {
            Some(path) => RuntimeConfig::from_file(path),
            None => Ok(RuntimeConfig::default()),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Print the scenario catalogue
    pub fn list(&self) -> FluxResult<()> {
        for scenario in scenarios::all() {
            self.context.info(&format!(
                "{:<24} {}",
                scenario.name.bold(),
                scenario.description
            ));
        }
        Ok(())
    }

    /// Execute the run command
    pub fn run(&self, command: &Commands) -> FluxResult<RunSummary> {
        let Commands::Run { names, depth, budget } = command else {
            return Err(FluxError::Cli("expected the run command".to_string()));
        };

        let mut config = self.config.clone();
        if let Some(depth) = depth {
            if *depth == 0 {
                return Err(FluxError::Cli("--depth must be positive".to_string()));
            }
            config.scenarios.depth = *depth;
        }
        if let Some(budget) = budget {
            if *budget == 0 {
                return Err(FluxError::Cli("--budget must be positive".to_string()));
            }
            config.event_loop.task_budget = Some(*budget);
        }

        let selected = Self::select(names)?;
        self.context.verbose(&format!("Running {} scenarios", selected.len()));

        let pb = self.context.progress_bar(selected.len() as u64, "scenarios");
        let mut summary = RunSummary::default();
        for scenario in selected {
            tracing::debug!(scenario = scenario.name, "running scenario");
            let report = match scenario.run(&config) {
                Ok(report) => report,
                Err(err @ FluxError::BudgetExhausted { .. }) => {
                    self.context.warn(&format!("{} stopped early: {}", scenario.name, err));
                    return Err(err);
                }
                Err(err) => return Err(err),
            };
            self.report(&report);
            summary.reports.push(report);
            if let Some(pb) = &pb {
                pb.inc(1);
            }
        }
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        if summary.all_passed() {
            self.context.success(&format!(
                "{} scenarios passed in {:.2}s",
                summary.passed(),
                self.context.elapsed().as_secs_f64()
            ));
        } else {
            self.context.error(&format!(
                "{} of {} scenarios failed",
                summary.failed(),
                summary.reports.len()
            ));
        }
        Ok(summary)
    }

    fn select(names: &[String]) -> FluxResult<Vec<&'static Scenario>> {
        if names.is_empty() {
            return Ok(scenarios::all().iter().collect());
        }

        names
            .iter()
            .map(|name| {
                scenarios::find(name)
                    .ok_or_else(|| FluxError::Cli(format!("unknown scenario '{}'", name)))
            })
            .collect()
    }

    fn report(&self, report: &ScenarioReport) {
        if report.passed {
            self.context.info(&format!("{} {} ({})", "ok".green(), report.name, report.detail));
        } else {
            self.context.error(&format!("{} failed: {}", report.name, report.detail));
        }
        self.context.verbose(&report.stats.to_string());
    }
}
