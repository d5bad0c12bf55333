//! Flux future runtime CLI

use anyhow::Context;
use clap::Parser;
use std::process;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use flux_future::cli::{Cli, CliContext, Commands, ScenarioDriver};

fn init_tracing(default_filter: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn run(cli: &Cli, context: &CliContext) -> anyhow::Result<bool> {
    let config = ScenarioDriver::load_config(cli.config.as_ref())
        .with_context(|| format!("failed to load configuration {:?}", cli.config))?;
    init_tracing(&config.logging.filter);

    let driver = ScenarioDriver::new(context.clone(), config);
    match &cli.command {
        Commands::List => {
            driver.list()?;
            Ok(true)
        }
        command @ Commands::Run { .. } => {
            let summary = driver.run(command).context("scenario run failed")?;
            Ok(summary.all_passed())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let context = CliContext::new(cli.verbose, cli.quiet);

    match run(&cli, &context) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            context.error(&format!("{:#}", e));
            process::exit(1);
        }
    }
}
