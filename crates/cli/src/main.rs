mod cli;
mod run;

use anyhow::{Context, Result};
use clap::Parser;

use aquaguard_core::config::{load_dotenv, Config};

use crate::cli::{CliArgs, Command};

fn main() -> Result<()> {
    load_dotenv();

    // Logs go to stderr so the report can be piped from stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let config = Config::load(args.config.as_deref()).context("failed to load configuration")?;

    match args.command {
        Command::Run(run_args) => run::execute(config, &run_args),
        Command::Config => {
            let rendered =
                toml::to_string_pretty(&config).context("failed to render configuration")?;
            println!("{rendered}");
            Ok(())
        }
    }
}
