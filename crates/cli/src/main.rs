//! agentflow CLI — the main entry point.
//!
//! Commands:
//! - `run`      — Run a domain's workflow for one request
//! - `route`    — Show which strategy and agents a request would use (no LLM calls)
//! - `catalog`  — List configured agents and domains
//! - `config`   — Show configuration, or write starter files with `--init`

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "agentflow",
    about = "agentflow — multi-agent workflow orchestration",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    /// Catalog file (overrides config and AGENTFLOW_CATALOG)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a domain's workflow
    Run {
        /// Domain id from the catalog
        #[arg(short, long)]
        domain: String,

        /// The request; read from stdin when omitted
        #[arg(short, long)]
        message: Option<String>,

        /// Print every recorded step after the final response
        #[arg(long)]
        steps: bool,
    },

    /// Show how a request would be routed without calling an LLM
    Route {
        #[arg(short, long)]
        domain: String,

        #[arg(short, long)]
        message: String,
    },

    /// List agents and domains
    Catalog,

    /// Show configuration
    Config {
        /// Write default config.toml and catalog.toml if missing
        #[arg(long, conflicts_with = "check")]
        init: bool,

        /// Check that every configured provider is reachable
        #[arg(long)]
        check: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; logs go to stderr so stdout carries only the reply
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if cli.json {
        builder.json().init();
    } else {
        builder.init();
    }

    let catalog = cli.catalog;
    match cli.command {
        Commands::Run {
            domain,
            message,
            steps,
        } => commands::run::run(&domain, message, catalog, steps).await?,
        Commands::Route { domain, message } => commands::route::run(&domain, &message, catalog)?,
        Commands::Catalog => commands::catalog::run(catalog)?,
        Commands::Config { init, check } => {
            if init {
                commands::config_cmd::init()?
            } else if check {
                commands::config_cmd::check().await?
            } else {
                commands::config_cmd::show()?
            }
        }
    }

    Ok(())
}
