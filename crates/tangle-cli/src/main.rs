use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tangle_core::{GraphError, Registry, Resolver};
use tracing_subscriber::{EnvFilter, fmt};

mod builtins;
mod config;
mod report;

use config::TangleConfig;
use report::Report;

#[derive(Parser)]
#[command(name = "tangle", about = "Tangle component graph resolver")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered builders and the capabilities they produce
    List,
    /// Resolve a graph from the built-in builders and drive its lifecycle
    Run {
        /// Path to a TOML config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Builder name pattern to instantiate (repeatable)
        #[arg(short, long = "request")]
        requests: Vec<String>,

        /// Exit non-zero if any resolution or lifecycle error was reported
        #[arg(long)]
        strict: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::List => {
            init_logging("info");
            let registry = registry()?;
            for builder in registry.builders() {
                let produces: Vec<_> = builder.produces().iter().collect();
                println!("{:<16} {}", builder.name(), produces.join(", "));
            }
        }
        Commands::Run {
            config,
            requests,
            strict,
            json,
        } => {
            let config = TangleConfig::load(config.as_deref()).context("loading config")?;
            init_logging(&config.log.filter);
            run(config, requests, strict, json)?;
        }
    }
    Ok(())
}

/// Logs go to stderr so reports on stdout stay machine-readable.
fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_env("TANGLE_LOG").unwrap_or_else(|_| EnvFilter::new(default_filter));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn registry() -> Result<Registry> {
    let mut registry = Registry::new();
    builtins::register(&mut registry).context("registering built-in builders")?;
    Ok(registry)
}

fn run(config: TangleConfig, requests: Vec<String>, strict: bool, json: bool) -> Result<()> {
    let registry = registry()?;
    let requests: Vec<String> = config.requests.into_iter().chain(requests).collect();
    let strict = strict || config.strict;

    tracing::info!(requests = ?requests, "Resolving graph");

    let mut errors: Vec<GraphError> = Vec::new();
    let mut graph = Resolver::new(&registry)
        .requests(&requests)
        .on_error(|e| errors.push(e))
        .resolve();

    graph.initialize(|e| errors.push(e));
    graph.deinitialize(|e| errors.push(e));
    let report = Report::new(&graph, &errors);

    if json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.to_text());
    }

    if strict && report.has_errors() {
        anyhow::bail!("{} error(s) reported", report.errors.len());
    }
    Ok(())
}
