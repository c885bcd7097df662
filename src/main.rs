//! # Context Switcher CLI (`ctxsw`)
//!
//! The `ctxsw` binary runs the HTTP API or performs a one-shot
//! aggregation from the command line.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ctxsw serve` | Start the HTTP API server |
//! | `ctxsw context <ISSUE-KEY>` | Aggregate context for one issue and print JSON |
//!
//! ## Examples
//!
//! ```bash
//! # Start the API from a config file
//! ctxsw serve --config ./config/ctxsw.toml
//!
//! # One-shot aggregation (token from ATLASSIAN_TOKEN)
//! ctxsw context ABC-1 --cloud-id 1234-5678
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use context_switcher::aggregate::Aggregator;
use context_switcher::ai::AiService;
use context_switcher::config::load_config;
use context_switcher::fetch::{HttpFetcher, Tenant};
use context_switcher::server::run_server;

/// Context Switcher — concurrent context aggregation for issue-tracker
/// tickets, with optional AI enrichment.
#[derive(Parser)]
#[command(
    name = "ctxsw",
    about = "Concurrent context aggregation for issue-tracker tickets",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ctxsw.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server.
    ///
    /// Serves `/api/context/{issue_key}` and `/api/summarize` on the
    /// configured bind address. Credentials arrive per request via the
    /// `Authorization` and `X-Cloud-Id` headers.
    Serve,

    /// Aggregate context for one issue and print it as JSON.
    ///
    /// Runs the same pipeline the server uses, without the HTTP layer.
    Context {
        /// Issue key, e.g. `ABC-1`.
        issue_key: String,

        /// Atlassian cloud (tenant) id.
        #[arg(long)]
        cloud_id: String,

        /// Bearer token. Defaults to the `ATLASSIAN_TOKEN` environment
        /// variable.
        #[arg(long, short)]
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => run_server(&config).await,
        Commands::Context {
            issue_key,
            cloud_id,
            token,
        } => {
            let token = match token.or_else(|| std::env::var("ATLASSIAN_TOKEN").ok()) {
                Some(token) => token,
                None => anyhow::bail!("No token given: pass --token or set ATLASSIAN_TOKEN"),
            };

            let fetcher = HttpFetcher::new(
                token,
                Duration::from_secs(config.atlassian.timeout_secs),
            )?;
            let tenant = Tenant::new(config.atlassian.base_url.clone(), cloud_id);
            let aggregator = Aggregator::new(Arc::new(fetcher), tenant);

            let context = aggregator.get_issue_context(&issue_key).await?;

            let ai = AiService::from_config(&config.ai).unwrap_or_else(|_| AiService::disabled());
            let context = ai.enrich(context).await;

            println!("{}", serde_json::to_string_pretty(&context)?);
            Ok(())
        }
    }
}
