//! Command-line interface for the miner dashboard.
//!
//! Talks to a running `miner-dashboardd` over its HTTP API and prints the
//! JSON replies.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;

use miner_dashboard::api_client::{rpc_envelope, ApiClient};
use miner_dashboard::tracing;

#[derive(Debug, Parser)]
#[command(name = "miner-dashboard-cli", version, about = "Query and control a miner dashboard")]
struct Cli {
    /// Dashboard base URL
    #[arg(long, env = "DASHBOARD_URL", default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Server health
    Health,
    /// Current mining statistics
    Stats,
    /// Validated blocks
    Blocks,
    /// Whether the miner process is running
    Status,
    /// Start the miner
    Start,
    /// Stop the miner
    Stop,
    /// Dashboard process and request metrics
    Metrics,
    /// Send a JSON-RPC call to the node through the dashboard
    Rpc {
        /// RPC method name, e.g. quai_blockNumber
        method: String,
        /// Parameters as a JSON array
        #[arg(default_value = "[]")]
        params: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing::init_cli();

    let cli = Cli::parse();
    let client = ApiClient::new(&cli.url)?;

    match cli.command {
        Command::Health => print(&client.health().await?),
        Command::Stats => print(&client.stats().await?),
        Command::Blocks => print(&client.validated_blocks().await?),
        Command::Status => print(&client.miner_status().await?),
        Command::Start => print(&client.start_miner().await?),
        Command::Stop => print(&client.stop_miner().await?),
        Command::Metrics => print(&client.metrics().await?),
        Command::Rpc { method, params } => {
            let params: Value = serde_json::from_str(&params)
                .with_context(|| format!("params are not valid JSON: {params}"))?;
            let envelope = rpc_envelope(&method, params);
            print(&client.node_rpc(&envelope).await?)
        }
    }
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
