use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use fanout::config::ServiceConfig;

mod cmd;

#[derive(Parser)]
#[command(name = "fanout")]
#[command(version, about = "Fan out bulk code-patch runs and stream their output")]
pub struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true, env = "FANOUT_LOG_JSON")]
    pub log_json: bool,

    /// Directory containing one sub-directory per patch [env: FANOUT_PATCHES_DIR]
    #[arg(long, global = true)]
    pub patches_dir: Option<PathBuf>,

    /// External tool to run [env: FANOUT_TOOL]
    #[arg(long, global = true)]
    pub tool: Option<String>,

    /// Output lines buffered per run [env: FANOUT_OUTPUT_CAPACITY]
    #[arg(long, global = true)]
    pub output_capacity: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the HTTP API
    Serve {
        /// Port to serve on
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Development mode (permissive CORS)
        #[arg(long)]
        dev: bool,
    },
    /// List available patches
    Patches,
    /// Run a patch against an organization and stream its output
    Run {
        /// Patch name
        #[arg(long)]
        patch: String,

        /// GitHub organization
        #[arg(long)]
        org: String,

        /// GitHub access token
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: String,

        /// Pass --dry-run and debug logging to the tool
        #[arg(long)]
        dry_run: bool,

        /// Milliseconds between output polls
        #[arg(long, default_value = "250")]
        interval_ms: u64,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose {
        "fanout=debug,tower_http=debug"
    } else {
        "fanout=info,tower_http=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let service_config = ServiceConfig::from_env()
        .context("Failed to read configuration from environment")?
        .with_overrides(cli.patches_dir.clone(), cli.tool.clone(), cli.output_capacity)?;

    match &cli.command {
        Commands::Serve { port, host, dev } => {
            cmd::cmd_serve(&service_config, host, *port, *dev).await?;
        }
        Commands::Patches => cmd::cmd_patches(&service_config)?,
        Commands::Run {
            patch,
            org,
            token,
            dry_run,
            interval_ms,
        } => {
            cmd::cmd_run(&service_config, patch, org, token, *dry_run, *interval_ms).await?;
        }
    }

    Ok(())
}
