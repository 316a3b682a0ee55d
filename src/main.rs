//! rlm-govern - inspect difficulty estimates and compute allocations.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rlm_governor::{ComputeAllocator, GovernorSettings};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// rlm-govern - difficulty estimation and compute allocation for recursive LLM loops
#[derive(Parser, Debug)]
#[command(name = "rlm-govern")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify a query as easy, medium or hard
    Estimate {
        /// Query text
        query: String,

        /// Size of the context the query runs against, in tokens
        #[arg(long, default_value = "0")]
        context_tokens: u64,
    },

    /// Compute the resource allocation and enforced limits for a query
    Allocate {
        /// Query text
        query: String,

        /// Size of the context the query runs against, in tokens
        #[arg(long, default_value = "0")]
        context_tokens: u64,

        /// Path to a TOML settings file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct AllocateOutput<'a> {
    allocation: &'a rlm_governor::ComputeAllocation,
    guarantees: rlm_governor::GuaranteesConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match cli.command {
        Commands::Estimate {
            query,
            context_tokens,
        } => {
            let assessment = rlm_governor::estimate_difficulty(&query, context_tokens);
            println!("{}", serde_json::to_string_pretty(&assessment)?);
        }
        Commands::Allocate {
            query,
            context_tokens,
            config,
        } => {
            let settings = GovernorSettings::load(config.as_deref())
                .context("failed to load governor settings")?;
            let allocator = ComputeAllocator::with_policy(settings.policy.clone());
            let allocation = allocator
                .allocate_compute(
                    &CancellationToken::new(),
                    &query,
                    context_tokens,
                    &settings.budget,
                )
                .context("allocation failed")?;

            let output = AllocateOutput {
                guarantees: allocation.guarantees_config(&settings.budget),
                allocation: &allocation,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
