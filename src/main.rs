//! CLI entry point.
//!
//! `boorudex --role <discoverer|fetcher|server|all-in-one>` loads
//! [`BoorudexConfig`], wires a `RedisKv` handle and `UpstreamClient`, and
//! drives the [`Supervisor`] for the chosen role. `all-in-one` (the
//! default) hosts every task in this one process; the other roles are
//! what `Supervisor::spawn_os_processes` dispatches into via
//! `std::process::Command`.

use boorudex::{BoorudexConfig, Role, Supervisor};
use clap::Parser;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "boorudex", version, about = "Perceptual-image search index and ingestion pipeline")]
struct Cli {
    /// Which task to run in this process.
    #[arg(long, default_value = "all-in-one")]
    role: Role,

    /// Path to a YAML config file (without extension), overriding the
    /// default `boorudex.yaml` lookup.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match BoorudexConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()))
        .with_target(false)
        .init();

    let supervisor = match Supervisor::new(config) {
        Ok(supervisor) => supervisor,
        Err(err) => {
            eprintln!("failed to initialize supervisor: {err}");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(role = %cli.role, "starting boorudex");

    if let Err(err) = std::sync::Arc::new(supervisor).run_role(cli.role).await {
        tracing::error!(error = %err, "boorudex exited with error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
