pub mod api;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod health;
pub mod session;

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run() -> ExitCode {
    // Load environment variables from .env file
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = cli::Cli::parse();

    // UI callbacks and network callbacks interleave on one thread
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(cli::execute(cli))
}
