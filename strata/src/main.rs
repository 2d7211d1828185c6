mod commands;
mod ops;
mod reports;
mod timing;

use clap::Parser;
use eyre::Result;
use tracing_subscriber::EnvFilter;

use crate::commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    Cli::parse().run()
}

/// Log to stderr, filtered by `STRATA_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_env("STRATA_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}
