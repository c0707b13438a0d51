use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use b3futures::cli::{formatters, Cli};
use b3futures::dispatcher;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays clean for tables, JSON and CSV
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    formatters::init_color(cli.no_color);

    dispatcher::dispatch(cli).await
}
