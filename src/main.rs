//! k8sit CLI
//!
//! Brings up kind clusters and temporary namespaces for integration tests.

use clap::Parser;

use k8sit::cli::Cli;
use k8sit::telemetry::{init_tracing, TelemetryConfig};
use k8sit::{Error, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(TelemetryConfig {
        json: cli.log_json,
        ..Default::default()
    })
    .map_err(|e| Error::config(e.to_string()))?;

    cli.run().await
}
