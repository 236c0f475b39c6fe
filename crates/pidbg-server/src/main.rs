//! pidbg - Entry Point

use anyhow::Result;
use clap::Parser;
use pidbg_server::{Application, Cli, ConfigSource};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config path: --config > PIDBG_CONFIG > config/default.toml > defaults
    let source = ConfigSource::resolve(cli.config.clone());
    let mut config = source.load()?;
    cli.apply(&mut config);

    pidbg_telemetry::init_logging_with_filter(&config.telemetry.log_level)?;
    info!("Starting pidbg v{}", env!("CARGO_PKG_VERSION"));
    info!(source = %source, "Configuration loaded");

    let app = Application::new(config.clone())?;

    let addr = config.dashboard.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "Dashboard available");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
        }
    };
    app.run(listener, shutdown).await?;

    info!("pidbg stopped");
    Ok(())
}
