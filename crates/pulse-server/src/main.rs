//! Pulse dashboard server binary.

use std::path::PathBuf;

use clap::Parser;
use pulse_server::{DashboardConfig, DashboardServer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pulse-server")]
#[command(about = "Real-time telemetry dashboard server")]
#[command(version)]
struct Cli {
    /// Path to a JSON config file
    #[arg(short, long, env = "PULSE_CONFIG")]
    config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    port: Option<u16>,

    /// Broadcast interval in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut config = DashboardConfig::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config = config.with_host(host);
    }
    if let Some(port) = cli.port {
        config = config.with_port(port);
    }
    if let Some(ms) = cli.poll_interval_ms {
        config = config.with_poll_interval_ms(ms);
    }
    config.validate()?;

    info!(
        addr = %config.bind_address(),
        poll_interval_ms = config.poll_interval_ms,
        max_ws_connections = config.max_ws_connections,
        "starting pulse-server"
    );

    let server = DashboardServer::with_local_collectors(config);
    server
        .serve_with_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("shutdown requested"),
                Err(e) => {
                    warn!(error = %e, "cannot listen for ctrl-c, running until killed");
                    std::future::pending::<()>().await;
                }
            }
        })
        .await?;

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
