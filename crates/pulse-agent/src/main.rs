//! pulse-agent - remote metrics reporter for the Pulse dashboard.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use pulse_agent::{default_id_path, load_or_create_id, user_agent, Reporter};
use pulse_collect::HostCollector;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pulse-agent")]
#[command(about = "Push this machine's metrics to a Pulse dashboard")]
#[command(version)]
struct Cli {
    /// Dashboard server URL, e.g. http://dashboard:8000
    #[arg(long, env = "PULSE_SERVER_URL")]
    server_url: String,

    /// Seconds between reports
    #[arg(long, default_value_t = 5)]
    interval_secs: u64,

    /// File holding the persistent agent id (default: ~/.pulse-agent-id)
    #[arg(long)]
    id_file: Option<PathBuf>,

    /// Use this id instead of the persistent one
    #[arg(long)]
    server_id: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    if cli.interval_secs == 0 {
        anyhow::bail!("--interval-secs must be greater than zero");
    }

    let server_id = match cli.server_id.filter(|id| !id.trim().is_empty()) {
        Some(id) => id,
        None => {
            let path = cli.id_file.or_else(default_id_path);
            load_or_create_id(path.as_deref())
        }
    };

    let reporter = Reporter::new(&cli.server_url, server_id)?;
    info!(
        endpoint = reporter.endpoint(),
        server_id = reporter.server_id(),
        user_agent = %user_agent(),
        "starting pulse-agent"
    );

    let collector = HostCollector::new();
    reporter
        .run(&collector, Duration::from_secs(cli.interval_secs), async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("shutdown requested"),
                Err(e) => {
                    warn!(error = %e, "cannot listen for ctrl-c, running until killed");
                    std::future::pending::<()>().await;
                }
            }
        })
        .await;

    Ok(())
}
