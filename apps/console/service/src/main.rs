use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use stratus_console_service::config::Config;
use stratus_console_service::{serve, RelayCapabilities};

#[derive(Debug, Parser)]
#[command(
    name = "stratus-console-service",
    about = "REST gateway for the Stratus platform core",
    version
)]
struct Args {
    /// Socket address to listen on; overrides STRATUS_CONSOLE_BIND_ADDR.
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Log filter, e.g. "info" or "stratus_console_service=debug".
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(log_level) = args.log_level {
        config.log_filter = log_level;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    if args.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    serve(config, RelayCapabilities::default()).await?;
    Ok(())
}
