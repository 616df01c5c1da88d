//! dev-all - start the dev server, wait for it, then start the mini app tool

use booking_api_mock::AppState;
use booking_desk::devrun::{self, CommandSpec, DevRunConfig, runner};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "dev-all")]
#[command(about = "Run the dev server and the mini app tool together", long_about = None)]
struct Cli {
    /// Dev server command
    #[arg(long, default_value = runner::DEFAULT_PRIMARY)]
    primary: String,

    /// Started once the dev server answers
    #[arg(long, default_value = runner::DEFAULT_SECONDARY)]
    secondary: String,

    /// Polled with GET until it answers 2xx/3xx
    #[arg(long, default_value = runner::DEFAULT_READY_URL)]
    url: String,

    /// Seconds to wait for the dev server
    #[arg(long, default_value_t = runner::DEFAULT_READY_TIMEOUT_SECS)]
    timeout: u64,

    /// Also serve the mock bookings API on this address (e.g. 127.0.0.1:3000)
    #[arg(long)]
    mock_api: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into());
    booking_desk::init_logger(&level, false)?;

    let cli = Cli::parse();
    let config = DevRunConfig {
        primary: CommandSpec::new(cli.primary)?,
        secondary: CommandSpec::new(cli.secondary)?,
        ready_url: cli.url,
        ready_timeout: Duration::from_secs(cli.timeout),
        ..DevRunConfig::default()
    };

    if let Some(addr) = cli.mock_api {
        let bound = booking_api_mock::spawn(addr, Arc::new(AppState::seeded())).await?;
        tracing::info!("Mock bookings API on http://{}/api/bookings", bound);
    }

    let outcome = devrun::run(&config).await?;
    tracing::info!(?outcome, code = outcome.exit_code(), "dev-all finished");
    std::process::exit(outcome.exit_code());
}
