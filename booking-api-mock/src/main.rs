use booking_api_mock::{AppState, router};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "booking-api-mock")]
#[command(about = "Mock bookings API for local development", long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "booking_api_mock=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let state = Arc::new(AppState::seeded());
    let listener = tokio::net::TcpListener::bind(cli.addr).await?;

    info!("Mock bookings API on http://{}/api/bookings", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
