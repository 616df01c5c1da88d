//! dev-all - 开发进程编排
//!
//! ```text
//! primary (npm run dev)
//!     ├─ poll ready_url until 2xx/3xx (up to 120s)
//!     │      ├─ primary exits non-zero → exit with its code
//!     │      ├─ timeout              → kill primary, exit 1
//!     │      └─ SIGINT/SIGTERM       → kill primary, exit 0
//!     └─ secondary (npx zmp start)
//!            ├─ secondary exits      → kill primary, exit with its code
//!            ├─ primary exits ≠ 0    → kill secondary, exit with its code
//!            └─ SIGINT/SIGTERM       → kill both, exit 0
//! ```

pub mod runner;

pub use runner::{CommandSpec, DevRunConfig, RunOutcome, RunnerError, run, run_with_shutdown};

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, stopping children...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, stopping children...");
        },
    }
}
