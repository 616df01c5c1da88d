//! Mock of the external bookings API
//!
//! Serves `GET/POST /api/bookings` over an in-memory list seeded with the
//! demo bookings, plus a stand-in for the template message endpoint. Used
//! by `dev-all` during development and by integration tests.

pub mod api;
pub mod state;

pub use api::router;
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;

/// Bind and serve on a background task. Returns the bound address.
pub async fn spawn(addr: SocketAddr, state: Arc<AppState>) -> std::io::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    let app = router(state);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "Mock API server stopped");
        }
    });
    Ok(local)
}
