//! # turntracker-observability
//!
//! Observability-Crate fuer Turntracker:
//! - Health-Check-Endpunkt (`/health`)
//! - Structured Logging via tracing-subscriber (Text oder JSON)

pub mod health;
pub mod logging;

pub use health::{health_router, HealthResponse, HealthState, HealthStatus, Kennzahlen};
pub use logging::{logging_initialisieren, LogFormat};

use anyhow::Result;
use std::future::Future;
use std::net::SocketAddr;

/// Startet den Health-HTTP-Server
///
/// Endpunkte:
/// - `GET /health` – Health-Check JSON
///
/// Laeuft, bis `shutdown` fertig wird.
pub async fn health_server_starten(
    bind_addr: SocketAddr,
    state: HealthState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = health_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %bind_addr, "Health-Server gestartet");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
