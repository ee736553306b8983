//! Health-Check-Endpunkt fuer Turntracker
//!
//! Endpoint: `GET /health`
//! Response: JSON mit Status, Version, Uptime, Verbindungen und Raeumen.
//! Waehrend des Herunterfahrens antwortet der Endpunkt mit 503.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

/// Status des Health-Checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub connections: u64,
    pub rooms: u64,
}

/// Momentaufnahme der Laufzeitwerte
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Kennzahlen {
    pub verbindungen: u64,
    pub raeume: u64,
}

type KennzahlenQuelle = Arc<dyn Fn() -> Kennzahlen + Send + Sync>;

/// Geteilter Zustand fuer den Health-Check-Handler
#[derive(Clone)]
pub struct HealthState {
    start_time: Instant,
    bereit: Arc<AtomicBool>,
    kennzahlen: KennzahlenQuelle,
}

impl HealthState {
    /// `kennzahlen` wird bei jeder Anfrage aufgerufen
    pub fn neu(kennzahlen: impl Fn() -> Kennzahlen + Send + Sync + 'static) -> Self {
        Self {
            start_time: Instant::now(),
            bereit: Arc::new(AtomicBool::new(true)),
            kennzahlen: Arc::new(kennzahlen),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn ist_bereit(&self) -> bool {
        self.bereit.load(Ordering::Relaxed)
    }

    /// Markiert den Server als (nicht) bereit, z.B. beim Herunterfahren
    pub fn bereit_setzen(&self, bereit: bool) {
        self.bereit.store(bereit, Ordering::Relaxed);
    }

    fn antwort(&self) -> (StatusCode, HealthResponse) {
        let (status, http_status) = if self.ist_bereit() {
            (HealthStatus::Healthy, StatusCode::OK)
        } else {
            (HealthStatus::Unhealthy, StatusCode::SERVICE_UNAVAILABLE)
        };
        let kennzahlen = (self.kennzahlen)();
        let response = HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.uptime_seconds(),
            connections: kennzahlen.verbindungen,
            rooms: kennzahlen.raeume,
        };
        (http_status, response)
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

/// `GET /health` – gibt den Serverstatus zurueck
async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let (http_status, response) = state.antwort();
    (http_status, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    fn state_mit(verbindungen: u64, raeume: u64) -> HealthState {
        HealthState::neu(move || Kennzahlen { verbindungen, raeume })
    }

    #[test]
    fn frischer_state_ist_bereit() {
        let state = state_mit(0, 0);
        assert!(state.ist_bereit());
        assert!(state.uptime_seconds() < 5);
    }

    #[test]
    fn kennzahlen_werden_pro_anfrage_gelesen() {
        let zaehler = Arc::new(AtomicU64::new(1));
        let quelle = Arc::clone(&zaehler);
        let state = HealthState::neu(move || Kennzahlen {
            verbindungen: quelle.load(Ordering::Relaxed),
            raeume: 2,
        });

        assert_eq!(state.antwort().1.connections, 1);
        zaehler.store(7, Ordering::Relaxed);
        let (status, antwort) = state.antwort();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(antwort.connections, 7);
        assert_eq!(antwort.rooms, 2);
    }

    #[test]
    fn herunterfahren_meldet_503() {
        let state = state_mit(3, 1);
        state.bereit_setzen(false);
        let (status, antwort) = state.antwort();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(antwort.status, HealthStatus::Unhealthy);
    }

    #[test]
    fn health_response_serialisierung() {
        let (_, antwort) = state_mit(12, 4).antwort();
        let json = serde_json::to_value(&antwort).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(json["connections"], 12);
        assert_eq!(json["rooms"], 4);
    }

    #[tokio::test]
    async fn handler_liefert_json() {
        let antwort = health_handler(State(state_mit(1, 1))).await.into_response();
        assert_eq!(antwort.status(), StatusCode::OK);
        let body = axum::body::to_bytes(antwort.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
    }
}
