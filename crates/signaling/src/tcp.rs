//! WebSocket-Listener – Bindet Socket, akzeptiert Verbindungen
//!
//! Fuer jede eingehende TCP-Verbindung laeuft der WebSocket-Handshake in
//! einem eigenen Task. Die Zulassung passiert bereits im Handshake-Callback:
//! Ist das Limit erreicht, bekommt der Client HTTP 503 und keine Identitaet.
//!
//! ## Ablauf
//! ```text
//! accept -> Handshake (Quelladresse, ?client_id=, Zulassung)
//!        -> Verbindung anlegen -> Hub::registrieren -> Pumpen starten
//! ```
//! Scheitert ein Schritt nach der Zulassung, werden die reservierten
//! Plaetze wieder freigegeben.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_util::sync::CancellationToken;

use crate::connection::{pumpen_starten, NachrichtenHandler};
use crate::error::SignalingResult;
use crate::hub::Hub;
use crate::verbindung::Verbindung;

/// Frist fuer den kompletten WebSocket-Handshake
const HANDSHAKE_FRIST: Duration = Duration::from_secs(10);

/// Ergebnis eines zugelassenen Handshakes
struct Zulassung {
    ip: String,
    client_id: Option<String>,
}

/// WebSocket-Signaling-Server
pub struct SignalingServer {
    hub: Hub,
    handler: Arc<dyn NachrichtenHandler>,
    listener: TcpListener,
}

impl SignalingServer {
    /// Bindet den Socket
    pub async fn binden(
        hub: Hub,
        handler: Arc<dyn NachrichtenHandler>,
        bind_addr: SocketAddr,
    ) -> SignalingResult<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        Ok(Self { hub, handler, listener })
    }

    /// Tatsaechlich gebundene Adresse (relevant bei Port 0)
    pub fn lokale_adresse(&self) -> SignalingResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Akzeptiert Verbindungen, bis `shutdown` ausgeloest wird
    pub async fn starten(self, shutdown: CancellationToken) -> SignalingResult<()> {
        let lokale_addr = self.listener.local_addr()?;
        tracing::info!(adresse = %lokale_addr, "WebSocket-Server gestartet");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("WebSocket-Server: Shutdown-Signal empfangen");
                    break;
                }
                ergebnis = self.listener.accept() => match ergebnis {
                    Ok((stream, peer_addr)) => {
                        tracing::trace!(peer = %peer_addr, "TCP-Verbindung akzeptiert");
                        let hub = self.hub.clone();
                        let handler = Arc::clone(&self.handler);
                        self.hub.task_starten(async move {
                            verbindung_annehmen(hub, handler, stream, peer_addr).await
                        });
                    }
                    Err(e) => {
                        tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                },
            }
        }

        tracing::info!("WebSocket-Server gestoppt");
        Ok(())
    }
}

async fn verbindung_annehmen(
    hub: Hub,
    handler: Arc<dyn NachrichtenHandler>,
    stream: TcpStream,
    peer_addr: SocketAddr,
) {
    let config = hub.config().clone();
    let ws_config = WebSocketConfig::default()
        .max_message_size(Some(config.max_nachrichten_groesse))
        .max_frame_size(Some(config.max_nachrichten_groesse));

    let mut zulassung: Option<Zulassung> = None;
    let callback = |anfrage: &Request, antwort: Response| -> Result<Response, ErrorResponse> {
        let ip = quell_adresse(anfrage, peer_addr);
        if !hub.ip_registrieren(&ip) {
            return Err(server_voll());
        }
        zulassung = Some(Zulassung {
            ip,
            client_id: client_id_aus_query(anfrage.uri().query()),
        });
        Ok(antwort)
    };

    let handshake = tokio::time::timeout(
        HANDSHAKE_FRIST,
        tokio_tungstenite::accept_hdr_async_with_config(stream, callback, Some(ws_config)),
    )
    .await;

    let ws = match handshake {
        Ok(Ok(ws)) => ws,
        Ok(Err(e)) => {
            tracing::debug!(peer = %peer_addr, fehler = %e, "WebSocket-Handshake fehlgeschlagen");
            if let Some(z) = zulassung {
                hub.ip_abmelden(&z.ip);
            }
            return;
        }
        Err(_) => {
            tracing::debug!(peer = %peer_addr, "WebSocket-Handshake Timeout");
            if let Some(z) = zulassung {
                hub.ip_abmelden(&z.ip);
            }
            return;
        }
    };
    let Some(zulassung) = zulassung else {
        // Handshake ohne Callback ist nicht moeglich
        return;
    };

    let (verbindung, sende_rx) = Verbindung::neu(
        zulassung.client_id,
        zulassung.ip,
        config.sende_queue_groesse,
        config.rate_limit,
    );

    match hub.registrieren(&verbindung).await {
        Ok(client_id) => {
            tracing::debug!(client_id = %client_id, peer = %peer_addr, "Verbindung bereit");
            pumpen_starten(&hub, verbindung, sende_rx, ws, handler);
        }
        Err(e) => {
            tracing::debug!(peer = %peer_addr, fehler = %e, "Registrierung fehlgeschlagen");
            if hub.ist_registriert(&verbindung) {
                hub.abmeldung_verarbeiten(&verbindung);
            } else {
                hub.ip_abmelden(verbindung.ip());
            }
            let mut ws = ws;
            let _ = tokio::time::timeout(Duration::from_secs(1), ws.close(None)).await;
        }
    }
}

/// Quelladresse: erster Eintrag aus `X-Forwarded-For`, dann `X-Real-IP`,
/// sonst die Peer-Adresse
fn quell_adresse(anfrage: &Request, peer_addr: SocketAddr) -> String {
    let header = |name: &str| {
        anfrage
            .headers()
            .get(name)
            .and_then(|wert| wert.to_str().ok())
            .map(str::trim)
            .filter(|wert| !wert.is_empty())
    };

    if let Some(erster) = header("x-forwarded-for")
        .and_then(|liste| liste.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return erster.to_string();
    }
    if let Some(ip) = header("x-real-ip") {
        return ip.to_string();
    }
    peer_addr.ip().to_string()
}

/// Liest `client_id` aus dem Query-String
fn client_id_aus_query(query: Option<&str>) -> Option<String> {
    query?
        .split('&')
        .filter_map(|paar| paar.split_once('='))
        .find(|(name, _)| *name == "client_id")
        .map(|(_, wert)| wert.to_string())
        .filter(|wert| !wert.is_empty())
}

fn server_voll() -> ErrorResponse {
    let mut antwort = ErrorResponse::new(Some("Server voll".to_string()));
    *antwort.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
    antwort
}
