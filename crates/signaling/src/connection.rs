//! Verbindungs-Pumpen – Lesen und Schreiben einer WebSocket-Verbindung
//!
//! Jede registrierte Verbindung bekommt zwei Tasks:
//!
//! ```text
//! WebSocket --> Leser  --> RateLimiter --> NachrichtenHandler
//! Send-Queue --> Schreiber --> WebSocket   (+ Ping alle ping_intervall)
//! ```
//!
//! ## Leser
//! Liest genau einen Frame nach dem anderen und ruft den Handler synchron
//! auf. Ein langsamer Handler bremst damit nur diese Verbindung. Jeder
//! eingehende Frame (auch Pongs) verlaengert die Lesefrist.
//!
//! ## Schreiber
//! Sendet die erste Nachricht aus der Queue und haengt bereits wartende
//! Nachrichten (bis `max_batch`) durch `\n` getrennt an denselben Frame.
//!
//! Beide Pumpen enden beim Abbruch der Verbindung. Der Leser meldet die
//! Verbindung danach beim Hub ab.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
use tokio_tungstenite::WebSocketStream;
use turntracker_protocol::fehler::{self, fehler_nachricht};

use crate::error::{SignalingError, SignalingResult};
use crate::hub::Hub;
use crate::puffer_pool::PufferPool;
use crate::verbindung::Verbindung;

// ---------------------------------------------------------------------------
// NachrichtenHandler
// ---------------------------------------------------------------------------

/// Verarbeitet eingehende Text-Nachrichten einer Verbindung
///
/// Wird synchron aus dem Leser aufgerufen. Antworten gehen ueber
/// `Verbindung::senden` oder die Broadcast-Methoden des Hubs.
pub trait NachrichtenHandler: Send + Sync + 'static {
    fn verarbeiten(&self, hub: &Hub, verbindung: &Arc<Verbindung>, text: &str);
}

// ---------------------------------------------------------------------------
// Pumpen
// ---------------------------------------------------------------------------

/// Startet Leser und Schreiber einer registrierten Verbindung
///
/// Beide Tasks laufen auf dem Task-Tracker des Hubs, damit das
/// Herunterfahren auf sie wartet.
pub fn pumpen_starten<S>(
    hub: &Hub,
    verbindung: Arc<Verbindung>,
    sende_rx: mpsc::Receiver<Bytes>,
    ws: WebSocketStream<S>,
    handler: Arc<dyn NachrichtenHandler>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sink, stream) = ws.split();

    let schreiber_hub = hub.clone();
    let schreiber_verbindung = Arc::clone(&verbindung);
    hub.task_starten(async move {
        schreiben(schreiber_hub, schreiber_verbindung, sende_rx, sink).await
    });

    let leser_hub = hub.clone();
    hub.task_starten(async move { lesen(leser_hub, verbindung, stream, handler).await });
}

async fn lesen<S>(
    hub: Hub,
    verbindung: Arc<Verbindung>,
    mut stream: SplitStream<WebSocketStream<S>>,
    handler: Arc<dyn NachrichtenHandler>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let client_id = verbindung.client_id();
    let wartezeit = hub.config().pong_wartezeit;

    loop {
        let frame = tokio::select! {
            _ = verbindung.abgebrochen() => break,
            frame = tokio::time::timeout(wartezeit, stream.next()) => frame,
        };

        let nachricht = match frame {
            Ok(Some(Ok(nachricht))) => nachricht,
            Ok(Some(Err(e))) => {
                tracing::debug!(client_id = %client_id, fehler = %e, "Lesefehler");
                break;
            }
            Ok(None) => {
                tracing::debug!(client_id = %client_id, "Verbindung vom Client geschlossen");
                break;
            }
            Err(_) => {
                tracing::info!(client_id = %client_id, "Keine Antwort innerhalb der Lesefrist");
                break;
            }
        };

        match nachricht {
            Message::Text(text) => {
                if rate_limit_einhalten(&verbindung) {
                    handler.verarbeiten(&hub, &verbindung, text.as_str());
                }
            }
            Message::Binary(daten) => {
                if !rate_limit_einhalten(&verbindung) {
                    continue;
                }
                match std::str::from_utf8(&daten) {
                    Ok(text) => handler.verarbeiten(&hub, &verbindung, text),
                    Err(_) => {
                        verbindung.senden(fehler_nachricht(fehler::UNGUELTIGES_FORMAT));
                    }
                }
            }
            Message::Close(_) => {
                tracing::debug!(client_id = %client_id, "Close-Frame empfangen");
                break;
            }
            // Ping wird von tungstenite beantwortet; alles verlaengert nur die Frist
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
        }
    }

    verbindung.abbrechen();
    hub.abmelden(&verbindung).await;
    tracing::debug!(client_id = %client_id, "Leser beendet");
}

/// Verbucht eine Daten-Nachricht; bei Ueberschreitung geht ein Fehler raus
fn rate_limit_einhalten(verbindung: &Verbindung) -> bool {
    if verbindung.rate_limit_pruefen() {
        return true;
    }
    tracing::warn!(client_id = %verbindung.client_id(), "Rate Limit ueberschritten");
    verbindung.senden(fehler_nachricht(fehler::RATE_LIMIT_UEBERSCHRITTEN));
    false
}

async fn schreiben<S>(
    hub: Hub,
    verbindung: Arc<Verbindung>,
    mut sende_rx: mpsc::Receiver<Bytes>,
    mut sink: SplitSink<WebSocketStream<S>, Message>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let client_id = verbindung.client_id();
    let config = hub.config();
    let frist = config.schreib_frist;
    let ping_intervall = config.ping_intervall();
    let mut ping = tokio::time::interval_at(tokio::time::Instant::now() + ping_intervall, ping_intervall);

    loop {
        tokio::select! {
            biased;

            _ = verbindung.abgebrochen() => break,

            nachricht = sende_rx.recv() => {
                let Some(erste) = nachricht else {
                    // Queue vom Hub geschlossen
                    let _ = tokio::time::timeout(frist, sink.send(Message::Close(None))).await;
                    break;
                };
                let daten = batch_bauen(hub.puffer_pool(), erste, &mut sende_rx, config.max_batch);
                if let Err(e) = text_senden(&mut sink, daten, frist).await {
                    tracing::debug!(client_id = %client_id, fehler = %e, "Schreiben fehlgeschlagen");
                    break;
                }
            }

            _ = ping.tick() => {
                if let Err(e) = frame_senden(&mut sink, Message::Ping(Bytes::new()), frist).await {
                    tracing::debug!(client_id = %client_id, fehler = %e, "Ping fehlgeschlagen");
                    break;
                }
            }
        }
    }

    verbindung.abbrechen();
    let _ = tokio::time::timeout(frist, sink.close()).await;
    tracing::debug!(client_id = %client_id, "Schreiber beendet");
}

/// Fasst die erste Nachricht mit bereits wartenden zu einem Frame zusammen
fn batch_bauen(
    pool: &PufferPool,
    erste: Bytes,
    sende_rx: &mut mpsc::Receiver<Bytes>,
    max_batch: usize,
) -> Bytes {
    if max_batch == 0 {
        return erste;
    }
    let Ok(zweite) = sende_rx.try_recv() else {
        return erste;
    };

    let mut puffer = pool.holen();
    puffer.extend_from_slice(&erste);
    puffer.extend_from_slice(b"\n");
    puffer.extend_from_slice(&zweite);
    for _ in 1..max_batch {
        let Ok(weitere) = sende_rx.try_recv() else {
            break;
        };
        puffer.extend_from_slice(b"\n");
        puffer.extend_from_slice(&weitere);
    }

    let daten = puffer.split().freeze();
    pool.zurueckgeben(puffer);
    daten
}

async fn text_senden<S>(
    sink: &mut SplitSink<WebSocketStream<S>, Message>,
    daten: Bytes,
    frist: Duration,
) -> SignalingResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let text = Utf8Bytes::try_from(daten)
        .map_err(|e| SignalingError::intern(format!("ausgehende Nachricht ist kein UTF-8: {e}")))?;
    frame_senden(sink, Message::Text(text), frist).await
}

async fn frame_senden<S>(
    sink: &mut SplitSink<WebSocketStream<S>, Message>,
    nachricht: Message,
    frist: Duration,
) -> SignalingResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    tokio::time::timeout(frist, sink.send(nachricht))
        .await
        .map_err(|_| SignalingError::Timeout)??;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
