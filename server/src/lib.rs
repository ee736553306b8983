//! turntracker-server – Bibliotheks-Root
//!
//! Verdrahtet Hub, WebSocket-Listener und Health-Server und stellt den
//! Einstiegspunkt fuer Tests bereit.

pub mod config;

use std::future::Future;

use anyhow::Result;
use config::ServerConfig;
use tokio_util::sync::CancellationToken;
use turntracker_observability::{health_server_starten, HealthState, Kennzahlen};
use turntracker_signaling::{Hub, MessageDispatcher, SignalingServer, StandardEreignisse};

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Subsysteme und laeuft bis Ctrl-C / SIGTERM
    pub async fn starten(self) -> Result<()> {
        self.starten_bis(shutdown_signal()).await
    }

    /// Startet alle Subsysteme und laeuft, bis `signal` fertig wird
    ///
    /// Reihenfolge:
    /// 1. Hub mit Standard-Ereignissen und Aufraeum-Tasks
    /// 2. WebSocket-Listener
    /// 3. Health-Server (optional)
    /// 4. Auf Signal warten, dann Listener stoppen und Hub herunterfahren
    pub async fn starten_bis(self, signal: impl Future<Output = ()>) -> Result<()> {
        let ws_addr = self.config.ws_bind_adresse()?;
        tracing::info!(
            server_name = %self.config.server.name,
            websocket = %ws_addr,
            "Server startet"
        );

        let hub = Hub::neu(self.config.signaling_config());
        hub.ereignisse_setzen(StandardEreignisse::neu());
        hub.starten();

        let ws_server = SignalingServer::binden(hub.clone(), MessageDispatcher::neu(), ws_addr).await?;
        let ws_stopp = CancellationToken::new();
        let ws_task = tokio::spawn(ws_server.starten(ws_stopp.clone()));

        let kennzahlen_hub = hub.clone();
        let health_state = HealthState::neu(move || Kennzahlen {
            verbindungen: u64::from(kennzahlen_hub.verbindungs_anzahl()),
            raeume: kennzahlen_hub.raum_anzahl() as u64,
        });
        let health_stopp = CancellationToken::new();
        let health_task = if self.config.netzwerk.health_aktiviert {
            let addr = self.config.health_bind_adresse()?;
            let stopp = health_stopp.clone();
            Some(tokio::spawn(health_server_starten(
                addr,
                health_state.clone(),
                async move { stopp.cancelled().await },
            )))
        } else {
            None
        };

        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        signal.await;
        tracing::info!("Shutdown-Signal empfangen, Server wird beendet");

        health_state.bereit_setzen(false);
        ws_stopp.cancel();
        match ws_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(fehler = %e, "WebSocket-Server mit Fehler beendet"),
            Err(e) => tracing::warn!(fehler = %e, "WebSocket-Task abgebrochen"),
        }

        if !hub.herunterfahren(self.config.shutdown_frist()).await {
            tracing::warn!("Nicht alle Verbindungen wurden rechtzeitig beendet");
        }

        health_stopp.cancel();
        if let Some(task) = health_task {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(fehler = %e, "Health-Server mit Fehler beendet"),
                Err(e) => tracing::warn!(fehler = %e, "Health-Task abgebrochen"),
            }
        }

        tracing::info!("Server beendet");
        Ok(())
    }
}

/// Wartet auf SIGINT oder SIGTERM (unter Windows nur Ctrl-C)
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(mut sigint), Ok(mut sigterm)) => {
                tokio::select! {
                    _ = sigint.recv() => tracing::info!("SIGINT empfangen"),
                    _ = sigterm.recv() => tracing::info!("SIGTERM empfangen"),
                }
                return;
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(fehler = %e, "Signal-Handler nicht installierbar, nur Ctrl-C");
            }
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(fehler = %e, "Ctrl-C-Handler fehlgeschlagen");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_config() -> ServerConfig {
        let mut config = ServerConfig::default();
        config.netzwerk.bind_adresse = "127.0.0.1".into();
        config.netzwerk.port = 0;
        config.netzwerk.health_port = 0;
        config.shutdown_frist_sek = 2;
        config
    }

    #[tokio::test]
    async fn server_beendet_sich_nach_signal() {
        let server = Server::neu(test_config());
        let ergebnis = tokio::time::timeout(
            Duration::from_secs(5),
            server.starten_bis(tokio::time::sleep(Duration::from_millis(50))),
        )
        .await;
        assert!(matches!(ergebnis, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn ohne_health_server() {
        let mut config = test_config();
        config.netzwerk.health_aktiviert = false;
        let ergebnis = Server::neu(config).starten_bis(async {}).await;
        assert!(ergebnis.is_ok());
    }

    #[tokio::test]
    async fn ungueltige_adresse_schlaegt_fehl() {
        let mut config = test_config();
        config.netzwerk.bind_adresse = "nirgendwo".into();
        assert!(Server::neu(config).starten_bis(async {}).await.is_err());
    }
}
