//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist. Zeitangaben sind in Sekunden bzw. Millisekunden.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use turntracker_signaling::{RateLimitKonfig, SignalingConfig};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Grenzen und Fristen pro Verbindung
    pub verbindungen: VerbindungsEinstellungen,
    /// Rate Limit pro Verbindung
    pub rate_limit: RateLimitEinstellungen,
    /// Aufraeum-Tasks
    pub aufraeumen: AufraeumEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Maximale Wartezeit beim Herunterfahren
    pub shutdown_frist_sek: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server: ServerEinstellungen::default(),
            netzwerk: NetzwerkEinstellungen::default(),
            verbindungen: VerbindungsEinstellungen::default(),
            rate_limit: RateLimitEinstellungen::default(),
            aufraeumen: AufraeumEinstellungen::default(),
            logging: LoggingEinstellungen::default(),
            shutdown_frist_sek: 10,
        }
    }
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename der Instanz (nur fuer Logs)
    pub name: String,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Turntracker".into(),
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer WebSocket- und Health-Listener
    pub bind_adresse: String,
    /// Port fuer WebSocket-Verbindungen
    pub port: u16,
    /// Port fuer `GET /health`
    pub health_port: u16,
    /// Health-Server starten
    pub health_aktiviert: bool,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 8080,
            health_port: 8081,
            health_aktiviert: true,
        }
    }
}

/// Grenzen und Fristen pro Verbindung
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerbindungsEinstellungen {
    pub max_gesamt: u32,
    pub max_pro_ip: u32,
    pub sende_queue_groesse: usize,
    pub max_nachrichten_groesse: usize,
    pub pong_wartezeit_sek: u64,
    pub schreib_frist_sek: u64,
    pub max_batch: usize,
    pub registrier_queue_groesse: usize,
}

impl Default for VerbindungsEinstellungen {
    fn default() -> Self {
        Self {
            max_gesamt: 10_000,
            max_pro_ip: 20,
            sende_queue_groesse: 32,
            max_nachrichten_groesse: 64 * 1024,
            pong_wartezeit_sek: 90,
            schreib_frist_sek: 10,
            max_batch: 10,
            registrier_queue_groesse: 100,
        }
    }
}

/// Rate Limit pro Verbindung
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitEinstellungen {
    pub max_nachrichten: usize,
    pub fenster_ms: u64,
}

impl Default for RateLimitEinstellungen {
    fn default() -> Self {
        Self {
            max_nachrichten: 20,
            fenster_ms: 1000,
        }
    }
}

/// Intervalle und Schwellen der Aufraeum-Tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AufraeumEinstellungen {
    pub raum_intervall_sek: u64,
    pub raum_max_alter_sek: u64,
    pub getrennt_intervall_sek: u64,
    pub getrennt_ttl_sek: u64,
}

impl Default for AufraeumEinstellungen {
    fn default() -> Self {
        Self {
            raum_intervall_sek: 2 * 60 * 60,
            raum_max_alter_sek: 12 * 60 * 60,
            getrennt_intervall_sek: 5 * 60,
            getrennt_ttl_sek: 5 * 60,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level oder Filter-Direktive
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str(&inhalt)
                .with_context(|| format!("Konfigurationsfehler in '{pfad}'")),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Uebernimmt den WebSocket-Port aus einer `PORT`-Umgebungsvariable
    pub fn port_ueberschreiben(&mut self, port: Option<&str>) -> anyhow::Result<()> {
        if let Some(port) = port {
            self.netzwerk.port = port
                .trim()
                .parse()
                .with_context(|| format!("Ungueltiger Port '{port}'"))?;
        }
        Ok(())
    }

    /// Bind-Adresse fuer WebSocket-Verbindungen
    pub fn ws_bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        adresse(&self.netzwerk.bind_adresse, self.netzwerk.port)
    }

    /// Bind-Adresse fuer den Health-Server
    pub fn health_bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        adresse(&self.netzwerk.bind_adresse, self.netzwerk.health_port)
    }

    pub fn shutdown_frist(&self) -> Duration {
        Duration::from_secs(self.shutdown_frist_sek)
    }

    /// Uebersetzt die Datei-Konfiguration in die Laufzeit-Konfiguration des Hubs
    pub fn signaling_config(&self) -> SignalingConfig {
        let v = &self.verbindungen;
        let a = &self.aufraeumen;
        SignalingConfig {
            max_verbindungen: v.max_gesamt,
            max_verbindungen_pro_ip: v.max_pro_ip,
            sende_queue_groesse: v.sende_queue_groesse.max(1),
            max_nachrichten_groesse: v.max_nachrichten_groesse,
            pong_wartezeit: Duration::from_secs(v.pong_wartezeit_sek),
            schreib_frist: Duration::from_secs(v.schreib_frist_sek),
            max_batch: v.max_batch,
            registrier_queue_groesse: v.registrier_queue_groesse.max(1),
            rate_limit: RateLimitKonfig {
                max_nachrichten: self.rate_limit.max_nachrichten,
                fenster: Duration::from_millis(self.rate_limit.fenster_ms),
            },
            raum_aufraeum_intervall: Duration::from_secs(a.raum_intervall_sek),
            raum_max_alter: Duration::from_secs(a.raum_max_alter_sek),
            getrennt_aufraeum_intervall: Duration::from_secs(a.getrennt_intervall_sek),
            getrennt_ttl: Duration::from_secs(a.getrennt_ttl_sek),
        }
    }
}

fn adresse(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    format!("{host}:{port}")
        .parse()
        .with_context(|| format!("Ungueltige Bind-Adresse '{host}:{port}'"))
}
