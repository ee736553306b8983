//! Laufzeit-Konfiguration des Signaling-Service
//!
//! Der Server-Binary uebersetzt seine TOML-Konfiguration in diese Struktur.
//! Alle Werte haben sinnvolle Standardwerte fuer den Produktivbetrieb.

use std::time::Duration;

use crate::rate_limit::RateLimitKonfig;

/// Konfiguration fuer Hub, Verbindungen und Aufraeum-Tasks
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Maximale gleichzeitige Verbindungen insgesamt
    pub max_verbindungen: u32,
    /// Maximale gleichzeitige Verbindungen pro Quelladresse
    pub max_verbindungen_pro_ip: u32,
    /// Kapazitaet der ausgehenden Queue pro Verbindung
    pub sende_queue_groesse: usize,
    /// Maximale Groesse eines eingehenden Frames in Bytes
    pub max_nachrichten_groesse: usize,
    /// Wie lange ohne eingehenden Frame gewartet wird, bevor die
    /// Verbindung als tot gilt
    pub pong_wartezeit: Duration,
    /// Frist fuer einen einzelnen Schreibvorgang
    pub schreib_frist: Duration,
    /// Maximale Anzahl zusaetzlicher Nachrichten pro Schreibvorgang
    pub max_batch: usize,
    /// Kapazitaet der Registrierungs-Queue des Hubs
    pub registrier_queue_groesse: usize,
    /// Rate Limit pro Verbindung
    pub rate_limit: RateLimitKonfig,
    /// Intervall des Raum-Aufraeumers
    pub raum_aufraeum_intervall: Duration,
    /// Raeume, die aelter sind, werden geloescht (auch mit Mitgliedern)
    pub raum_max_alter: Duration,
    /// Intervall des Aufraeumers fuer getrennte Clients
    pub getrennt_aufraeum_intervall: Duration,
    /// Wie lange ein getrennter Client wiederhergestellt werden kann
    pub getrennt_ttl: Duration,
}

impl SignalingConfig {
    /// Ping-Intervall: 9/10 der Pong-Wartezeit
    pub fn ping_intervall(&self) -> Duration {
        self.pong_wartezeit * 9 / 10
    }
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            max_verbindungen: 10_000,
            max_verbindungen_pro_ip: 20,
            sende_queue_groesse: 32,
            max_nachrichten_groesse: 64 * 1024,
            pong_wartezeit: Duration::from_secs(90),
            schreib_frist: Duration::from_secs(10),
            max_batch: 10,
            registrier_queue_groesse: 100,
            rate_limit: RateLimitKonfig::default(),
            raum_aufraeum_intervall: Duration::from_secs(2 * 60 * 60),
            raum_max_alter: Duration::from_secs(12 * 60 * 60),
            getrennt_aufraeum_intervall: Duration::from_secs(5 * 60),
            getrennt_ttl: Duration::from_secs(5 * 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_intervall_ist_kuerzer_als_pong_wartezeit() {
        let config = SignalingConfig::default();
        assert_eq!(config.ping_intervall(), Duration::from_secs(81));
        assert!(config.ping_intervall() < config.pong_wartezeit);
    }
}
