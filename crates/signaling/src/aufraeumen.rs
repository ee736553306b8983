//! Periodische Aufraeumer
//!
//! Zwei Hintergrund-Tasks mit festem Intervall:
//! - getrennte Clients, deren TTL abgelaufen ist
//! - verlassene Raeume, die aelter als die Maximaldauer sind
//!
//! Beide loeschen erst bei einem Alter *echt groesser* als die Grenze.

use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;

use crate::hub::Hub;

impl Hub {
    pub(crate) fn aufraeumer_starten(&self) {
        let config = self.config();

        let hub = self.clone();
        let intervall = config.getrennt_aufraeum_intervall;
        self.task_starten(async move {
            hub.periodisch(intervall, "getrennte Clients", |hub| {
                hub.getrennte_aufraeumen_bei(Instant::now())
            })
            .await
        });

        let hub = self.clone();
        let intervall = config.raum_aufraeum_intervall;
        self.task_starten(async move {
            hub.periodisch(intervall, "Raeume", |hub| hub.raeume_aufraeumen_bei(Instant::now()))
                .await
        });
    }

    async fn periodisch(self, intervall: Duration, name: &'static str, lauf: impl Fn(&Hub) -> usize) {
        let shutdown = self.shutdown_token();
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + intervall, intervall);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let entfernt = lauf(&self);
                    if entfernt > 0 {
                        tracing::info!(aufraeumer = name, entfernt, "Aufraeumlauf abgeschlossen");
                    }
                }
            }
        }
        tracing::debug!(aufraeumer = name, "Aufraeumer beendet");
    }

    /// Entfernt getrennte Clients, deren TTL zu `jetzt` abgelaufen ist
    pub fn getrennte_aufraeumen_bei(&self, jetzt: Instant) -> usize {
        let ttl = self.config().getrennt_ttl;
        let vorher = self.getrennte().len();
        self.getrennte()
            .retain(|_, client| jetzt.saturating_duration_since(client.getrennt_am) <= ttl);
        vorher.saturating_sub(self.getrennte().len())
    }

    /// Loescht Raeume, die zu `jetzt` aelter als die Maximaldauer sind
    ///
    /// Mitglieder spielen keine Rolle. Raeume ohne Erstellungszeit werden
    /// uebersprungen.
    pub fn raeume_aufraeumen_bei(&self, jetzt: Instant) -> usize {
        let max_alter = self.config().raum_max_alter;
        let geloescht = self.raeume_loeschen_wenn(|raum| {
            raum.erstellt_am()
                .is_some_and(|erstellt| jetzt.saturating_duration_since(erstellt) > max_alter)
        });
        for raum in &geloescht {
            tracing::info!(
                raum_id = %raum.id(),
                mitglieder = raum.anzahl(),
                "Verlassenen Raum geloescht"
            );
        }
        geloescht.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SignalingConfig;
    use crate::rate_limit::RateLimitKonfig;
    use crate::raum::Raum;
    use crate::verbindung::Verbindung;
    use std::sync::Arc;
    use turntracker_core::{Profil, RaumId};

    const TTL: Duration = Duration::from_secs(300);
    const MAX_ALTER: Duration = Duration::from_secs(12 * 60 * 60);

    fn test_hub() -> Hub {
        Hub::neu(SignalingConfig {
            getrennt_ttl: TTL,
            raum_max_alter: MAX_ALTER,
            ..SignalingConfig::default()
        })
    }

    /// Trennt einen Client aus einem Raum und gibt seinen Trennzeitpunkt zurueck
    fn getrennten_client_anlegen(hub: &Hub) -> (String, Instant) {
        let raum_id = RaumId::parsen("TTLR").unwrap();
        let raum = match hub.raum_holen(&raum_id) {
            Some(raum) => raum,
            None => {
                let raum = Arc::new(Raum::neu(raum_id.clone(), None));
                hub.raum_hinzufuegen(Arc::clone(&raum));
                raum
            }
        };
        let (v, _rx) = Verbindung::neu(None, "127.0.0.1", 4, RateLimitKonfig::default());
        let id = hub.registrierung_verarbeiten(&v);
        v.profil_setzen(Profil::initialisieren("Bob", "#123456"));
        raum.client_hinzufuegen(Arc::clone(&v));
        v.raum_id_setzen(Some(raum_id));
        hub.abmeldung_verarbeiten(&v);
        let getrennt_am = hub.getrennter_client(id.as_str()).unwrap().getrennt_am;
        (id.to_string(), getrennt_am)
    }

    #[test]
    fn getrennter_client_genau_bei_ttl_bleibt() {
        let hub = test_hub();
        let (id, t) = getrennten_client_anlegen(&hub);
        assert_eq!(hub.getrennte_aufraeumen_bei(t + TTL), 0);
        assert!(hub.getrennter_client(&id).is_some());
    }

    #[test]
    fn getrennter_client_nach_ttl_wird_entfernt() {
        let hub = test_hub();
        let (id, t) = getrennten_client_anlegen(&hub);
        assert_eq!(hub.getrennte_aufraeumen_bei(t + TTL + Duration::from_millis(1)), 1);
        assert!(hub.getrennter_client(&id).is_none());
    }

    #[test]
    fn raum_genau_bei_max_alter_bleibt() {
        let hub = test_hub();
        let t = Instant::now();
        let raum_id = RaumId::parsen("KEEP").unwrap();
        hub.raum_hinzufuegen(Arc::new(Raum::neu_bei(raum_id.clone(), None, Some(t))));
        assert_eq!(hub.raeume_aufraeumen_bei(t + MAX_ALTER), 0);
        assert!(hub.raum_existiert(&raum_id));
    }

    #[test]
    fn alter_raum_wird_auch_mit_mitgliedern_geloescht() {
        let hub = test_hub();
        let t = Instant::now();
        let raum_id = RaumId::parsen("OLD1").unwrap();
        let raum = Arc::new(Raum::neu_bei(raum_id.clone(), None, Some(t)));
        let (v, _rx) = Verbindung::neu(None, "127.0.0.1", 4, RateLimitKonfig::default());
        raum.client_hinzufuegen(v);
        hub.raum_hinzufuegen(raum);

        assert_eq!(hub.raeume_aufraeumen_bei(t + MAX_ALTER + Duration::from_secs(1)), 1);
        assert!(!hub.raum_existiert(&raum_id));
    }

    #[test]
    fn raum_ohne_erstellungszeit_wird_uebersprungen() {
        let hub = test_hub();
        let raum_id = RaumId::parsen("NOTS").unwrap();
        hub.raum_hinzufuegen(Arc::new(Raum::neu_bei(raum_id.clone(), None, None)));
        let weit_spaeter = Instant::now() + MAX_ALTER * 10;
        assert_eq!(hub.raeume_aufraeumen_bei(weit_spaeter), 0);
        assert!(hub.raum_existiert(&raum_id));
    }
}
