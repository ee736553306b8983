//! Handler fuer alle Client-Nachrichten
//!
//! Jeder Handler bekommt den Hub, die sendende Verbindung und die bereits
//! geparsten Nutzdaten. Antworten und Fehler gehen direkt in die
//! Send-Queue der Verbindung; Benachrichtigungen per Broadcast an den Raum.

pub mod profil_handler;
pub mod raum_handler;
pub mod rundruf_handler;
pub mod zug_handler;

use std::sync::Arc;

use turntracker_core::RaumId;
use turntracker_protocol::{fehler_nachricht, ServerNachricht};

use crate::hub::Hub;
use crate::raum::Raum;
use crate::verbindung::Verbindung;

/// Kodiert eine Nachricht und reiht sie bei einem einzelnen Client ein
pub(crate) fn antworten(verbindung: &Verbindung, nachricht: &ServerNachricht) {
    match nachricht.kodieren() {
        Ok(bytes) => {
            verbindung.senden(bytes);
        }
        Err(e) => tracing::error!(fehler = %e, "Antwort konnte nicht kodiert werden"),
    }
}

/// Kodiert eine Nachricht einmal und verteilt sie an den ganzen Raum
pub(crate) fn rundsenden(hub: &Hub, raum_id: &RaumId, nachricht: &ServerNachricht) {
    match nachricht.kodieren() {
        Ok(bytes) => {
            hub.an_raum_senden(raum_id, bytes);
        }
        Err(e) => tracing::error!(fehler = %e, raum_id = %raum_id, "Broadcast konnte nicht kodiert werden"),
    }
}

pub(crate) fn fehler_senden(verbindung: &Verbindung, text: &str) {
    verbindung.senden(fehler_nachricht(text));
}

/// Aktueller Raum der Verbindung; sendet sonst den passenden Fehler
pub(crate) fn eigener_raum(hub: &Hub, verbindung: &Arc<Verbindung>) -> Option<Arc<Raum>> {
    use turntracker_protocol::fehler;

    let Some(raum_id) = verbindung.raum_id() else {
        fehler_senden(verbindung, fehler::NICHT_IM_RAUM);
        return None;
    };
    let raum = hub.raum_holen(&raum_id);
    if raum.is_none() {
        fehler_senden(verbindung, fehler::RAUM_NICHT_GEFUNDEN);
    }
    raum
}

#[cfg(test)]
pub(crate) mod test_hilfen {
    use std::sync::Arc;

    use bytes::Bytes;
    use tokio::sync::mpsc;

    use crate::config::SignalingConfig;
    use crate::ereignisse::StandardEreignisse;
    use crate::hub::Hub;
    use crate::rate_limit::RateLimitKonfig;
    use crate::verbindung::Verbindung;

    pub struct TestClient {
        pub verbindung: Arc<Verbindung>,
        pub rx: mpsc::Receiver<Bytes>,
    }

    impl TestClient {
        /// Naechste Nachricht als JSON, `None` wenn die Queue leer ist
        pub fn naechste(&mut self) -> Option<serde_json::Value> {
            self.rx
                .try_recv()
                .ok()
                .map(|b| serde_json::from_slice(&b).unwrap())
        }

        /// Naechste Nachricht, die den erwarteten Typ haben muss
        pub fn erwarten(&mut self, typ: &str) -> serde_json::Value {
            let nachricht = self.naechste().unwrap_or_else(|| panic!("keine Nachricht, erwartet {typ}"));
            assert_eq!(nachricht["type"], typ, "unerwartete Nachricht: {nachricht}");
            nachricht["data"].clone()
        }

        pub fn fehler_erwarten(&mut self, text: &str) {
            assert_eq!(self.erwarten("error")["message"], text);
        }

        pub fn leer(&mut self) -> bool {
            self.rx.try_recv().is_err()
        }

        pub fn id(&self) -> String {
            self.verbindung.client_id().to_string()
        }
    }

    pub fn test_hub() -> Hub {
        let hub = Hub::neu(SignalingConfig::default());
        hub.ereignisse_setzen(StandardEreignisse::neu());
        hub
    }

    pub fn client(hub: &Hub) -> TestClient {
        let (verbindung, rx) = Verbindung::neu(None, "127.0.0.1", 64, RateLimitKonfig::default());
        hub.registrierung_verarbeiten(&verbindung);
        TestClient { verbindung, rx }
    }
}
