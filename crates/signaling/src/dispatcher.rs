//! Message-Dispatcher – Routet Client-Nachrichten an die Handler
//!
//! Der Dispatcher parst zuerst den Umschlag, dann die Nutzdaten passend
//! zum Typ. Raum-IDs werden vor der Weitergabe in Grossbuchstaben
//! gewandelt.
//!
//! Fehler beim Parsen gehen als `error` an den Absender:
//! - kein gueltiger Umschlag: `Invalid message format`
//! - unbekannter Typ: `Unknown message type: <typ>`
//! - Nutzdaten passen nicht: `Invalid <typ> data`

use std::sync::Arc;

use serde::de::DeserializeOwned;
use turntracker_core::RaumId;
use turntracker_protocol::nachricht::{
    EingehendeNachricht, ProfilAktualisierenDaten, RaumBeitretenDaten, RaumErstellenDaten,
    RaumVerlassenDaten, RundrufDaten, ZugStartenDaten, TYP_PROFIL_AKTUALISIEREN,
    TYP_RAUM_BEITRETEN, TYP_RAUM_ERSTELLEN, TYP_RAUM_VERLASSEN, TYP_RUNDRUF, TYP_ZUG_STARTEN,
};
use turntracker_protocol::{fehler, fehler_nachricht};

use crate::connection::NachrichtenHandler;
use crate::handlers::{profil_handler, raum_handler, rundruf_handler, zug_handler};
use crate::hub::Hub;
use crate::verbindung::Verbindung;

/// Zentraler Message-Dispatcher
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageDispatcher;

impl MessageDispatcher {
    pub fn neu() -> Arc<Self> {
        Arc::new(Self)
    }

    /// Routet eine eingehende Text-Nachricht
    pub fn dispatch(&self, hub: &Hub, verbindung: &Arc<Verbindung>, text: &str) {
        let nachricht = match EingehendeNachricht::parsen(text) {
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(client_id = %verbindung.client_id(), fehler = %e, "Ungueltiger Umschlag");
                verbindung.senden(fehler_nachricht(fehler::UNGUELTIGES_FORMAT));
                return;
            }
        };

        tracing::trace!(client_id = %verbindung.client_id(), typ = %nachricht.typ, "Nachricht empfangen");

        match nachricht.typ.as_str() {
            TYP_RAUM_ERSTELLEN => {
                if let Some(mut daten) = daten::<RaumErstellenDaten>(&nachricht, verbindung) {
                    daten.room_id = RaumId::normalisieren(&daten.room_id);
                    raum_handler::raum_erstellen(hub, verbindung, daten);
                }
            }
            TYP_RAUM_BEITRETEN => {
                if let Some(mut daten) = daten::<RaumBeitretenDaten>(&nachricht, verbindung) {
                    daten.room_id = RaumId::normalisieren(&daten.room_id);
                    raum_handler::raum_beitreten(hub, verbindung, daten);
                }
            }
            TYP_RAUM_VERLASSEN => {
                if let Some(mut daten) = daten::<RaumVerlassenDaten>(&nachricht, verbindung) {
                    daten.room_id = RaumId::normalisieren(&daten.room_id);
                    raum_handler::raum_verlassen(hub, verbindung, daten);
                }
            }
            TYP_PROFIL_AKTUALISIEREN => {
                if let Some(daten) = daten::<ProfilAktualisierenDaten>(&nachricht, verbindung) {
                    profil_handler::profil_aktualisieren(hub, verbindung, daten);
                }
            }
            TYP_ZUG_STARTEN => {
                if let Some(daten) = daten::<ZugStartenDaten>(&nachricht, verbindung) {
                    zug_handler::zug_starten(hub, verbindung, daten);
                }
            }
            TYP_RUNDRUF => {
                if let Some(mut daten) = daten::<RundrufDaten>(&nachricht, verbindung) {
                    daten.room_id = RaumId::normalisieren(&daten.room_id);
                    rundruf_handler::rundruf(hub, verbindung, daten);
                }
            }
            unbekannt => {
                tracing::debug!(client_id = %verbindung.client_id(), typ = %unbekannt, "Unbekannter Nachrichtentyp");
                verbindung.senden(fehler::unbekannter_typ(unbekannt));
            }
        }
    }
}

impl NachrichtenHandler for MessageDispatcher {
    fn verarbeiten(&self, hub: &Hub, verbindung: &Arc<Verbindung>, text: &str) {
        self.dispatch(hub, verbindung, text);
    }
}

/// Parst die Nutzdaten; bei Fehler geht `Invalid <typ> data` an den Absender
fn daten<T: DeserializeOwned>(nachricht: &EingehendeNachricht, verbindung: &Verbindung) -> Option<T> {
    match nachricht.daten::<T>() {
        Ok(daten) => Some(daten),
        Err(e) => {
            tracing::debug!(
                client_id = %verbindung.client_id(),
                typ = %nachricht.typ,
                fehler = %e,
                "Ungueltige Nutzdaten"
            );
            verbindung.senden(fehler::ungueltige_daten(&nachricht.typ));
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
