//! Broadcast – Verteilt Nachrichten an die Mitglieder eines Raums
//!
//! Die Nachricht wird vom Aufrufer genau einmal kodiert; jeder Empfaenger
//! bekommt eine Referenz auf denselben Puffer. Die Mitgliederliste wird
//! unter dem Raum-Lock kopiert, gesendet wird danach ohne Lock.
//!
//! Ein voller Empfaenger verliert nur diese Nachricht. Ein Empfaenger mit
//! geschlossener Queue, der nicht mehr registriert ist, wird aus dem Raum
//! entfernt.

use std::sync::Arc;

use bytes::Bytes;
use turntracker_core::RaumId;

use crate::hub::Hub;
use crate::verbindung::{SendeErgebnis, Verbindung};

impl Hub {
    /// Sendet eine Nachricht an alle Mitglieder eines Raums
    ///
    /// Gibt die Anzahl der eingereihten Sendungen zurueck.
    pub fn an_raum_senden(&self, raum_id: &RaumId, nachricht: Bytes) -> usize {
        self.an_raum_ausser_senden(raum_id, None, nachricht)
    }

    /// Sendet eine Nachricht an alle Mitglieder ausser `ausgeschlossen`
    pub fn an_raum_ausser_senden(
        &self,
        raum_id: &RaumId,
        ausgeschlossen: Option<&Arc<Verbindung>>,
        nachricht: Bytes,
    ) -> usize {
        let Some(raum) = self.raum_holen(raum_id) else {
            tracing::debug!(raum_id = %raum_id, "Broadcast an unbekannten Raum");
            return 0;
        };

        let mut gesendet = 0;
        let mut tote = Vec::new();
        for mitglied in raum.mitglieder() {
            if ausgeschlossen.is_some_and(|a| Arc::ptr_eq(a, &mitglied)) {
                continue;
            }
            match mitglied.senden(nachricht.clone()) {
                SendeErgebnis::Eingereiht => gesendet += 1,
                SendeErgebnis::Verworfen => {}
                SendeErgebnis::Geschlossen => {
                    if !self.ist_registriert(&mitglied) {
                        tote.push(mitglied);
                    }
                }
            }
        }

        for tot in tote {
            tracing::debug!(
                client_id = %tot.client_id(),
                raum_id = %raum_id,
                "Getrennten Empfaenger aus Raum entfernen"
            );
            self.verbindung_aus_raum_entfernen(raum_id, &tot, "send_failed");
        }
        gesendet
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
