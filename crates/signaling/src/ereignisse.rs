//! Raum-Ereignisse – Rueckrufe des Hubs an die Handler-Schicht
//!
//! Der Hub meldet zwei Ereignisse, die beim Entfernen eines Mitglieds
//! entstehen: ein Spieler hat den Raum verlassen, und ein laufender Zug
//! wurde dadurch beendet. Die Rueckrufe werden einmal beim Start gesetzt.

use std::sync::Arc;

use bytes::Bytes;
use turntracker_core::{ClientId, RaumId};
use turntracker_protocol::nachricht::{SpielerVerlassenDaten, ZugGewechseltDaten};
use turntracker_protocol::ServerNachricht;

use crate::hub::Hub;

/// Rueckrufe fuer Aenderungen an der Raum-Mitgliedschaft
pub trait RaumEreignisse: Send + Sync + 'static {
    /// Ein Spieler wurde aus einem nicht-leeren Raum entfernt
    ///
    /// `nachricht` ist eine bereits kodierte Nachricht, die statt der
    /// Standard-Benachrichtigung verteilt werden soll.
    fn spieler_verlassen(
        &self,
        hub: &Hub,
        raum_id: &RaumId,
        client_id: &ClientId,
        nachricht: Option<Bytes>,
    );

    /// Das Entfernen eines Mitglieds hat einen laufenden Zug beendet
    fn zug_beendet(&self, hub: &Hub, raum_id: &RaumId);
}

/// Standard-Rueckrufe: informieren die verbleibenden Spieler
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardEreignisse;

impl StandardEreignisse {
    pub fn neu() -> Arc<Self> {
        Arc::new(Self)
    }
}

impl RaumEreignisse for StandardEreignisse {
    fn spieler_verlassen(
        &self,
        hub: &Hub,
        raum_id: &RaumId,
        client_id: &ClientId,
        nachricht: Option<Bytes>,
    ) {
        let nachricht = match nachricht {
            Some(n) => n,
            None => {
                let kodiert = ServerNachricht::PlayerLeft(SpielerVerlassenDaten {
                    room_id: raum_id.clone(),
                    peer_id: client_id.clone(),
                })
                .kodieren();
                match kodiert {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::error!(fehler = %e, "player_left konnte nicht kodiert werden");
                        return;
                    }
                }
            }
        };
        hub.an_raum_senden(raum_id, nachricht);
    }

    fn zug_beendet(&self, hub: &Hub, raum_id: &RaumId) {
        let Some(raum) = hub.raum_holen(raum_id) else {
            return;
        };
        // Aktueller Zustand mit frischer Sequenznummer, im Normalfall "kein Zug"
        let zustand = raum.zug_momentaufnahme();
        let kodiert = ServerNachricht::TurnChanged(ZugGewechseltDaten {
            room_id: raum_id.clone(),
            current_turn: zustand.halter,
            turn_start_time: zustand.start_ms,
            sequence: zustand.sequenz,
        })
        .kodieren();
        match kodiert {
            Ok(bytes) => {
                hub.an_raum_senden(raum_id, bytes);
            }
            Err(e) => tracing::error!(fehler = %e, "turn_changed konnte nicht kodiert werden"),
        }
    }
}
