//! Zug-Handler – `start_turn`
//!
//! Der Client schickt seine Sicht auf den aktuellen Zughalter mit. Passt
//! sie nicht mehr, bekommt nur er den tatsaechlichen Zustand zurueck;
//! die anderen Spieler merken davon nichts.

use std::sync::Arc;

use turntracker_core::RaumId;
use turntracker_protocol::nachricht::{ZugGewechseltDaten, ZugStartenDaten};
use turntracker_protocol::ServerNachricht;

use super::{antworten, eigener_raum, rundsenden};
use crate::hub::Hub;
use crate::raum::{Raum, ZugMomentaufnahme};
use crate::verbindung::Verbindung;

fn zug_nachricht(raum_id: &RaumId, zustand: ZugMomentaufnahme) -> ServerNachricht {
    ServerNachricht::TurnChanged(ZugGewechseltDaten {
        room_id: raum_id.clone(),
        current_turn: zustand.halter,
        turn_start_time: zustand.start_ms,
        sequence: zustand.sequenz,
    })
}

/// Verarbeitet `start_turn`
pub fn zug_starten(hub: &Hub, verbindung: &Arc<Verbindung>, daten: ZugStartenDaten) {
    if daten.new_turn == daten.current_turn {
        return;
    }
    let Some(raum) = eigener_raum(hub, verbindung) else {
        return;
    };

    if daten.new_turn.is_empty() {
        zug_beenden(hub, verbindung, &raum);
        return;
    }

    if !raum.zug_setzen(&daten.current_turn, &daten.new_turn) {
        // Veraltete Sicht: nur dem Anfragenden den echten Zustand schicken
        antworten(verbindung, &zug_nachricht(raum.id(), raum.zug_momentaufnahme()));
        tracing::debug!(
            client_id = %verbindung.client_id(),
            raum_id = %raum.id(),
            erwartet = %daten.current_turn,
            "Zugwechsel abgelehnt, Zustand weicht ab"
        );
        return;
    }

    rundsenden(hub, raum.id(), &zug_nachricht(raum.id(), raum.zug_momentaufnahme()));
    tracing::info!(
        raum_id = %raum.id(),
        zughalter = %daten.new_turn,
        von = %verbindung.client_id(),
        "Zug gestartet"
    );
}

fn zug_beenden(hub: &Hub, verbindung: &Verbindung, raum: &Raum) {
    raum.zug_beenden();
    rundsenden(hub, raum.id(), &zug_nachricht(raum.id(), raum.zug_momentaufnahme()));
    tracing::info!(raum_id = %raum.id(), von = %verbindung.client_id(), "Zug beendet");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
