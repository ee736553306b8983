//! Raum-Handler – Create, Join, Leave
//!
//! Ein Raumwechsel laeuft in zwei Schritten: erst wird der alte Raum
//! verlassen (mit allen Benachrichtigungen), dann der neue betreten. Beide
//! Schritte sind einzeln gesperrt, nicht als eine Transaktion.

use std::sync::Arc;

use turntracker_core::{Profil, RaumId};
use turntracker_protocol::fehler;
use turntracker_protocol::nachricht::{
    RaumBeitretenDaten, RaumBetretenDaten, RaumErstellenDaten, RaumVerlassenDaten, SpielerDaten,
};
use turntracker_protocol::ServerNachricht;

use super::{antworten, fehler_senden};
use crate::hub::Hub;
use crate::raum::Raum;
use crate::verbindung::Verbindung;

/// Setzt das Profil der Verbindung fuer einen Raumeintritt
///
/// Fehlende Angaben uebernehmen den bisherigen Wert (z.B. nach einem
/// Reconnect); was dann noch fehlt oder ungueltig ist, wird zufaellig
/// erzeugt.
fn profil_uebernehmen(verbindung: &Verbindung, anzeigename: &str, farbe: &str) {
    let bisher = verbindung.profil();
    let anzeigename = if anzeigename.is_empty() { bisher.anzeigename.as_str() } else { anzeigename };
    let farbe = if farbe.is_empty() { bisher.farbe.as_str() } else { farbe };
    verbindung.profil_setzen(Profil::initialisieren(anzeigename, farbe));
}

/// Verlaesst den aktuellen Raum, falls es nicht `ziel` ist
fn vorherigen_raum_verlassen(hub: &Hub, verbindung: &Arc<Verbindung>, ziel: Option<&RaumId>, grund: &str) {
    let Some(alt) = verbindung.raum_id() else {
        return;
    };
    if ziel == Some(&alt) {
        return;
    }
    if hub.raum_existiert(&alt) {
        hub.client_aus_raum_entfernen(&alt, &verbindung.client_id(), grund);
    } else {
        tracing::debug!(client_id = %verbindung.client_id(), raum_id = %alt, "Vorheriger Raum existiert nicht mehr");
    }
    verbindung.raum_id_setzen(None);
}

/// Verarbeitet `create_room`
pub fn raum_erstellen(hub: &Hub, verbindung: &Arc<Verbindung>, daten: RaumErstellenDaten) {
    let gewuenscht = RaumId::parsen(&daten.room_id);
    if let Some(id) = &gewuenscht {
        if hub.raum_existiert(id) {
            fehler_senden(verbindung, fehler::RAUM_EXISTIERT_BEREITS);
            return;
        }
    }

    profil_uebernehmen(verbindung, &daten.display_name, &daten.color);
    vorherigen_raum_verlassen(hub, verbindung, None, "switching rooms");

    let client_id = verbindung.client_id();
    let raum = match gewuenscht {
        Some(id) => {
            let raum = Arc::new(Raum::neu(id, Some(client_id.clone())));
            if !hub.raum_hinzufuegen(Arc::clone(&raum)) {
                // Zwischen Pruefung und Anlegen von jemand anderem erstellt
                fehler_senden(verbindung, fehler::RAUM_EXISTIERT_BEREITS);
                return;
            }
            raum
        }
        None => loop {
            let raum = Arc::new(Raum::neu(RaumId::generieren(), Some(client_id.clone())));
            if hub.raum_hinzufuegen(Arc::clone(&raum)) {
                break raum;
            }
            tracing::debug!(raum_id = %raum.id(), "Raum-ID-Kollision, neue wird erzeugt");
        },
    };

    raum.client_hinzufuegen(Arc::clone(verbindung));
    verbindung.raum_id_setzen(Some(raum.id().clone()));

    antworten(
        verbindung,
        &ServerNachricht::RoomCreated(RaumBetretenDaten {
            room_id: raum.id().clone(),
            your_client_id: client_id.clone(),
            peers: raum.spieler_liste(),
            current_turn: raum.aktueller_zug_info(),
        }),
    );
    tracing::info!(
        raum_id = %raum.id(),
        client_id = %client_id,
        anzeigename = %verbindung.profil().anzeigename,
        "Raum erstellt"
    );
}

/// Verarbeitet `join_room`
pub fn raum_beitreten(hub: &Hub, verbindung: &Arc<Verbindung>, daten: RaumBeitretenDaten) {
    profil_uebernehmen(verbindung, &daten.display_name, &daten.color);

    let Some(raum_id) = RaumId::parsen(&daten.room_id) else {
        fehler_senden(verbindung, fehler::UNGUELTIGE_RAUM_ID);
        return;
    };
    if !hub.raum_existiert(&raum_id) {
        fehler_senden(verbindung, fehler::RAUM_NICHT_GEFUNDEN);
        return;
    }

    vorherigen_raum_verlassen(hub, verbindung, Some(&raum_id), "moved to another room");

    // Der Raum kann beim Verlassen des alten verschwunden sein
    let Some(raum) = hub.raum_holen(&raum_id) else {
        fehler_senden(verbindung, fehler::RAUM_GELOESCHT);
        return;
    };
    if !raum.client_hinzufuegen(Arc::clone(verbindung)) {
        fehler_senden(verbindung, fehler::BEREITS_IM_RAUM);
        return;
    }
    verbindung.raum_id_setzen(Some(raum_id.clone()));

    let client_id = verbindung.client_id();
    let profil = verbindung.profil();
    antworten(
        verbindung,
        &ServerNachricht::RoomJoined(RaumBetretenDaten {
            room_id: raum_id.clone(),
            your_client_id: client_id.clone(),
            peers: raum.spieler_liste(),
            current_turn: raum.aktueller_zug_info(),
        }),
    );

    let beigetreten = ServerNachricht::PlayerJoined(SpielerDaten {
        room_id: raum_id.clone(),
        peer_id: client_id.clone(),
        display_name: profil.anzeigename.clone(),
        color: profil.farbe,
        total_turn_time: verbindung.zugzeit_ms(),
    });
    match beigetreten.kodieren() {
        Ok(bytes) => {
            hub.an_raum_ausser_senden(&raum_id, Some(verbindung), bytes);
        }
        Err(e) => tracing::error!(fehler = %e, "player_joined konnte nicht kodiert werden"),
    }

    tracing::info!(
        raum_id = %raum_id,
        client_id = %client_id,
        anzeigename = %profil.anzeigename,
        "Client ist Raum beigetreten"
    );
}

/// Verarbeitet `leave_room`
pub fn raum_verlassen(hub: &Hub, verbindung: &Arc<Verbindung>, daten: RaumVerlassenDaten) {
    let Some(aktuell) = verbindung.raum_id() else {
        fehler_senden(verbindung, fehler::NICHT_IM_RAUM);
        return;
    };
    if aktuell.as_str() != daten.room_id {
        fehler_senden(verbindung, fehler::RAUM_ID_ABWEICHUNG);
        return;
    }
    if !hub.raum_existiert(&aktuell) {
        fehler_senden(verbindung, fehler::RAUM_NICHT_GEFUNDEN);
        return;
    }

    hub.client_aus_raum_entfernen(&aktuell, &verbindung.client_id(), "intentional leave");
    verbindung.raum_id_setzen(None);
    tracing::info!(raum_id = %aktuell, client_id = %verbindung.client_id(), "Client hat Raum verlassen");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
