//! Profil-Handler – `update_profile`

use std::sync::Arc;

use turntracker_core::profil::{anzeigename_gueltig, farbe_gueltig};
use turntracker_protocol::fehler;
use turntracker_protocol::nachricht::{ProfilAktualisierenDaten, SpielerDaten};
use turntracker_protocol::ServerNachricht;

use super::{eigener_raum, fehler_senden, rundsenden};
use crate::hub::Hub;
use crate::verbindung::Verbindung;

/// Verarbeitet `update_profile`
///
/// Leere Felder bleiben unveraendert. Der Name wird getrimmt, die Farbe
/// zusaetzlich in Grossbuchstaben gewandelt.
pub fn profil_aktualisieren(hub: &Hub, verbindung: &Arc<Verbindung>, daten: ProfilAktualisierenDaten) {
    let Some(raum_id) = verbindung.raum_id() else {
        fehler_senden(verbindung, fehler::NICHT_IM_RAUM);
        return;
    };

    let bisher = verbindung.profil();
    let name = Some(daten.display_name.trim()).filter(|n| !n.is_empty());
    let farbe = Some(daten.color.trim().to_uppercase()).filter(|f| !f.is_empty());

    let name_neu = name.filter(|n| *n != bisher.anzeigename);
    let farbe_neu = farbe.filter(|f| *f != bisher.farbe);
    if name_neu.is_none() && farbe_neu.is_none() {
        return;
    }

    if name_neu.is_some_and(|n| !anzeigename_gueltig(n)) {
        fehler_senden(verbindung, fehler::UNGUELTIGER_NAME);
        return;
    }
    if farbe_neu.as_deref().is_some_and(|f| !farbe_gueltig(f)) {
        fehler_senden(verbindung, fehler::UNGUELTIGE_FARBE);
        return;
    }
    if eigener_raum(hub, verbindung).is_none() {
        return;
    }

    verbindung.profil_aktualisieren(name_neu.map(str::to_string), farbe_neu);
    let profil = verbindung.profil();
    rundsenden(
        hub,
        &raum_id,
        &ServerNachricht::ProfileUpdated(SpielerDaten {
            room_id: raum_id.clone(),
            peer_id: verbindung.client_id(),
            display_name: profil.anzeigename,
            color: profil.farbe,
            total_turn_time: verbindung.zugzeit_ms(),
        }),
    );
    tracing::info!(client_id = %verbindung.client_id(), raum_id = %raum_id, "Profil aktualisiert");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
