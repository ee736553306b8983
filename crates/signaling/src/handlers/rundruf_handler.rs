//! Rundruf-Handler – `broadcast`
//!
//! Leitet eine beliebige JSON-Nutzlast an alle Mitglieder des Raums
//! weiter, den Absender eingeschlossen. Der Server interpretiert die
//! Nutzlast nicht.

use std::sync::Arc;

use turntracker_core::RaumId;
use turntracker_protocol::fehler;
use turntracker_protocol::nachricht::{RundrufDaten, RundrufEmpfangenDaten};
use turntracker_protocol::ServerNachricht;

use super::{fehler_senden, rundsenden};
use crate::hub::Hub;
use crate::verbindung::Verbindung;

/// Verarbeitet `broadcast`
pub fn rundruf(hub: &Hub, verbindung: &Arc<Verbindung>, daten: RundrufDaten) {
    let Some(raum) = RaumId::parsen(&daten.room_id).and_then(|id| hub.raum_holen(&id)) else {
        fehler_senden(verbindung, fehler::RAUM_NICHT_GEFUNDEN);
        return;
    };

    let client_id = verbindung.client_id();
    if !raum.ist_mitglied(client_id.as_str()) {
        fehler_senden(verbindung, fehler::KEIN_MITGLIED);
        return;
    }

    rundsenden(
        hub,
        raum.id(),
        &ServerNachricht::Broadcast(RundrufEmpfangenDaten {
            room_id: raum.id().clone(),
            from: client_id.clone(),
            payload: daten.payload,
        }),
    );
    tracing::debug!(client_id = %client_id, raum_id = %raum.id(), "Rundruf weitergeleitet");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::raum_handler::raum_erstellen;
    use crate::handlers::test_hilfen::{client, test_hub};
    use serde_json::json;
    use turntracker_protocol::nachricht::RaumErstellenDaten;

    #[test]
    fn nutzlast_geht_an_alle_inklusive_absender() {
        let hub = test_hub();
        let mut a = client(&hub);
        raum_erstellen(
            &hub,
            &a.verbindung,
            RaumErstellenDaten { room_id: "CAST".into(), ..Default::default() },
        );
        a.erwarten("room_created");

        let nutzlast = json!({"wuerfel": [3, 5], "runde": 7});
        rundruf(
            &hub,
            &a.verbindung,
            RundrufDaten { room_id: "CAST".into(), payload: nutzlast.clone() },
        );
        let daten = a.erwarten("broadcast");
        assert_eq!(daten["from"], a.id().as_str());
        assert_eq!(daten["room_id"], "CAST");
        assert_eq!(daten["payload"], nutzlast);
    }

    #[test]
    fn fremder_raum_wird_abgelehnt() {
        let hub = test_hub();
        let mut a = client(&hub);
        let mut b = client(&hub);
        raum_erstellen(
            &hub,
            &a.verbindung,
            RaumErstellenDaten { room_id: "PRIV".into(), ..Default::default() },
        );
        a.erwarten("room_created");

        rundruf(&hub, &b.verbindung, RundrufDaten { room_id: "PRIV".into(), payload: json!(1) });
        b.fehler_erwarten(fehler::KEIN_MITGLIED);
        assert!(a.leer());

        rundruf(&hub, &b.verbindung, RundrufDaten { room_id: "NONE".into(), payload: json!(1) });
        b.fehler_erwarten(fehler::RAUM_NICHT_GEFUNDEN);
    }
}
