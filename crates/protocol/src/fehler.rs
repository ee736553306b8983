//! Fehlernachrichten an Clients
//!
//! Haeufige Fehler werden einmal kodiert und danach nur noch als
//! geteilter `Bytes`-Puffer ausgeliefert.

use std::collections::HashMap;
use std::sync::OnceLock;

use bytes::Bytes;

use crate::nachricht::{FehlerDaten, ServerNachricht};

pub const UNGUELTIGES_FORMAT: &str = "Invalid message format";
pub const RATE_LIMIT_UEBERSCHRITTEN: &str = "Rate limit exceeded";
pub const RAUM_NICHT_GEFUNDEN: &str = "Room not found";
pub const RAUM_EXISTIERT_BEREITS: &str = "Room already exists";
pub const RAUM_GELOESCHT: &str = "Room has been deleted";
pub const UNGUELTIGE_RAUM_ID: &str = "Invalid game ID format";
pub const BEREITS_IM_RAUM: &str = "Already in this room";
pub const NICHT_IM_RAUM: &str = "Not in a room";
pub const RAUM_ID_ABWEICHUNG: &str = "Room ID mismatch";
pub const UNGUELTIGER_NAME: &str = "Invalid display name";
pub const UNGUELTIGE_FARBE: &str = "Invalid color format (expected #RRGGBB)";
pub const KEIN_MITGLIED: &str = "Not a member of this room";

/// Praefix fuer unbekannte Nachrichtentypen
pub const UNBEKANNTER_TYP_PRAEFIX: &str = "Unknown message type: ";

/// Fehler, die vorkodiert im Cache liegen
const HAEUFIGE_FEHLER: &[&str] = &[
    UNGUELTIGES_FORMAT,
    RATE_LIMIT_UEBERSCHRITTEN,
    RAUM_NICHT_GEFUNDEN,
    RAUM_EXISTIERT_BEREITS,
    NICHT_IM_RAUM,
    KEIN_MITGLIED,
    "Invalid create_room data",
    "Invalid join_room data",
    "Invalid broadcast data",
];

/// Notfall-Nachricht falls die Serialisierung scheitert
const INTERNER_FEHLER: &[u8] = br#"{"type":"error","data":{"message":"Internal error"}}"#;

fn cache() -> &'static HashMap<&'static str, Bytes> {
    static CACHE: OnceLock<HashMap<&'static str, Bytes>> = OnceLock::new();
    CACHE.get_or_init(|| {
        HAEUFIGE_FEHLER
            .iter()
            .map(|text| (*text, kodieren(text)))
            .collect()
    })
}

fn kodieren(text: &str) -> Bytes {
    ServerNachricht::Error(FehlerDaten {
        message: text.to_string(),
    })
    .kodieren()
    .unwrap_or_else(|_| Bytes::from_static(INTERNER_FEHLER))
}

/// Liefert die kodierte `error`-Nachricht, aus dem Cache falls vorhanden
pub fn fehler_nachricht(text: &str) -> Bytes {
    match cache().get(text) {
        Some(bytes) => bytes.clone(),
        None => kodieren(text),
    }
}

/// `Unknown message type: <typ>`
pub fn unbekannter_typ(typ: &str) -> Bytes {
    let mut text = String::with_capacity(UNBEKANNTER_TYP_PRAEFIX.len() + typ.len());
    text.push_str(UNBEKANNTER_TYP_PRAEFIX);
    text.push_str(typ);
    fehler_nachricht(&text)
}

/// `Invalid <typ> data`
pub fn ungueltige_daten(typ: &str) -> Bytes {
    fehler_nachricht(&format!("Invalid {typ} data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_von(bytes: &Bytes) -> String {
        let wert: serde_json::Value = serde_json::from_slice(bytes).unwrap();
        assert_eq!(wert["type"], "error");
        wert["data"]["message"].as_str().unwrap().to_string()
    }

    #[test]
    fn haeufige_fehler_kommen_aus_dem_cache() {
        let a = fehler_nachricht(RAUM_NICHT_GEFUNDEN);
        let b = fehler_nachricht(RAUM_NICHT_GEFUNDEN);
        // Gleicher Puffer, keine neue Allokation
        assert_eq!(a.as_ptr(), b.as_ptr());
        assert_eq!(text_von(&a), "Room not found");
    }

    #[test]
    fn seltene_fehler_werden_frisch_kodiert() {
        let bytes = fehler_nachricht(UNGUELTIGE_FARBE);
        assert_eq!(text_von(&bytes), "Invalid color format (expected #RRGGBB)");
    }

    #[test]
    fn unbekannter_typ_text() {
        assert_eq!(text_von(&unbekannter_typ("dance")), "Unknown message type: dance");
    }

    #[test]
    fn ungueltige_daten_nutzt_cache() {
        let a = ungueltige_daten("join_room");
        let b = fehler_nachricht("Invalid join_room data");
        assert_eq!(a.as_ptr(), b.as_ptr());
        assert_eq!(text_von(&ungueltige_daten("start_turn")), "Invalid start_turn data");
    }
}
