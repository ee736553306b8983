//! WebSocket-Nachrichten (JSON)
//!
//! Jede Nachricht ist ein Umschlag `{"type": ..., "data": {...}}`.
//! Eingehende Nachrichten werden zweistufig geparst: zuerst der Umschlag,
//! dann die Nutzdaten passend zum Typ. So kann der Dispatcher zwischen
//! "unbekannter Typ" und "ungueltige Daten" unterscheiden.
//!
//! Ausgehende Nachrichten sind ein getaggtes Enum und werden einmal pro
//! Broadcast serialisiert, egal wie viele Empfaenger es gibt.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use turntracker_core::{ClientId, RaumId};

// ---------------------------------------------------------------------------
// Nachrichtentypen (Client -> Server)
// ---------------------------------------------------------------------------

pub const TYP_RAUM_ERSTELLEN: &str = "create_room";
pub const TYP_RAUM_BEITRETEN: &str = "join_room";
pub const TYP_RAUM_VERLASSEN: &str = "leave_room";
pub const TYP_PROFIL_AKTUALISIEREN: &str = "update_profile";
pub const TYP_ZUG_STARTEN: &str = "start_turn";
pub const TYP_RUNDRUF: &str = "broadcast";

/// Umschlag einer eingehenden Nachricht
///
/// `data` bleibt ungeparst, bis der Typ feststeht.
#[derive(Debug, Clone, Deserialize)]
pub struct EingehendeNachricht {
    #[serde(rename = "type", default)]
    pub typ: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl EingehendeNachricht {
    /// Parst den Umschlag eines Text-Frames
    pub fn parsen(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Parst die Nutzdaten in den erwarteten Typ
    ///
    /// Fehlendes oder `null`-`data` wird wie ein leeres Objekt behandelt.
    pub fn daten<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        if self.data.is_null() {
            return serde_json::from_value(serde_json::Value::Object(Default::default()));
        }
        T::deserialize(&self.data)
    }
}

/// `create_room` – Raum-ID ist optional, fehlt sie wird eine erzeugt
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RaumErstellenDaten {
    #[serde(default)]
    pub room_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub color: String,
}

/// `join_room`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RaumBeitretenDaten {
    #[serde(default)]
    pub room_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub color: String,
}

/// `leave_room`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RaumVerlassenDaten {
    #[serde(default)]
    pub room_id: String,
}

/// `update_profile` – leere Felder bleiben unveraendert
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfilAktualisierenDaten {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub color: String,
}

/// `start_turn` – optimistische Nebenlaeufigkeit
///
/// `current_turn` ist die Sicht des Clients auf den aktuellen Zughalter
/// (leer = kein Zug). Ein leeres `new_turn` beendet den Zug.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZugStartenDaten {
    #[serde(default)]
    pub current_turn: String,
    #[serde(default)]
    pub new_turn: String,
}

/// `broadcast` – beliebige JSON-Nutzlast an alle im Raum
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RundrufDaten {
    #[serde(default)]
    pub room_id: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

/// Oeffentliche Informationen ueber einen Spieler im Raum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpielerInfo {
    pub client_id: ClientId,
    pub display_name: String,
    pub color: String,
    /// Summe aller beendeten Zuege in Millisekunden
    pub total_turn_time: i64,
}

/// Antwort auf `create_room` und `join_room`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaumBetretenDaten {
    pub room_id: RaumId,
    pub your_client_id: ClientId,
    pub peers: Vec<SpielerInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_turn: Option<SpielerInfo>,
}

/// `player_joined` und `profile_updated`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpielerDaten {
    pub room_id: RaumId,
    pub peer_id: ClientId,
    pub display_name: String,
    pub color: String,
    pub total_turn_time: i64,
}

/// `player_left`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpielerVerlassenDaten {
    pub room_id: RaumId,
    pub peer_id: ClientId,
}

/// `turn_changed`
///
/// `current_turn` und `turn_start_time` sind entweder beide gesetzt oder
/// beide `null`. Die Sequenznummer erlaubt Clients, veraltete Nachrichten
/// zu verwerfen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZugGewechseltDaten {
    pub room_id: RaumId,
    pub current_turn: Option<SpielerInfo>,
    /// Unix-Zeitstempel in Millisekunden
    pub turn_start_time: Option<i64>,
    pub sequence: u64,
}

/// `broadcast` (weitergeleitet)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RundrufEmpfangenDaten {
    pub room_id: RaumId,
    pub from: ClientId,
    pub payload: serde_json::Value,
}

/// `error`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FehlerDaten {
    pub message: String,
}

/// Alle Nachrichten, die der Server an Clients sendet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerNachricht {
    RoomCreated(RaumBetretenDaten),
    RoomJoined(RaumBetretenDaten),
    PlayerJoined(SpielerDaten),
    PlayerLeft(SpielerVerlassenDaten),
    TurnChanged(ZugGewechseltDaten),
    ProfileUpdated(SpielerDaten),
    Broadcast(RundrufEmpfangenDaten),
    Error(FehlerDaten),
}

impl ServerNachricht {
    /// Serialisiert die Nachricht in einen teilbaren Puffer
    pub fn kodieren(&self) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Bytes::from)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
