//! Identifikationstypen fuer Turntracker
//!
//! Beide IDs verwenden das Newtype-Pattern, damit Client- und Raum-IDs
//! zur Compilezeit nicht verwechselt werden koennen. Vom Client gelieferte
//! Werte werden vor der Verwendung immer ueber `parsen` validiert.

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

/// Laenge einer Client-ID in Hex-Zeichen (8 Zufallsbytes)
pub const CLIENT_ID_LAENGE: usize = 16;

/// Laenge einer Raum-ID
pub const RAUM_ID_LAENGE: usize = 4;

/// Erlaubte Zeichen einer Raum-ID
const RAUM_ID_ZEICHEN: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

// ---------------------------------------------------------------------------
// ClientId
// ---------------------------------------------------------------------------

/// Eindeutige Client-ID (16 Hex-Zeichen)
///
/// Unter allen lebenden Verbindungen eindeutig. Ueberlebt einen Reconnect,
/// wenn der Client seine alte ID beim Verbindungsaufbau mitschickt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Erzeugt eine neue zufaellige Client-ID
    pub fn generieren() -> Self {
        let mut bytes = [0u8; CLIENT_ID_LAENGE / 2];
        rand::thread_rng().fill_bytes(&mut bytes);
        let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        Self(hex)
    }

    /// Prueft das Format: genau 16 Hex-Zeichen (Gross- oder Kleinschreibung)
    pub fn ist_gueltig(wert: &str) -> bool {
        wert.len() == CLIENT_ID_LAENGE && wert.bytes().all(|b| b.is_ascii_hexdigit())
    }

    /// Uebernimmt einen vom Client gelieferten Wert, falls das Format stimmt
    ///
    /// Wird wie bei `generieren` in Kleinschreibung abgelegt, damit
    /// `AABB..` und `aabb..` dieselbe Identitaet sind.
    pub fn parsen(wert: &str) -> Option<Self> {
        Self::ist_gueltig(wert).then(|| Self(wert.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Erlaubt Lookups in `HashMap<ClientId, _>` direkt mit `&str`
impl std::borrow::Borrow<str> for ClientId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// RaumId
// ---------------------------------------------------------------------------

/// Raum-ID (4 Zeichen, Grossbuchstaben und Ziffern)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RaumId(String);

impl RaumId {
    /// Erzeugt eine zufaellige Raum-ID
    ///
    /// Kollisionen mit existierenden Raeumen prueft der Aufrufer.
    pub fn generieren() -> Self {
        let mut rng = rand::thread_rng();
        let id: String = (0..RAUM_ID_LAENGE)
            .map(|_| RAUM_ID_ZEICHEN[rng.gen_range(0..RAUM_ID_ZEICHEN.len())] as char)
            .collect();
        Self(id)
    }

    /// Prueft das Format: genau 4 Zeichen aus `A-Z0-9`
    pub fn ist_gueltig(wert: &str) -> bool {
        wert.len() == RAUM_ID_LAENGE
            && wert
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
    }

    /// Uebernimmt einen Wert, falls das Format stimmt (ohne Normalisierung)
    pub fn parsen(wert: &str) -> Option<Self> {
        Self::ist_gueltig(wert).then(|| Self(wert.to_string()))
    }

    /// Normalisiert eine Client-Eingabe auf Grossbuchstaben
    pub fn normalisieren(wert: &str) -> String {
        wert.to_uppercase()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RaumId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
