//! Spielerprofil – Anzeigename und Farbe
//!
//! Fehlende oder ungueltige Werte werden beim Erstellen/Beitreten durch
//! zufaellige, brettspiel-typische Werte ersetzt.

use rand::seq::SliceRandom;
use rand::Rng;

/// Maximale Laenge eines Anzeigenamens in Bytes
pub const MAX_ANZEIGENAME_LAENGE: usize = 50;

/// Obergrenze (exklusiv) fuer die Zahl hinter zufaelligen Namen
const MAX_NAMENSZAHL: u32 = 9999;

/// Klassische Spielfiguren-Farben
const BRETTSPIEL_FARBEN: &[&str] = &[
    "#FF0000", "#0066FF", "#00AA00", "#FFD700", "#FF6600", "#9932CC", "#8B4513", "#FF1493",
    "#00CED1",
];

/// Kurze Fantasienamen (Frontend hat wenig Platz)
const BRETTSPIEL_NAMEN: &[&str] = &[
    "Zorp", "Blip", "Flum", "Glork", "Snarf", "Blorp", "Quark", "Zing", "Fizz", "Wump", "Zara",
    "Kira", "Luna", "Zeph", "Nyx", "Rex", "Vex", "Zed", "Lex", "Jax", "Squish", "Bloop", "Plop",
    "Ding", "Bonk", "Zap", "Zoom", "Boom", "Ping", "Pow", "Axel", "Rune", "Faye", "Jade", "Sage",
    "Zane", "Mira", "Kai", "Blaze", "Nova", "Pixel", "Byte", "Code", "Data", "Bit",
];

/// Anzeigename und Farbe eines Spielers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profil {
    pub anzeigename: String,
    /// Farbe im Format `#RRGGBB`
    pub farbe: String,
}

impl Profil {
    /// Uebernimmt gueltige Werte und ersetzt leere/ungueltige zufaellig
    pub fn initialisieren(anzeigename: &str, farbe: &str) -> Self {
        let anzeigename = if anzeigename_gueltig(anzeigename) {
            anzeigename.to_string()
        } else {
            zufaelliger_anzeigename()
        };
        let farbe = if farbe_gueltig(farbe) {
            farbe.to_string()
        } else {
            zufaellige_farbe()
        };
        Self { anzeigename, farbe }
    }

    /// Ein Profil gilt als leer, wenn weder Name noch Farbe gesetzt sind
    pub fn ist_leer(&self) -> bool {
        self.anzeigename.is_empty() && self.farbe.is_empty()
    }
}

/// Anzeigename: nicht leer, hoechstens 50 Bytes
pub fn anzeigename_gueltig(name: &str) -> bool {
    !name.is_empty() && name.len() <= MAX_ANZEIGENAME_LAENGE
}

/// Farbe: `#RRGGBB`, Hex-Ziffern in beliebiger Schreibweise
pub fn farbe_gueltig(farbe: &str) -> bool {
    let bytes = farbe.as_bytes();
    bytes.len() == 7 && bytes[0] == b'#' && bytes[1..].iter().all(|b| b.is_ascii_hexdigit())
}

/// Zufaelliger Name wie `Zorp4711`
pub fn zufaelliger_anzeigename() -> String {
    let mut rng = rand::thread_rng();
    let name = BRETTSPIEL_NAMEN.choose(&mut rng).copied().unwrap_or("Zorp");
    let zahl = rng.gen_range(0..MAX_NAMENSZAHL);
    format!("{name}{zahl}")
}

/// Zufaellige Spielfiguren-Farbe
pub fn zufaellige_farbe() -> String {
    BRETTSPIEL_FARBEN
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("#FF0000")
        .to_string()
}
