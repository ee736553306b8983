//! Raum – Zug-Zustandsmaschine und Mitgliederliste einer Spielrunde
//!
//! Alle Operationen laufen unter einem Lock pro Raum; Raeume blockieren
//! sich nie gegenseitig.
//!
//! ## Zugzeit
//! Jedes Zugende (Uebergabe, explizites Ende, Entfernen des Halters)
//! schreibt dem bisherigen Halter `jetzt - start` in ganzen Millisekunden
//! gut. Dafuer gibt es genau eine Stelle: `zug_abschliessen`.
//!
//! Halter und Startzeit stecken gemeinsam in `Option<AktiverZug>`, koennen
//! also nur zusammen gesetzt oder geloescht werden.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use turntracker_core::{ClientId, RaumId};
use turntracker_protocol::SpielerInfo;

use crate::verbindung::Verbindung;

#[derive(Debug, Clone)]
struct AktiverZug {
    halter: ClientId,
    /// Monotone Startzeit fuer die Zeitabrechnung
    start: Instant,
    /// Wanduhr-Startzeit fuer Clients (Unix, Nanosekunden)
    start_unix_ns: i64,
}

#[derive(Default)]
struct RaumZustand {
    mitglieder: HashMap<ClientId, Arc<Verbindung>>,
    zug: Option<AktiverZug>,
    sequenz: u64,
}

impl RaumZustand {
    /// Beendet einen laufenden Zug und schreibt die Zeit gut
    fn zug_abschliessen(&mut self, jetzt: Instant) {
        if let Some(zug) = self.zug.take() {
            let dauer_ms = jetzt.saturating_duration_since(zug.start).as_millis();
            if let Some(halter) = self.mitglieder.get(&zug.halter) {
                halter.zugzeit_gutschreiben(i64::try_from(dauer_ms).unwrap_or(i64::MAX));
            }
        }
    }

    fn halter_info(&self) -> Option<SpielerInfo> {
        let zug = self.zug.as_ref()?;
        self.mitglieder.get(&zug.halter).map(|v| v.spieler_info())
    }
}

/// Ergebnis von `client_entfernen`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntfernenErgebnis {
    /// Client war Mitglied und wurde entfernt
    pub entfernt: bool,
    /// Der entfernte Client hielt den Zug
    pub hatte_zug: bool,
    /// Raum ist danach leer
    pub ist_leer: bool,
}

/// Konsistente Momentaufnahme des Zug-Zustands fuer `turn_changed`
#[derive(Debug, Clone)]
pub struct ZugMomentaufnahme {
    pub halter: Option<SpielerInfo>,
    /// Unix-Zeitstempel in Millisekunden
    pub start_ms: Option<i64>,
    pub sequenz: u64,
}

/// Eine Spielrunde
pub struct Raum {
    id: RaumId,
    erstellt_von: Option<ClientId>,
    /// `None` bei unbekanntem Erstellzeitpunkt; solche Raeume raeumt der
    /// Aufraeumer nie ab
    erstellt_am: Option<Instant>,
    zustand: RwLock<RaumZustand>,
}

impl Raum {
    pub fn neu(id: RaumId, erstellt_von: Option<ClientId>) -> Self {
        Self::neu_bei(id, erstellt_von, Some(Instant::now()))
    }

    /// Wie `neu`, aber mit vorgegebenem Erstellzeitpunkt
    pub fn neu_bei(id: RaumId, erstellt_von: Option<ClientId>, erstellt_am: Option<Instant>) -> Self {
        Self {
            id,
            erstellt_von,
            erstellt_am,
            zustand: RwLock::new(RaumZustand::default()),
        }
    }

    pub fn id(&self) -> &RaumId {
        &self.id
    }

    pub fn erstellt_von(&self) -> Option<&ClientId> {
        self.erstellt_von.as_ref()
    }

    pub fn erstellt_am(&self) -> Option<Instant> {
        self.erstellt_am
    }

    // -----------------------------------------------------------------------
    // Mitglieder
    // -----------------------------------------------------------------------

    /// Fuegt einen Client hinzu, falls seine ID noch nicht Mitglied ist
    pub fn client_hinzufuegen(&self, verbindung: Arc<Verbindung>) -> bool {
        let mut zustand = self.zustand.write();
        let id = verbindung.client_id();
        if zustand.mitglieder.contains_key(&id) {
            return false;
        }
        zustand.mitglieder.insert(id, verbindung);
        true
    }

    /// Entfernt einen Client; haelt er den Zug, wird dieser vorher beendet
    pub fn client_entfernen(&self, client_id: &str) -> EntfernenErgebnis {
        self.client_entfernen_bei(client_id, Instant::now())
    }

    pub fn client_entfernen_bei(&self, client_id: &str, jetzt: Instant) -> EntfernenErgebnis {
        let mut zustand = self.zustand.write();
        Self::entfernen_gesperrt(&mut zustand, client_id, jetzt)
    }

    /// Entfernt genau diese Verbindung, nicht eine neuere mit gleicher ID
    pub fn verbindung_entfernen(&self, verbindung: &Arc<Verbindung>) -> EntfernenErgebnis {
        let mut zustand = self.zustand.write();
        let id = verbindung.client_id();
        let gleiche = zustand
            .mitglieder
            .get(&id)
            .is_some_and(|mitglied| Arc::ptr_eq(mitglied, verbindung));
        if !gleiche {
            return EntfernenErgebnis {
                entfernt: false,
                hatte_zug: false,
                ist_leer: zustand.mitglieder.is_empty(),
            };
        }
        Self::entfernen_gesperrt(&mut zustand, id.as_str(), Instant::now())
    }

    fn entfernen_gesperrt(zustand: &mut RaumZustand, client_id: &str, jetzt: Instant) -> EntfernenErgebnis {
        if !zustand.mitglieder.contains_key(client_id) {
            return EntfernenErgebnis {
                entfernt: false,
                hatte_zug: false,
                ist_leer: zustand.mitglieder.is_empty(),
            };
        }

        let hatte_zug = zustand
            .zug
            .as_ref()
            .is_some_and(|zug| zug.halter.as_str() == client_id);
        if hatte_zug {
            // Zeit gutschreiben solange der Halter noch Mitglied ist
            zustand.zug_abschliessen(jetzt);
        }
        zustand.mitglieder.remove(client_id);

        EntfernenErgebnis {
            entfernt: true,
            hatte_zug,
            ist_leer: zustand.mitglieder.is_empty(),
        }
    }

    pub fn ist_mitglied(&self, client_id: &str) -> bool {
        self.zustand.read().mitglieder.contains_key(client_id)
    }

    pub fn mitglied(&self, client_id: &str) -> Option<Arc<Verbindung>> {
        self.zustand.read().mitglieder.get(client_id).cloned()
    }

    /// Momentaufnahme aller Mitglieder (fuer Broadcasts ausserhalb des Locks)
    pub fn mitglieder(&self) -> Vec<Arc<Verbindung>> {
        self.zustand.read().mitglieder.values().cloned().collect()
    }

    pub fn spieler_liste(&self) -> Vec<SpielerInfo> {
        self.zustand
            .read()
            .mitglieder
            .values()
            .map(|v| v.spieler_info())
            .collect()
    }

    pub fn anzahl(&self) -> usize {
        self.zustand.read().mitglieder.len()
    }

    pub fn ist_leer(&self) -> bool {
        self.zustand.read().mitglieder.is_empty()
    }

    // -----------------------------------------------------------------------
    // Zug-Zustandsmaschine
    // -----------------------------------------------------------------------

    /// Optimistischer Zugwechsel
    ///
    /// Gelingt nur, wenn `neu` Mitglied ist und der tatsaechliche Halter
    /// `erwartet` entspricht (leer = kein Zug). Sonst bleibt alles
    /// unveraendert.
    pub fn zug_setzen(&self, erwartet: &str, neu: &str) -> bool {
        self.zug_setzen_bei(erwartet, neu, Instant::now())
    }

    pub fn zug_setzen_bei(&self, erwartet: &str, neu: &str, jetzt: Instant) -> bool {
        let mut zustand = self.zustand.write();

        let Some(neuer_halter) = zustand.mitglieder.get_key_value(neu).map(|(id, _)| id.clone())
        else {
            return false;
        };
        let aktuell = zustand.zug.as_ref().map_or("", |zug| zug.halter.as_str());
        if aktuell != erwartet {
            return false;
        }

        zustand.zug_abschliessen(jetzt);
        zustand.zug = Some(AktiverZug {
            halter: neuer_halter,
            start: jetzt,
            start_unix_ns: unix_ns_jetzt(),
        });
        true
    }

    /// Beendet einen laufenden Zug; ohne Zug passiert nichts
    pub fn zug_beenden(&self) {
        self.zug_beenden_bei(Instant::now());
    }

    pub fn zug_beenden_bei(&self, jetzt: Instant) {
        self.zustand.write().zug_abschliessen(jetzt);
    }

    pub fn aktueller_zug(&self) -> Option<ClientId> {
        self.zustand.read().zug.as_ref().map(|zug| zug.halter.clone())
    }

    pub fn aktueller_zug_info(&self) -> Option<SpielerInfo> {
        self.zustand.read().halter_info()
    }

    /// Startzeit des laufenden Zuges (Unix, Millisekunden)
    pub fn zug_startzeit(&self) -> Option<i64> {
        self.zustand
            .read()
            .zug
            .as_ref()
            .map(|zug| zug.start_unix_ns / 1_000_000)
    }

    /// Naechste Sequenznummer; genau einmal pro `turn_changed` aufrufen
    pub fn zug_sequenz(&self) -> u64 {
        let mut zustand = self.zustand.write();
        zustand.sequenz += 1;
        zustand.sequenz
    }

    /// Halter, Startzeit und neue Sequenznummer unter einem Lock
    pub fn zug_momentaufnahme(&self) -> ZugMomentaufnahme {
        let mut zustand = self.zustand.write();
        zustand.sequenz += 1;
        ZugMomentaufnahme {
            halter: zustand.halter_info(),
            start_ms: zustand.zug.as_ref().map(|zug| zug.start_unix_ns / 1_000_000),
            sequenz: zustand.sequenz,
        }
    }
}

impl std::fmt::Debug for Raum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Raum")
            .field("id", &self.id)
            .field("mitglieder", &self.anzahl())
            .field("zug", &self.aktueller_zug())
            .finish()
    }
}

fn unix_ns_jetzt() -> i64 {
    let jetzt = chrono::Utc::now();
    jetzt
        .timestamp_nanos_opt()
        .unwrap_or_else(|| jetzt.timestamp_millis().saturating_mul(1_000_000))
}
