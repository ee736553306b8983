//! Verbindung – Zustand eines verbundenen Clients
//!
//! Eine `Verbindung` wird bei der Zulassung erzeugt und lebt, solange
//! Hub, Raeume oder Pumpen eine Referenz halten. Sie ist unabhaengig vom
//! Transport; die Pumpen in `connection` verbinden sie mit dem WebSocket.
//!
//! ## Senden
//! `senden` blockiert nie. Ist die Queue voll, wird die Nachricht fuer
//! diesen Empfaenger verworfen. Ist sie geschlossen (Verbindung im Abbau),
//! meldet das Ergebnis `Geschlossen`, damit der Aufrufer aufraeumen kann.

use std::sync::atomic::{AtomicI64, Ordering};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use turntracker_core::{ClientId, Profil, RaumId};
use turntracker_protocol::SpielerInfo;

use crate::rate_limit::{RateLimitKonfig, RateLimiter};

/// Ergebnis eines nicht-blockierenden Sendeversuchs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendeErgebnis {
    /// In die Queue eingereiht
    Eingereiht,
    /// Queue voll – langsamer Empfaenger, Nachricht verworfen
    Verworfen,
    /// Queue geschlossen – Verbindung wird abgebaut
    Geschlossen,
}

impl SendeErgebnis {
    pub fn ist_ok(self) -> bool {
        self == Self::Eingereiht
    }
}

/// Zustand einer einzelnen Client-Verbindung
pub struct Verbindung {
    /// Vom Hub vergeben; vor der Registrierung vorlaeufig
    client_id: RwLock<ClientId>,
    /// Beim Verbindungsaufbau mitgeschickte ID (Reconnect)
    angefragte_id: Option<String>,
    /// Quelladresse fuer die Verbindungszaehlung
    ip: String,
    raum_id: RwLock<Option<RaumId>>,
    profil: RwLock<Profil>,
    /// Summe aller beendeten Zuege in Millisekunden
    zugzeit_ms: AtomicI64,
    sende_tx: Mutex<Option<mpsc::Sender<Bytes>>>,
    rate_konfig: RateLimitKonfig,
    /// Wird erst bei der ersten Nachricht angelegt
    rate_limiter: Mutex<Option<RateLimiter>>,
    abbruch: CancellationToken,
}

impl Verbindung {
    /// Erstellt eine neue Verbindung und gibt die Empfangsseite der
    /// ausgehenden Queue zurueck
    pub fn neu(
        angefragte_id: Option<String>,
        ip: impl Into<String>,
        queue_groesse: usize,
        rate_konfig: RateLimitKonfig,
    ) -> (std::sync::Arc<Self>, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(queue_groesse.max(1));
        let verbindung = Self {
            client_id: RwLock::new(ClientId::generieren()),
            angefragte_id: angefragte_id.filter(|id| !id.is_empty()),
            ip: ip.into(),
            raum_id: RwLock::new(None),
            profil: RwLock::new(Profil::default()),
            zugzeit_ms: AtomicI64::new(0),
            sende_tx: Mutex::new(Some(tx)),
            rate_konfig,
            rate_limiter: Mutex::new(None),
            abbruch: CancellationToken::new(),
        };
        (std::sync::Arc::new(verbindung), rx)
    }

    // -----------------------------------------------------------------------
    // Identitaet
    // -----------------------------------------------------------------------

    pub fn client_id(&self) -> ClientId {
        self.client_id.read().clone()
    }

    pub(crate) fn client_id_setzen(&self, id: ClientId) {
        *self.client_id.write() = id;
    }

    pub fn angefragte_id(&self) -> Option<&str> {
        self.angefragte_id.as_deref()
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    // -----------------------------------------------------------------------
    // Raum und Profil
    // -----------------------------------------------------------------------

    pub fn raum_id(&self) -> Option<RaumId> {
        self.raum_id.read().clone()
    }

    pub fn raum_id_setzen(&self, raum_id: Option<RaumId>) {
        *self.raum_id.write() = raum_id;
    }

    pub fn profil(&self) -> Profil {
        self.profil.read().clone()
    }

    pub fn profil_setzen(&self, profil: Profil) {
        *self.profil.write() = profil;
    }

    /// Aendert nur die gesetzten Felder
    pub fn profil_aktualisieren(&self, anzeigename: Option<String>, farbe: Option<String>) {
        let mut profil = self.profil.write();
        if let Some(name) = anzeigename {
            profil.anzeigename = name;
        }
        if let Some(farbe) = farbe {
            profil.farbe = farbe;
        }
    }

    pub fn zugzeit_ms(&self) -> i64 {
        self.zugzeit_ms.load(Ordering::Acquire)
    }

    pub(crate) fn zugzeit_setzen(&self, ms: i64) {
        self.zugzeit_ms.store(ms, Ordering::Release);
    }

    /// Schreibt die Dauer eines beendeten Zuges gut
    pub(crate) fn zugzeit_gutschreiben(&self, ms: i64) {
        self.zugzeit_ms.fetch_add(ms.max(0), Ordering::AcqRel);
    }

    /// Oeffentliche Sicht fuer andere Spieler
    pub fn spieler_info(&self) -> SpielerInfo {
        let profil = self.profil.read();
        SpielerInfo {
            client_id: self.client_id(),
            display_name: profil.anzeigename.clone(),
            color: profil.farbe.clone(),
            total_turn_time: self.zugzeit_ms(),
        }
    }

    // -----------------------------------------------------------------------
    // Senden
    // -----------------------------------------------------------------------

    /// Reiht eine Nachricht nicht-blockierend ein
    pub fn senden(&self, nachricht: Bytes) -> SendeErgebnis {
        let sende_tx = self.sende_tx.lock();
        let Some(tx) = sende_tx.as_ref() else {
            return SendeErgebnis::Geschlossen;
        };
        match tx.try_send(nachricht) {
            Ok(()) => SendeErgebnis::Eingereiht,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    client_id = %self.client_id(),
                    "Send-Queue voll – Nachricht verworfen"
                );
                SendeErgebnis::Verworfen
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(
                    client_id = %self.client_id(),
                    "Send-Queue geschlossen (Client getrennt)"
                );
                SendeErgebnis::Geschlossen
            }
        }
    }

    /// Schliesst die ausgehende Queue; der Writer beendet sich daraufhin
    pub(crate) fn sende_queue_schliessen(&self) {
        self.sende_tx.lock().take();
    }

    // -----------------------------------------------------------------------
    // Rate Limit und Abbruch
    // -----------------------------------------------------------------------

    /// Prueft das Rate Limit fuer eine eingehende Nachricht
    pub fn rate_limit_pruefen(&self) -> bool {
        self.rate_limiter
            .lock()
            .get_or_insert_with(|| RateLimiter::neu(self.rate_konfig))
            .erlauben()
    }

    pub fn abbrechen(&self) {
        self.abbruch.cancel();
    }

    pub fn ist_abgebrochen(&self) -> bool {
        self.abbruch.is_cancelled()
    }

    /// Wird fertig, sobald die Verbindung abgebrochen wird
    pub fn abgebrochen(&self) -> WaitForCancellationFuture<'_> {
        self.abbruch.cancelled()
    }
}

impl std::fmt::Debug for Verbindung {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verbindung")
            .field("client_id", &self.client_id())
            .field("ip", &self.ip)
            .field("raum_id", &self.raum_id())
            .finish_non_exhaustive()
    }
}
