//! Hub – Register aller Verbindungen und Raeume
//!
//! Der Hub ist die einzige Stelle fuer Zulassung, Identitaet und das
//! Raumverzeichnis. Er wird beim Start einmal erzeugt und per `Clone`
//! (geteilter innerer Zustand) an alle Tasks weitergereicht.
//!
//! ## Registrierung
//! Registrierungen und Abmeldungen laufen ueber eine begrenzte Queue und
//! werden von genau einem Koordinations-Task abgearbeitet. Damit sind
//! Registrierung und Abmeldung derselben Identitaet nie nebenlaeufig.
//!
//! ```text
//! Unregistriert --registrieren--> Live (ohne Raum)
//! Live (ohne Raum) --create/join--> Live (im Raum) --leave--> Live (ohne Raum)
//! Live --abmelden--> Weg  (+ GetrennterClient, falls Raum und Profil)
//! GetrennterClient --Reconnect innerhalb TTL--> Live
//! GetrennterClient --TTL abgelaufen--> entfernt
//! ```
//!
//! ## Locks
//! Raumverzeichnis und Client-Set haben je ein RwLock, die Zaehler pro
//! Adresse ein Mutex, der globale Zaehler ist atomar. Kein Lock wird ueber
//! Netzwerk-I/O oder Rueckrufe hinweg gehalten.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use turntracker_core::{ClientId, Profil, RaumId};

use crate::config::SignalingConfig;
use crate::error::{SignalingError, SignalingResult};
use crate::ereignisse::RaumEreignisse;
use crate::puffer_pool::PufferPool;
use crate::raum::{EntfernenErgebnis, Raum};
use crate::verbindung::Verbindung;

// ---------------------------------------------------------------------------
// GetrennterClient
// ---------------------------------------------------------------------------

/// Momentaufnahme eines getrennten Clients fuer den Reconnect
#[derive(Debug, Clone)]
pub struct GetrennterClient {
    pub client_id: ClientId,
    pub profil: Profil,
    pub zugzeit_ms: i64,
    pub letzter_raum: RaumId,
    pub getrennt_am: Instant,
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

enum HubBefehl {
    Registrieren {
        verbindung: Arc<Verbindung>,
        antwort: oneshot::Sender<ClientId>,
    },
    Abmelden(Arc<Verbindung>),
}

/// Zentrales Register; Clone teilt den inneren Zustand
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

struct HubInner {
    config: SignalingConfig,
    raeume: RwLock<HashMap<RaumId, Arc<Raum>>>,
    clients: RwLock<HashMap<ClientId, Arc<Verbindung>>>,
    getrennte: DashMap<ClientId, GetrennterClient>,
    /// Verbindungen pro Quelladresse
    ip_verbindungen: Mutex<HashMap<String, u32>>,
    /// Verbindungen insgesamt (zugelassen, nicht nur registriert)
    verbindungen: AtomicU32,
    befehl_tx: mpsc::Sender<HubBefehl>,
    befehl_rx: Mutex<Option<mpsc::Receiver<HubBefehl>>>,
    ereignisse: OnceLock<Arc<dyn RaumEreignisse>>,
    puffer_pool: PufferPool,
    tasks: TaskTracker,
    shutdown: CancellationToken,
}

impl Hub {
    /// Erstellt einen neuen Hub. Hintergrund-Tasks startet `starten`.
    pub fn neu(config: SignalingConfig) -> Self {
        let (befehl_tx, befehl_rx) = mpsc::channel(config.registrier_queue_groesse.max(1));
        Self {
            inner: Arc::new(HubInner {
                config,
                raeume: RwLock::new(HashMap::new()),
                clients: RwLock::new(HashMap::new()),
                getrennte: DashMap::new(),
                ip_verbindungen: Mutex::new(HashMap::new()),
                verbindungen: AtomicU32::new(0),
                befehl_tx,
                befehl_rx: Mutex::new(Some(befehl_rx)),
                ereignisse: OnceLock::new(),
                puffer_pool: PufferPool::neu(),
                tasks: TaskTracker::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Startet den Koordinations-Task und die Aufraeumer
    ///
    /// Ein zweiter Aufruf hat keine Wirkung.
    pub fn starten(&self) {
        let Some(befehl_rx) = self.inner.befehl_rx.lock().take() else {
            tracing::warn!("Hub wurde bereits gestartet");
            return;
        };
        let hub = self.clone();
        self.inner.tasks.spawn(async move { hub.koordinieren(befehl_rx).await });
        self.aufraeumer_starten();
        tracing::info!(
            max_verbindungen = self.inner.config.max_verbindungen,
            max_pro_ip = self.inner.config.max_verbindungen_pro_ip,
            "Hub gestartet"
        );
    }

    pub fn config(&self) -> &SignalingConfig {
        &self.inner.config
    }

    pub fn puffer_pool(&self) -> &PufferPool {
        &self.inner.puffer_pool
    }

    /// Setzt die Raum-Rueckrufe. Nur der erste Aufruf wirkt.
    pub fn ereignisse_setzen(&self, ereignisse: Arc<dyn RaumEreignisse>) -> bool {
        self.inner.ereignisse.set(ereignisse).is_ok()
    }

    /// Startet einen Task, auf den `herunterfahren` wartet
    pub fn task_starten<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.inner.tasks.spawn(task);
    }

    /// Token, das beim Herunterfahren ausgeloest wird
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    // -----------------------------------------------------------------------
    // Zulassung
    // -----------------------------------------------------------------------

    /// Reserviert einen globalen und einen Adress-Platz
    ///
    /// Der globale Platz wird lock-frei per CAS reserviert und wieder
    /// freigegeben, wenn das Adresslimit greift. Leere Adressen werden
    /// immer abgelehnt.
    pub fn ip_registrieren(&self, ip: &str) -> bool {
        if ip.is_empty() {
            return false;
        }

        let max = self.inner.config.max_verbindungen;
        let global_reserviert = self
            .inner
            .verbindungen
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max).then_some(n + 1))
            .is_ok();
        if !global_reserviert {
            tracing::warn!(ip = %ip, max, "Globales Verbindungslimit erreicht");
            return false;
        }

        let mut pro_ip = self.inner.ip_verbindungen.lock();
        let anzahl = pro_ip.entry(ip.to_string()).or_insert(0);
        if *anzahl >= self.inner.config.max_verbindungen_pro_ip {
            if *anzahl == 0 {
                pro_ip.remove(ip);
            }
            drop(pro_ip);
            self.global_freigeben();
            tracing::warn!(ip = %ip, "Verbindungslimit pro Adresse erreicht");
            return false;
        }
        *anzahl += 1;
        true
    }

    /// Gibt die mit `ip_registrieren` reservierten Plaetze frei
    pub fn ip_abmelden(&self, ip: &str) {
        if ip.is_empty() {
            return;
        }
        let mut pro_ip = self.inner.ip_verbindungen.lock();
        match pro_ip.get_mut(ip) {
            Some(anzahl) if *anzahl > 1 => *anzahl -= 1,
            Some(_) => {
                pro_ip.remove(ip);
            }
            // Nie registriert: auch global nichts freigeben
            None => return,
        }
        drop(pro_ip);
        self.global_freigeben();
    }

    fn global_freigeben(&self) {
        let _ = self
            .inner
            .verbindungen
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// Anzahl zugelassener Verbindungen
    pub fn verbindungs_anzahl(&self) -> u32 {
        self.inner.verbindungen.load(Ordering::Acquire)
    }

    /// Anzahl zugelassener Verbindungen einer Adresse
    pub fn ip_anzahl(&self, ip: &str) -> u32 {
        self.inner.ip_verbindungen.lock().get(ip).copied().unwrap_or(0)
    }

    // -----------------------------------------------------------------------
    // Registrierung
    // -----------------------------------------------------------------------

    /// Registriert eine Verbindung und gibt ihre endgueltige Client-ID zurueck
    ///
    /// Wartet, bis der Koordinations-Task die Registrierung bestaetigt hat.
    pub async fn registrieren(&self, verbindung: &Arc<Verbindung>) -> SignalingResult<ClientId> {
        if self.inner.shutdown.is_cancelled() {
            return Err(SignalingError::HubBeendet);
        }
        let (antwort, bestaetigung) = oneshot::channel();
        self.inner
            .befehl_tx
            .send(HubBefehl::Registrieren {
                verbindung: Arc::clone(verbindung),
                antwort,
            })
            .await
            .map_err(|_| SignalingError::HubBeendet)?;

        tokio::select! {
            _ = self.inner.shutdown.cancelled() => Err(SignalingError::HubBeendet),
            id = bestaetigung => id.map_err(|_| SignalingError::HubBeendet),
        }
    }

    /// Meldet eine Verbindung ab; ohne Registrierung passiert nichts
    pub async fn abmelden(&self, verbindung: &Arc<Verbindung>) {
        if !self.inner.shutdown.is_cancelled() {
            let befehl = HubBefehl::Abmelden(Arc::clone(verbindung));
            if self.inner.befehl_tx.send(befehl).await.is_ok() {
                return;
            }
        }
        // Koordination laeuft nicht mehr: direkt abarbeiten
        self.abmeldung_verarbeiten(verbindung);
    }

    async fn koordinieren(self, mut befehl_rx: mpsc::Receiver<HubBefehl>) {
        loop {
            tokio::select! {
                _ = self.inner.shutdown.cancelled() => break,
                befehl = befehl_rx.recv() => match befehl {
                    Some(HubBefehl::Registrieren { verbindung, antwort }) => {
                        let id = self.registrierung_verarbeiten(&verbindung);
                        if antwort.send(id).is_err() {
                            // Aufrufer ist weg, Verbindung wieder abbauen
                            self.abmeldung_verarbeiten(&verbindung);
                        }
                    }
                    Some(HubBefehl::Abmelden(verbindung)) => {
                        self.abmeldung_verarbeiten(&verbindung);
                    }
                    None => break,
                },
            }
        }
        tracing::debug!("Hub-Koordination beendet");
    }

    /// Vergibt die Identitaet und nimmt die Verbindung ins Client-Set auf
    pub(crate) fn registrierung_verarbeiten(&self, verbindung: &Arc<Verbindung>) -> ClientId {
        let mut clients = self.inner.clients.write();

        let mut wiederhergestellt = false;
        let mut client_id = None;
        if let Some(roh) = verbindung.angefragte_id() {
            match ClientId::parsen(roh) {
                None => {
                    tracing::debug!(angefragt = %roh, "Ungueltiges Client-ID-Format, neue wird erzeugt");
                }
                Some(angefragt) if clients.contains_key(&angefragt) => {
                    tracing::warn!(angefragt = %angefragt, "Client-ID bereits vergeben, neue wird erzeugt");
                }
                Some(angefragt) => match self.inner.getrennte.remove(&angefragt) {
                    Some((id, getrennt)) => {
                        verbindung.profil_setzen(getrennt.profil);
                        verbindung.zugzeit_setzen(getrennt.zugzeit_ms);
                        wiederhergestellt = true;
                        client_id = Some(id);
                    }
                    None => client_id = Some(angefragt),
                },
            }
        }

        let client_id = client_id.unwrap_or_else(|| loop {
            let id = ClientId::generieren();
            if !clients.contains_key(&id) {
                break id;
            }
        });

        verbindung.client_id_setzen(client_id.clone());
        clients.insert(client_id.clone(), Arc::clone(verbindung));
        drop(clients);

        if wiederhergestellt {
            tracing::info!(client_id = %client_id, ip = %verbindung.ip(), "Client wiederverbunden (Daten wiederhergestellt)");
        } else {
            tracing::info!(client_id = %client_id, ip = %verbindung.ip(), "Client registriert");
        }
        client_id
    }

    /// Entfernt die Verbindung, gibt Plaetze frei und merkt sich den
    /// Client fuer einen Reconnect
    pub(crate) fn abmeldung_verarbeiten(&self, verbindung: &Arc<Verbindung>) {
        let client_id = verbindung.client_id();
        {
            let mut clients = self.inner.clients.write();
            let registriert = clients
                .get(&client_id)
                .is_some_and(|v| Arc::ptr_eq(v, verbindung));
            if !registriert {
                return;
            }
            clients.remove(&client_id);
        }

        verbindung.sende_queue_schliessen();
        verbindung.abbrechen();
        self.ip_abmelden(verbindung.ip());

        let Some(raum_id) = verbindung.raum_id() else {
            tracing::info!(client_id = %client_id, "Client abgemeldet (kein Raum)");
            return;
        };

        // Erst entfernen: ein laufender Zug wird dabei der Verbindung
        // gutgeschrieben, der Datensatz enthaelt dann die volle Zugzeit
        self.client_aus_raum_entfernen(&raum_id, &client_id, "disconnect");

        let profil = verbindung.profil();
        if !profil.ist_leer() {
            self.inner.getrennte.insert(
                client_id.clone(),
                GetrennterClient {
                    client_id: client_id.clone(),
                    profil,
                    zugzeit_ms: verbindung.zugzeit_ms(),
                    letzter_raum: raum_id.clone(),
                    getrennt_am: Instant::now(),
                },
            );
            tracing::debug!(client_id = %client_id, "Daten des getrennten Clients gespeichert");
        }
        tracing::info!(client_id = %client_id, raum_id = %raum_id, "Client abgemeldet");
    }

    /// Ist genau diese Verbindung noch registriert?
    pub fn ist_registriert(&self, verbindung: &Arc<Verbindung>) -> bool {
        self.inner
            .clients
            .read()
            .get(&verbindung.client_id())
            .is_some_and(|v| Arc::ptr_eq(v, verbindung))
    }

    pub fn client_anzahl(&self) -> usize {
        self.inner.clients.read().len()
    }

    // -----------------------------------------------------------------------
    // Getrennte Clients
    // -----------------------------------------------------------------------

    pub fn getrennter_client(&self, client_id: &str) -> Option<GetrennterClient> {
        self.inner.getrennte.get(client_id).map(|e| e.value().clone())
    }

    pub fn getrennte_anzahl(&self) -> usize {
        self.inner.getrennte.len()
    }

    pub(crate) fn getrennte(&self) -> &DashMap<ClientId, GetrennterClient> {
        &self.inner.getrennte
    }

    // -----------------------------------------------------------------------
    // Raumverzeichnis
    // -----------------------------------------------------------------------

    pub fn raum_holen(&self, raum_id: &RaumId) -> Option<Arc<Raum>> {
        self.inner.raeume.read().get(raum_id).cloned()
    }

    /// Fuegt einen Raum hinzu; existiert die ID schon, passiert nichts
    pub fn raum_hinzufuegen(&self, raum: Arc<Raum>) -> bool {
        let mut raeume = self.inner.raeume.write();
        if raeume.contains_key(raum.id()) {
            return false;
        }
        raeume.insert(raum.id().clone(), raum);
        true
    }

    pub fn raum_loeschen(&self, raum_id: &RaumId) -> Option<Arc<Raum>> {
        self.inner.raeume.write().remove(raum_id)
    }

    pub fn raum_existiert(&self, raum_id: &RaumId) -> bool {
        self.inner.raeume.read().contains_key(raum_id)
    }

    pub fn raum_anzahl(&self) -> usize {
        self.inner.raeume.read().len()
    }

    /// Momentaufnahme aller Raeume
    pub(crate) fn raeume(&self) -> Vec<Arc<Raum>> {
        self.inner.raeume.read().values().cloned().collect()
    }

    pub(crate) fn raeume_loeschen_wenn(&self, mut loeschen: impl FnMut(&Raum) -> bool) -> Vec<Arc<Raum>> {
        let mut raeume = self.inner.raeume.write();
        let ids: Vec<RaumId> = raeume
            .iter()
            .filter(|(_, raum)| loeschen(raum))
            .map(|(id, _)| id.clone())
            .collect();
        ids.iter().filter_map(|id| raeume.remove(id)).collect()
    }

    // -----------------------------------------------------------------------
    // Raum-Mitgliedschaft
    // -----------------------------------------------------------------------

    /// Entfernt einen Client aus einem Raum und benachrichtigt die Uebrigen
    ///
    /// Idempotent. Wird der Raum leer, bleibt er bestehen; geloescht wird er
    /// nur vom Aufraeumer.
    pub fn client_aus_raum_entfernen(&self, raum_id: &RaumId, client_id: &ClientId, grund: &str) {
        let Some(raum) = self.raum_holen(raum_id) else {
            return;
        };
        let ergebnis = raum.client_entfernen(client_id.as_str());
        self.entfernung_melden(raum_id, client_id, ergebnis, grund);
    }

    /// Wie `client_aus_raum_entfernen`, entfernt aber nur genau diese
    /// Verbindung
    pub fn verbindung_aus_raum_entfernen(&self, raum_id: &RaumId, verbindung: &Arc<Verbindung>, grund: &str) {
        let Some(raum) = self.raum_holen(raum_id) else {
            return;
        };
        let ergebnis = raum.verbindung_entfernen(verbindung);
        self.entfernung_melden(raum_id, &verbindung.client_id(), ergebnis, grund);
    }

    fn entfernung_melden(
        &self,
        raum_id: &RaumId,
        client_id: &ClientId,
        ergebnis: EntfernenErgebnis,
        grund: &str,
    ) {
        if !ergebnis.entfernt {
            return;
        }
        if ergebnis.ist_leer {
            tracing::debug!(raum_id = %raum_id, "Raum ist leer (wird vom Aufraeumer entfernt)");
            return;
        }

        let ereignisse = self.inner.ereignisse.get();
        if ergebnis.hatte_zug {
            if let Some(ereignisse) = ereignisse {
                ereignisse.zug_beendet(self, raum_id);
            }
        }
        if let Some(ereignisse) = ereignisse {
            ereignisse.spieler_verlassen(self, raum_id, client_id, None);
        }
        tracing::info!(client_id = %client_id, raum_id = %raum_id, grund, "Client aus Raum entfernt");
    }

    // -----------------------------------------------------------------------
    // Shutdown
    // -----------------------------------------------------------------------

    /// Faehrt den Hub herunter
    ///
    /// Loest das Shutdown-Signal aus, bricht jede Verbindung ab und wartet
    /// hoechstens `frist` auf alle Hintergrund-Tasks. Gibt `false` zurueck,
    /// wenn die Frist abgelaufen ist.
    pub async fn herunterfahren(&self, frist: Duration) -> bool {
        tracing::info!("Hub wird heruntergefahren");
        self.inner.shutdown.cancel();

        let clients: Vec<Arc<Verbindung>> = self.inner.clients.read().values().cloned().collect();
        for verbindung in &clients {
            verbindung.abbrechen();
        }

        self.inner.tasks.close();
        match tokio::time::timeout(frist, self.inner.tasks.wait()).await {
            Ok(()) => {
                tracing::info!(verbindungen = clients.len(), "Hub heruntergefahren");
                true
            }
            Err(_) => {
                tracing::warn!(
                    offen = self.inner.tasks.len(),
                    "Shutdown-Frist abgelaufen, Tasks laufen noch"
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("clients", &self.client_anzahl())
            .field("raeume", &self.raum_anzahl())
            .field("verbindungen", &self.verbindungs_anzahl())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::RateLimitKonfig;
    use bytes::Bytes;
    use parking_lot::Mutex as TestMutex;

    fn test_hub(max: u32, max_pro_ip: u32) -> Hub {
        Hub::neu(SignalingConfig {
            max_verbindungen: max,
            max_verbindungen_pro_ip: max_pro_ip,
            ..SignalingConfig::default()
        })
    }

    fn verbindung(angefragt: Option<&str>) -> (Arc<Verbindung>, mpsc::Receiver<Bytes>) {
        Verbindung::neu(
            angefragt.map(str::to_string),
            "10.0.0.1",
            16,
            RateLimitKonfig::default(),
        )
    }

    fn raum_id(s: &str) -> RaumId {
        RaumId::parsen(s).unwrap()
    }

    /// Zeichnet Rueckrufe auf
    #[derive(Default)]
    struct Aufzeichnung {
        verlassen: TestMutex<Vec<(RaumId, ClientId)>>,
        zug_beendet: TestMutex<Vec<RaumId>>,
    }

    impl RaumEreignisse for Aufzeichnung {
        fn spieler_verlassen(&self, _: &Hub, raum_id: &RaumId, client_id: &ClientId, _: Option<Bytes>) {
            self.verlassen.lock().push((raum_id.clone(), client_id.clone()));
        }
        fn zug_beendet(&self, _: &Hub, raum_id: &RaumId) {
            self.zug_beendet.lock().push(raum_id.clone());
        }
    }

    // --- Zulassung ---

    #[test]
    fn leere_adresse_wird_abgelehnt() {
        let hub = test_hub(10, 10);
        assert!(!hub.ip_registrieren(""));
        assert_eq!(hub.verbindungs_anzahl(), 0);
    }

    #[test]
    fn globales_limit_greift_unabhaengig_von_adresse() {
        let hub = test_hub(2, 10);
        assert!(hub.ip_registrieren("1.1.1.1"));
        assert!(hub.ip_registrieren("2.2.2.2"));
        assert!(!hub.ip_registrieren("3.3.3.3"));
        assert_eq!(hub.verbindungs_anzahl(), 2);
        // Adresszaehler bleibt unveraendert
        assert_eq!(hub.ip_anzahl("3.3.3.3"), 0);
    }

    #[test]
    fn adresslimit_gibt_globale_reservierung_zurueck() {
        let hub = test_hub(100, 2);
        assert!(hub.ip_registrieren("1.1.1.1"));
        assert!(hub.ip_registrieren("1.1.1.1"));
        assert!(!hub.ip_registrieren("1.1.1.1"));
        assert_eq!(hub.verbindungs_anzahl(), 2);
        assert_eq!(hub.ip_anzahl("1.1.1.1"), 2);
        // Andere Adresse hat noch Platz
        assert!(hub.ip_registrieren("2.2.2.2"));
    }

    #[test]
    fn ip_abmelden_gibt_plaetze_frei() {
        let hub = test_hub(1, 1);
        assert!(hub.ip_registrieren("1.1.1.1"));
        assert!(!hub.ip_registrieren("2.2.2.2"));
        hub.ip_abmelden("1.1.1.1");
        assert_eq!(hub.verbindungs_anzahl(), 0);
        assert_eq!(hub.ip_anzahl("1.1.1.1"), 0);
        assert!(hub.ip_registrieren("2.2.2.2"));
        // Unbekannte Adresse aendert nichts
        hub.ip_abmelden("9.9.9.9");
        assert_eq!(hub.verbindungs_anzahl(), 1);
    }

    #[test]
    fn zulassung_unter_last_bleibt_im_limit() {
        let hub = test_hub(50, 1000);
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let hub = hub.clone();
                std::thread::spawn(move || (0..20).filter(|_| hub.ip_registrieren("1.2.3.4")).count())
            })
            .collect();
        let zugelassen: usize = threads.into_iter().map(|t| t.join().unwrap()).sum();
        assert_eq!(zugelassen, 50);
        assert_eq!(hub.verbindungs_anzahl(), 50);
        assert_eq!(hub.ip_anzahl("1.2.3.4"), 50);
    }

    // --- Registrierung ---

    #[test]
    fn registrierung_ohne_id_erzeugt_neue() {
        let hub = test_hub(10, 10);
        let (v, _rx) = verbindung(None);
        let id = hub.registrierung_verarbeiten(&v);
        assert!(ClientId::ist_gueltig(id.as_str()));
        assert_eq!(v.client_id(), id);
        assert!(hub.ist_registriert(&v));
    }

    #[test]
    fn gueltige_angefragte_id_wird_uebernommen() {
        let hub = test_hub(10, 10);
        let (v, _rx) = verbindung(Some("00112233445566ff"));
        assert_eq!(hub.registrierung_verarbeiten(&v).as_str(), "00112233445566ff");
    }

    #[test]
    fn ungueltige_angefragte_id_wird_ersetzt() {
        let hub = test_hub(10, 10);
        let (v, _rx) = verbindung(Some("<script>"));
        let id = hub.registrierung_verarbeiten(&v);
        assert_ne!(id.as_str(), "<script>");
        assert!(ClientId::ist_gueltig(id.as_str()));
    }

    #[test]
    fn kollidierende_id_wird_ersetzt() {
        let hub = test_hub(10, 10);
        let (a, _ra) = verbindung(Some("aaaaaaaaaaaaaaaa"));
        let (b, _rb) = verbindung(Some("aaaaaaaaaaaaaaaa"));
        hub.registrierung_verarbeiten(&a);
        let id_b = hub.registrierung_verarbeiten(&b);
        assert_ne!(id_b.as_str(), "aaaaaaaaaaaaaaaa");
        assert_eq!(hub.client_anzahl(), 2);
    }

    #[test]
    fn abmeldung_ist_idempotent() {
        let hub = test_hub(10, 10);
        assert!(hub.ip_registrieren("10.0.0.1"));
        let (v, _rx) = verbindung(None);
        hub.registrierung_verarbeiten(&v);
        hub.abmeldung_verarbeiten(&v);
        hub.abmeldung_verarbeiten(&v);
        assert_eq!(hub.client_anzahl(), 0);
        assert_eq!(hub.verbindungs_anzahl(), 0);
        assert!(v.ist_abgebrochen());
    }

    #[test]
    fn abmeldung_ohne_raum_speichert_nichts() {
        let hub = test_hub(10, 10);
        let (v, _rx) = verbindung(None);
        v.profil_setzen(Profil::initialisieren("Alice", "#FF0000"));
        hub.registrierung_verarbeiten(&v);
        hub.abmeldung_verarbeiten(&v);
        assert_eq!(hub.getrennte_anzahl(), 0);
    }

    #[test]
    fn reconnect_stellt_profil_und_zugzeit_wieder_her() {
        let hub = test_hub(10, 10);
        let raum = Arc::new(Raum::neu(raum_id("GAME"), None));
        hub.raum_hinzufuegen(Arc::clone(&raum));

        let (alt, _rx) = verbindung(None);
        let id = hub.registrierung_verarbeiten(&alt);
        alt.profil_setzen(Profil::initialisieren("Alice", "#00AA00"));
        alt.zugzeit_setzen(4200);
        raum.client_hinzufuegen(Arc::clone(&alt));
        alt.raum_id_setzen(Some(raum_id("GAME")));

        hub.abmeldung_verarbeiten(&alt);
        let gespeichert = hub.getrennter_client(id.as_str()).unwrap();
        assert_eq!(gespeichert.letzter_raum, raum_id("GAME"));
        assert!(raum.ist_leer());

        let (neu, _rx2) = verbindung(Some(id.as_str()));
        assert_eq!(hub.registrierung_verarbeiten(&neu), id);
        assert_eq!(neu.profil().anzeigename, "Alice");
        assert_eq!(neu.zugzeit_ms(), 4200);
        // Datensatz wird genau einmal verbraucht
        assert!(hub.getrennter_client(id.as_str()).is_none());
        // Mitgliedschaft wird nicht wiederhergestellt
        assert!(neu.raum_id().is_none());
    }

    #[test]
    fn reconnect_waehrend_zug_enthaelt_laufende_zugzeit() {
        let hub = test_hub(10, 10);
        let r = raum_id("TURN");
        let raum = Arc::new(Raum::neu(r.clone(), None));
        hub.raum_hinzufuegen(Arc::clone(&raum));

        let (a, _ra) = verbindung(None);
        let (b, _rb) = verbindung(None);
        hub.registrierung_verarbeiten(&a);
        let id_b = hub.registrierung_verarbeiten(&b);
        for v in [&a, &b] {
            v.profil_setzen(Profil::initialisieren("", ""));
            raum.client_hinzufuegen(Arc::clone(v));
            v.raum_id_setzen(Some(r.clone()));
        }
        b.zugzeit_setzen(4200);

        // B haelt den Zug seit 300 ms
        let start = Instant::now().checked_sub(Duration::from_millis(300)).unwrap();
        assert!(raum.zug_setzen_bei("", id_b.as_str(), start));

        hub.abmeldung_verarbeiten(&b);
        let gutgeschrieben = b.zugzeit_ms();
        assert!(gutgeschrieben >= 4200 + 300, "gutgeschrieben: {gutgeschrieben}");
        assert_eq!(hub.getrennter_client(id_b.as_str()).unwrap().zugzeit_ms, gutgeschrieben);

        let (neu, _rn) = verbindung(Some(id_b.as_str()));
        assert_eq!(hub.registrierung_verarbeiten(&neu), id_b);
        assert_eq!(neu.zugzeit_ms(), gutgeschrieben);
    }

    #[test]
    fn angefragte_id_in_grossschreibung_kollidiert() {
        let hub = test_hub(10, 10);
        let (a, _ra) = verbindung(Some("aabbccddeeff0011"));
        let (b, _rb) = verbindung(Some("AABBCCDDEEFF0011"));
        assert_eq!(hub.registrierung_verarbeiten(&a).as_str(), "aabbccddeeff0011");
        let id_b = hub.registrierung_verarbeiten(&b);
        assert_ne!(id_b.as_str(), "aabbccddeeff0011");
        assert!(hub.ist_registriert(&a));
        assert_eq!(hub.client_anzahl(), 2);
    }

    #[test]
    fn reconnect_mit_grossschreibung_findet_datensatz() {
        let hub = test_hub(10, 10);
        let raum = Arc::new(Raum::neu(raum_id("CASE"), None));
        hub.raum_hinzufuegen(Arc::clone(&raum));

        let (alt, _rx) = verbindung(Some("00aa00aa00aa00aa"));
        let id = hub.registrierung_verarbeiten(&alt);
        alt.profil_setzen(Profil::initialisieren("Alice", "#00AA00"));
        raum.client_hinzufuegen(Arc::clone(&alt));
        alt.raum_id_setzen(Some(raum_id("CASE")));
        hub.abmeldung_verarbeiten(&alt);

        let (neu, _rx2) = verbindung(Some("00AA00AA00AA00AA"));
        assert_eq!(hub.registrierung_verarbeiten(&neu), id);
        assert_eq!(neu.profil().anzeigename, "Alice");
        assert_eq!(hub.getrennte_anzahl(), 0);
    }

    #[tokio::test]
    async fn registrierung_ueber_koordination() {
        let hub = test_hub(10, 10);
        hub.starten();
        let (v, _rx) = verbindung(None);
        let id = hub.registrieren(&v).await.unwrap();
        assert_eq!(v.client_id(), id);
        assert!(hub.ist_registriert(&v));

        hub.abmelden(&v).await;
        // Abmeldung laeuft asynchron im Koordinations-Task
        for _ in 0..100 {
            if hub.client_anzahl() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(hub.client_anzahl(), 0);
        assert!(hub.herunterfahren(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn registrierung_nach_shutdown_schlaegt_fehl() {
        let hub = test_hub(10, 10);
        hub.starten();
        assert!(hub.herunterfahren(Duration::from_secs(1)).await);
        let (v, _rx) = verbindung(None);
        assert!(matches!(hub.registrieren(&v).await, Err(SignalingError::HubBeendet)));
    }

    #[tokio::test]
    async fn shutdown_bricht_verbindungen_ab() {
        let hub = test_hub(10, 10);
        hub.starten();
        let (v, _rx) = verbindung(None);
        hub.registrieren(&v).await.unwrap();
        assert!(hub.herunterfahren(Duration::from_secs(1)).await);
        assert!(v.ist_abgebrochen());
    }

    // --- Raumverzeichnis und Entfernen ---

    #[test]
    fn raum_hinzufuegen_ueberschreibt_nicht() {
        let hub = test_hub(10, 10);
        let erster = Arc::new(Raum::neu(raum_id("ABCD"), None));
        assert!(hub.raum_hinzufuegen(Arc::clone(&erster)));
        assert!(!hub.raum_hinzufuegen(Arc::new(Raum::neu(raum_id("ABCD"), None))));
        assert!(Arc::ptr_eq(&hub.raum_holen(&raum_id("ABCD")).unwrap(), &erster));
        assert!(hub.raum_existiert(&raum_id("ABCD")));
        hub.raum_loeschen(&raum_id("ABCD"));
        assert!(!hub.raum_existiert(&raum_id("ABCD")));
    }

    #[test]
    fn szenario_zughalter_trennt_sich() {
        let hub = test_hub(10, 10);
        let aufzeichnung = Arc::new(Aufzeichnung::default());
        assert!(hub.ereignisse_setzen(aufzeichnung.clone()));

        let r = raum_id("ROOM");
        let raum = Arc::new(Raum::neu(r.clone(), None));
        hub.raum_hinzufuegen(Arc::clone(&raum));

        let (a, _ra) = verbindung(None);
        let (b, _rb) = verbindung(None);
        hub.registrierung_verarbeiten(&a);
        hub.registrierung_verarbeiten(&b);
        for v in [&a, &b] {
            v.profil_setzen(Profil::initialisieren("", ""));
            raum.client_hinzufuegen(Arc::clone(v));
            v.raum_id_setzen(Some(r.clone()));
        }
        assert_eq!(raum.anzahl(), 2);

        let id_a = a.client_id().to_string();
        let id_b = b.client_id().to_string();
        assert!(raum.zug_setzen("", &id_b));
        assert!(!raum.zug_setzen("", &id_a));

        std::thread::sleep(Duration::from_millis(5));
        hub.abmeldung_verarbeiten(&b);

        assert!(b.zugzeit_ms() >= 5);
        assert_eq!(aufzeichnung.zug_beendet.lock().as_slice(), &[r.clone()]);
        assert_eq!(aufzeichnung.verlassen.lock().as_slice(), &[(r.clone(), b.client_id())]);
        assert!(raum.aktueller_zug().is_none());
        assert_eq!(raum.anzahl(), 1);
    }

    #[test]
    fn leerer_raum_loest_keine_rueckrufe_aus() {
        let hub = test_hub(10, 10);
        let aufzeichnung = Arc::new(Aufzeichnung::default());
        hub.ereignisse_setzen(aufzeichnung.clone());

        let r = raum_id("SOLO");
        let raum = Arc::new(Raum::neu(r.clone(), None));
        hub.raum_hinzufuegen(Arc::clone(&raum));
        let (a, _ra) = verbindung(None);
        hub.registrierung_verarbeiten(&a);
        raum.client_hinzufuegen(Arc::clone(&a));
        raum.zug_setzen("", a.client_id().as_str());

        hub.client_aus_raum_entfernen(&r, &a.client_id(), "test");
        assert!(aufzeichnung.zug_beendet.lock().is_empty());
        assert!(aufzeichnung.verlassen.lock().is_empty());
        // Raum bleibt bestehen
        assert!(hub.raum_existiert(&r));
    }

    #[test]
    fn entfernen_aus_unbekanntem_raum_ist_noop() {
        let hub = test_hub(10, 10);
        let (a, _ra) = verbindung(None);
        hub.client_aus_raum_entfernen(&raum_id("NONE"), &a.client_id(), "test");
    }

    #[test]
    fn ereignisse_nur_einmal_setzbar() {
        let hub = test_hub(10, 10);
        assert!(hub.ereignisse_setzen(Arc::new(Aufzeichnung::default())));
        assert!(!hub.ereignisse_setzen(Arc::new(Aufzeichnung::default())));
    }
}
