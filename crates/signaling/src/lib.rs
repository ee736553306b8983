//! turntracker-signaling – WebSocket-Signaling fuer rundenbasierte Spiele
//!
//! Dieser Crate implementiert den Kern des Turn-Trackers: Zulassung und
//! Identitaet der Verbindungen, Raeume mit Zugzustand, Broadcast an
//! Raum-Mitglieder und die Aufraeum-Tasks.
//!
//! ## Architektur
//!
//! ```text
//! WebSocket Listener (SignalingServer)
//!     |  Handshake: Quelladresse, ?client_id=, Zulassung (Hub)
//!     v
//! Verbindung + Pumpen (pro Verbindung Leser- und Schreiber-Task)
//!     |  RateLimiter
//!     v
//! MessageDispatcher
//!     |
//!     +-- raum_handler     (create_room, join_room, leave_room)
//!     +-- zug_handler      (start_turn)
//!     +-- profil_handler   (update_profile)
//!     +-- rundruf_handler  (broadcast)
//!
//! Hub          – Verbindungen, Raeume, getrennte Clients, Zaehler
//! Raum         – Mitglieder und Zugzustand, eigenes Lock
//! Ereignisse   – Rueckrufe bei Austritt und beendetem Zug
//! Aufraeumer   – getrennte Clients (TTL) und alte Raeume
//! ```

pub mod aufraeumen;
pub mod broadcast;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod ereignisse;
pub mod error;
pub mod handlers;
pub mod hub;
pub mod puffer_pool;
pub mod rate_limit;
pub mod raum;
pub mod tcp;
pub mod verbindung;

// Bequeme Re-Exporte
pub use config::SignalingConfig;
pub use connection::NachrichtenHandler;
pub use dispatcher::MessageDispatcher;
pub use ereignisse::{RaumEreignisse, StandardEreignisse};
pub use error::{SignalingError, SignalingResult};
pub use hub::{GetrennterClient, Hub};
pub use rate_limit::{RateLimitKonfig, RateLimiter};
pub use raum::Raum;
pub use tcp::SignalingServer;
pub use verbindung::{SendeErgebnis, Verbindung};
