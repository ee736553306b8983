//! turntracker-core – Gemeinsame Typen
//!
//! Dieses Crate stellt die Identitaeten (Client, Raum) und Profilwerte
//! bereit, die von Protokoll, Signaling und Server gemeinsam genutzt werden.

pub mod profil;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use profil::Profil;
pub use types::{ClientId, RaumId};
