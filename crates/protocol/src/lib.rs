//! turntracker-protocol – Nachrichtenschema
//!
//! Dieses Crate definiert alle JSON-Nachrichten, die zwischen Browser-Client
//! und Server ueber die WebSocket-Verbindung ausgetauscht werden.

pub mod fehler;
pub mod nachricht;

pub use fehler::fehler_nachricht;
pub use nachricht::{EingehendeNachricht, ServerNachricht, SpielerInfo};
