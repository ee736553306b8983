//! Fehlertypen fuer den Signaling-Service

use thiserror::Error;

/// Fehlertyp fuer den Signaling-Service
///
/// Keiner dieser Fehler beendet den Prozess. Sie fuehren hoechstens zum
/// Schliessen einer einzelnen Verbindung.
#[derive(Debug, Error)]
pub enum SignalingError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket-Fehler (Handshake, Frame, Protokoll)
    #[error("WebSocket-Fehler: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Verbindungslimit erreicht (global oder pro Adresse)
    #[error("Verbindungslimit erreicht fuer {0}")]
    ServerVoll(String),

    /// Hub nimmt keine Registrierungen mehr an (Shutdown)
    #[error("Hub wurde beendet")]
    HubBeendet,

    /// Timeout (Schreibfrist, Lesefrist)
    #[error("Timeout")]
    Timeout,

    /// Interner Fehler
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl SignalingError {
    /// Erstellt einen internen Fehler
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;
