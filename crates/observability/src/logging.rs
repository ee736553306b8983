//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Konfigurationsdatei, ueberschreibbar per Umgebung:
//! - `TT_LOG_LEVEL`: Filter-Direktive (z.B. `info`, `turntracker_signaling=debug`)
//! - `TT_LOG_FORMAT`: Format (`text`/`json`), Standard: `text`

use tracing_subscriber::{fmt, EnvFilter};

/// Umgebungsvariable fuer den Log-Filter
pub const ENV_LOG_LEVEL: &str = "TT_LOG_LEVEL";

/// Umgebungsvariable fuer das Log-Format
pub const ENV_LOG_FORMAT: &str = "TT_LOG_FORMAT";

/// Ausgabeformat der Logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// Parst `text` oder `json`; alles andere ergibt `None`
    pub fn parsen(wert: &str) -> Option<Self> {
        match wert {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Umgebung vor Konfiguration, ungueltige Werte fallen auf `Text` zurueck
    fn waehlen(umgebung: Option<&str>, konfiguriert: &str) -> Self {
        umgebung
            .and_then(Self::parsen)
            .or_else(|| Self::parsen(konfiguriert))
            .unwrap_or(Self::Text)
    }
}

/// Initialisiert das Logging-System.
///
/// `TT_LOG_LEVEL` und `TT_LOG_FORMAT` haben Vorrang vor den uebergebenen
/// Werten. Faellt auf `info` / `text` zurueck.
pub fn logging_initialisieren(level: &str, format: &str) {
    let filter = EnvFilter::try_from_env(ENV_LOG_LEVEL)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format_env = std::env::var(ENV_LOG_FORMAT).ok();

    match LogFormat::waehlen(format_env.as_deref(), format) {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_current_span(true)
                .init();
        }
        LogFormat::Text => {
            fmt().with_env_filter(filter).with_target(true).init();
        }
    }
}

/// Validiert ob ein einfacher Log-Level-String gueltig ist.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_werte() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            assert!(log_level_gueltig(level));
        }
        assert!(!log_level_gueltig("verbose"));
        assert!(!log_level_gueltig("INFO"));
        assert!(!log_level_gueltig(""));
    }

    #[test]
    fn format_parsen() {
        assert_eq!(LogFormat::parsen("text"), Some(LogFormat::Text));
        assert_eq!(LogFormat::parsen("json"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parsen("JSON"), None);
        assert_eq!(LogFormat::parsen("xml"), None);
    }

    #[test]
    fn umgebung_hat_vorrang() {
        assert_eq!(LogFormat::waehlen(Some("json"), "text"), LogFormat::Json);
        assert_eq!(LogFormat::waehlen(None, "json"), LogFormat::Json);
        // Ungueltige Umgebung faellt auf die Konfiguration zurueck
        assert_eq!(LogFormat::waehlen(Some("xml"), "json"), LogFormat::Json);
        assert_eq!(LogFormat::waehlen(None, "yaml"), LogFormat::Text);
    }
}
