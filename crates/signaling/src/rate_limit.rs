//! Rate Limiter pro Verbindung
//!
//! Gleitendes Zeitfenster ueber ein Protokoll der letzten Zeitstempel.
//! Solange weniger als `max_nachrichten` Eintraege vorliegen, wird ohne
//! Scan angehaengt. Erst am Limit werden veraltete Eintraege entfernt.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Konfiguration fuer den Rate Limiter
#[derive(Debug, Clone, Copy)]
pub struct RateLimitKonfig {
    /// Maximale Nachrichten pro Fenster
    pub max_nachrichten: usize,
    /// Laenge des gleitenden Fensters
    pub fenster: Duration,
}

impl Default for RateLimitKonfig {
    fn default() -> Self {
        Self {
            max_nachrichten: 20,
            fenster: Duration::from_secs(1),
        }
    }
}

/// Gleitendes Fenster fuer eine einzelne Verbindung
///
/// Nicht thread-safe; die Verbindung haelt ihn hinter einem Mutex.
#[derive(Debug)]
pub struct RateLimiter {
    konfig: RateLimitKonfig,
    zeitstempel: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn neu(konfig: RateLimitKonfig) -> Self {
        Self {
            konfig,
            zeitstempel: VecDeque::with_capacity(konfig.max_nachrichten),
        }
    }

    /// Prueft und verbucht eine Nachricht. Gibt `true` zurueck wenn erlaubt.
    pub fn erlauben(&mut self) -> bool {
        self.erlauben_bei(Instant::now())
    }

    /// Wie `erlauben`, aber mit vorgegebenem Zeitpunkt
    pub fn erlauben_bei(&mut self, jetzt: Instant) -> bool {
        // Schneller Pfad: unter dem Limit, kein Scan
        if self.zeitstempel.len() < self.konfig.max_nachrichten {
            self.zeitstempel.push_back(jetzt);
            return true;
        }

        // Langsamer Pfad: alles verwerfen, was aus dem Fenster gefallen ist
        while let Some(aeltester) = self.zeitstempel.front() {
            if jetzt.saturating_duration_since(*aeltester) < self.konfig.fenster {
                break;
            }
            self.zeitstempel.pop_front();
        }

        if self.zeitstempel.len() >= self.konfig.max_nachrichten {
            return false;
        }
        self.zeitstempel.push_back(jetzt);
        true
    }

    /// Anzahl der aktuell protokollierten Zeitstempel
    pub fn eintraege(&self) -> usize {
        self.zeitstempel.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: usize) -> RateLimiter {
        RateLimiter::neu(RateLimitKonfig {
            max_nachrichten: max,
            fenster: Duration::from_secs(1),
        })
    }

    #[test]
    fn erlaubt_nachrichten_bis_limit() {
        let mut rl = limiter(20);
        let start = Instant::now();
        for i in 0..20 {
            assert!(
                rl.erlauben_bei(start + Duration::from_millis(i)),
                "Nachricht {i} sollte erlaubt sein"
            );
        }
        // 21. Nachricht im selben Fenster wird abgelehnt
        assert!(!rl.erlauben_bei(start + Duration::from_millis(20)));
    }

    #[test]
    fn erlaubt_wieder_nach_ablauf_des_fensters() {
        let mut rl = limiter(3);
        let start = Instant::now();
        for _ in 0..3 {
            assert!(rl.erlauben_bei(start));
        }
        assert!(!rl.erlauben_bei(start + Duration::from_millis(999)));
        assert!(rl.erlauben_bei(start + Duration::from_secs(1)));
        // Alte Eintraege wurden entfernt, nur der neue bleibt
        assert_eq!(rl.eintraege(), 1);
    }

    #[test]
    fn gleitendes_fenster_gibt_einzelne_plaetze_frei() {
        let mut rl = limiter(2);
        let start = Instant::now();
        assert!(rl.erlauben_bei(start));
        assert!(rl.erlauben_bei(start + Duration::from_millis(500)));
        assert!(!rl.erlauben_bei(start + Duration::from_millis(900)));
        // Erster Eintrag faellt heraus, zweiter ist noch im Fenster
        assert!(rl.erlauben_bei(start + Duration::from_millis(1100)));
        assert!(!rl.erlauben_bei(start + Duration::from_millis(1200)));
        assert_eq!(rl.eintraege(), 2);
    }

    #[test]
    fn abgelehnte_nachrichten_werden_nicht_verbucht() {
        let mut rl = limiter(1);
        let start = Instant::now();
        assert!(rl.erlauben_bei(start));
        for i in 1..10 {
            assert!(!rl.erlauben_bei(start + Duration::from_millis(i * 10)));
        }
        assert_eq!(rl.eintraege(), 1);
        assert!(rl.erlauben_bei(start + Duration::from_secs(1)));
    }
}
