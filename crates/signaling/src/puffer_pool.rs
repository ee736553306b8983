//! Puffer-Pool fuer ausgehende Nachrichten
//!
//! Beim Zusammenfassen mehrerer Nachrichten zu einem Schreibvorgang wird
//! ein `BytesMut` aus dem Pool geholt, gefuellt und per `split().freeze()`
//! abgegeben. Der Rest des Puffers kommt zurueck in den Pool; sobald der
//! eingefrorene Teil gesendet und verworfen wurde, kann `reserve` den
//! Speicher wiederverwenden.

use bytes::BytesMut;
use parking_lot::Mutex;

/// Startkapazitaet neuer Puffer
const START_KAPAZITAET: usize = 1024;

/// Groessere Puffer werden nicht zurueckgenommen
const MAX_KAPAZITAET: usize = 64 * 1024;

/// Maximale Anzahl vorgehaltener Puffer
const MAX_PUFFER: usize = 256;

/// Thread-sicherer Pool wiederverwendbarer Puffer
#[derive(Debug, Default)]
pub struct PufferPool {
    frei: Mutex<Vec<BytesMut>>,
}

impl PufferPool {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Holt einen leeren Puffer (wiederverwendet oder neu)
    pub fn holen(&self) -> BytesMut {
        self.frei
            .lock()
            .pop()
            .unwrap_or_else(|| BytesMut::with_capacity(START_KAPAZITAET))
    }

    /// Gibt einen Puffer zurueck. Uebergrosse Puffer werden verworfen.
    pub fn zurueckgeben(&self, mut puffer: BytesMut) {
        if puffer.capacity() > MAX_KAPAZITAET {
            return;
        }
        puffer.clear();
        let mut frei = self.frei.lock();
        if frei.len() < MAX_PUFFER {
            frei.push(puffer);
        }
    }

    /// Anzahl der aktuell vorgehaltenen Puffer
    pub fn verfuegbar(&self) -> usize {
        self.frei.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neuer_puffer_hat_startkapazitaet() {
        let pool = PufferPool::neu();
        let puffer = pool.holen();
        assert!(puffer.is_empty());
        assert!(puffer.capacity() >= START_KAPAZITAET);
    }

    #[test]
    fn puffer_wird_wiederverwendet() {
        let pool = PufferPool::neu();
        let mut puffer = pool.holen();
        puffer.extend_from_slice(b"hallo");
        let zeiger = puffer.as_ptr();

        pool.zurueckgeben(puffer);
        assert_eq!(pool.verfuegbar(), 1);

        let wieder = pool.holen();
        assert!(wieder.is_empty());
        assert_eq!(wieder.as_ptr(), zeiger);
        assert_eq!(pool.verfuegbar(), 0);
    }

    #[test]
    fn uebergrosse_puffer_werden_verworfen() {
        let pool = PufferPool::neu();
        pool.zurueckgeben(BytesMut::with_capacity(MAX_KAPAZITAET + 1));
        assert_eq!(pool.verfuegbar(), 0);
    }

    #[test]
    fn split_freeze_laesst_rest_im_puffer() {
        let pool = PufferPool::neu();
        let mut puffer = pool.holen();
        puffer.extend_from_slice(b"{\"a\":1}\n{\"b\":2}");
        let daten = puffer.split().freeze();
        assert_eq!(&daten[..], b"{\"a\":1}\n{\"b\":2}");
        assert!(puffer.is_empty());
        pool.zurueckgeben(puffer);
        assert_eq!(pool.verfuegbar(), 1);
    }
}
