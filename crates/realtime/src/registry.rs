//! Verbindungs-Registry – (Raum, Benutzer) -> lebende Verbindung
//!
//! Die Registry ist der einzige Ort der Transport-Handles besitzt.
//! Jede Verbindung traegt ihre Liveness-Zaehler: die Anzahl der seit
//! dem letzten Ack gesendeten Probes und den Zeitpunkt des letzten
//! akzeptierten Acks.
//!
//! ## Schluessel
//! Der Schluessel ist das Paar (RoomId, UserId) – ein Benutzer darf
//! gleichzeitig in mehreren Raeumen leben, aber pro Paar existiert
//! hoechstens eine Verbindung. Ein zweiter `join` auf denselben
//! Schluessel ueberschreibt den alten Eintrag (last-writer-wins); der
//! alte Transport wird nicht aktiv geschlossen und lebt bis er selbst
//! einen Fehler meldet. Damit der spaete Abbau des alten Transports
//! nicht den neuen Eintrag trifft, traegt jeder Eintrag eine
//! Generationsnummer; `entfernen_wenn_generation` entfernt nur die
//! eigene Generation.

use dashmap::DashMap;
use kritzel_core::types::{RoomId, UserId};
use kritzel_protocol::Frame;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Groesse der Send-Queue pro Verbindung
const SEND_QUEUE_GROESSE: usize = 64;

// ---------------------------------------------------------------------------
// Verbindung & Sende-Ergebnis
// ---------------------------------------------------------------------------

/// Eine lebende Verbindung mit ihren Liveness-Zaehlern
#[derive(Debug)]
struct Verbindung {
    /// Send-Queue des Verbindungs-Tasks
    tx: mpsc::Sender<Frame>,
    /// Probes seit dem letzten Ack (optimistisch gezaehlt: jede Probe
    /// gilt als verpasst bis ein Ack eintrifft)
    fehlschlaege: u32,
    /// Zeitpunkt des letzten akzeptierten Acks
    letzter_ack: Instant,
    /// Registrierungs-Generation, vergeben bei `registrieren`
    generation: u64,
}

/// Ergebnis eines direkten Sende-Versuchs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendeErgebnis {
    /// Frame wurde in die Queue eingereiht
    Gesendet,
    /// Queue voll – Frame verworfen (best-effort)
    QueueVoll,
    /// Queue geschlossen – der Verbindungs-Task lebt nicht mehr
    Geschlossen,
    /// Kein Eintrag fuer diesen Schluessel
    NichtGefunden,
}

// ---------------------------------------------------------------------------
// VerbindungsRegistry
// ---------------------------------------------------------------------------

/// Registry aller lebenden Verbindungen
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct VerbindungsRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    /// Lebende Verbindungen, indiziert nach (Raum, Benutzer)
    verbindungen: DashMap<(RoomId, UserId), Verbindung>,
    /// Raum -> Liste der Benutzer mit lebender Verbindung
    raum_index: DashMap<RoomId, Vec<UserId>>,
    /// Zaehler fuer Registrierungs-Generationen
    naechste_generation: AtomicU64,
}

impl VerbindungsRegistry {
    /// Erstellt eine neue leere Registry
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                verbindungen: DashMap::new(),
                raum_index: DashMap::new(),
                naechste_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Installiert oder ersetzt die Verbindung fuer (Raum, Benutzer)
    ///
    /// Setzt die Liveness-Zaehler zurueck und gibt die Empfangs-Queue
    /// samt Generationsnummer zurueck; aus der Queue liest der
    /// Verbindungs-Task und sendet via TCP. Ein bestehender Eintrag
    /// wird ueberschrieben; dessen Queue wird dadurch geschlossen.
    pub fn registrieren(
        &self,
        room_id: RoomId,
        user_id: UserId,
    ) -> (mpsc::Receiver<Frame>, u64) {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_GROESSE);
        let generation = self
            .inner
            .naechste_generation
            .fetch_add(1, Ordering::Relaxed)
            + 1;
        let verbindung = Verbindung {
            tx,
            fehlschlaege: 0,
            letzter_ack: Instant::now(),
            generation,
        };

        self.inner
            .verbindungen
            .insert((room_id.clone(), user_id.clone()), verbindung);

        // Raum-Index pflegen (keine Duplikate bei Re-Join)
        let mut eintrag = self.inner.raum_index.entry(room_id.clone()).or_default();
        if !eintrag.contains(&user_id) {
            eintrag.push(user_id.clone());
        }
        drop(eintrag);

        tracing::debug!(room_id = %room_id, user_id = %user_id, generation, "Verbindung registriert");
        (rx, generation)
    }

    /// Entfernt die Verbindung fuer (Raum, Benutzer)
    pub fn entfernen(&self, room_id: &RoomId, user_id: &UserId) {
        let entfernt = self
            .inner
            .verbindungen
            .remove(&(room_id.clone(), user_id.clone()))
            .is_some();

        self.index_bereinigen(room_id, user_id);

        if entfernt {
            tracing::debug!(room_id = %room_id, user_id = %user_id, "Verbindung entfernt");
        }
    }

    /// Entfernt die Verbindung nur wenn sie noch zur angegebenen
    /// Generation gehoert
    ///
    /// Wurde der Schluessel inzwischen von einem neueren `join`
    /// ueberschrieben, bleibt der neue Eintrag stehen. Gibt true
    /// zurueck wenn tatsaechlich entfernt wurde.
    pub fn entfernen_wenn_generation(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        generation: u64,
    ) -> bool {
        let entfernt = self
            .inner
            .verbindungen
            .remove_if(&(room_id.clone(), user_id.clone()), |_, v| {
                v.generation == generation
            })
            .is_some();

        if entfernt {
            self.index_bereinigen(room_id, user_id);
            tracing::debug!(room_id = %room_id, user_id = %user_id, generation, "Verbindung entfernt");
        }
        entfernt
    }

    fn index_bereinigen(&self, room_id: &RoomId, user_id: &UserId) {
        if let Some(mut ids) = self.inner.raum_index.get_mut(room_id) {
            ids.retain(|uid| uid != user_id);
            let ist_leer = ids.is_empty();
            drop(ids);
            if ist_leer {
                self.inner.raum_index.remove(room_id);
            }
        }
    }

    /// Prueft ob eine lebende Verbindung fuer den Schluessel existiert
    pub fn ist_registriert(&self, room_id: &RoomId, user_id: &UserId) -> bool {
        self.inner
            .verbindungen
            .contains_key(&(room_id.clone(), user_id.clone()))
    }

    /// Verbucht ein Liveness-Ack: Zaehler auf 0, Ack-Zeitpunkt frisch
    ///
    /// Gibt false zurueck wenn kein Eintrag existiert (No-Op).
    pub fn ack_verbuchen(&self, room_id: &RoomId, user_id: &UserId) -> bool {
        match self
            .inner
            .verbindungen
            .get_mut(&(room_id.clone(), user_id.clone()))
        {
            Some(mut v) => {
                v.fehlschlaege = 0;
                v.letzter_ack = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Verbucht eine gesendete Probe: Zaehler um 1 erhoehen
    ///
    /// Die Probe gilt als verpasst bis ein Ack eintrifft. Gibt den
    /// neuen Zaehlerstand zurueck, None wenn kein Eintrag existiert.
    pub fn probe_verbucht(&self, room_id: &RoomId, user_id: &UserId) -> Option<u32> {
        self.inner
            .verbindungen
            .get_mut(&(room_id.clone(), user_id.clone()))
            .map(|mut v| {
                v.fehlschlaege += 1;
                v.fehlschlaege
            })
    }

    /// Gibt den aktuellen Fehlschlag-Zaehler zurueck
    pub fn fehlschlaege(&self, room_id: &RoomId, user_id: &UserId) -> Option<u32> {
        self.inner
            .verbindungen
            .get(&(room_id.clone(), user_id.clone()))
            .map(|v| v.fehlschlaege)
    }

    /// Sendet ein Frame nicht-blockierend an eine Verbindung
    pub fn direkt_senden(&self, room_id: &RoomId, user_id: &UserId, frame: Frame) -> SendeErgebnis {
        let Some(v) = self
            .inner
            .verbindungen
            .get(&(room_id.clone(), user_id.clone()))
        else {
            return SendeErgebnis::NichtGefunden;
        };

        match v.tx.try_send(frame) {
            Ok(()) => SendeErgebnis::Gesendet,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    room_id = %room_id,
                    user_id = %user_id,
                    "Send-Queue voll – Frame verworfen"
                );
                SendeErgebnis::QueueVoll
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(
                    room_id = %room_id,
                    user_id = %user_id,
                    "Send-Queue geschlossen (Client getrennt)"
                );
                SendeErgebnis::Geschlossen
            }
        }
    }

    /// Gibt alle Benutzer mit lebender Verbindung in einem Raum zurueck
    ///
    /// Liefert eine Kopie – die Liste bleibt gueltig auch wenn waehrend
    /// der Verarbeitung Eintraege entfernt werden.
    pub fn user_ids_in_raum(&self, room_id: &RoomId) -> Vec<UserId> {
        self.inner
            .raum_index
            .get(room_id)
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    /// Gibt die Gesamtzahl lebender Verbindungen zurueck
    pub fn anzahl(&self) -> usize {
        self.inner.verbindungen.len()
    }
}

impl Default for VerbindungsRegistry {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
