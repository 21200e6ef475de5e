//! Broadcast-Router – Frames an Raum-Teilnehmer verteilen
//!
//! Zustellung ist best-effort: eine volle Queue verwirft das Frame fuer
//! genau diesen Empfaenger, eine geschlossene Queue raeumt den toten
//! Registry-Eintrag sofort weg. Ein fehlgeschlagener Empfaenger bricht
//! die Runde nie ab.

use crate::registry::{SendeErgebnis, VerbindungsRegistry};
use kritzel_core::types::{RoomId, UserId};
use kritzel_protocol::Frame;

/// Verteilt Frames an die lebenden Verbindungen eines Raums
#[derive(Clone)]
pub struct RaumBroadcaster {
    registry: VerbindungsRegistry,
}

impl RaumBroadcaster {
    /// Erstellt einen neuen Broadcaster ueber der Registry
    pub fn neu(registry: VerbindungsRegistry) -> Self {
        Self { registry }
    }

    /// Sendet ein Frame an alle Teilnehmer eines Raums
    ///
    /// `ausser` nimmt einen Teilnehmer aus (typisch: der Absender eines
    /// Zeichen-Events). Gibt die Anzahl der eingereihten Frames zurueck.
    pub fn an_raum_senden(
        &self,
        room_id: &RoomId,
        ausser: Option<&UserId>,
        frame: &Frame,
    ) -> usize {
        // Snapshot der Teilnehmer, damit Entfernungen waehrend der
        // Runde die Iteration nicht stoeren
        let teilnehmer = self.registry.user_ids_in_raum(room_id);
        let mut gesendet = 0;

        for user_id in &teilnehmer {
            if ausser == Some(user_id) {
                continue;
            }
            if self.an_user_senden(room_id, user_id, frame.clone()) {
                gesendet += 1;
            }
        }

        tracing::trace!(
            room_id = %room_id,
            empfaenger = teilnehmer.len(),
            gesendet,
            "Raum-Broadcast"
        );
        gesendet
    }

    /// Sendet ein Frame an einen einzelnen Teilnehmer
    ///
    /// Eine geschlossene Queue entfernt den Eintrag aus der Registry.
    /// Gibt true zurueck wenn das Frame eingereiht wurde.
    pub fn an_user_senden(&self, room_id: &RoomId, user_id: &UserId, frame: Frame) -> bool {
        match self.registry.direkt_senden(room_id, user_id, frame) {
            SendeErgebnis::Gesendet => true,
            SendeErgebnis::QueueVoll => false,
            SendeErgebnis::Geschlossen => {
                // Toter Transport – Eintrag sofort wegraeumen
                self.registry.entfernen(room_id, user_id);
                false
            }
            SendeErgebnis::NichtGefunden => false,
        }
    }
}
