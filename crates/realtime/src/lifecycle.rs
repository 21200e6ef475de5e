//! Raum-Lebenszyklus – Eviction und Aufloesung
//!
//! Buendelt die destruktiven Uebergaenge eines Raums: einzelne
//! Mitglieder entfernen (Eviction) und den ganzen Raum aufloesen.
//! Reihenfolge bei der Aufloesung: erst die verbleibenden Teilnehmer
//! benachrichtigen (best-effort), dann die Registry-Eintraege
//! wegraeumen, zuletzt den Store bereinigen. So erreicht die
//! room_deleted-Nachricht die Clients bevor ihre Queues verschwinden.

use crate::broadcast::RaumBroadcaster;
use crate::error::RealtimeResult;
use crate::registry::VerbindungsRegistry;
use kritzel_core::types::{RoomId, UserId};
use kritzel_protocol::{Frame, LoeschGrund};
use kritzel_store::RaumStore;
use std::sync::Arc;

/// Steuert Eviction und Aufloesung von Raeumen
pub struct RaumLebenszyklus<S: RaumStore> {
    store: Arc<S>,
    registry: VerbindungsRegistry,
    broadcaster: RaumBroadcaster,
}

impl<S: RaumStore> Clone for RaumLebenszyklus<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            registry: self.registry.clone(),
            broadcaster: self.broadcaster.clone(),
        }
    }
}

impl<S: RaumStore> RaumLebenszyklus<S> {
    pub fn neu(store: Arc<S>, registry: VerbindungsRegistry, broadcaster: RaumBroadcaster) -> Self {
        Self {
            store,
            registry,
            broadcaster,
        }
    }

    /// Loest einen Raum vollstaendig auf
    ///
    /// Benachrichtigt alle noch verbundenen Teilnehmer mit dem
    /// angegebenen Grund, entfernt ihre Registry-Eintraege und loescht
    /// Raum samt Mitgliedschaften aus dem Store.
    pub async fn aufloesen(&self, room_id: &RoomId, grund: LoeschGrund) -> RealtimeResult<()> {
        tracing::info!(room_id = %room_id, grund = ?grund, "Raum wird aufgeloest");

        let frame = Frame::room_deleted(room_id.clone(), Some(grund));
        self.broadcaster.an_raum_senden(room_id, None, &frame);

        for user_id in self.registry.user_ids_in_raum(room_id) {
            self.registry.entfernen(room_id, &user_id);
        }

        self.store.raum_aufloesen(room_id).await?;
        Ok(())
    }

    /// Entfernt ein einzelnes Mitglied (Eviction)
    ///
    /// Raum und uebrige Mitgliedschaften bleiben unberuehrt.
    pub async fn mitglied_entfernen(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
    ) -> RealtimeResult<()> {
        tracing::info!(room_id = %room_id, user_id = %user_id, "Mitglied wird entfernt");
        self.registry.entfernen(room_id, user_id);
        self.store.mitglied_loeschen(room_id, user_id).await?;
        Ok(())
    }

    /// Verarbeitet ein explizites Verlassen
    ///
    /// Verlaesst der Besitzer den Raum, wird der Raum aufgeloest;
    /// andere Mitglieder werden nur entfernt.
    pub async fn verlassen(&self, room_id: &RoomId, user_id: &UserId) -> RealtimeResult<()> {
        let mitglieder = self.store.mitglieder(room_id).await?;
        let ist_besitzer = mitglieder
            .iter()
            .any(|m| &m.user_id == user_id && m.ist_besitzer());

        if ist_besitzer {
            self.aufloesen(room_id, LoeschGrund::Explizit).await
        } else {
            self.mitglied_entfernen(room_id, user_id).await
        }
    }

    /// Raeumt Verbindungen eines Raums weg der im Store nicht mehr
    /// existiert (z.B. extern geloescht)
    ///
    /// Es gibt nichts mehr zu loeschen, nur zu benachrichtigen.
    pub fn raum_verschwunden(&self, room_id: &RoomId) {
        tracing::info!(room_id = %room_id, "Raum existiert nicht mehr im Store");

        let frame = Frame::room_deleted(room_id.clone(), None);
        self.broadcaster.an_raum_senden(room_id, None, &frame);

        for user_id in self.registry.user_ids_in_raum(room_id) {
            self.registry.entfernen(room_id, &user_id);
        }
    }

    /// Loescht den Raum wenn er keine Mitglieder mehr hat
    pub async fn leeren_raum_bereinigen(&self, room_id: &RoomId) -> RealtimeResult<()> {
        if self.store.mitglieder_anzahl(room_id).await? == 0 {
            if self.store.raum_loeschen(room_id).await? {
                tracing::info!(room_id = %room_id, "Leerer Raum geloescht");
            }
        }
        Ok(())
    }
}
