//! In-Memory-Implementierung des RaumStore
//!
//! Fuer Tests und den Entwicklungsmodus ohne Datenbank-Datei.
//! Thread-safe via Arc + Mutex; Clone teilt den inneren Zustand.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use kritzel_core::types::{RoomId, UserId};

use crate::error::{StoreError, StoreResult};
use crate::models::{MitgliedRecord, MitgliedsRolle, RaumRecord};
use crate::repository::RaumStore;

#[derive(Default)]
struct MemoryInner {
    raeume: HashMap<RoomId, RaumRecord>,
    mitglieder: HashMap<RoomId, Vec<MitgliedRecord>>,
    /// Simulierter Total-Ausfall des Stores (fuer Fehlerpfad-Tests)
    ausfall: bool,
}

/// In-Memory RaumStore
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    /// Erstellt einen neuen leeren MemoryStore
    pub fn neu() -> Self {
        Self::default()
    }

    /// Legt einen Raum an und registriert den Besitzer als Mitglied
    pub fn raum_anlegen(&self, raum: RaumRecord) {
        let mut inner = self.inner.lock();
        inner.mitglieder.entry(raum.id.clone()).or_default().push(
            MitgliedRecord {
                room_id: raum.id.clone(),
                user_id: raum.owner_id.clone(),
                rolle: MitgliedsRolle::Besitzer,
            },
        );
        inner.raeume.insert(raum.id.clone(), raum);
    }

    /// Fuegt ein normales Mitglied zu einem Raum hinzu
    pub fn mitglied_anlegen(&self, room_id: &RoomId, user_id: &UserId) {
        let mut inner = self.inner.lock();
        inner
            .mitglieder
            .entry(room_id.clone())
            .or_default()
            .push(MitgliedRecord {
                room_id: room_id.clone(),
                user_id: user_id.clone(),
                rolle: MitgliedsRolle::Mitglied,
            });
    }

    /// Schaltet den simulierten Store-Ausfall ein oder aus
    pub fn ausfall_simulieren(&self, ausfall: bool) {
        self.inner.lock().ausfall = ausfall;
    }

    fn pruefen(&self) -> StoreResult<()> {
        if self.inner.lock().ausfall {
            Err(StoreError::intern("simulierter Store-Ausfall"))
        } else {
            Ok(())
        }
    }
}

impl RaumStore for MemoryStore {
    async fn aktive_raeume(&self) -> StoreResult<Vec<RaumRecord>> {
        self.pruefen()?;
        let inner = self.inner.lock();
        let mut raeume: Vec<RaumRecord> = inner.raeume.values().cloned().collect();
        raeume.sort_by(|a, b| a.id.als_str().cmp(b.id.als_str()));
        Ok(raeume)
    }

    async fn mitglieder(&self, room_id: &RoomId) -> StoreResult<Vec<MitgliedRecord>> {
        self.pruefen()?;
        Ok(self
            .inner
            .lock()
            .mitglieder
            .get(room_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn raum_existiert(&self, room_id: &RoomId) -> StoreResult<bool> {
        self.pruefen()?;
        Ok(self.inner.lock().raeume.contains_key(room_id))
    }

    async fn raum_loeschen(&self, room_id: &RoomId) -> StoreResult<bool> {
        self.pruefen()?;
        Ok(self.inner.lock().raeume.remove(room_id).is_some())
    }

    async fn mitglied_loeschen(&self, room_id: &RoomId, user_id: &UserId) -> StoreResult<bool> {
        self.pruefen()?;
        let mut inner = self.inner.lock();
        let Some(liste) = inner.mitglieder.get_mut(room_id) else {
            return Ok(false);
        };
        let vorher = liste.len();
        liste.retain(|m| &m.user_id != user_id);
        Ok(liste.len() < vorher)
    }

    async fn mitglieder_anzahl(&self, room_id: &RoomId) -> StoreResult<u32> {
        self.pruefen()?;
        Ok(self
            .inner
            .lock()
            .mitglieder
            .get(room_id)
            .map(|l| l.len() as u32)
            .unwrap_or(0))
    }

    async fn raum_aufloesen(&self, room_id: &RoomId) -> StoreResult<()> {
        self.pruefen()?;
        let mut inner = self.inner.lock();
        inner.mitglieder.remove(room_id);
        inner.raeume.remove(room_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_raum(id: &str, owner: &str) -> RaumRecord {
        RaumRecord {
            id: RoomId::from(id),
            external_id: id.to_string(),
            owner_id: UserId::from(owner),
            max_mitglieder: 8,
            erstellt_am: Utc::now(),
        }
    }

    #[tokio::test]
    async fn raum_anlegen_registriert_besitzer() {
        let store = MemoryStore::neu();
        store.raum_anlegen(test_raum("R1", "U1"));

        let mitglieder = store.mitglieder(&RoomId::from("R1")).await.unwrap();
        assert_eq!(mitglieder.len(), 1);
        assert!(mitglieder[0].ist_besitzer());
    }

    #[tokio::test]
    async fn raum_aufloesen_entfernt_alles() {
        let store = MemoryStore::neu();
        store.raum_anlegen(test_raum("R1", "U1"));
        store.mitglied_anlegen(&RoomId::from("R1"), &UserId::from("U2"));

        store.raum_aufloesen(&RoomId::from("R1")).await.unwrap();

        assert!(!store.raum_existiert(&RoomId::from("R1")).await.unwrap());
        assert_eq!(
            store.mitglieder_anzahl(&RoomId::from("R1")).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn ausfall_simulieren_laesst_alles_fehlschlagen() {
        let store = MemoryStore::neu();
        store.ausfall_simulieren(true);
        assert!(store.aktive_raeume().await.is_err());

        store.ausfall_simulieren(false);
        assert!(store.aktive_raeume().await.is_ok());
    }
}
