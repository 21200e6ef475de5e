//! Repository-Trait fuer den Raum-Store
//!
//! Das Repository-Pattern entkoppelt den Echtzeit-Koordinator von der
//! konkreten Persistenz. Der Koordinator liest Raum- und
//! Mitgliedschafts-Snapshots und loescht Datensaetze – angelegt werden
//! Raeume vom externen CRUD-System, nicht von diesem Core.
//!
//! Die async-Methoden tragen keine Send-Garantie (async_fn_in_trait);
//! alle Verbindungs- und Sweeper-Tasks laufen daher in einer
//! `tokio::task::LocalSet`.

use kritzel_core::types::{RoomId, UserId};

use crate::error::StoreResult;
use crate::models::{MitgliedRecord, RaumRecord};

/// Repository fuer Raum- und Mitgliedschafts-Datenzugriffe
#[allow(async_fn_in_trait)]
pub trait RaumStore: Send + Sync {
    /// Laedt alle aktiven Raeume
    async fn aktive_raeume(&self) -> StoreResult<Vec<RaumRecord>>;

    /// Laedt die aktuelle Mitgliederliste eines Raums
    async fn mitglieder(&self, room_id: &RoomId) -> StoreResult<Vec<MitgliedRecord>>;

    /// Prueft ob ein Raum (noch) existiert
    async fn raum_existiert(&self, room_id: &RoomId) -> StoreResult<bool>;

    /// Loescht einen Raum. Gibt false zurueck wenn er nicht existierte.
    async fn raum_loeschen(&self, room_id: &RoomId) -> StoreResult<bool>;

    /// Loescht eine einzelne Mitgliedschaft ohne den Raum anzutasten.
    /// Gibt false zurueck wenn sie nicht existierte.
    async fn mitglied_loeschen(&self, room_id: &RoomId, user_id: &UserId) -> StoreResult<bool>;

    /// Gibt die aktuelle Mitgliederzahl eines Raums zurueck
    async fn mitglieder_anzahl(&self, room_id: &RoomId) -> StoreResult<u32>;

    /// Loescht einen Raum samt aller Mitgliedschaften als eine logische
    /// Einheit. Ein Abbruch mittendrin darf keine verwaiste
    /// Mitgliedschaft ohne Raum zuruecklassen.
    async fn raum_aufloesen(&self, room_id: &RoomId) -> StoreResult<()>;
}
