//! SQLite-Implementierung des RaumStore-Traits

use chrono::{DateTime, Utc};
use sqlx::Row;

use kritzel_core::types::{RoomId, UserId};

use crate::error::{StoreError, StoreResult};
use crate::models::{MitgliedRecord, MitgliedsRolle, RaumRecord};
use crate::repository::RaumStore;
use crate::sqlite::pool::SqliteStore;

fn row_to_raum(row: &sqlx::sqlite::SqliteRow) -> StoreResult<RaumRecord> {
    let created_at: String = row.try_get("created_at")?;
    let erstellt_am = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| StoreError::UngueltigeDaten(format!("created_at: {e}")))?
        .with_timezone(&Utc);

    Ok(RaumRecord {
        id: RoomId(row.try_get("id")?),
        external_id: row.try_get("external_id")?,
        owner_id: UserId(row.try_get("owner_id")?),
        max_mitglieder: row.try_get::<i64, _>("max_members")? as u32,
        erstellt_am,
    })
}

fn row_to_mitglied(row: &sqlx::sqlite::SqliteRow) -> StoreResult<MitgliedRecord> {
    let rolle: String = row.try_get("role")?;
    Ok(MitgliedRecord {
        room_id: RoomId(row.try_get("room_id")?),
        user_id: UserId(row.try_get("user_id")?),
        rolle: MitgliedsRolle::aus_str(&rolle)?,
    })
}

impl RaumStore for SqliteStore {
    async fn aktive_raeume(&self) -> StoreResult<Vec<RaumRecord>> {
        let rows = sqlx::query(
            "SELECT id, external_id, owner_id, max_members, created_at
             FROM rooms WHERE status = 'active' ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_raum).collect()
    }

    async fn mitglieder(&self, room_id: &RoomId) -> StoreResult<Vec<MitgliedRecord>> {
        let rows = sqlx::query(
            "SELECT room_id, user_id, role
             FROM room_members WHERE room_id = ? ORDER BY role, user_id",
        )
        .bind(room_id.als_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_mitglied).collect()
    }

    async fn raum_existiert(&self, room_id: &RoomId) -> StoreResult<bool> {
        let row = sqlx::query("SELECT 1 FROM rooms WHERE id = ?")
            .bind(room_id.als_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn raum_loeschen(&self, room_id: &RoomId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM rooms WHERE id = ?")
            .bind(room_id.als_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mitglied_loeschen(&self, room_id: &RoomId, user_id: &UserId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM room_members WHERE room_id = ? AND user_id = ?")
            .bind(room_id.als_str())
            .bind(user_id.als_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mitglieder_anzahl(&self, room_id: &RoomId) -> StoreResult<u32> {
        let row = sqlx::query("SELECT COUNT(*) AS anzahl FROM room_members WHERE room_id = ?")
            .bind(room_id.als_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("anzahl")? as u32)
    }

    async fn raum_aufloesen(&self, room_id: &RoomId) -> StoreResult<()> {
        // Mitgliedschaften und Raum in einer Transaktion loeschen damit
        // nie eine verwaiste Mitgliedschaft ohne Raum zurueckbleibt
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM room_members WHERE room_id = ?")
            .bind(room_id.als_str())
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM rooms WHERE id = ?")
            .bind(room_id.als_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

impl SqliteStore {
    /// Legt einen Raum an (nur fuer Tests und Seeding – im Betrieb
    /// schreibt das externe CRUD-System diese Tabellen)
    pub async fn raum_anlegen(&self, raum: &RaumRecord) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO rooms (id, external_id, owner_id, max_members, status, created_at)
             VALUES (?, ?, ?, ?, 'active', ?)",
        )
        .bind(raum.id.als_str())
        .bind(&raum.external_id)
        .bind(raum.owner_id.als_str())
        .bind(raum.max_mitglieder as i64)
        .bind(raum.erstellt_am.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Legt eine Mitgliedschaft an (nur fuer Tests und Seeding)
    pub async fn mitglied_anlegen(&self, mitglied: &MitgliedRecord) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO room_members (room_id, user_id, role)
             VALUES (?, ?, ?)",
        )
        .bind(mitglied.room_id.als_str())
        .bind(mitglied.user_id.als_str())
        .bind(mitglied.rolle.als_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
