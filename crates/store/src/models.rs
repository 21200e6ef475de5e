//! Datensatz-Modelle fuer Raeume und Mitgliedschaften
//!
//! Der Koordinator haelt von diesen Records nur transiente Sichten –
//! die Wahrheit liegt immer im Store.

use chrono::{DateTime, Utc};
use kritzel_core::types::{RoomId, UserId};

use crate::error::StoreError;

/// Rolle eines Mitglieds in einem Raum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MitgliedsRolle {
    /// Besitzer des Raums – sein Ausfall loest die Raum-Aufloesung aus
    Besitzer,
    /// Normales Mitglied
    Mitglied,
}

impl MitgliedsRolle {
    /// Gibt die Rolle als DB-String zurueck
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Besitzer => "owner",
            Self::Mitglied => "member",
        }
    }

    /// Parst eine Rolle aus dem DB-String
    pub fn aus_str(s: &str) -> Result<Self, StoreError> {
        match s {
            "owner" => Ok(Self::Besitzer),
            "member" => Ok(Self::Mitglied),
            andere => Err(StoreError::UngueltigeDaten(format!(
                "Unbekannte Rolle: {andere}"
            ))),
        }
    }
}

/// Datensatz fuer einen aktiven Raum
#[derive(Debug, Clone)]
pub struct RaumRecord {
    /// Raum-ID (vom externen Raum-System vergeben)
    pub id: RoomId,
    /// Oeffentlicher Raum-Code den Clients zum Beitreten verwenden
    pub external_id: String,
    /// Besitzer des Raums
    pub owner_id: UserId,
    /// Maximale Mitgliederzahl
    pub max_mitglieder: u32,
    /// Erstellungszeitpunkt
    pub erstellt_am: DateTime<Utc>,
}

/// Datensatz fuer eine Raum-Mitgliedschaft
#[derive(Debug, Clone)]
pub struct MitgliedRecord {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub rolle: MitgliedsRolle,
}

impl MitgliedRecord {
    /// Prueft ob dieses Mitglied der Raum-Besitzer ist
    pub fn ist_besitzer(&self) -> bool {
        self.rolle == MitgliedsRolle::Besitzer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolle_round_trip() {
        for rolle in [MitgliedsRolle::Besitzer, MitgliedsRolle::Mitglied] {
            assert_eq!(MitgliedsRolle::aus_str(rolle.als_str()).unwrap(), rolle);
        }
    }

    #[test]
    fn unbekannte_rolle_ist_fehler() {
        assert!(MitgliedsRolle::aus_str("admin").is_err());
    }
}
