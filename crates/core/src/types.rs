//! Gemeinsame Identifikationstypen fuer Kritzel
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen. Die IDs
//! stammen aus dem externen Benutzer-/Raum-System und werden auf dem
//! Draht als einfache Strings uebertragen – daher String-basiert und
//! nicht UUID-typisiert.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Eindeutige Benutzer-ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Erstellt eine neue zufaellige UserId
    pub fn neu() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Gibt die ID als String-Slice zurueck
    pub fn als_str(&self) -> &str {
        &self.0
    }

    /// Prueft ob die ID leer ist (ungueltig)
    pub fn ist_leer(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Eindeutige Raum-ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Erstellt eine neue zufaellige RoomId
    pub fn neu() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Gibt die ID als String-Slice zurueck
    pub fn als_str(&self) -> &str {
        &self.0
    }

    /// Prueft ob die ID leer ist (ungueltig)
    pub fn ist_leer(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
