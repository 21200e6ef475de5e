//! Echtzeit-Frames fuer die Client-Verbindung
//!
//! Alle Frames sind JSON-Objekte mit einem `type`-Feld als Diskriminator.
//!
//! ## Design
//! - Tagged Enum fuer typsichere Frame-Typen
//! - Feldnamen auf dem Draht in camelCase (Kompatibilitaet mit den
//!   Web-Clients)
//! - `draw_event` transportiert beliebige Nutzdaten die unveraendert an
//!   die Raum-Teilnehmer weitergereicht werden

use serde::{Deserialize, Serialize};
use kritzel_core::types::{RoomId, UserId};

// ---------------------------------------------------------------------------
// Loesch-Gruende
// ---------------------------------------------------------------------------

/// Grund fuer eine Raum-Aufloesung (wird im `room_deleted`-Frame mitgesendet)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoeschGrund {
    /// Besitzer hat den Raum explizit verlassen oder geloescht
    #[serde(rename = "explicit")]
    Explizit,
    /// Besitzer hatte zum Sweep-Zeitpunkt keine lebende Verbindung
    #[serde(rename = "owner_disconnected")]
    BesitzerGetrennt,
    /// Besitzer hat die maximale Anzahl verpasster Probes erreicht
    #[serde(rename = "owner_timeout")]
    BesitzerTimeout,
}

// ---------------------------------------------------------------------------
// Frame-Strukturen
// ---------------------------------------------------------------------------

/// Beitritts-Anfrage vom Client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinFrame {
    pub user_id: UserId,
    pub room_id: RoomId,
}

/// Bestaetigung des Beitritts (Server -> Client)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedFrame {
    pub room_id: RoomId,
    pub user_id: UserId,
}

/// Raum verlassen (Client -> Server)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveFrame {
    pub room_id: RoomId,
}

/// Heartbeat in beide Richtungen
///
/// Vom Client ohne Felder gesendet (Liveness-Ack), vom Server mit
/// `timestamp` als Probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatFrame {
    /// Unix-Timestamp in Millisekunden (nur bei Server-Probes gesetzt)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

/// Heartbeat-Bestaetigung (Server -> Client)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatAckFrame {
    /// Server-Zeit als Unix-Timestamp in Millisekunden
    pub timestamp: u64,
}

/// Zeichen-Event mit beliebigen Nutzdaten
///
/// Die Nutzdaten werden nicht interpretiert sondern unveraendert an alle
/// anderen Raum-Teilnehmer weitergereicht.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawEventFrame {
    #[serde(flatten)]
    pub daten: serde_json::Map<String, serde_json::Value>,
}

/// Raum wurde aufgeloest (Server -> Client)
///
/// Der Client muss daraufhin die Verbindung trennen und lokal aufraeumen.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDeletedFrame {
    pub room_id: RoomId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<LoeschGrund>,
}

// ---------------------------------------------------------------------------
// Haupt-Enum: Frame
// ---------------------------------------------------------------------------

/// Alle moeglichen Frames (typsicher via Tagged Enum)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    // Client -> Server
    Join(JoinFrame),
    Leave(LeaveFrame),

    // Beide Richtungen
    Heartbeat(HeartbeatFrame),
    DrawEvent(DrawEventFrame),

    // Server -> Client
    Joined(JoinedFrame),
    HeartbeatAck(HeartbeatAckFrame),
    RoomDeleted(RoomDeletedFrame),
}

impl Frame {
    /// Erstellt eine Beitritts-Bestaetigung
    pub fn joined(room_id: RoomId, user_id: UserId) -> Self {
        Self::Joined(JoinedFrame { room_id, user_id })
    }

    /// Erstellt eine Heartbeat-Bestaetigung mit Server-Zeit
    pub fn heartbeat_ack(timestamp: u64) -> Self {
        Self::HeartbeatAck(HeartbeatAckFrame { timestamp })
    }

    /// Erstellt eine Server-Heartbeat-Probe
    pub fn heartbeat_probe(timestamp: u64) -> Self {
        Self::Heartbeat(HeartbeatFrame {
            timestamp: Some(timestamp),
        })
    }

    /// Erstellt ein Raum-Aufloesungs-Frame
    pub fn room_deleted(room_id: RoomId, reason: Option<LoeschGrund>) -> Self {
        Self::RoomDeleted(RoomDeletedFrame { room_id, reason })
    }
}

/// Gibt die aktuelle Unix-Zeit in Millisekunden zurueck
pub fn unix_zeit_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
