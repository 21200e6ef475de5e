//! kritzel-core – Gemeinsame Typen und Fehler
//!
//! Dieser Crate enthaelt die Bausteine die von allen anderen
//! Kritzel-Crates verwendet werden: ID-Newtypes und der zentrale
//! Fehler-Enum.

pub mod error;
pub mod types;

pub use error::{KritzelError, Result};
pub use types::{RoomId, UserId};
