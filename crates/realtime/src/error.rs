//! Fehlertypen fuer den Echtzeit-Koordinator

use kritzel_store::StoreError;
use thiserror::Error;

/// Fehlertyp fuer den Echtzeit-Koordinator
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Store-Fehler (Raum-/Mitgliedschafts-Daten)
    #[error("Store-Fehler: {0}")]
    Store(#[from] StoreError),

    /// Verbindung wurde getrennt
    #[error("Verbindung getrennt")]
    VerbindungGetrennt,

    /// Protokollfehler (ungueltiges Frame, falscher Zustand)
    #[error("Protokollfehler: {0}")]
    Protokoll(String),

    /// Senden an Client fehlgeschlagen (Queue geschlossen)
    #[error("Senden fehlgeschlagen")]
    SendFehler,

    /// Interner Fehler
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl RealtimeError {
    /// Erstellt einen internen Fehler
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Erstellt einen Protokollfehler
    pub fn protokoll(msg: impl Into<String>) -> Self {
        Self::Protokoll(msg.into())
    }
}

/// Result-Typ fuer den Echtzeit-Koordinator
pub type RealtimeResult<T> = Result<T, RealtimeError>;
