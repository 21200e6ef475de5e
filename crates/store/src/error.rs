//! Fehlertypen fuer das Store-Crate

use thiserror::Error;

/// Result-Alias fuer Store-Operationen
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Store-Fehlertypen
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Datensatz nicht gefunden: {0}")]
    NichtGefunden(String),

    #[error("Ungueltige Daten: {0}")]
    UngueltigeDaten(String),

    #[error("SQLx-Fehler: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration-Fehler: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Interner Store-Fehler: {0}")]
    Intern(String),
}

impl StoreError {
    pub fn nicht_gefunden(msg: impl Into<String>) -> Self {
        Self::NichtGefunden(msg.into())
    }

    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}
