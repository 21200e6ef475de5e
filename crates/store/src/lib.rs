//! kritzel-store – Persistenz-Schnittstelle fuer Raeume
//!
//! Dieses Crate stellt das Repository-Pattern fuer die dauerhaften
//! Raum- und Mitgliedschafts-Daten bereit. Der Echtzeit-Koordinator
//! besitzt diese Daten nicht – er liest und loescht sie ueber den
//! `RaumStore`-Trait. Seine eigene Sicht ist immer nur ein Cache der
//! zwischen zwei Sweeps veralten kann.
//!
//! Implementierungen:
//! - `SqliteStore` – Standard fuer Single-Instance-Betrieb (sqlx)
//! - `MemoryStore` – fuer Tests und Entwicklungsmodus

pub mod error;
pub mod memory;
pub mod models;
pub mod repository;
pub mod sqlite;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use models::{MitgliedRecord, MitgliedsRolle, RaumRecord};
pub use repository::RaumStore;
pub use sqlite::SqliteStore;
