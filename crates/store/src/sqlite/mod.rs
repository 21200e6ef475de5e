//! SQLite-Implementierung des RaumStore

mod pool;
mod raeume;

pub use pool::{SqliteStore, StoreConfig};
