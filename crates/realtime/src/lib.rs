//! kritzel-realtime – Echtzeit-Koordinator fuer Raum-Praesenz
//!
//! Dieser Crate verwaltet die lebenden Client-Verbindungen der
//! Zeichen-Raeume: wer ist mit welchem Raum verbunden, welche
//! Verbindungen sind noch ansprechbar, und wann wird ein Raum
//! aufgeloest. Zeichen-Events werden best-effort an alle anderen
//! Raum-Teilnehmer weitergereicht.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (RaumServer)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task)
//!     |  State Machine: NichtBeigetreten -> Beigetreten -> Geschlossen
//!     |
//!     v
//! FrameDispatcher
//!     +-- join        -> VerbindungsRegistry + joined-Antwort
//!     +-- heartbeat   -> Ack verbuchen + heartbeat_ack
//!     +-- draw_event  -> RaumBroadcaster (Sender ausgenommen)
//!     +-- leave       -> RaumLebenszyklus (Eviction oder Aufloesung)
//!
//! VerbindungsRegistry – (Raum, Benutzer) -> lebende Verbindung + Zaehler
//! RaumBroadcaster     – Frames an Raum-Teilnehmer senden
//! LivenessSweeper     – periodische Probe aller Raum-Mitglieder
//! RaumLebenszyklus    – Eviction- und Aufloesungs-Entscheidungen
//! ```
//!
//! Die Registry ist der einzige geteilte veraenderliche Zustand; der
//! Store (kritzel-store) bleibt die alleinige Wahrheit fuer Raeume und
//! Mitgliedschaften und wird vor jeder destruktiven Entscheidung im
//! selben Sweep-Schritt erneut gelesen.

pub mod broadcast;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod registry;
pub mod server_state;
pub mod sweeper;
pub mod tcp;

// Bequeme Re-Exporte
pub use broadcast::RaumBroadcaster;
pub use connection::ClientConnection;
pub use dispatcher::FrameDispatcher;
pub use error::{RealtimeError, RealtimeResult};
pub use lifecycle::RaumLebenszyklus;
pub use registry::VerbindungsRegistry;
pub use server_state::{KoordinatorState, RealtimeConfig};
pub use sweeper::LivenessSweeper;
pub use tcp::RaumServer;
