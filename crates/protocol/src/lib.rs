//! kritzel-protocol – Frame-Definitionen und Wire-Format
//!
//! Definiert die JSON-Frames die zwischen Client und Koordinator
//! ausgetauscht werden sowie den Codec fuer die TCP-Verbindung.

pub mod frames;
pub mod wire;

pub use frames::{
    unix_zeit_ms, DrawEventFrame, Frame, HeartbeatAckFrame, HeartbeatFrame, JoinFrame,
    JoinedFrame, LeaveFrame, LoeschGrund, RoomDeletedFrame,
};
pub use wire::{DecodedFrame, FrameCodec};
