//! Wire-Format fuer TCP-Verbindungen
//!
//! Frame-basiertes Protokoll: Length(u32 big-endian) + JSON-Payload.
//!
//! ## Frame-Format
//!
//! ```text
//! +--------+--------+--------+--------+----...----+
//! | Laenge (u32 BE) | 4 Bytes        | Payload    |
//! +--------+--------+--------+--------+----...----+
//! ```
//!
//! Die Laenge gibt die Anzahl der Payload-Bytes an (ohne die 4 Laengen-Bytes).
//! Maximale Frame-Groesse ist konfigurierbar (Standard: 1 MB).
//!
//! Ein nicht deserialisierbarer Payload (ungueltiges JSON, unbekannter
//! `type`) verbraucht den Frame trotzdem vollstaendig – der Decoder
//! synchronisiert sich am naechsten Laengen-Feld neu. Die Verbindung
//! bleibt dadurch nach einem fehlerhaften Frame nutzbar.

use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

use crate::frames::Frame;

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-maximale Frame-Groesse (1 MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Groesse des Laengen-Felds in Bytes
pub const LENGTH_FIELD_SIZE: usize = 4;

// ---------------------------------------------------------------------------
// Decode-Ergebnis
// ---------------------------------------------------------------------------

/// Ergebnis eines Dekodier-Versuchs
///
/// Fehlerhafte Frames werden als `Ungueltig` gemeldet statt als
/// IO-Fehler, damit die Verbindungs-Schleife sie loggen und die
/// Verbindung offen halten kann.
#[derive(Debug)]
pub enum DecodedFrame {
    /// Erfolgreich dekodierter Frame
    Gueltig(Frame),
    /// Payload war kein gueltiger Frame (JSON-Fehler oder unbekannter Typ)
    Ungueltig(String),
}

// ---------------------------------------------------------------------------
// FrameCodec
// ---------------------------------------------------------------------------

/// tokio-util Codec fuer frame-basierte TCP-Verbindungen
///
/// Implementiert `Encoder<Frame>` und `Decoder` fuer nahtlose
/// Integration mit `tokio_util::codec::Framed`.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    /// Maximale erlaubte Frame-Groesse in Bytes
    max_frame_size: usize,
}

impl FrameCodec {
    /// Erstellt einen neuen `FrameCodec` mit Standard-Limits
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Erstellt einen `FrameCodec` mit benutzerdefinierter maximaler Frame-Groesse
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Gibt die konfigurierte maximale Frame-Groesse zurueck
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Decoder-Implementierung
// ---------------------------------------------------------------------------

impl Decoder for FrameCodec {
    type Item = DecodedFrame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Warte auf mindestens 4 Bytes fuer das Laengen-Feld
        if src.len() < LENGTH_FIELD_SIZE {
            return Ok(None);
        }

        // Laenge lesen (big-endian u32) ohne den Buffer zu veraendern
        let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;

        // Maximale Frame-Groesse pruefen – hier ist keine Neusynchronisation
        // moeglich, die Verbindung muss getrennt werden
        if length > self.max_frame_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Frame zu gross: {} Bytes (Maximum: {} Bytes)",
                    length, self.max_frame_size
                ),
            ));
        }

        // Pruefen ob der vollstaendige Frame bereits im Buffer ist
        let total_size = LENGTH_FIELD_SIZE + length;
        if src.len() < total_size {
            // Speicher vorbelegen um Reallocations zu vermeiden
            src.reserve(total_size - src.len());
            return Ok(None);
        }

        // Laengen-Feld verbrauchen
        src.advance(LENGTH_FIELD_SIZE);

        // Payload-Bytes extrahieren
        let payload = src.split_to(length);

        // JSON deserialisieren – Fehler verbrauchen den Frame und werden
        // der Verbindungs-Schleife als Ungueltig gemeldet
        match serde_json::from_slice::<Frame>(&payload) {
            Ok(frame) => Ok(Some(DecodedFrame::Gueltig(frame))),
            Err(e) => Ok(Some(DecodedFrame::Ungueltig(format!(
                "JSON-Deserialisierung fehlgeschlagen: {}",
                e
            )))),
        }
    }
}

// ---------------------------------------------------------------------------
// Encoder-Implementierung
// ---------------------------------------------------------------------------

impl Encoder<Frame> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        // JSON serialisieren
        let json = serde_json::to_vec(&item).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("JSON-Serialisierung fehlgeschlagen: {}", e),
            )
        })?;

        // Groesse pruefen
        if json.len() > self.max_frame_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Nachricht zu gross: {} Bytes (Maximum: {} Bytes)",
                    json.len(),
                    self.max_frame_size
                ),
            ));
        }

        // Laengen-Feld + Payload schreiben
        dst.reserve(LENGTH_FIELD_SIZE + json.len());
        dst.put_u32(json.len() as u32);
        dst.put_slice(&json);

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::Frame;

    fn test_probe(ts: u64) -> Frame {
        Frame::heartbeat_probe(ts)
    }

    fn decode_gueltig(codec: &mut FrameCodec, buf: &mut BytesMut) -> Frame {
        match codec.decode(buf).unwrap().expect("Frame erwartet") {
            DecodedFrame::Gueltig(f) => f,
            DecodedFrame::Ungueltig(e) => panic!("Unerwartet ungueltig: {}", e),
        }
    }

    #[test]
    fn frame_codec_encode_decode_round_trip() {
        let mut codec = FrameCodec::new();
        let original = test_probe(999888777);

        let mut buf = BytesMut::new();
        codec.encode(original, &mut buf).unwrap();

        // Laengen-Feld pruefen
        let payload_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        assert!(payload_len > 0);
        assert_eq!(buf.len(), LENGTH_FIELD_SIZE + payload_len);

        let decoded = decode_gueltig(&mut codec, &mut buf);
        match decoded {
            Frame::Heartbeat(hb) => assert_eq!(hb.timestamp, Some(999888777)),
            _ => panic!("Erwartet Heartbeat-Frame"),
        }
    }

    #[test]
    fn frame_codec_unvollstaendiger_frame() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(test_probe(1), &mut buf).unwrap();

        // Nur die Haelfte der Bytes behalten
        let half = buf.len() / 2;
        let mut partial = buf.split_to(half);

        // Sollte None zurueckgeben (wartet auf mehr Daten)
        let result = codec.decode(&mut partial).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn frame_codec_zu_wenig_bytes_fuer_laengenfeld() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&[0x00, 0x00][..]);
        let result = codec.decode(&mut buf).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn frame_codec_ablehnung_zu_grosser_frame() {
        let mut codec = FrameCodec::with_max_size(100);

        // Frame-Laenge von 200 Bytes im Buffer simulieren
        let mut buf = BytesMut::new();
        buf.put_u32(200);
        buf.put_slice(&[b'x'; 200]);

        let result = codec.decode(&mut buf);
        assert!(result.is_err());
    }

    #[test]
    fn frame_codec_ungueltiges_json_verbraucht_frame() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        // Kaputten Payload gefolgt von einem gueltigen Frame einreihen
        let kaputt = b"{nicht json}";
        buf.put_u32(kaputt.len() as u32);
        buf.put_slice(kaputt);
        codec.encode(test_probe(7), &mut buf).unwrap();

        // Erster Decode: Ungueltig, aber kein Fehler
        match codec.decode(&mut buf).unwrap().expect("Frame erwartet") {
            DecodedFrame::Ungueltig(_) => {}
            DecodedFrame::Gueltig(_) => panic!("Kaputter Payload darf nicht gueltig sein"),
        }

        // Zweiter Decode: der gueltige Frame dahinter
        let decoded = decode_gueltig(&mut codec, &mut buf);
        assert!(matches!(decoded, Frame::Heartbeat(_)));
        assert!(buf.is_empty());
    }

    #[test]
    fn frame_codec_unbekannter_typ_verbraucht_frame() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        let unbekannt = br#"{"type":"teleport"}"#;
        buf.put_u32(unbekannt.len() as u32);
        buf.put_slice(unbekannt);

        match codec.decode(&mut buf).unwrap().expect("Frame erwartet") {
            DecodedFrame::Ungueltig(grund) => {
                assert!(grund.contains("JSON-Deserialisierung"));
            }
            DecodedFrame::Gueltig(_) => panic!("Unbekannter Typ darf nicht gueltig sein"),
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn frame_codec_mehrere_nachrichten_im_buffer() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        for i in 0..3u64 {
            codec.encode(test_probe(i), &mut buf).unwrap();
        }

        for i in 0..3u64 {
            let decoded = decode_gueltig(&mut codec, &mut buf);
            match decoded {
                Frame::Heartbeat(hb) => assert_eq!(hb.timestamp, Some(i)),
                _ => panic!("Erwartet Heartbeat-Frame"),
            }
        }

        assert!(buf.is_empty());
    }

    #[test]
    fn frame_codec_default_max_size() {
        let codec = FrameCodec::new();
        assert_eq!(codec.max_frame_size(), DEFAULT_MAX_FRAME_SIZE);
    }
}
