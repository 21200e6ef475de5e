//! Client-Verbindung – Frame-Schleife fuer einen TCP-Client
//!
//! Jede Verbindung laeuft als eigener Task und multiplext drei
//! Ereignisquellen: eingehende Frames vom Socket, ausgehende Frames
//! aus der Send-Queue und das Shutdown-Signal. Ungueltige Frames
//! werden geloggt und verworfen, die Verbindung bleibt offen.

use crate::dispatcher::{DispatcherContext, FrameDispatcher};
use crate::error::RealtimeResult;
use crate::server_state::KoordinatorState;
use futures_util::{SinkExt, StreamExt};
use kritzel_protocol::{DecodedFrame, Frame, FrameCodec};
use kritzel_store::RaumStore;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_util::codec::Framed;

/// Groesse der Ausgangs-Queue zwischen Dispatcher und Socket
const AUSGANGS_QUEUE_GROESSE: usize = 64;

/// Eine aktive Client-Verbindung
pub struct ClientConnection<S: RaumStore> {
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: KoordinatorState<S>,
}

impl<S: RaumStore> ClientConnection<S> {
    pub fn neu(stream: TcpStream, peer_addr: SocketAddr, state: KoordinatorState<S>) -> Self {
        Self {
            stream,
            peer_addr,
            state,
        }
    }

    /// Fuehrt die Frame-Schleife bis zum Verbindungsende aus
    ///
    /// Beendet sich bei Socket-Schluss, IO-Fehler oder Shutdown-Signal
    /// und raeumt dabei den Registry-Eintrag der Verbindung weg.
    pub async fn verarbeiten(self, mut shutdown_rx: watch::Receiver<bool>) -> RealtimeResult<()> {
        let peer_addr = self.peer_addr;
        let mut framed = Framed::new(self.stream, FrameCodec::new());

        let (sende_tx, mut sende_rx) = mpsc::channel::<Frame>(AUSGANGS_QUEUE_GROESSE);
        let dispatcher = FrameDispatcher::neu(self.state.clone());
        let mut ctx = DispatcherContext::neu(peer_addr, sende_tx);

        tracing::debug!(peer = %peer_addr, "Verbindungs-Schleife gestartet");

        loop {
            tokio::select! {
                eingehend = framed.next() => {
                    match eingehend {
                        Some(Ok(DecodedFrame::Gueltig(frame))) => {
                            match dispatcher.verarbeiten(&mut ctx, frame).await {
                                Ok(Some(antwort)) => {
                                    if let Err(e) = framed.send(antwort).await {
                                        tracing::debug!(peer = %peer_addr, fehler = %e, "Antwort-Senden fehlgeschlagen");
                                        break;
                                    }
                                }
                                Ok(None) => {}
                                // Store-Fehler einzelner Frames trennen die
                                // Verbindung nicht
                                Err(e) => {
                                    tracing::error!(peer = %peer_addr, fehler = %e, "Frame-Verarbeitung fehlgeschlagen");
                                }
                            }
                        }
                        Some(Ok(DecodedFrame::Ungueltig(grund))) => {
                            tracing::warn!(peer = %peer_addr, grund = %grund, "Ungueltiges Frame verworfen");
                        }
                        Some(Err(e)) => {
                            tracing::warn!(peer = %peer_addr, fehler = %e, "Verbindungsfehler");
                            break;
                        }
                        None => {
                            tracing::debug!(peer = %peer_addr, "Client hat die Verbindung geschlossen");
                            break;
                        }
                    }
                }
                ausgehend = sende_rx.recv() => {
                    // Die Queue schliesst nie solange ctx lebt
                    let Some(frame) = ausgehend else { break };
                    if let Err(e) = framed.send(frame).await {
                        tracing::debug!(peer = %peer_addr, fehler = %e, "Senden fehlgeschlagen");
                        break;
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::debug!(peer = %peer_addr, "Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        dispatcher.verbindung_schliessen(&ctx);
        Ok(())
    }
}
