//! TCP-Server – Accept-Schleife fuer Client-Verbindungen
//!
//! Verbindungen laufen als `spawn_local`-Tasks; der Server muss daher
//! innerhalb eines `tokio::task::LocalSet` gestartet werden. Bei
//! erreichter Kapazitaet werden neue Verbindungen sofort wieder
//! geschlossen.

use crate::connection::ClientConnection;
use crate::error::RealtimeResult;
use crate::server_state::KoordinatorState;
use kritzel_store::RaumStore;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// TCP-Server des Echtzeit-Koordinators
pub struct RaumServer<S: RaumStore> {
    state: KoordinatorState<S>,
}

impl<S: RaumStore + 'static> RaumServer<S> {
    pub fn neu(state: KoordinatorState<S>) -> Self {
        Self { state }
    }

    /// Bindet die Adresse und startet die Accept-Schleife
    pub async fn starten(
        &self,
        bind_addr: SocketAddr,
        shutdown_rx: watch::Receiver<bool>,
    ) -> RealtimeResult<()> {
        let listener = TcpListener::bind(bind_addr).await?;
        self.mit_listener(listener, shutdown_rx).await
    }

    /// Startet die Accept-Schleife auf einem bereits gebundenen Listener
    pub async fn mit_listener(
        &self,
        listener: TcpListener,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> RealtimeResult<()> {
        let addr = listener.local_addr()?;
        tracing::info!(
            addr = %addr,
            server = %self.state.config.server_name,
            max_clients = self.state.config.max_clients,
            "Raum-Server lauscht"
        );

        loop {
            tokio::select! {
                angenommen = listener.accept() => {
                    match angenommen {
                        Ok((stream, peer_addr)) => {
                            // Slot wird beim Accept belegt und erst beim
                            // Task-Ende wieder frei; so zaehlen auch noch
                            // nicht beigetretene Sockets gegen max_clients
                            if !self.state.verbindung_reservieren() {
                                tracing::warn!(peer = %peer_addr, "Kapazitaet erreicht – Verbindung abgewiesen");
                                drop(stream);
                                continue;
                            }

                            tracing::debug!(peer = %peer_addr, "Neue Verbindung angenommen");
                            let state = self.state.clone();
                            let verbindung =
                                ClientConnection::neu(stream, peer_addr, state.clone());
                            let conn_shutdown = shutdown_rx.clone();
                            tokio::task::spawn_local(async move {
                                if let Err(e) = verbindung.verarbeiten(conn_shutdown).await {
                                    tracing::warn!(peer = %peer_addr, fehler = %e, "Verbindung mit Fehler beendet");
                                }
                                state.verbindung_freigeben();
                            });
                        }
                        Err(e) => {
                            tracing::warn!(fehler = %e, "accept fehlgeschlagen");
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Raum-Server beendet");
                        return Ok(());
                    }
                }
            }
        }
    }
}
