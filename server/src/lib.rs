//! kritzel-server – Bibliotheks-Root
//!
//! Verdrahtet Store, Echtzeit-Koordinator und Liveness-Sweeper und
//! stellt den oeffentlichen Einstiegspunkt fuer Integrationstests
//! bereit.

pub mod config;

use anyhow::Result;
use config::ServerConfig;
use kritzel_core::KritzelError;
use kritzel_realtime::{KoordinatorState, LivenessSweeper, RaumServer, RealtimeConfig};
use kritzel_store::sqlite::StoreConfig;
use kritzel_store::SqliteStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Server-Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Datenbankverbindung herstellen (inkl. Migrationen)
    /// 2. TCP-Listener starten (Client-Frames)
    /// 3. Liveness-Sweeper starten
    /// 4. Auf Ctrl-C warten, dann Shutdown-Signal verteilen
    pub async fn starten(self) -> Result<()> {
        tracing::info!(
            server_name = %self.config.server.name,
            tcp = %self.config.tcp_bind_adresse(),
            "Server startet"
        );

        let store = SqliteStore::oeffnen(&StoreConfig {
            url: self.config.datenbank.url.clone(),
            max_verbindungen: self.config.datenbank.max_verbindungen,
            sqlite_wal: self.config.datenbank.sqlite_wal,
        })
        .await?;

        let realtime_config = RealtimeConfig {
            server_name: self.config.server.name.clone(),
            max_clients: self.config.server.max_clients as usize,
            sweep_intervall_sek: self.config.sweeper.intervall_sek,
            max_verpasste_probes: self.config.sweeper.max_verpasste_probes,
        };
        let state = KoordinatorState::neu(realtime_config, Arc::new(store));

        let bind_addr: SocketAddr = self
            .config
            .tcp_bind_adresse()
            .parse()
            .map_err(|e| KritzelError::Konfiguration(format!("Ungueltige Bind-Adresse: {e}")))?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Verbindungs-Tasks sind nicht Send, daher laeuft alles in
        // einem LocalSet
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async move {
                let sweeper_state = state.clone();
                let sweeper_shutdown = shutdown_rx.clone();
                tokio::task::spawn_local(async move {
                    LivenessSweeper::neu(sweeper_state)
                        .starten(sweeper_shutdown)
                        .await;
                });

                let server_shutdown = shutdown_rx.clone();
                let server_task = tokio::task::spawn_local(async move {
                    RaumServer::neu(state)
                        .starten(bind_addr, server_shutdown)
                        .await
                });

                tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
                tokio::signal::ctrl_c().await?;
                tracing::info!("Shutdown-Signal empfangen, Server wird beendet");

                // Sweeper und alle Verbindungs-Tasks benachrichtigen
                let _ = shutdown_tx.send(true);
                server_task.await??;

                Ok(())
            })
            .await
    }
}
