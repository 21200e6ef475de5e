//! Geteilter Zustand des Echtzeit-Koordinators
//!
//! `KoordinatorState` buendelt Konfiguration, Store-Handle, Registry,
//! Broadcaster und Lebenszyklus. Clone ist billig und teilt den
//! Zustand; jeder Verbindungs-Task und der Sweeper arbeiten auf
//! derselben Instanz.

use crate::broadcast::RaumBroadcaster;
use crate::lifecycle::RaumLebenszyklus;
use crate::registry::VerbindungsRegistry;
use kritzel_store::RaumStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Laufzeit-Konfiguration des Koordinators
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Angezeigter Server-Name (Logging)
    pub server_name: String,
    /// Maximale Anzahl gleichzeitiger Client-Verbindungen
    pub max_clients: usize,
    /// Abstand zwischen zwei Sweep-Zyklen in Sekunden
    pub sweep_intervall_sek: u64,
    /// Anzahl verpasster Probes nach der eine Verbindung als tot gilt
    pub max_verpasste_probes: u32,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            server_name: "Kritzel Server".to_string(),
            max_clients: 512,
            sweep_intervall_sek: 10,
            max_verpasste_probes: 3,
        }
    }
}

impl RealtimeConfig {
    /// Sweep-Intervall als Duration
    pub fn sweep_intervall(&self) -> Duration {
        Duration::from_secs(self.sweep_intervall_sek.max(1))
    }
}

// ---------------------------------------------------------------------------
// KoordinatorState
// ---------------------------------------------------------------------------

/// Geteilter Zustand fuer Verbindungs-Tasks und Sweeper
pub struct KoordinatorState<S: RaumStore> {
    pub config: RealtimeConfig,
    pub store: Arc<S>,
    pub registry: VerbindungsRegistry,
    pub broadcaster: RaumBroadcaster,
    pub lebenszyklus: RaumLebenszyklus<S>,
    /// Anzahl lebender Verbindungs-Tasks (auch vor dem join)
    aktive_verbindungen: Arc<AtomicUsize>,
}

impl<S: RaumStore> Clone for KoordinatorState<S> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            store: Arc::clone(&self.store),
            registry: self.registry.clone(),
            broadcaster: self.broadcaster.clone(),
            lebenszyklus: self.lebenszyklus.clone(),
            aktive_verbindungen: Arc::clone(&self.aktive_verbindungen),
        }
    }
}

impl<S: RaumStore> KoordinatorState<S> {
    /// Baut den kompletten Koordinator-Zustand auf
    pub fn neu(config: RealtimeConfig, store: Arc<S>) -> Self {
        let registry = VerbindungsRegistry::neu();
        let broadcaster = RaumBroadcaster::neu(registry.clone());
        let lebenszyklus =
            RaumLebenszyklus::neu(Arc::clone(&store), registry.clone(), broadcaster.clone());

        Self {
            config,
            store,
            registry,
            broadcaster,
            lebenszyklus,
            aktive_verbindungen: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Reserviert einen Verbindungs-Slot beim Accept
    ///
    /// Zaehlt lebende Verbindungs-Tasks, nicht Registry-Eintraege; auch
    /// angenommene aber noch nicht beigetretene Sockets belegen einen
    /// Slot. Gibt false zurueck wenn die Kapazitaet erreicht ist.
    pub fn verbindung_reservieren(&self) -> bool {
        let vorher = self.aktive_verbindungen.fetch_add(1, Ordering::SeqCst);
        if vorher >= self.config.max_clients {
            self.aktive_verbindungen.fetch_sub(1, Ordering::SeqCst);
            return false;
        }
        true
    }

    /// Gibt einen reservierten Verbindungs-Slot wieder frei
    pub fn verbindung_freigeben(&self) {
        self.aktive_verbindungen.fetch_sub(1, Ordering::SeqCst);
    }

    /// Anzahl aktuell belegter Verbindungs-Slots
    pub fn aktive_verbindungen(&self) -> usize {
        self.aktive_verbindungen.load(Ordering::SeqCst)
    }
}
