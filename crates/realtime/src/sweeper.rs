//! Liveness-Sweeper – periodische Praesenz-Pruefung aller Raeume
//!
//! Der Sweeper laeuft als eigener Task und prueft in festem Abstand
//! jeden aktiven Raum: hat jedes Mitglied noch eine lebende,
//! ansprechbare Verbindung? Probes werden optimistisch als verpasst
//! gezaehlt; erst das Ack des Clients setzt den Zaehler zurueck.
//!
//! ## Eskalation
//! - Mitglied ohne lebende Verbindung: sofort. Besitzer -> Raum wird
//!   aufgeloest (owner_disconnected), Mitglied -> Eviction.
//! - Mitglied mit lebender aber stummer Verbindung: erst nach
//!   `max_verpasste_probes` Fehlschlaegen. Besitzer -> Aufloesung
//!   (owner_timeout), Mitglied -> Eviction.
//!
//! Vor jeder destruktiven Entscheidung wird der Store im selben
//! Schritt erneut gelesen; ein extern geloeschter Raum wird nur noch
//! weggeraeumt, nicht nochmal geloescht.

use crate::error::RealtimeResult;
use crate::server_state::KoordinatorState;
use kritzel_core::types::RoomId;
use kritzel_protocol::{unix_zeit_ms, Frame, LoeschGrund};
use kritzel_store::{MitgliedRecord, RaumStore};
use tokio::sync::watch;

/// Ergebnis der Pruefung eines einzelnen Raums
enum RaumErgebnis {
    /// Raum besteht weiter
    Besteht,
    /// Raum wurde aufgeloest oder ist verschwunden
    Weg,
}

/// Periodische Praesenz-Pruefung
pub struct LivenessSweeper<S: RaumStore> {
    state: KoordinatorState<S>,
}

impl<S: RaumStore> LivenessSweeper<S> {
    pub fn neu(state: KoordinatorState<S>) -> Self {
        Self { state }
    }

    /// Startet die Sweep-Schleife bis zum Shutdown-Signal
    ///
    /// Ein fehlgeschlagener Zyklus (z.B. Store nicht erreichbar) wird
    /// geloggt und beim naechsten Tick erneut versucht; destruktive
    /// Entscheidungen ohne verlaessliche Store-Daten gibt es nicht.
    pub async fn starten(&self, mut shutdown_rx: watch::Receiver<bool>) {
        let intervall = self.state.config.sweep_intervall();
        let mut ticker = tokio::time::interval(intervall);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Erster Tick feuert sofort, wir wollen erst nach einem Intervall pruefen
        ticker.tick().await;

        tracing::info!(intervall_sek = intervall.as_secs(), "Liveness-Sweeper gestartet");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.zyklus().await {
                        tracing::error!(fehler = %e, "Sweep-Zyklus fehlgeschlagen");
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Liveness-Sweeper beendet");
                        return;
                    }
                }
            }
        }
    }

    /// Fuehrt genau einen Sweep-Zyklus aus
    pub async fn zyklus(&self) -> RealtimeResult<()> {
        let raeume = self.state.store.aktive_raeume().await?;
        tracing::debug!(raeume = raeume.len(), "Sweep-Zyklus beginnt");

        for raum in &raeume {
            // Raum kann seit der Liste extern verschwunden sein
            if !self.state.store.raum_existiert(&raum.id).await? {
                self.state.lebenszyklus.raum_verschwunden(&raum.id);
                continue;
            }

            if let RaumErgebnis::Weg = self.raum_pruefen(&raum.id).await? {
                continue;
            }

            self.state.lebenszyklus.leeren_raum_bereinigen(&raum.id).await?;
        }

        Ok(())
    }

    /// Prueft alle Mitglieder eines Raums in zwei Runden
    ///
    /// Runde 1 sendet Probes an alle lebenden Verbindungen und
    /// eskaliert Abwesenheit sofort; Runde 2 prueft danach die
    /// Fehlschlag-Schwellen. So erhalten alle Mitglieder ihre Probe
    /// bevor die erste Schwellen-Entscheidung faellt.
    async fn raum_pruefen(&self, room_id: &RoomId) -> RealtimeResult<RaumErgebnis> {
        let mitglieder = self.state.store.mitglieder(room_id).await?;

        let mut lebende: Vec<&MitgliedRecord> = Vec::with_capacity(mitglieder.len());
        for mitglied in &mitglieder {
            if self.state.registry.ist_registriert(room_id, &mitglied.user_id) {
                let probe = Frame::heartbeat_probe(unix_zeit_ms());
                self.state
                    .broadcaster
                    .an_user_senden(room_id, &mitglied.user_id, probe);

                // Probe zaehlt als verpasst bis das Ack eintrifft. Ist
                // der Eintrag beim Senden weggefallen (Queue
                // geschlossen), gilt das Mitglied ab sofort als abwesend.
                if self
                    .state
                    .registry
                    .probe_verbucht(room_id, &mitglied.user_id)
                    .is_some()
                {
                    lebende.push(mitglied);
                    continue;
                }
            }

            if let RaumErgebnis::Weg = self.abwesenheit_eskalieren(room_id, mitglied).await? {
                return Ok(RaumErgebnis::Weg);
            }
        }

        for mitglied in lebende {
            if let RaumErgebnis::Weg = self.schwelle_pruefen(room_id, mitglied).await? {
                return Ok(RaumErgebnis::Weg);
            }
        }

        Ok(RaumErgebnis::Besteht)
    }

    /// Eskaliert ein Mitglied dessen Zaehler die Schwelle erreicht hat
    async fn schwelle_pruefen(
        &self,
        room_id: &RoomId,
        mitglied: &MitgliedRecord,
    ) -> RealtimeResult<RaumErgebnis> {
        let Some(fehlschlaege) = self.state.registry.fehlschlaege(room_id, &mitglied.user_id)
        else {
            return Ok(RaumErgebnis::Besteht);
        };

        if fehlschlaege < self.state.config.max_verpasste_probes {
            return Ok(RaumErgebnis::Besteht);
        }

        tracing::warn!(
            room_id = %room_id,
            user_id = %mitglied.user_id,
            fehlschlaege,
            "Liveness-Schwelle erreicht"
        );

        // Store-Zustand kann sich seit Zyklusbeginn geaendert haben
        if !self.state.store.raum_existiert(room_id).await? {
            self.state.lebenszyklus.raum_verschwunden(room_id);
            return Ok(RaumErgebnis::Weg);
        }

        if mitglied.ist_besitzer() {
            self.state
                .lebenszyklus
                .aufloesen(room_id, LoeschGrund::BesitzerTimeout)
                .await?;
            Ok(RaumErgebnis::Weg)
        } else {
            self.state
                .lebenszyklus
                .mitglied_entfernen(room_id, &mitglied.user_id)
                .await?;
            Ok(RaumErgebnis::Besteht)
        }
    }

    /// Eskaliert ein Mitglied ohne lebende Verbindung (sofort, ohne Schwelle)
    async fn abwesenheit_eskalieren(
        &self,
        room_id: &RoomId,
        mitglied: &MitgliedRecord,
    ) -> RealtimeResult<RaumErgebnis> {
        tracing::info!(
            room_id = %room_id,
            user_id = %mitglied.user_id,
            besitzer = mitglied.ist_besitzer(),
            "Mitglied ohne lebende Verbindung"
        );

        if !self.state.store.raum_existiert(room_id).await? {
            self.state.lebenszyklus.raum_verschwunden(room_id);
            return Ok(RaumErgebnis::Weg);
        }

        if mitglied.ist_besitzer() {
            self.state
                .lebenszyklus
                .aufloesen(room_id, LoeschGrund::BesitzerGetrennt)
                .await?;
            Ok(RaumErgebnis::Weg)
        } else {
            self.state
                .lebenszyklus
                .mitglied_entfernen(room_id, &mitglied.user_id)
                .await?;
            Ok(RaumErgebnis::Besteht)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server_state::RealtimeConfig;
    use chrono::Utc;
    use kritzel_core::types::UserId;
    use kritzel_store::{MemoryStore, RaumRecord};
    use std::sync::Arc;

    fn test_raum(id: &str, owner: &str) -> RaumRecord {
        RaumRecord {
            id: RoomId::from(id),
            external_id: id.to_string(),
            owner_id: UserId::from(owner),
            max_mitglieder: 8,
            erstellt_am: Utc::now(),
        }
    }

    fn aufbau(max_probes: u32) -> (Arc<MemoryStore>, KoordinatorState<MemoryStore>) {
        let store = Arc::new(MemoryStore::neu());
        let config = RealtimeConfig {
            max_verpasste_probes: max_probes,
            ..RealtimeConfig::default()
        };
        let state = KoordinatorState::neu(config, Arc::clone(&store));
        (store, state)
    }

    #[tokio::test]
    async fn abwesender_besitzer_loest_raum_sofort_auf() {
        let (store, state) = aufbau(3);
        store.raum_anlegen(test_raum("R1", "U1"));
        store.mitglied_anlegen(&RoomId::from("R1"), &UserId::from("U2"));

        // Nur U2 ist verbunden, der Besitzer nicht
        let (mut rx2, _) = state
            .registry
            .registrieren(RoomId::from("R1"), UserId::from("U2"));

        let sweeper = LivenessSweeper::neu(state.clone());
        sweeper.zyklus().await.unwrap();

        assert!(!store.raum_existiert(&RoomId::from("R1")).await.unwrap());
        match rx2.try_recv().unwrap() {
            Frame::RoomDeleted(f) => {
                assert_eq!(f.reason, Some(LoeschGrund::BesitzerGetrennt));
            }
            andere => panic!("room_deleted erwartet, war {andere:?}"),
        }
        assert_eq!(state.registry.anzahl(), 0);
    }

    #[tokio::test]
    async fn abwesendes_mitglied_wird_entfernt_raum_bleibt() {
        let (store, state) = aufbau(3);
        store.raum_anlegen(test_raum("R1", "U1"));
        store.mitglied_anlegen(&RoomId::from("R1"), &UserId::from("U2"));

        // Besitzer verbunden, U2 nicht
        let (_rx1, _) = state
            .registry
            .registrieren(RoomId::from("R1"), UserId::from("U1"));

        let sweeper = LivenessSweeper::neu(state.clone());
        sweeper.zyklus().await.unwrap();

        assert!(store.raum_existiert(&RoomId::from("R1")).await.unwrap());
        assert_eq!(
            store.mitglieder_anzahl(&RoomId::from("R1")).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn stummer_besitzer_erreicht_schwelle_nach_drei_zyklen() {
        let (store, state) = aufbau(3);
        store.raum_anlegen(test_raum("R1", "U1"));

        let (mut rx1, _) = state
            .registry
            .registrieren(RoomId::from("R1"), UserId::from("U1"));

        let sweeper = LivenessSweeper::neu(state.clone());

        // Zwei Zyklen: Probes gesendet, Schwelle noch nicht erreicht
        sweeper.zyklus().await.unwrap();
        sweeper.zyklus().await.unwrap();
        assert!(store.raum_existiert(&RoomId::from("R1")).await.unwrap());
        assert_eq!(
            state
                .registry
                .fehlschlaege(&RoomId::from("R1"), &UserId::from("U1")),
            Some(2)
        );

        // Dritter Zyklus erreicht die Schwelle
        sweeper.zyklus().await.unwrap();
        assert!(!store.raum_existiert(&RoomId::from("R1")).await.unwrap());

        // Der Client hat drei Probes und dann room_deleted erhalten
        let mut probes = 0;
        let mut deleted = false;
        while let Ok(frame) = rx1.try_recv() {
            match frame {
                Frame::Heartbeat(_) => probes += 1,
                Frame::RoomDeleted(f) => {
                    assert_eq!(f.reason, Some(LoeschGrund::BesitzerTimeout));
                    deleted = true;
                }
                _ => {}
            }
        }
        assert_eq!(probes, 3);
        assert!(deleted);
    }

    #[tokio::test]
    async fn ack_zwischen_zyklen_setzt_zaehler_zurueck() {
        let (store, state) = aufbau(2);
        store.raum_anlegen(test_raum("R1", "U1"));

        let (_rx1, _) = state
            .registry
            .registrieren(RoomId::from("R1"), UserId::from("U1"));

        let sweeper = LivenessSweeper::neu(state.clone());

        sweeper.zyklus().await.unwrap();
        state
            .registry
            .ack_verbuchen(&RoomId::from("R1"), &UserId::from("U1"));
        sweeper.zyklus().await.unwrap();

        // Nach dem Ack steht der Zaehler wieder bei 1, nicht 2
        assert!(store.raum_existiert(&RoomId::from("R1")).await.unwrap());
        assert_eq!(
            state
                .registry
                .fehlschlaege(&RoomId::from("R1"), &UserId::from("U1")),
            Some(1)
        );
    }

    #[tokio::test]
    async fn store_ausfall_bricht_zyklus_ohne_schaden_ab() {
        let (store, state) = aufbau(3);
        store.raum_anlegen(test_raum("R1", "U1"));
        let (_rx1, _) = state
            .registry
            .registrieren(RoomId::from("R1"), UserId::from("U1"));

        store.ausfall_simulieren(true);
        let sweeper = LivenessSweeper::neu(state.clone());
        assert!(sweeper.zyklus().await.is_err());

        // Registry unveraendert, keine Eskalation ohne Store-Daten
        assert_eq!(state.registry.anzahl(), 1);

        store.ausfall_simulieren(false);
        assert!(sweeper.zyklus().await.is_ok());
        assert!(store.raum_existiert(&RoomId::from("R1")).await.unwrap());
    }

    #[tokio::test]
    async fn extern_geloeschter_raum_wird_nur_weggeraeumt() {
        let (store, state) = aufbau(3);
        store.raum_anlegen(test_raum("R1", "U1"));
        let (mut rx1, _) = state
            .registry
            .registrieren(RoomId::from("R1"), UserId::from("U1"));

        // Raum verschwindet extern, die Verbindung lebt noch
        store.raum_aufloesen(&RoomId::from("R1")).await.unwrap();

        let sweeper = LivenessSweeper::neu(state.clone());
        sweeper.zyklus().await.unwrap();

        // Kein aktiver Raum mehr, aber der Eintrag bleibt bis der
        // Client selbst trennt oder ein Raum extern gemeldet wird
        assert!(rx1.try_recv().is_err());
        assert_eq!(state.registry.anzahl(), 1);
    }

    #[tokio::test]
    async fn leerer_raum_wird_bereinigt() {
        let (store, state) = aufbau(3);
        store.raum_anlegen(test_raum("R1", "U1"));
        store
            .mitglied_loeschen(&RoomId::from("R1"), &UserId::from("U1"))
            .await
            .unwrap();

        let sweeper = LivenessSweeper::neu(state.clone());
        sweeper.zyklus().await.unwrap();

        assert!(!store.raum_existiert(&RoomId::from("R1")).await.unwrap());
    }
}
