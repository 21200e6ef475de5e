//! Frame-Dispatcher – Zustandsmaschine pro Client-Verbindung
//!
//! Zustaende: NichtBeigetreten -> Beigetreten -> Geschlossen. Frames
//! vor einem erfolgreichen `join` die kein `join` sind werden
//! stillschweigend ignoriert (der Client darf rennen). Registry-Misses
//! sind gutartige No-Ops und erzeugen nie ein Fehler-Frame.

use crate::error::RealtimeResult;
use crate::server_state::KoordinatorState;
use kritzel_core::types::{RoomId, UserId};
use kritzel_protocol::{unix_zeit_ms, Frame};
use kritzel_store::RaumStore;
use std::net::SocketAddr;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Verbindungs-Kontext
// ---------------------------------------------------------------------------

/// Zustand einer einzelnen Client-Verbindung
///
/// `user_id`/`room_id` sind gesetzt sobald ein `join` akzeptiert wurde.
pub struct DispatcherContext {
    pub peer_addr: SocketAddr,
    pub user_id: Option<UserId>,
    pub room_id: Option<RoomId>,
    /// Generation des eigenen Registry-Eintrags (aus `registrieren`)
    pub generation: u64,
    /// Ausgangs-Queue des Verbindungs-Tasks (schreibt auf den Socket)
    pub sende_tx: mpsc::Sender<Frame>,
}

impl DispatcherContext {
    pub fn neu(peer_addr: SocketAddr, sende_tx: mpsc::Sender<Frame>) -> Self {
        Self {
            peer_addr,
            user_id: None,
            room_id: None,
            generation: 0,
            sende_tx,
        }
    }

    /// Gibt (Raum, Benutzer) zurueck wenn die Verbindung beigetreten ist
    fn beigetreten(&self) -> Option<(&RoomId, &UserId)> {
        match (&self.room_id, &self.user_id) {
            (Some(r), Some(u)) => Some((r, u)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// FrameDispatcher
// ---------------------------------------------------------------------------

/// Verarbeitet eingehende Frames einer Client-Verbindung
pub struct FrameDispatcher<S: RaumStore> {
    state: KoordinatorState<S>,
}

impl<S: RaumStore> FrameDispatcher<S> {
    pub fn neu(state: KoordinatorState<S>) -> Self {
        Self { state }
    }

    /// Verarbeitet ein Frame und gibt die optionale Antwort zurueck
    pub async fn verarbeiten(
        &self,
        ctx: &mut DispatcherContext,
        frame: Frame,
    ) -> RealtimeResult<Option<Frame>> {
        match frame {
            Frame::Join(join) => self.join_verarbeiten(ctx, join.room_id, join.user_id),
            Frame::Heartbeat(_) => Ok(self.heartbeat_verarbeiten(ctx)),
            Frame::DrawEvent(ev) => {
                self.draw_event_verarbeiten(ctx, Frame::DrawEvent(ev));
                Ok(None)
            }
            Frame::Leave(leave) => {
                self.leave_verarbeiten(ctx, &leave.room_id).await?;
                Ok(None)
            }
            // Server -> Client Frames haben eingehend nichts verloren
            andere => {
                tracing::debug!(
                    peer = %ctx.peer_addr,
                    frame = ?andere,
                    "Unerwartetes Server-Frame vom Client ignoriert"
                );
                Ok(None)
            }
        }
    }

    /// Raeumt beim Verbindungsende den Registry-Eintrag weg
    ///
    /// Nur noetig wenn die Verbindung den Beigetreten-Zustand erreicht
    /// hatte. Entfernt wird generationsgeprueft: hat inzwischen ein
    /// neuer `join` denselben Schluessel uebernommen, bleibt dessen
    /// Eintrag bestehen.
    pub fn verbindung_schliessen(&self, ctx: &DispatcherContext) {
        if let Some((room_id, user_id)) = ctx.beigetreten() {
            tracing::info!(
                peer = %ctx.peer_addr,
                room_id = %room_id,
                user_id = %user_id,
                "Verbindung geschlossen"
            );
            self.state
                .registry
                .entfernen_wenn_generation(room_id, user_id, ctx.generation);
        }
    }

    // -----------------------------------------------------------------------
    // Frame-Handler
    // -----------------------------------------------------------------------

    fn join_verarbeiten(
        &self,
        ctx: &mut DispatcherContext,
        room_id: RoomId,
        user_id: UserId,
    ) -> RealtimeResult<Option<Frame>> {
        if room_id.ist_leer() || user_id.ist_leer() {
            tracing::warn!(peer = %ctx.peer_addr, "join mit leeren Feldern ignoriert");
            return Ok(None);
        }

        // Erneuter join auf derselben Verbindung wechselt den Raum;
        // der alte Eintrag wird nur entfernt wenn er noch uns gehoert
        if let Some((altes_room, alter_user)) = ctx.beigetreten() {
            if altes_room != &room_id || alter_user != &user_id {
                self.state
                    .registry
                    .entfernen_wenn_generation(altes_room, alter_user, ctx.generation);
            }
        }

        let (mut rx, generation) = self
            .state
            .registry
            .registrieren(room_id.clone(), user_id.clone());

        // Broadcast-Frames aus der Registry-Queue in die Ausgangs-Queue
        // der Verbindung weiterreichen; endet wenn eine der Queues
        // schliesst (Eviction, Ueberschreiben oder Verbindungsende)
        let sende_tx = ctx.sende_tx.clone();
        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if sende_tx.send(frame).await.is_err() {
                    break;
                }
            }
        });

        ctx.room_id = Some(room_id.clone());
        ctx.user_id = Some(user_id.clone());
        ctx.generation = generation;

        tracing::info!(
            peer = %ctx.peer_addr,
            room_id = %room_id,
            user_id = %user_id,
            "Client beigetreten"
        );
        Ok(Some(Frame::joined(room_id, user_id)))
    }

    fn heartbeat_verarbeiten(&self, ctx: &DispatcherContext) -> Option<Frame> {
        let (room_id, user_id) = ctx.beigetreten()?;

        // Registry-Miss (z.B. nach Eviction): Ack stillschweigend fallen
        // lassen
        if self.state.registry.ack_verbuchen(room_id, user_id) {
            Some(Frame::heartbeat_ack(unix_zeit_ms()))
        } else {
            None
        }
    }

    fn draw_event_verarbeiten(&self, ctx: &DispatcherContext, frame: Frame) {
        let Some((room_id, user_id)) = ctx.beigetreten() else {
            tracing::trace!(peer = %ctx.peer_addr, "draw_event vor join ignoriert");
            return;
        };

        self.state
            .broadcaster
            .an_raum_senden(room_id, Some(user_id), &frame);
    }

    async fn leave_verarbeiten(
        &self,
        ctx: &mut DispatcherContext,
        room_id: &RoomId,
    ) -> RealtimeResult<()> {
        let Some((aktueller_raum, user_id)) = ctx.beigetreten() else {
            tracing::trace!(peer = %ctx.peer_addr, "leave vor join ignoriert");
            return Ok(());
        };
        if aktueller_raum != room_id {
            tracing::debug!(
                peer = %ctx.peer_addr,
                room_id = %room_id,
                "leave fuer fremden Raum ignoriert"
            );
            return Ok(());
        }

        let user_id = user_id.clone();
        let room_id = room_id.clone();
        self.state.lebenszyklus.verlassen(&room_id, &user_id).await?;

        // Zurueck in den NichtBeigetreten-Zustand, ein frisches join ist
        // erlaubt
        ctx.room_id = None;
        ctx.user_id = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kritzel_protocol::{DrawEventFrame, HeartbeatFrame, JoinFrame, LeaveFrame};
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

    fn join_frame(raum: &str, user: &str) -> Frame {
        Frame::Join(JoinFrame {
            user_id: UserId::from(user),
            room_id: RoomId::from(raum),
        })
    }

    fn heartbeat_frame() -> Frame {
        Frame::Heartbeat(HeartbeatFrame { timestamp: None })
    }

    fn aufbau() -> (
        Arc<MemoryStore>,
        KoordinatorState<MemoryStore>,
        FrameDispatcher<MemoryStore>,
    ) {
        let store = Arc::new(MemoryStore::neu());
        let state = KoordinatorState::neu(Default::default(), Arc::clone(&store));
        let dispatcher = FrameDispatcher::neu(state.clone());
        (store, state, dispatcher)
    }

    fn test_ctx() -> (DispatcherContext, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(16);
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        (DispatcherContext::neu(addr, tx), rx)
    }

    #[tokio::test]
    async fn join_registriert_und_antwortet() {
        let (_store, state, dispatcher) = aufbau();
        let (mut ctx, _rx) = test_ctx();

        let antwort = dispatcher
            .verarbeiten(&mut ctx, join_frame("R1", "U1"))
            .await
            .unwrap();

        match antwort {
            Some(Frame::Joined(j)) => {
                assert_eq!(j.room_id.als_str(), "R1");
                assert_eq!(j.user_id.als_str(), "U1");
            }
            andere => panic!("joined erwartet, war {andere:?}"),
        }
        assert!(state
            .registry
            .ist_registriert(&RoomId::from("R1"), &UserId::from("U1")));
    }

    #[tokio::test]
    async fn join_mit_leeren_feldern_wird_ignoriert() {
        let (_store, state, dispatcher) = aufbau();
        let (mut ctx, _rx) = test_ctx();

        let antwort = dispatcher
            .verarbeiten(&mut ctx, join_frame("", "U1"))
            .await
            .unwrap();

        assert!(antwort.is_none());
        assert_eq!(state.registry.anzahl(), 0);
        assert!(ctx.room_id.is_none());
    }

    #[tokio::test]
    async fn frames_vor_join_werden_ignoriert() {
        let (_store, _state, dispatcher) = aufbau();
        let (mut ctx, _rx) = test_ctx();

        let antwort = dispatcher
            .verarbeiten(&mut ctx, heartbeat_frame())
            .await
            .unwrap();
        assert!(antwort.is_none());

        let ev = Frame::DrawEvent(DrawEventFrame {
            daten: serde_json::Map::new(),
        });
        assert!(dispatcher.verarbeiten(&mut ctx, ev).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn heartbeat_setzt_zaehler_zurueck_und_antwortet() {
        let (_store, state, dispatcher) = aufbau();
        let (mut ctx, _rx) = test_ctx();

        dispatcher
            .verarbeiten(&mut ctx, join_frame("R1", "U1"))
            .await
            .unwrap();
        state
            .registry
            .probe_verbucht(&RoomId::from("R1"), &UserId::from("U1"));

        let antwort = dispatcher
            .verarbeiten(&mut ctx, heartbeat_frame())
            .await
            .unwrap();

        assert!(matches!(antwort, Some(Frame::HeartbeatAck(_))));
        assert_eq!(
            state
                .registry
                .fehlschlaege(&RoomId::from("R1"), &UserId::from("U1")),
            Some(0)
        );
    }

    #[tokio::test]
    async fn heartbeat_nach_eviction_bleibt_stumm() {
        let (_store, state, dispatcher) = aufbau();
        let (mut ctx, _rx) = test_ctx();

        dispatcher
            .verarbeiten(&mut ctx, join_frame("R1", "U1"))
            .await
            .unwrap();
        state
            .registry
            .entfernen(&RoomId::from("R1"), &UserId::from("U1"));

        let antwort = dispatcher
            .verarbeiten(&mut ctx, heartbeat_frame())
            .await
            .unwrap();
        assert!(antwort.is_none());
    }

    #[tokio::test]
    async fn draw_event_erreicht_raum_ohne_absender() {
        let (_store, state, dispatcher) = aufbau();
        let (mut ctx, _eigene_rx) = test_ctx();

        dispatcher
            .verarbeiten(&mut ctx, join_frame("R1", "U1"))
            .await
            .unwrap();
        let (mut rx2, _) = state
            .registry
            .registrieren(RoomId::from("R1"), UserId::from("U2"));

        let mut daten = serde_json::Map::new();
        daten.insert("x".into(), serde_json::json!(5));
        let ev = Frame::DrawEvent(DrawEventFrame { daten });

        let antwort = dispatcher.verarbeiten(&mut ctx, ev).await.unwrap();
        assert!(antwort.is_none());

        // U2 erhaelt das Event, der Absender nicht
        match rx2.try_recv().unwrap() {
            Frame::DrawEvent(ev) => assert_eq!(ev.daten["x"], 5),
            andere => panic!("draw_event erwartet, war {andere:?}"),
        }
    }

    #[tokio::test]
    async fn leave_als_mitglied_entfernt_nur_eigene_mitgliedschaft() {
        let (store, state, dispatcher) = aufbau();
        store.raum_anlegen(test_raum("R1", "U1"));
        store.mitglied_anlegen(&RoomId::from("R1"), &UserId::from("U2"));

        let (mut ctx, _rx) = test_ctx();
        dispatcher
            .verarbeiten(&mut ctx, join_frame("R1", "U2"))
            .await
            .unwrap();

        let leave = Frame::Leave(LeaveFrame {
            room_id: RoomId::from("R1"),
        });
        dispatcher.verarbeiten(&mut ctx, leave).await.unwrap();

        assert!(store.raum_existiert(&RoomId::from("R1")).await.unwrap());
        assert_eq!(
            store.mitglieder_anzahl(&RoomId::from("R1")).await.unwrap(),
            1
        );
        assert!(ctx.room_id.is_none());
        assert!(!state
            .registry
            .ist_registriert(&RoomId::from("R1"), &UserId::from("U2")));
    }

    #[tokio::test]
    async fn leave_als_besitzer_loest_raum_auf() {
        let (store, _state, dispatcher) = aufbau();
        store.raum_anlegen(test_raum("R1", "U1"));

        let (mut ctx, _rx) = test_ctx();
        dispatcher
            .verarbeiten(&mut ctx, join_frame("R1", "U1"))
            .await
            .unwrap();

        let leave = Frame::Leave(LeaveFrame {
            room_id: RoomId::from("R1"),
        });
        dispatcher.verarbeiten(&mut ctx, leave).await.unwrap();

        assert!(!store.raum_existiert(&RoomId::from("R1")).await.unwrap());
    }

    #[tokio::test]
    async fn verbindung_schliessen_raeumt_registry_auf() {
        let (_store, state, dispatcher) = aufbau();
        let (mut ctx, _rx) = test_ctx();

        dispatcher
            .verarbeiten(&mut ctx, join_frame("R1", "U1"))
            .await
            .unwrap();
        assert_eq!(state.registry.anzahl(), 1);

        dispatcher.verbindung_schliessen(&ctx);
        assert_eq!(state.registry.anzahl(), 0);
    }

    #[tokio::test]
    async fn schliessen_der_ueberschriebenen_verbindung_laesst_neue_leben() {
        let (_store, state, dispatcher) = aufbau();
        let (mut ctx_alt, _rx_alt) = test_ctx();
        let (mut ctx_neu, _rx_neu) = test_ctx();

        dispatcher
            .verarbeiten(&mut ctx_alt, join_frame("R1", "U1"))
            .await
            .unwrap();
        // Derselbe Benutzer tritt ueber eine zweite Verbindung bei und
        // ueberschreibt damit den Registry-Eintrag
        dispatcher
            .verarbeiten(&mut ctx_neu, join_frame("R1", "U1"))
            .await
            .unwrap();

        // Der spaete Abbau der alten Verbindung trifft den neuen
        // Eintrag nicht
        dispatcher.verbindung_schliessen(&ctx_alt);
        assert!(state
            .registry
            .ist_registriert(&RoomId::from("R1"), &UserId::from("U1")));

        dispatcher.verbindung_schliessen(&ctx_neu);
        assert!(!state
            .registry
            .ist_registriert(&RoomId::from("R1"), &UserId::from("U1")));
    }

    #[tokio::test]
    async fn erneuter_join_wechselt_den_raum() {
        let (_store, state, dispatcher) = aufbau();
        let (mut ctx, _rx) = test_ctx();

        dispatcher
            .verarbeiten(&mut ctx, join_frame("R1", "U1"))
            .await
            .unwrap();
        dispatcher
            .verarbeiten(&mut ctx, join_frame("R2", "U1"))
            .await
            .unwrap();

        assert!(!state
            .registry
            .ist_registriert(&RoomId::from("R1"), &UserId::from("U1")));
        assert!(state
            .registry
            .ist_registriert(&RoomId::from("R2"), &UserId::from("U1")));
    }
}
