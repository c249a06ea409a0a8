//! The session actor: sole owner of the game table.
//!
//! Connection lifecycle, inbound frames and upload notifications all arrive
//! on one channel and are handled strictly in order, one at a time.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use tavern_core::protocol::ClientMessage;
use tavern_core::{ConnectionId, EventSink, Role, ServerEvent, Table};
use tokio::sync::mpsc;

use crate::gateway::BroadcastGateway;
use crate::images::ImageLibrary;

#[derive(Debug)]
pub enum SessionCommand {
    Connected { connection: ConnectionId, role: Role },
    Message { connection: ConnectionId, raw: String },
    Disconnected { connection: ConnectionId },
    ImagesChanged,
}

pub struct SessionActor<R = rand::rngs::StdRng> {
    table: Table<R>,
    gateway: BroadcastGateway,
    images: Arc<dyn ImageLibrary>,
    roles: HashMap<ConnectionId, Role>,
    enforce_roles: bool,
}

impl<R: Rng> SessionActor<R> {
    pub fn new(
        table: Table<R>,
        gateway: BroadcastGateway,
        images: Arc<dyn ImageLibrary>,
        enforce_roles: bool,
    ) -> Self {
        Self {
            table,
            gateway,
            images,
            roles: HashMap::new(),
            enforce_roles,
        }
    }

    pub fn table(&self) -> &Table<R> {
        &self.table
    }

    /// Process commands until every sender is gone.
    pub async fn run(mut self, mut rx: mpsc::Receiver<SessionCommand>) {
        while let Some(cmd) = rx.recv().await {
            self.handle(cmd);
        }
        tracing::info!("Session actor stopped");
    }

    pub fn handle(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Connected { connection, role } => {
                tracing::info!(connection_id = %connection, %role, "viewer joined");
                self.roles.insert(connection.clone(), role);
                self.table.snapshot(&connection, &self.gateway);
            }
            SessionCommand::Message { connection, raw } => self.handle_message(&connection, &raw),
            SessionCommand::Disconnected { connection } => {
                self.roles.remove(&connection);
                self.table.release(&connection);
            }
            SessionCommand::ImagesChanged => self.gateway.broadcast_image_list_changed(),
        }
    }

    fn handle_message(&mut self, connection: &ConnectionId, raw: &str) {
        let msg = match ClientMessage::decode(raw) {
            Ok(msg) => msg,
            Err(err) => {
                tracing::warn!(connection_id = %connection, kind = err.error_kind(), %err, "dropping inbound frame");
                return;
            }
        };

        let role = self.roles.get(connection).copied().unwrap_or_default();
        if self.enforce_roles && msg.is_gm_only() && role != Role::Gm {
            tracing::warn!(
                connection_id = %connection,
                %role,
                event = msg.event_name(),
                "GM-only event from non-GM ignored"
            );
            return;
        }

        tracing::trace!(connection_id = %connection, event = msg.event_name(), "handling event");
        match msg {
            ClientMessage::ClaimCharacter(name) => {
                if let Err(err) = self.table.claim_character(connection, &name, &self.gateway) {
                    tracing::debug!(connection_id = %connection, kind = err.error_kind(), "claim rejection delivered");
                }
            }
            ClientMessage::UpdateStats(update) => {
                self.table.update_stats(connection, update, &self.gateway);
            }
            ClientMessage::UpdateBoss(update) => self.table.update_boss(update, &self.gateway),
            ClientMessage::RollDice(request) => {
                self.table.roll_dice(connection, &request, &self.gateway);
            }
            ClientMessage::DisplayImage(path) => {
                let path = path.trim();
                self.gateway
                    .broadcast_image((!path.is_empty()).then(|| path.to_string()));
            }
            ClientMessage::HideImage => self.gateway.broadcast_image(None),
            ClientMessage::ResetDice => self.gateway.broadcast_log_cleared(),
            ClientMessage::ListImages => {
                let images = self.images.list().unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "failed to list images");
                    Vec::new()
                });
                self.gateway.send_to(connection, &ServerEvent::ImageList(images));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientRegistry;
    use crate::images::{DirImageLibrary, ImageError};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::{json, Value};
    use tavern_core::GameState;

    struct FixedImages(Vec<String>);

    impl ImageLibrary for FixedImages {
        fn list(&self) -> Result<Vec<String>, ImageError> {
            Ok(self.0.clone())
        }

        fn store(&self, file_name: &str, _: &str, _: &[u8]) -> Result<String, ImageError> {
            Ok(file_name.to_string())
        }
    }

    struct Harness {
        actor: SessionActor<StdRng>,
        registry: Arc<ClientRegistry>,
    }

    impl Harness {
        fn new(enforce_roles: bool) -> Self {
            let registry = Arc::new(ClientRegistry::new(64));
            let actor = SessionActor::new(
                Table::with_rng(GameState::default(), StdRng::seed_from_u64(11)),
                BroadcastGateway::new(Arc::clone(&registry)),
                Arc::new(FixedImages(vec!["map.png".into()])),
                enforce_roles,
            );
            Self { actor, registry }
        }

        fn join(&mut self, role: Role) -> (ConnectionId, mpsc::Receiver<String>) {
            let (id, rx) = self.registry.register();
            self.actor.handle(SessionCommand::Connected { connection: id.clone(), role });
            (id, rx)
        }

        fn send(&mut self, id: &ConnectionId, frame: Value) {
            self.actor.handle(SessionCommand::Message {
                connection: id.clone(),
                raw: frame.to_string(),
            });
        }
    }

    fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(raw) = rx.try_recv() {
            out.push(serde_json::from_str(&raw).unwrap());
        }
        out
    }

    #[test]
    fn join_receives_snapshot() {
        let mut h = Harness::new(false);
        let (_id, mut rx) = h.join(Role::Overlay);
        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["event"], "gameStateUpdate");
        assert_eq!(frames[0]["data"]["players"], json!([]));
    }

    #[test]
    fn claim_flow_reaches_requester_and_everyone() {
        let mut h = Harness::new(false);
        let (a, mut rx_a) = h.join(Role::Player);
        let (_o, mut rx_o) = h.join(Role::Overlay);
        drain(&mut rx_a);
        drain(&mut rx_o);

        h.send(&a, json!({"event": "claimCharacter", "data": "Grog"}));
        let to_a = drain(&mut rx_a);
        assert_eq!(to_a[0]["event"], "claimSuccess");
        assert_eq!(to_a[0]["data"]["hp"], 10);
        assert_eq!(to_a[1]["event"], "gameStateUpdate");

        let to_o = drain(&mut rx_o);
        assert_eq!(to_o.len(), 1);
        assert_eq!(to_o[0]["data"]["players"][0]["name"], "Grog");
    }

    #[test]
    fn disconnect_frees_the_character() {
        let mut h = Harness::new(false);
        let (a, _rx_a) = h.join(Role::Player);
        let (b, mut rx_b) = h.join(Role::Player);
        h.send(&a, json!({"event": "claimCharacter", "data": "Grog"}));
        drain(&mut rx_b);

        h.send(&b, json!({"event": "claimCharacter", "data": "grog"}));
        let refused = drain(&mut rx_b);
        assert_eq!(refused[0]["event"], "claimError");
        assert!(refused[0]["data"].as_str().unwrap().contains("Grog"));

        h.actor.handle(SessionCommand::Disconnected { connection: a });
        h.send(&b, json!({"event": "claimCharacter", "data": "GROG"}));
        assert_eq!(drain(&mut rx_b)[0]["event"], "claimSuccess");
        assert_eq!(h.actor.table().state().players.len(), 1);
    }

    #[test]
    fn image_events_fan_out() {
        let mut h = Harness::new(false);
        let (gm, mut rx_gm) = h.join(Role::Gm);
        let (_o, mut rx_o) = h.join(Role::Overlay);
        drain(&mut rx_gm);
        drain(&mut rx_o);

        h.send(&gm, json!({"event": "displayImage", "data": "images/map.png"}));
        h.send(&gm, json!({"event": "hideImage"}));
        h.send(&gm, json!({"event": "resetDice"}));
        h.actor.handle(SessionCommand::ImagesChanged);

        let events: Vec<Value> = drain(&mut rx_o).into_iter().map(|f| f["event"].clone()).collect();
        assert_eq!(events, vec![json!("showImage"), json!("hideImage"), json!("diceCleared"), json!("refreshImageList")]);
    }

    #[test]
    fn list_images_answers_requester_only() {
        let mut h = Harness::new(false);
        let (gm, mut rx_gm) = h.join(Role::Gm);
        let (_o, mut rx_o) = h.join(Role::Overlay);
        drain(&mut rx_gm);
        drain(&mut rx_o);

        h.send(&gm, json!({"event": "listImages"}));
        assert_eq!(drain(&mut rx_gm), vec![json!({"event": "imageList", "data": ["map.png"]})]);
        assert!(drain(&mut rx_o).is_empty());
    }

    #[test]
    fn enforced_roles_gate_gm_events() {
        let mut h = Harness::new(true);
        let (player, mut rx_p) = h.join(Role::Player);
        let (gm, _rx_gm) = h.join(Role::Gm);
        drain(&mut rx_p);

        h.send(&player, json!({"event": "updateBoss", "data": {"name": "Hijacked"}}));
        h.send(&player, json!({"event": "hideImage"}));
        assert!(drain(&mut rx_p).is_empty());
        assert_eq!(h.actor.table().state().boss.name, "");

        h.send(&gm, json!({"event": "updateBoss", "data": {"name": "Ogre"}}));
        assert_eq!(h.actor.table().state().boss.name, "Ogre");
        assert_eq!(drain(&mut rx_p)[0]["event"], "gameStateUpdate");
    }

    #[test]
    fn unenforced_roles_trust_anyone_with_boss_updates() {
        let mut h = Harness::new(false);
        let (player, _rx) = h.join(Role::Player);
        h.send(&player, json!({"event": "updateBoss", "data": {"name": "Ogre", "hp": "30"}}));
        assert_eq!(h.actor.table().state().boss.name, "Ogre");
        assert_eq!(h.actor.table().state().boss.hp, 30);
    }

    #[test]
    fn garbage_frames_are_ignored() {
        let mut h = Harness::new(false);
        let (a, mut rx) = h.join(Role::Player);
        drain(&mut rx);
        h.actor.handle(SessionCommand::Message { connection: a.clone(), raw: "{{{".into() });
        h.send(&a, json!({"event": "teleport", "data": 1}));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn grouped_roll_broadcasts_aggregate() {
        let mut h = Harness::new(false);
        let (a, mut rx) = h.join(Role::Player);
        h.send(&a, json!({"event": "claimCharacter", "data": "Grog"}));
        drain(&mut rx);

        h.send(&a, json!({"event": "rollDice", "data": [{"type": "d6", "qty": 2}, {"type": "d20", "qty": 1}]}));
        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 1);
        let data = &frames[0]["data"];
        assert_eq!(frames[0]["event"], "diceRolled");
        assert_eq!(data["player"], "Grog");
        let results = data["results"].as_array().unwrap();
        assert_eq!(results.len(), 3);
        let sum: u64 = results.iter().map(|r| r["value"].as_u64().unwrap()).sum();
        assert_eq!(data["total"].as_u64().unwrap(), sum);
    }

    #[test]
    fn mixed_basket_still_rolls_the_valid_dice() {
        let mut h = Harness::new(false);
        let (a, mut rx) = h.join(Role::Player);
        drain(&mut rx);

        h.send(&a, json!({"event": "rollDice", "data": [{"type": "d6", "qty": 2}, {"type": 20, "qty": 1}]}));
        h.send(&a, json!({"event": "rollDice", "data": [{"type": "d6", "qty": 2}, {"qty": 1}]}));
        h.send(&a, json!({"event": "rollDice", "data": {"player": 7, "dice": "d20"}}));

        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f["event"] == "diceRolled"));
        assert_eq!(frames[0]["data"]["results"].as_array().unwrap().len(), 2);
        assert_eq!(frames[1]["data"]["results"].as_array().unwrap().len(), 2);
        assert_eq!(frames[2]["data"]["player"], "Anonymous");
        assert_eq!(frames[2]["data"]["dieType"], "d20");
    }

    #[test]
    fn partial_stat_and_boss_payloads_still_apply() {
        let mut h = Harness::new(false);
        let (a, mut rx) = h.join(Role::Player);
        h.send(&a, json!({"event": "claimCharacter", "data": "Grog"}));
        drain(&mut rx);

        h.send(&a, json!({"event": "updateStats", "data": {"hp_current": 5, "customStats": {"Rage": 2}}}));
        h.send(&a, json!({"event": "updateBoss", "data": {"hp": 99, "status": 3}}));

        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0]["data"]["players"][0]["hp"], 5);
        assert_eq!(frames[1]["data"]["boss"]["hp"], 99);
        assert_eq!(h.actor.table().state().boss.status, None);
    }

    #[test]
    fn dir_library_plugs_in() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cave.webp"), b"x").unwrap();
        let registry = Arc::new(ClientRegistry::new(8));
        let mut actor = SessionActor::new(
            Table::with_rng(GameState::default(), StdRng::seed_from_u64(2)),
            BroadcastGateway::new(Arc::clone(&registry)),
            Arc::new(DirImageLibrary::new(dir.path())),
            false,
        );
        let (id, mut rx) = registry.register();
        actor.handle(SessionCommand::Message {
            connection: id,
            raw: r#"{"event":"listImages"}"#.into(),
        });
        assert_eq!(drain(&mut rx), vec![json!({"event": "imageList", "data": ["cave.webp"]})]);
    }
}
