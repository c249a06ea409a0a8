//! The session table: game state plus claims, behind one owner.
//!
//! Every operation takes `&mut self` and finishes before returning, so a
//! single owner (the session actor) gives run-to-completion semantics.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::dice::{self, RollOutcome, RollRequest};
use crate::errors::ClaimError;
use crate::ids::{CharacterId, ConnectionId};
use crate::model::{Character, GameState};
use crate::protocol::ServerEvent;
use crate::registry::SessionRegistry;
use crate::sink::EventSink;

pub struct Table<R = StdRng> {
    pub(crate) state: GameState,
    pub(crate) claims: SessionRegistry,
    rng: R,
}

impl Table<StdRng> {
    pub fn new(state: GameState) -> Self {
        Self::with_rng(state, StdRng::from_entropy())
    }
}

impl<R: Rng> Table<R> {
    pub fn with_rng(state: GameState, rng: R) -> Self {
        Self {
            state,
            claims: SessionRegistry::new(),
            rng,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn claims(&self) -> &SessionRegistry {
        &self.claims
    }

    /// Initial sync for a freshly connected viewer.
    pub fn snapshot(&self, connection: &ConnectionId, sink: &dyn EventSink) {
        sink.snapshot(connection, &self.state);
    }

    /// Push the whole state to everyone. Safe to call redundantly.
    pub fn broadcast_state(&self, sink: &dyn EventSink) {
        sink.broadcast_state(&self.state);
    }

    /// Claim (or create) a character for `connection` and announce the outcome.
    pub fn claim_character(
        &mut self,
        connection: &ConnectionId,
        name: &str,
        sink: &dyn EventSink,
    ) -> Result<Character, ClaimError> {
        match self.claims.claim(&mut self.state, connection, name) {
            Ok(character) => {
                tracing::info!(connection_id = %connection, character = %character.name, "character claimed");
                sink.send_to(connection, &ServerEvent::ClaimSuccess(character.clone()));
                self.broadcast_state(sink);
                Ok(character)
            }
            Err(err) => {
                tracing::info!(connection_id = %connection, kind = err.error_kind(), %err, "claim refused");
                sink.send_to(connection, &ServerEvent::ClaimError(err.to_string()));
                Err(err)
            }
        }
    }

    pub fn resolve(&self, connection: &ConnectionId) -> Option<&Character> {
        self.claims.resolve(&self.state, connection)
    }

    /// Forget the claim held by a departing connection. No broadcast.
    pub fn release(&mut self, connection: &ConnectionId) -> Option<CharacterId> {
        let released = self.claims.release(connection);
        if let Some(id) = released {
            tracing::info!(connection_id = %connection, character_id = %id, "claim released");
        }
        released
    }

    /// Roll dice on behalf of `connection` and announce the result.
    pub fn roll_dice(
        &mut self,
        connection: &ConnectionId,
        request: &RollRequest,
        sink: &dyn EventSink,
    ) -> RollOutcome {
        let claimed = self.claims.resolve(&self.state, connection).map(|c| c.name.as_str());
        let player = dice::roller_name(claimed, request.player.as_deref());
        let outcome = dice::resolve(&mut self.rng, request, player);
        tracing::info!(
            connection_id = %connection,
            player = outcome.player(),
            total = outcome.total(),
            "dice rolled"
        );
        sink.broadcast_roll(&outcome);
        outcome
    }
}
