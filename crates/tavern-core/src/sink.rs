use crate::dice::RollOutcome;
use crate::ids::ConnectionId;
use crate::model::GameState;
use crate::protocol::ServerEvent;

/// Outbound side of the session: where state changes get announced.
///
/// Implementations must not block; delivery is best effort. Only `send_to`
/// and `broadcast` need implementing, the rest are named shorthands.
pub trait EventSink {
    /// Deliver to a single connection.
    fn send_to(&self, connection: &ConnectionId, event: &ServerEvent);

    /// Deliver to every live connection.
    fn broadcast(&self, event: &ServerEvent);

    fn snapshot(&self, connection: &ConnectionId, state: &GameState) {
        self.send_to(connection, &ServerEvent::GameStateUpdate(state.clone()));
    }

    fn broadcast_state(&self, state: &GameState) {
        self.broadcast(&ServerEvent::GameStateUpdate(state.clone()));
    }

    fn broadcast_roll(&self, outcome: &RollOutcome) {
        self.broadcast(&ServerEvent::DiceRolled(outcome.clone()));
    }

    /// `None` clears the projection on every overlay.
    fn broadcast_image(&self, url: Option<String>) {
        match url {
            Some(url) => self.broadcast(&ServerEvent::ShowImage(url)),
            None => self.broadcast(&ServerEvent::HideImage),
        }
    }

    fn broadcast_image_list_changed(&self) {
        self.broadcast(&ServerEvent::RefreshImageList);
    }

    fn broadcast_log_cleared(&self) {
        self.broadcast(&ServerEvent::DiceCleared);
    }
}

/// Sink that remembers everything it was given.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    sent: std::cell::RefCell<Vec<(Option<ConnectionId>, ServerEvent)>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain and return what has been recorded. `None` target means broadcast.
    pub fn take(&self) -> Vec<(Option<ConnectionId>, ServerEvent)> {
        std::mem::take(&mut *self.sent.borrow_mut())
    }

    pub fn broadcasts(&self) -> Vec<ServerEvent> {
        self.take()
            .into_iter()
            .filter_map(|(to, ev)| to.is_none().then_some(ev))
            .collect()
    }
}

#[cfg(test)]
impl EventSink for RecordingSink {
    fn send_to(&self, connection: &ConnectionId, event: &ServerEvent) {
        self.sent.borrow_mut().push((Some(connection.clone()), event.clone()));
    }

    fn broadcast(&self, event: &ServerEvent) {
        self.sent.borrow_mut().push((None, event.clone()));
    }
}
