use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use tavern_core::ConnectionId;
use tokio::sync::mpsc;

use crate::session::SessionCommand;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(90);

/// A connected WebSocket viewer.
pub struct ClientConnection {
    pub id: ConnectionId,
    tx: mpsc::Sender<String>,
    last_pong: AtomicU64,
}

impl ClientConnection {
    fn new(id: ConnectionId, tx: mpsc::Sender<String>) -> Self {
        Self {
            id,
            tx,
            last_pong: AtomicU64::new(now_secs()),
        }
    }

    pub fn record_pong(&self) {
        self.last_pong.store(now_secs(), Ordering::Relaxed);
    }

    pub fn is_alive(&self) -> bool {
        let last = self.last_pong.load(Ordering::Relaxed);
        now_secs().saturating_sub(last) < CLIENT_TIMEOUT.as_secs()
    }

    /// Queue a frame without waiting. Drops it if the queue is full.
    fn try_send(&self, message: String) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(msg)) => {
                tracing::warn!(
                    connection_id = %self.id,
                    msg_len = msg.len(),
                    "Send queue full, dropping message"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Registry of all connected WebSocket viewers.
pub struct ClientRegistry {
    clients: DashMap<ConnectionId, ClientConnection>,
    max_send_queue: usize,
}

impl ClientRegistry {
    pub fn new(max_send_queue: usize) -> Self {
        Self {
            clients: DashMap::new(),
            max_send_queue,
        }
    }

    /// Register a new viewer and return its ID + outbound queue.
    pub fn register(&self) -> (ConnectionId, mpsc::Receiver<String>) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        self.clients
            .insert(id.clone(), ClientConnection::new(id.clone(), tx));
        (id, rx)
    }

    /// Remove a viewer. Dropping its sender ends the writer task.
    pub fn unregister(&self, id: &ConnectionId) -> bool {
        self.clients.remove(id).is_some()
    }

    /// Send a frame to one viewer.
    pub fn send_to(&self, id: &ConnectionId, message: String) -> bool {
        self.clients
            .get(id)
            .is_some_and(|client| client.try_send(message))
    }

    /// Send a frame to every viewer. Returns how many accepted it.
    pub fn broadcast(&self, message: &str) -> usize {
        self.clients
            .iter()
            .filter(|entry| entry.value().try_send(message.to_string()))
            .count()
    }

    pub fn record_pong(&self, id: &ConnectionId) {
        if let Some(client) = self.clients.get(id) {
            client.record_pong();
        }
    }

    /// Number of connected viewers.
    pub fn count(&self) -> usize {
        self.clients.len()
    }

    /// Remove viewers that haven't answered pings within the timeout.
    pub fn cleanup_dead_clients(&self) -> usize {
        let dead: Vec<ConnectionId> = self
            .clients
            .iter()
            .filter(|entry| !entry.value().is_alive())
            .map(|entry| entry.key().clone())
            .collect();

        for id in &dead {
            self.unregister(id);
            tracing::info!(connection_id = %id, "Cleaned up dead client");
        }
        dead.len()
    }

    #[cfg(test)]
    pub(crate) fn expire(&self, id: &ConnectionId) {
        if let Some(client) = self.clients.get(id) {
            client.last_pong.store(0, Ordering::Relaxed);
        }
    }
}

/// Drive one WebSocket: writer forwards queued frames and pings, reader feeds
/// the session actor. Returns once either side ends.
pub async fn handle_ws_connection(
    socket: WebSocket,
    connection: ConnectionId,
    mut rx: mpsc::Receiver<String>,
    registry: Arc<ClientRegistry>,
    commands: mpsc::Sender<SessionCommand>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer_id = connection.clone();
    let mut writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        ping_interval.tick().await; // consume first immediate tick

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(WsMessage::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                    tracing::trace!(connection_id = %writer_id, "Sent ping");
                }
            }
        }
        let _ = ws_tx.close().await;
    });

    let reader_id = connection.clone();
    let reader_registry = Arc::clone(&registry);
    let reader_commands = commands.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Text(text) => {
                    let cmd = SessionCommand::Message {
                        connection: reader_id.clone(),
                        raw: text.to_string(),
                    };
                    if reader_commands.send(cmd).await.is_err() {
                        break;
                    }
                }
                WsMessage::Pong(_) => reader_registry.record_pong(&reader_id),
                WsMessage::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    registry.unregister(&connection);
    let _ = commands
        .send(SessionCommand::Disconnected { connection: connection.clone() })
        .await;
    tracing::info!(connection_id = %connection, "WebSocket client disconnected");
}

/// Start a background task that periodically cleans up dead clients.
pub fn start_cleanup_task(
    registry: Arc<ClientRegistry>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let removed = registry.cleanup_dead_clients();
            if removed > 0 {
                tracing::info!(removed = removed, "Dead client cleanup");
            }
        }
    })
}
