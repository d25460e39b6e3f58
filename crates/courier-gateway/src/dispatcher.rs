use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, broadcast, mpsc};
use tracing::{debug, trace};

use crate::ports::{ConnectionPusher, GatewayError, Publisher};

/// Largest message accepted by `publish`.
pub const MAX_PUBLISH_BYTES: usize = 256 * 1024;
/// Largest frame accepted by `push_to_connection`.
pub const MAX_PUSH_BYTES: usize = 128 * 1024;

const TOPIC_CAPACITY: usize = 1024;

/// Routes published messages to topic subscribers and pushed payloads to
/// open gateway connections.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// topic -> broadcast sender, created on first subscribe
    topics: RwLock<HashMap<String, broadcast::Sender<String>>>,

    /// connection_id -> outbound frame sender
    connections: RwLock<HashMap<String, mpsc::UnboundedSender<String>>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                topics: RwLock::new(HashMap::new()),
                connections: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to a topic. Messages published before this call are not replayed.
    pub async fn subscribe(&self, topic: &str) -> broadcast::Receiver<String> {
        let mut topics = self.inner.topics.write().await;
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe()
    }

    /// Register an open connection. A second registration under the same id
    /// replaces the first, whose receiver then ends.
    pub async fn register_connection(&self, connection_id: &str) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .connections
            .write()
            .await
            .insert(connection_id.to_string(), tx);
        rx
    }

    pub async fn unregister_connection(&self, connection_id: &str) {
        self.inner.connections.write().await.remove(connection_id);
    }

    pub async fn is_connected(&self, connection_id: &str) -> bool {
        self.inner.connections.read().await.contains_key(connection_id)
    }
}

#[async_trait]
impl Publisher for Dispatcher {
    async fn publish(&self, topic: &str, message: String) -> Result<(), GatewayError> {
        check_size(&message, MAX_PUBLISH_BYTES)?;

        let topics = self.inner.topics.read().await;
        match topics.get(topic) {
            Some(tx) => {
                // No live receivers is not an error for fan-out.
                let delivered = tx.send(message).unwrap_or(0);
                debug!("Published to {} ({} subscribers)", topic, delivered);
            }
            None => trace!("Published to {} with no subscribers", topic),
        }
        Ok(())
    }
}

#[async_trait]
impl ConnectionPusher for Dispatcher {
    async fn push_to_connection(&self, connection_id: &str, payload: String) -> Result<(), GatewayError> {
        check_size(&payload, MAX_PUSH_BYTES)?;

        let gone = || GatewayError::Gone {
            connection_id: connection_id.to_string(),
        };
        let connections = self.inner.connections.read().await;
        let tx = connections.get(connection_id).ok_or_else(gone)?;
        tx.send(payload).map_err(|_| gone())
    }
}

fn check_size(payload: &str, limit: usize) -> Result<(), GatewayError> {
    if payload.len() > limit {
        return Err(GatewayError::PayloadTooLarge {
            size: payload.len(),
            limit,
        });
    }
    Ok(())
}
