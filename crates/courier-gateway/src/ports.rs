//! Outbound delivery seams used by the message handler.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The connection is not open (never existed, closed, or stale).
    #[error("connection {connection_id} is gone")]
    Gone { connection_id: String },

    #[error("payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },
}

/// Fan-out publish. Delivery to subscribers is not reported back.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, message: String) -> Result<(), GatewayError>;
}

/// Deliver a payload to one open connection by its connection id.
#[async_trait]
pub trait ConnectionPusher: Send + Sync {
    async fn push_to_connection(&self, connection_id: &str, payload: String) -> Result<(), GatewayError>;
}
