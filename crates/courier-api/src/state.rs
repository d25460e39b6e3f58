use std::str::FromStr;
use std::sync::Arc;

use courier_db::{DocumentStore, Table};
use courier_gateway::{ConnectionPusher, Publisher};

pub type AppState = Arc<AppStateInner>;

/// Clients and configuration built once per process and shared by every
/// request.
pub struct AppStateInner {
    pub store: Arc<dyn DocumentStore>,
    pub publisher: Arc<dyn Publisher>,
    pub pusher: Arc<dyn ConnectionPusher>,
    pub tables: Tables,
    pub notifications_topic: String,
    pub push_addressing: PushAddressing,
    pub jwt_secret: String,
}

/// The four collections, with their primary-key attributes.
#[derive(Debug, Clone)]
pub struct Tables {
    pub users: Table,
    pub messages: Table,
    pub notifications: Table,
    pub connections: Table,
}

impl Tables {
    pub fn new(
        users: impl Into<String>,
        messages: impl Into<String>,
        notifications: impl Into<String>,
        connections: impl Into<String>,
    ) -> Self {
        Self {
            users: Table::new(users, "userId"),
            messages: Table::new(messages, "messageId"),
            notifications: Table::new(notifications, "notificationId"),
            connections: Table::new(connections, "connectionId"),
        }
    }
}

impl Default for Tables {
    fn default() -> Self {
        Self::new("users", "messages", "notifications", "connections")
    }
}

/// How the send path picks the connections to push a real-time event to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PushAddressing {
    /// Look up the recipient's open connections in the connections collection.
    #[default]
    ConnectionLookup,
    /// Push to a connection whose id is the recipient's user id.
    UserId,
}

impl FromStr for PushAddressing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connection" => Ok(Self::ConnectionLookup),
            "user-id" => Ok(Self::UserId),
            other => Err(format!("unknown push addressing mode `{other}` (expected `connection` or `user-id`)")),
        }
    }
}
