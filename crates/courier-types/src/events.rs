use serde::{Deserialize, Serialize};

use crate::api::Identity;

pub const CONNECT_ROUTE: &str = "$connect";
pub const DISCONNECT_ROUTE: &str = "$disconnect";

/// Published on the notifications topic for downstream subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum FanOutEvent {
    Message {
        user_id: String,
        message_id: String,
        content: String,
    },
}

/// Pushed to a recipient's open gateway connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum RealtimeEvent {
    Message {
        message_id: String,
        content: String,
        sender_id: String,
        timestamp: String,
    },
}

/// A connection lifecycle event as seen by the connection handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEvent {
    pub connection_id: Option<String>,
    pub route_key: String,
    pub identity: Option<Identity>,
}

impl ConnectionEvent {
    pub fn connect(connection_id: impl Into<String>, identity: Option<Identity>) -> Self {
        Self {
            connection_id: Some(connection_id.into()),
            route_key: CONNECT_ROUTE.into(),
            identity,
        }
    }

    pub fn disconnect(connection_id: impl Into<String>) -> Self {
        Self {
            connection_id: Some(connection_id.into()),
            route_key: DISCONNECT_ROUTE.into(),
            identity: None,
        }
    }
}
