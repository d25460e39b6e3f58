use axum::extract::State;
use serde_json::Value;
use tracing::{debug, info, warn};

use courier_db::{Condition, models::to_document};
use courier_gateway::GatewayError;
use courier_types::api::SendMessageRequest;
use courier_types::events::{FanOutEvent, RealtimeEvent};
use courier_types::models::{Message, Notification, NotificationKind};

use crate::error::{HandlerError, Rejection};
use crate::request::{ApiRequest, parse_body};
use crate::response::{self, ApiResponse};
use crate::state::{AppState, AppStateInner, PushAddressing};
use crate::validation::{generate_id, timestamp};

/// Characters of message content carried in the fan-out event.
pub const PREVIEW_CHARS: usize = 100;

/// `POST /messages`
pub async fn send_message(State(state): State<AppState>, req: ApiRequest) -> ApiResponse {
    send(&state, &req)
        .await
        .unwrap_or_else(|err| err.into_response("Error sending message", None))
}

async fn send(state: &AppStateInner, req: &ApiRequest) -> Result<ApiResponse, HandlerError> {
    let body = req.body().ok_or(Rejection::MISSING_BODY)?;
    let SendMessageRequest { user_id, content } = parse_body(body)?;

    let (Some(recipient), Some(content), Some(sender)) = (
        user_id.filter(|v| !v.is_empty()),
        content.filter(|v| !v.is_empty()),
        req.caller(),
    ) else {
        return Err(Rejection::MISSING_FIELDS.into());
    };

    let now = timestamp();
    let message = Message {
        message_id: generate_id(),
        user_id: recipient,
        sender_id: sender.to_string(),
        content,
        read: false,
        created_at: now.clone(),
        updated_at: now.clone(),
    };
    let notification = Notification {
        notification_id: generate_id(),
        user_id: message.user_id.clone(),
        kind: NotificationKind::Message,
        title: "New Message".into(),
        content: format!("You have received a new message from {}", message.sender_id),
        read: false,
        created_at: now,
    };

    state
        .store
        .put(&state.tables.messages, to_document(&message)?, None)
        .await?;
    state
        .store
        .put(&state.tables.notifications, to_document(&notification)?, None)
        .await?;

    let fan_out = FanOutEvent::Message {
        user_id: message.user_id.clone(),
        message_id: message.message_id.clone(),
        content: format!("New message: {}", preview(&message.content)),
    };
    state
        .publisher
        .publish(&state.notifications_topic, serde_json::to_string(&fan_out)?)
        .await?;

    let realtime = RealtimeEvent::Message {
        message_id: message.message_id.clone(),
        content: message.content.clone(),
        sender_id: message.sender_id.clone(),
        timestamp: message.created_at.clone(),
    };
    if let Err(e) = push_realtime(state, &message.user_id, serde_json::to_string(&realtime)?).await {
        warn!("Failed to send WebSocket notification to {}: {}", message.user_id, e);
    }

    info!("Message {} sent from {} to {}", message.message_id, message.sender_id, message.user_id);
    Ok(response::ok(&message))
}

/// First [`PREVIEW_CHARS`] characters of `content`, with `...` appended when cut.
pub fn preview(content: &str) -> String {
    match content.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

async fn push_realtime(state: &AppStateInner, recipient: &str, payload: String) -> Result<(), HandlerError> {
    if state.push_addressing == PushAddressing::UserId {
        state.pusher.push_to_connection(recipient, payload).await?;
        return Ok(());
    }

    let connections = state
        .store
        .query(&state.tables.connections, "userId", recipient)
        .await?;

    for connection in &connections {
        let Some(connection_id) = connection.get("connectionId").and_then(Value::as_str) else {
            continue;
        };

        match state.pusher.push_to_connection(connection_id, payload.clone()).await {
            Ok(()) => debug!("Pushed message to connection {}", connection_id),
            Err(GatewayError::Gone { .. }) => {
                debug!("Connection {} is gone, removing", connection_id);
                if let Err(e) = state
                    .store
                    .delete(&state.tables.connections, connection_id, Some(Condition::Exists))
                    .await
                {
                    if !e.is_condition_failed() {
                        warn!("Failed to remove stale connection {}: {}", connection_id, e);
                    }
                }
            }
            Err(e) => warn!("Failed to push to connection {}: {}", connection_id, e),
        }
    }

    Ok(())
}
