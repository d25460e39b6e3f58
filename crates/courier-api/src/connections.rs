use axum::extract::State;
use tracing::info;

use courier_db::models::to_document;
use courier_types::api::{Confirmation, LifecycleRequest};
use courier_types::events::{CONNECT_ROUTE, ConnectionEvent, DISCONNECT_ROUTE};
use courier_types::models::Connection;

use crate::error::{HandlerError, Rejection};
use crate::request::{ApiRequest, parse_body};
use crate::response::{self, ApiResponse};
use crate::state::{AppState, AppStateInner};
use crate::validation::timestamp;

const CONTEXT: &str = "Error handling WebSocket connection";

/// Record or forget a gateway connection.
///
/// Called by the gateway upgrade route on `$connect` (before the socket is
/// accepted) and `$disconnect` (after it closes).
pub async fn handle_event(state: &AppStateInner, event: ConnectionEvent) -> ApiResponse {
    handle(state, event)
        .await
        .unwrap_or_else(|err| err.into_response(CONTEXT, None))
}

/// `POST /connections/events`, for gateways that report lifecycle events out of band.
pub async fn lifecycle_event(State(state): State<AppState>, req: ApiRequest) -> ApiResponse {
    let event = match req.body() {
        Some(body) => match parse_body::<LifecycleRequest>(body) {
            Ok(LifecycleRequest { connection_id, route_key }) => ConnectionEvent {
                connection_id,
                route_key,
                identity: req.identity.clone(),
            },
            Err(err) => return err.into_response(CONTEXT, None),
        },
        None => return response::reject(Rejection::MISSING_BODY),
    };

    handle_event(&state, event).await
}

async fn handle(state: &AppStateInner, event: ConnectionEvent) -> Result<ApiResponse, HandlerError> {
    let connection_id = event
        .connection_id
        .filter(|id| !id.is_empty())
        .ok_or(Rejection::MISSING_CONNECTION_ID)?;

    match event.route_key.as_str() {
        CONNECT_ROUTE => {
            let user_id = event
                .identity
                .map(|identity| identity.sub)
                .filter(|sub| !sub.is_empty())
                .ok_or(Rejection::MISSING_CONNECTION_USER)?;

            let connection = Connection {
                connection_id,
                user_id,
                timestamp: timestamp(),
            };
            state
                .store
                .put(&state.tables.connections, to_document(&connection)?, None)
                .await?;
            info!("Connection {} opened for {}", connection.connection_id, connection.user_id);
        }
        DISCONNECT_ROUTE => {
            state
                .store
                .delete(&state.tables.connections, &connection_id, None)
                .await?;
            info!("Connection {} closed", connection_id);
        }
        _ => return Err(Rejection::INVALID_ROUTE.into()),
    }

    Ok(response::ok(&Confirmation::new("Connection handled successfully")))
}
