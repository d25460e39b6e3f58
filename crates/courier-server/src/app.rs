use axum::{
    Json, Router,
    extract::{State, WebSocketUpgrade},
    http::Extensions,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use courier_api::middleware::identify;
use courier_api::{AppState, connections, messages, users};
use courier_gateway::Dispatcher;
use courier_gateway::connection::handle_connection;
use courier_types::api::Identity;
use courier_types::events::ConnectionEvent;

#[derive(Clone)]
struct GatewayState {
    app: AppState,
    dispatcher: Dispatcher,
}

pub fn router(app_state: AppState, dispatcher: Dispatcher) -> Router {
    let api_routes = Router::new()
        .route("/users", post(users::create_user))
        .route(
            "/users/{userId}",
            get(users::get_user)
                .put(users::update_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route("/messages", post(messages::send_message))
        .route("/connections/events", post(connections::lifecycle_event))
        .with_state(app_state.clone());

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(GatewayState {
            app: app_state.clone(),
            dispatcher,
        });

    Router::new()
        .merge(api_routes)
        .merge(ws_route)
        .layer(middleware::from_fn_with_state(app_state, identify))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Record the connection, then upgrade. The record is removed once the socket
/// closes or the upgrade fails.
async fn ws_upgrade(State(state): State<GatewayState>, extensions: Extensions, ws: WebSocketUpgrade) -> Response {
    let identity = extensions.get::<Identity>().cloned();
    let (connection_id, outbound) = match open_connection(&state, identity).await {
        Ok(opened) => opened,
        Err(response) => return response,
    };

    let failed_state = state.clone();
    let failed_id = connection_id.clone();
    ws.on_failed_upgrade(move |err| {
        warn!("WebSocket upgrade for {} failed: {}", failed_id, err);
        tokio::spawn(close_connection(failed_state, failed_id));
    })
    .on_upgrade(move |socket| async move {
        handle_connection(socket, state.dispatcher.clone(), connection_id.clone(), outbound).await;
        close_connection(state, connection_id).await;
    })
}

/// Register a dispatcher sender, then run `$connect`.
///
/// The sender exists before the record does, so a push that finds the record
/// is buffered until the socket is driven.
async fn open_connection(
    state: &GatewayState,
    identity: Option<Identity>,
) -> Result<(String, mpsc::UnboundedReceiver<String>), Response> {
    let connection_id = Uuid::new_v4().to_string();
    let outbound = state.dispatcher.register_connection(&connection_id).await;

    let response = connections::handle_event(&state.app, ConnectionEvent::connect(&connection_id, identity)).await;
    if response.status_code != 200 {
        state.dispatcher.unregister_connection(&connection_id).await;
        return Err(response.into_response());
    }

    Ok((connection_id, outbound))
}

/// Drop the dispatcher sender, then run `$disconnect`.
async fn close_connection(state: GatewayState, connection_id: String) {
    state.dispatcher.unregister_connection(&connection_id).await;

    let response = connections::handle_event(&state.app, ConnectionEvent::disconnect(connection_id)).await;
    debug!("Disconnect handled with status {}", response.status_code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use futures_util::StreamExt;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tokio_tungstenite::tungstenite::Message as WsMessage;
    use tower::ServiceExt;

    use courier_api::middleware::create_token;
    use courier_api::{AppStateInner, PushAddressing, Tables};
    use courier_db::{DocumentStore, MemoryStore};

    const SECRET: &str = "router-test-secret";

    fn app_state(store: Arc<dyn DocumentStore>, dispatcher: &Dispatcher) -> AppState {
        Arc::new(AppStateInner {
            store,
            publisher: Arc::new(dispatcher.clone()),
            pusher: Arc::new(dispatcher.clone()),
            tables: Tables::default(),
            notifications_topic: "notifications".into(),
            push_addressing: PushAddressing::ConnectionLookup,
            jwt_secret: SECRET.into(),
        })
    }

    fn test_router() -> Router {
        let dispatcher = Dispatcher::new();
        router(app_state(Arc::new(MemoryStore::new()), &dispatcher), dispatcher)
    }

    fn token(sub: &str) -> String {
        create_token(SECRET, sub, chrono::Duration::minutes(5)).unwrap()
    }

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, body)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = test_router();
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        assert_eq!(call(&app, req).await, (StatusCode::OK, json!({ "status": "ok" })));
    }

    #[tokio::test]
    async fn user_lifecycle_over_http() {
        let app = test_router();

        let body = json!({ "email": "test@example.com", "firstName": "John", "lastName": "Doe" });
        let (status, user) = call(&app, json_request("POST", "/users", body)).await;
        assert_eq!(status, StatusCode::CREATED);
        let user_id = user["userId"].as_str().unwrap().to_string();

        let get = || Request::builder().uri(format!("/users/{user_id}")).body(Body::empty()).unwrap();
        let (status, fetched) = call(&app, get()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, user);

        let (status, updated) = call(&app, json_request("PATCH", &format!("/users/{user_id}"), json!({ "firstName": "Jane" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["firstName"], "Jane");

        let delete = Request::builder()
            .method("DELETE")
            .uri(format!("/users/{user_id}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = call(&app, delete).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&app, get()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "USER_NOT_FOUND");
    }

    #[tokio::test]
    async fn responses_carry_envelope_headers() {
        let app = test_router();
        let req = Request::builder().method("POST").uri("/users").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn send_message_uses_bearer_identity() {
        let app = test_router();
        let body = json!({ "userId": "u2", "content": "hello" });

        let (status, body_without_token) = call(&app, json_request("POST", "/messages", body.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body_without_token["code"], "INVALID_INPUT");

        let mut req = json_request("POST", "/messages", body);
        req.headers_mut()
            .insert(header::AUTHORIZATION, format!("Bearer {}", token("u1")).parse().unwrap());
        let (status, message) = call(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(message["senderId"], "u1");
    }

    #[tokio::test]
    async fn invalid_token_is_rejected() {
        let app = test_router();
        let req = Request::builder()
            .uri("/users/u1")
            .header(header::AUTHORIZATION, "Bearer not-a-jwt")
            .body(Body::empty())
            .unwrap();
        let (status, _) = call(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    async fn wait_for<F, Fut>(mut condition: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition().await {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn gateway_connection_receives_pushed_messages() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let dispatcher = Dispatcher::new();
        let state = app_state(store.clone(), &dispatcher);
        let app = router(state.clone(), dispatcher.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(axum::serve(listener, app.clone()).into_future());

        let url = format!("ws://{addr}/gateway?token={}", token("u2"));
        let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();

        let connections = store.query(&state.tables.connections, "userId", "u2").await.unwrap();
        assert_eq!(connections.len(), 1);
        let connection_id = connections[0]["connectionId"].as_str().unwrap().to_string();
        assert!(dispatcher.is_connected(&connection_id).await);

        let mut req = json_request("POST", "/messages", json!({ "userId": "u2", "content": "hello" }));
        req.headers_mut()
            .insert(header::AUTHORIZATION, format!("Bearer {}", token("u1")).parse().unwrap());
        let (status, _) = call(&app, req).await;
        assert_eq!(status, StatusCode::OK);

        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let WsMessage::Text(text) = frame else {
            panic!("expected a text frame");
        };
        let event: Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(event["type"], "message");
        assert_eq!(event["senderId"], "u1");
        assert_eq!(event["content"], "hello");

        socket.close(None).await.unwrap();
        wait_for(|| {
            let store = store.clone();
            let state = state.clone();
            let connection_id = connection_id.clone();
            async move {
                store
                    .get(&state.tables.connections, &connection_id)
                    .await
                    .unwrap()
                    .is_none()
            }
        })
        .await;
    }

    #[tokio::test]
    async fn gateway_without_identity_is_refused() {
        let store = Arc::new(MemoryStore::new());
        let dispatcher = Dispatcher::new();
        let state = app_state(store.clone(), &dispatcher);
        let app = router(state.clone(), dispatcher);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(axum::serve(listener, app).into_future());

        let result = tokio_tungstenite::connect_async(format!("ws://{addr}/gateway")).await;
        assert!(result.is_err());
        assert_eq!(store.len(&state.tables.connections).await, 0);
    }

    fn gateway_state() -> (GatewayState, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let dispatcher = Dispatcher::new();
        let app = app_state(store.clone(), &dispatcher);
        (GatewayState { app, dispatcher }, store)
    }

    fn identity(sub: &str) -> Option<Identity> {
        Some(Identity { sub: sub.into() })
    }

    #[tokio::test]
    async fn message_sent_during_handshake_keeps_the_connection() {
        let (state, store) = gateway_state();
        let Ok((connection_id, mut outbound)) = open_connection(&state, identity("u2")).await else {
            panic!("connect refused");
        };

        for content in ["first", "second"] {
            let req = courier_api::ApiRequest::new()
                .with_identity("u1")
                .with_body(json!({ "userId": "u2", "content": content }).to_string());
            let response = messages::send_message(State(state.app.clone()), req).await;
            assert_eq!(response.status_code, 200);
        }

        assert!(store.get(&state.app.tables.connections, &connection_id).await.unwrap().is_some());
        for content in ["first", "second"] {
            let event: Value = serde_json::from_str(&outbound.recv().await.unwrap()).unwrap();
            assert_eq!(event["content"], content);
        }
    }

    #[tokio::test]
    async fn refused_connect_leaves_nothing_registered() {
        let (state, store) = gateway_state();
        let Err(response) = open_connection(&state, None).await else {
            panic!("connect without identity was accepted");
        };

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(store.len(&state.app.tables.connections).await, 0);
    }

    #[tokio::test]
    async fn closing_forgets_record_and_sender() {
        let (state, store) = gateway_state();
        let Ok((connection_id, _outbound)) = open_connection(&state, identity("u2")).await else {
            panic!("connect refused");
        };
        assert!(state.dispatcher.is_connected(&connection_id).await);

        close_connection(state.clone(), connection_id.clone()).await;

        assert!(!state.dispatcher.is_connected(&connection_id).await);
        assert_eq!(store.len(&state.app.tables.connections).await, 0);
    }
}
