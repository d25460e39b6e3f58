mod app;
mod config;

use std::path::Path;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use courier_api::AppStateInner;
use courier_db::{Database, DocumentStore, MemoryStore};
use courier_gateway::Dispatcher;

use crate::config::{Config, DEFAULT_JWT_SECRET, MEMORY_DB};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "courier_server=debug,courier_api=debug,courier_gateway=debug,courier_db=debug,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;
    if config.jwt_secret == DEFAULT_JWT_SECRET {
        warn!("COURIER_JWT_SECRET is not set, using the development secret");
    }

    // Init store
    let store: Arc<dyn DocumentStore> = if config.db_path == MEMORY_DB {
        info!("Using in-memory document store");
        Arc::new(MemoryStore::new())
    } else {
        info!("Opening document store at {}", config.db_path);
        Arc::new(Database::open(Path::new(&config.db_path))?)
    };

    // Shared state
    let dispatcher = Dispatcher::new();
    let app_state = Arc::new(AppStateInner {
        store,
        publisher: Arc::new(dispatcher.clone()),
        pusher: Arc::new(dispatcher.clone()),
        tables: config.tables(),
        notifications_topic: config.notifications_topic.clone(),
        push_addressing: config.push_addressing,
        jwt_secret: config.jwt_secret.clone(),
    });

    spawn_fan_out_logger(&dispatcher, &config.notifications_topic).await;

    let app = app::router(app_state, dispatcher);

    let addr = config.addr()?;
    info!("Courier server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Log every event published on the notifications topic.
async fn spawn_fan_out_logger(dispatcher: &Dispatcher, topic: &str) {
    let mut events = dispatcher.subscribe(topic).await;
    let topic = topic.to_string();

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => info!(topic = %topic, "Fan-out event: {}", event),
                Err(RecvError::Lagged(skipped)) => warn!("Fan-out logger on {} skipped {} events", topic, skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });
}
