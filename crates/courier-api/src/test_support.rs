//! Test doubles for the store, publish and push seams.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use courier_db::{Condition, Document, DocumentStore, MemoryStore, StoreError, Table};
use courier_gateway::{ConnectionPusher, GatewayError, Publisher};

use crate::response::ApiResponse;
use crate::state::{AppState, AppStateInner, PushAddressing, Tables};

pub const TOPIC: &str = "test-notifications";
pub const SECRET: &str = "test-secret";

/// How [`FaultyStore`] misbehaves on puts to its target table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Conflict,
    Unavailable,
}

/// A [`MemoryStore`] whose puts to one table fail.
pub struct FaultyStore {
    pub inner: MemoryStore,
    pub table: String,
    pub fault: Fault,
}

impl FaultyStore {
    pub fn new(table: &str, fault: Fault) -> Self {
        Self {
            inner: MemoryStore::new(),
            table: table.to_string(),
            fault,
        }
    }
}

#[async_trait]
impl DocumentStore for FaultyStore {
    async fn put(&self, table: &Table, item: Document, condition: Option<Condition>) -> Result<(), StoreError> {
        if table.name != self.table {
            return self.inner.put(table, item, condition).await;
        }
        match self.fault {
            Fault::Conflict => Err(StoreError::ConditionFailed {
                table: table.name.clone(),
                key: table.key_of(&item)?,
            }),
            Fault::Unavailable => Err(StoreError::Unavailable("injected failure".into())),
        }
    }

    async fn get(&self, table: &Table, key: &str) -> Result<Option<Document>, StoreError> {
        self.inner.get(table, key).await
    }

    async fn delete(&self, table: &Table, key: &str, condition: Option<Condition>) -> Result<(), StoreError> {
        self.inner.delete(table, key, condition).await
    }

    async fn update(
        &self,
        table: &Table,
        key: &str,
        changes: Document,
        condition: Option<Condition>,
    ) -> Result<Document, StoreError> {
        self.inner.update(table, key, changes, condition).await
    }

    async fn query(&self, table: &Table, attribute: &str, value: &str) -> Result<Vec<Document>, StoreError> {
        self.inner.query(table, attribute, value).await
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    pub published: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, topic: &str, message: String) -> Result<(), GatewayError> {
        if self.fail {
            return Err(GatewayError::PayloadTooLarge { size: message.len(), limit: 0 });
        }
        self.published.lock().unwrap().push((topic.to_string(), message));
        Ok(())
    }
}

/// Accepts pushes only for connection ids in `open`.
#[derive(Default)]
pub struct RecordingPusher {
    pub open: Mutex<HashSet<String>>,
    pub pushed: Mutex<Vec<(String, String)>>,
}

impl RecordingPusher {
    pub fn open(&self, connection_id: &str) {
        self.open.lock().unwrap().insert(connection_id.to_string());
    }

    pub fn pushed_to(&self) -> Vec<String> {
        self.pushed.lock().unwrap().iter().map(|(id, _)| id.clone()).collect()
    }
}

#[async_trait]
impl ConnectionPusher for RecordingPusher {
    async fn push_to_connection(&self, connection_id: &str, payload: String) -> Result<(), GatewayError> {
        if !self.open.lock().unwrap().contains(connection_id) {
            return Err(GatewayError::Gone {
                connection_id: connection_id.to_string(),
            });
        }
        self.pushed.lock().unwrap().push((connection_id.to_string(), payload));
        Ok(())
    }
}

/// Application state wired to inspectable doubles.
pub struct Harness {
    pub state: AppState,
    pub store: Arc<dyn DocumentStore>,
    pub publisher: Arc<RecordingPublisher>,
    pub pusher: Arc<RecordingPusher>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(Arc::new(MemoryStore::new()), RecordingPublisher::default(), PushAddressing::default())
    }

    pub fn with_store(store: Arc<dyn DocumentStore>) -> Self {
        Self::build(store, RecordingPublisher::default(), PushAddressing::default())
    }

    pub fn with_failing_publisher() -> Self {
        let publisher = RecordingPublisher {
            fail: true,
            ..Default::default()
        };
        Self::build(Arc::new(MemoryStore::new()), publisher, PushAddressing::default())
    }

    pub fn with_addressing(addressing: PushAddressing) -> Self {
        Self::build(Arc::new(MemoryStore::new()), RecordingPublisher::default(), addressing)
    }

    fn build(store: Arc<dyn DocumentStore>, publisher: RecordingPublisher, push_addressing: PushAddressing) -> Self {
        let publisher = Arc::new(publisher);
        let pusher = Arc::new(RecordingPusher::default());
        let state = Arc::new(AppStateInner {
            store: store.clone(),
            publisher: publisher.clone(),
            pusher: pusher.clone(),
            tables: Tables::default(),
            notifications_topic: TOPIC.into(),
            push_addressing,
            jwt_secret: SECRET.into(),
        });
        Self {
            state,
            store,
            publisher,
            pusher,
        }
    }

    pub fn tables(&self) -> &Tables {
        &self.state.tables
    }
}

pub fn json(response: &ApiResponse) -> Value {
    serde_json::from_str(&response.body).unwrap()
}

pub fn assert_error(response: &ApiResponse, status: u16, code: &str) {
    assert_eq!(response.status_code, status, "body: {}", response.body);
    assert_eq!(json(response)["code"], code, "body: {}", response.body);
}
