use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::{self, Condition, Document, Table};
use crate::store::{DocumentStore, StoreError};

/// Process-local document store. Used by tests and by `COURIER_DB_PATH=:memory:`.
#[derive(Default)]
pub struct MemoryStore {
    /// collection name -> (key -> document)
    collections: RwLock<HashMap<String, BTreeMap<String, Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently held in `table`.
    pub async fn len(&self, table: &Table) -> usize {
        self.collections
            .read()
            .await
            .get(&table.name)
            .map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn put(&self, table: &Table, item: Document, condition: Option<Condition>) -> Result<(), StoreError> {
        let key = table.key_of(&item)?;
        let mut collections = self.collections.write().await;
        let collection = collections.entry(table.name.clone()).or_default();

        if let Some(condition) = condition {
            if !condition.holds(collection.contains_key(&key)) {
                return Err(table.condition_failed(&key));
            }
        }

        collection.insert(key, item);
        Ok(())
    }

    async fn get(&self, table: &Table, key: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .collections
            .read()
            .await
            .get(&table.name)
            .and_then(|collection| collection.get(key))
            .cloned())
    }

    async fn delete(&self, table: &Table, key: &str, condition: Option<Condition>) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let collection = collections.entry(table.name.clone()).or_default();

        if let Some(condition) = condition {
            if !condition.holds(collection.contains_key(key)) {
                return Err(table.condition_failed(key));
            }
        }

        collection.remove(key);
        Ok(())
    }

    async fn update(
        &self,
        table: &Table,
        key: &str,
        changes: Document,
        condition: Option<Condition>,
    ) -> Result<Document, StoreError> {
        let mut collections = self.collections.write().await;
        let collection = collections.entry(table.name.clone()).or_default();
        let existing = collection.remove(key);

        if let Some(condition) = condition {
            if !condition.holds(existing.is_some()) {
                if let Some(existing) = existing {
                    collection.insert(key.to_string(), existing);
                }
                return Err(table.condition_failed(key));
            }
        }

        let merged = models::merge(table, key, existing, changes);
        collection.insert(key.to_string(), merged.clone());
        Ok(merged)
    }

    async fn query(&self, table: &Table, attribute: &str, value: &str) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .collections
            .read()
            .await
            .get(&table.name)
            .map(|collection| {
                collection
                    .values()
                    .filter(|item| models::matches(item, attribute, value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
