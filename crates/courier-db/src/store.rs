use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Condition, Document, Table};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A put/update/delete precondition did not hold. Nothing was written.
    #[error("conditional check failed for {table}/{key}")]
    ConditionFailed { table: String, key: String },

    #[error("document for {table} is missing its key attribute `{attribute}`")]
    MissingKey { table: String, attribute: &'static str },

    #[error("record is not a JSON object: {0}")]
    NotAnObject(String),

    #[error("document serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_condition_failed(&self) -> bool {
        matches!(self, Self::ConditionFailed { .. })
    }
}

/// Key-value document store addressed by primary key, with optional
/// existence preconditions on writes.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create or replace the document keyed by `table.key`.
    async fn put(&self, table: &Table, item: Document, condition: Option<Condition>) -> Result<(), StoreError>;

    async fn get(&self, table: &Table, key: &str) -> Result<Option<Document>, StoreError>;

    /// Deleting an absent key without a condition succeeds.
    async fn delete(&self, table: &Table, key: &str, condition: Option<Condition>) -> Result<(), StoreError>;

    /// Set the given attributes and return the document as it is after the write.
    async fn update(
        &self,
        table: &Table,
        key: &str,
        changes: Document,
        condition: Option<Condition>,
    ) -> Result<Document, StoreError>;

    /// All documents whose string attribute `attribute` equals `value`.
    async fn query(&self, table: &Table, attribute: &str, value: &str) -> Result<Vec<Document>, StoreError>;
}
