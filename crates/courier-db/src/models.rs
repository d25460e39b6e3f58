//! Document and collection types shared by every store adapter.

use serde::Serialize;
use serde_json::Value;

use crate::store::StoreError;

/// A stored record: a flat JSON object of attributes.
pub type Document = serde_json::Map<String, Value>;

/// A named collection plus the attribute that holds its primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub key: &'static str,
}

impl Table {
    pub fn new(name: impl Into<String>, key: &'static str) -> Self {
        Self {
            name: name.into(),
            key,
        }
    }

    /// Extract the primary key from a document. Keys are always strings.
    pub fn key_of(&self, item: &Document) -> Result<String, StoreError> {
        match item.get(self.key) {
            Some(Value::String(key)) if !key.is_empty() => Ok(key.clone()),
            _ => Err(StoreError::MissingKey {
                table: self.name.clone(),
                attribute: self.key,
            }),
        }
    }

    pub(crate) fn condition_failed(&self, key: &str) -> StoreError {
        StoreError::ConditionFailed {
            table: self.name.clone(),
            key: key.to_string(),
        }
    }
}

/// Precondition on the existence of a document's primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Exists,
    NotExists,
}

impl Condition {
    pub fn holds(self, exists: bool) -> bool {
        match self {
            Self::Exists => exists,
            Self::NotExists => !exists,
        }
    }
}

/// Serialize a typed record into a document.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::NotAnObject(other.to_string())),
    }
}

/// Merge `changes` over `existing` attribute by attribute. The primary key is
/// never overwritten.
pub(crate) fn merge(table: &Table, key: &str, existing: Option<Document>, changes: Document) -> Document {
    let mut merged = existing.unwrap_or_default();
    for (attribute, value) in changes {
        if attribute != table.key {
            merged.insert(attribute, value);
        }
    }
    merged.insert(table.key.to_string(), Value::String(key.to_string()));
    merged
}

pub(crate) fn matches(item: &Document, attribute: &str, value: &str) -> bool {
    matches!(item.get(attribute), Some(Value::String(v)) if v == value)
}
