use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};

use crate::models::{self, Condition, Document, Table};
use crate::store::{DocumentStore, StoreError};
use crate::Database;

#[async_trait]
impl DocumentStore for Database {
    async fn put(&self, table: &Table, item: Document, condition: Option<Condition>) -> Result<(), StoreError> {
        let key = table.key_of(&item)?;
        let body = serde_json::to_string(&item)?;
        let table = table.clone();

        self.run(move |conn| {
            let tx = conn.transaction()?;
            let exists = load_document(&tx, &table.name, &key)?.is_some();
            check(condition, exists, &table, &key)?;
            write_document(&tx, &table.name, &key, &body)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get(&self, table: &Table, key: &str) -> Result<Option<Document>, StoreError> {
        let name = table.name.clone();
        let key = key.to_string();
        self.run(move |conn| load_document(conn, &name, &key)).await
    }

    async fn delete(&self, table: &Table, key: &str, condition: Option<Condition>) -> Result<(), StoreError> {
        let table = table.clone();
        let key = key.to_string();

        self.run(move |conn| {
            let tx = conn.transaction()?;
            let exists = load_document(&tx, &table.name, &key)?.is_some();
            check(condition, exists, &table, &key)?;
            tx.execute(
                "DELETE FROM documents WHERE collection = ?1 AND doc_key = ?2",
                params![table.name, key],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn update(
        &self,
        table: &Table,
        key: &str,
        changes: Document,
        condition: Option<Condition>,
    ) -> Result<Document, StoreError> {
        let table = table.clone();
        let key = key.to_string();

        self.run(move |conn| {
            let tx = conn.transaction()?;
            let existing = load_document(&tx, &table.name, &key)?;
            check(condition, existing.is_some(), &table, &key)?;

            let merged = models::merge(&table, &key, existing, changes);
            write_document(&tx, &table.name, &key, &serde_json::to_string(&merged)?)?;
            tx.commit()?;
            Ok(merged)
        })
        .await
    }

    async fn query(&self, table: &Table, attribute: &str, value: &str) -> Result<Vec<Document>, StoreError> {
        let name = table.name.clone();
        let attribute = attribute.to_string();
        let value = value.to_string();

        self.run(move |conn| {
            // String attributes only, the same rule the in-memory store applies.
            let path = format!("$.\"{}\"", attribute);
            let mut stmt = conn.prepare(
                "SELECT body FROM documents
                 WHERE collection = ?1
                   AND json_type(body, ?2) = 'text'
                   AND json_extract(body, ?2) = ?3
                 ORDER BY doc_key",
            )?;
            let bodies = stmt
                .query_map(params![name, path, value], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            bodies
                .iter()
                .map(|body| serde_json::from_str::<Document>(body).map_err(StoreError::from))
                .collect()
        })
        .await
    }
}

fn check(condition: Option<Condition>, exists: bool, table: &Table, key: &str) -> Result<(), StoreError> {
    match condition {
        Some(condition) if !condition.holds(exists) => Err(table.condition_failed(key)),
        _ => Ok(()),
    }
}

fn load_document(conn: &Connection, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM documents WHERE collection = ?1 AND doc_key = ?2",
            params![collection, key],
            |row| row.get(0),
        )
        .optional()?;

    match body {
        Some(body) => Ok(Some(serde_json::from_str(&body)?)),
        None => Ok(None),
    }
}

fn write_document(conn: &Connection, collection: &str, key: &str, body: &str) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR REPLACE INTO documents (collection, doc_key, body, written_at)
         VALUES (?1, ?2, ?3, datetime('now'))",
        params![collection, key, body],
    )?;
    Ok(())
}
