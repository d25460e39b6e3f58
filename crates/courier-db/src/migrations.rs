use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (documents)");
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS documents (
                collection  TEXT NOT NULL,
                doc_key     TEXT NOT NULL,
                body        TEXT NOT NULL,
                written_at  TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (collection, doc_key)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
