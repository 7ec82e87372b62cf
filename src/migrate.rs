//! Schema for the local SQLite index.
//!
//! One row per indexed chunk. The embedding is stored as a little-endian
//! f32 BLOB (see [`crate::embedding::vec_to_blob`]). Statements are
//! idempotent; running them against an existing database is a no-op.

use anyhow::Result;
use sqlx::SqlitePool;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            source_id TEXT NOT NULL,
            content TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            embedding BLOB NOT NULL,
            dims INTEGER NOT NULL,
            indexed_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_source_id ON documents(source_id)")
        .execute(pool)
        .await?;

    Ok(())
}
