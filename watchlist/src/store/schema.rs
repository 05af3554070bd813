use sqlx::SqlitePool;

/// Local tier: named slots holding a serialized watchlist.
pub async fn migrate_local(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS kv_slots (
  slot TEXT PRIMARY KEY,
  value TEXT NOT NULL,
  updated_at_ms BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Remote tier: one JSON document per path, versioned per write.
pub async fn migrate_remote(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS documents (
  path TEXT PRIMARY KEY,
  body TEXT NOT NULL,
  version BIGINT NOT NULL DEFAULT 0,
  updated_at_ms BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
