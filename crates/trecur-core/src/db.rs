use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;

use crate::error::CoreError;

pub use sqlx::SqlitePool as DbPool;

/// Opens the SQLite database at `db_path` and runs migrations.
///
/// Missing parent directories and the database file itself are created.
pub async fn establish_connection(db_path: &Path) -> Result<SqlitePool, CoreError> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// A private in-memory database. A single connection, since every
/// connection to `:memory:` would otherwise see its own empty database.
pub async fn establish_in_memory() -> Result<SqlitePool, CoreError> {
    let options: SqliteConnectOptions = "sqlite::memory:".parse()?;
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}
