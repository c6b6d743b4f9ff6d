use std::time::Duration;

use sqlx::migrate::MigrateError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::MIGRATOR;

/// Creates a SQLite connection pool for the ledger, creating the file if needed.
///
/// The notifier is the only writer, so a small pool is enough.
pub async fn create_sqlite_pool(options: SqliteConnectOptions) -> Result<SqlitePool, sqlx::Error> {
    let options = options
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
}

/// Runs all outstanding migrations against the provided connection pool.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// Connection options for a `sqlite:` URL or a plain filesystem path.
///
/// Plain paths are used verbatim, so `?` and `#` in a file name stay part of it.
pub fn connect_options(path_or_url: &str) -> Result<SqliteConnectOptions, sqlx::Error> {
    if path_or_url.starts_with("sqlite:") {
        path_or_url.parse()
    } else {
        Ok(SqliteConnectOptions::new().filename(path_or_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_options_accepts_url() {
        let pool = create_sqlite_pool(connect_options("sqlite::memory:").unwrap())
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        pool.close().await;
    }

    #[tokio::test]
    async fn test_pool_creates_file_with_url_characters() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ledger#?.db");

        let pool = create_sqlite_pool(connect_options(path.to_str().unwrap()).unwrap())
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        pool.close().await;

        // The literal name is used, not `ledger` with a query string
        assert!(path.exists());
        assert!(!dir.path().join("ledger").exists());
    }
}
