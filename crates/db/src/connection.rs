use std::time::Duration;

use assetflow_core::config::DatabaseConfig;
use sqlx::sqlite::SqlitePoolOptions;

pub type DbPool = sqlx::SqlitePool;

/// An in-memory database lives exactly as long as its single connection.
fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// Opens the pool described by the `[database]` settings. Every connection enforces foreign
/// keys and waits up to the configured timeout on a locked database before reporting busy.
pub async fn connect(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    let timeout = Duration::from_secs(config.timeout_secs.max(1));
    let busy_timeout_ms = timeout.as_millis();
    let mut options = SqlitePoolOptions::new().acquire_timeout(timeout);

    options = if is_in_memory(&config.url) {
        options.max_connections(1).min_connections(1).idle_timeout(None).max_lifetime(None)
    } else {
        options.max_connections(config.max_connections.max(1))
    };

    options
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query(&format!("PRAGMA busy_timeout = {busy_timeout_ms}"))
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(&config.url)
        .await
}

#[cfg(test)]
mod tests {
    use assetflow_core::config::DatabaseConfig;

    use super::{connect, is_in_memory};

    #[test]
    fn memory_urls_are_recognised() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite://scratch?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite://assetflow.db?mode=rwc"));
    }

    #[tokio::test]
    async fn in_memory_pool_keeps_one_connection_with_pragmas_applied() {
        let config = DatabaseConfig { max_connections: 8, ..DatabaseConfig::in_memory() };
        let pool = connect(&config).await.expect("connect");

        assert_eq!(pool.options().get_max_connections(), 1);
        let foreign_keys: i64 =
            sqlx::query_scalar("PRAGMA foreign_keys").fetch_one(&pool).await.expect("pragma");
        assert_eq!(foreign_keys, 1);
        let busy_timeout: i64 =
            sqlx::query_scalar("PRAGMA busy_timeout").fetch_one(&pool).await.expect("pragma");
        assert_eq!(busy_timeout, 30_000);
    }
}
