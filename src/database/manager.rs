use sqlx::{postgres::PgPoolOptions, PgPool};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Invalid SQL identifier: {0}")]
    InvalidIdentifier(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Connection pools shared by all tenants, keyed by connection URL
pub struct DatabaseManager {
    pools: Arc<RwLock<HashMap<String, PgPool>>>,
}

impl DatabaseManager {
    fn instance() -> &'static DatabaseManager {
        use std::sync::OnceLock;
        static INSTANCE: OnceLock<DatabaseManager> = OnceLock::new();
        INSTANCE.get_or_init(|| DatabaseManager {
            pools: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Get pool for a connection URL, created lazily on first use
    pub async fn pool(db_url: &str) -> Result<PgPool, DatabaseError> {
        Self::instance().get_pool(db_url).await
    }

    async fn get_pool(&self, db_url: &str) -> Result<PgPool, DatabaseError> {
        // Fast path: try read lock
        {
            let pools = self.pools.read().await;
            if let Some(pool) = pools.get(db_url) {
                return Ok(pool.clone());
            }
        }

        let parsed = url::Url::parse(db_url).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        if !matches!(parsed.scheme(), "postgres" | "postgresql") {
            return Err(DatabaseError::InvalidDatabaseUrl);
        }

        // Connect lazily so a tenant loads even while its database is down
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect_lazy(db_url)?;

        let mut pools = self.pools.write().await;
        let pool = pools.entry(db_url.to_string()).or_insert(pool).clone();

        info!("Created database pool for: {}", Self::redacted(&parsed));
        Ok(pool)
    }

    /// Close and remove all pools (e.g., on shutdown)
    pub async fn close_all() {
        let manager = Self::instance();
        let mut pools = manager.pools.write().await;
        for (_, pool) in pools.drain() {
            pool.close().await;
        }
        info!("Closed database pools");
    }

    /// Quote SQL identifier; only plain identifiers are accepted
    pub fn quote_identifier(name: &str) -> Result<String, DatabaseError> {
        if !Self::is_valid_identifier(name) {
            return Err(DatabaseError::InvalidIdentifier(name.to_string()));
        }
        Ok(format!("\"{}\"", name.replace('"', "\"\"")))
    }

    fn is_valid_identifier(name: &str) -> bool {
        !name.is_empty()
            && name.len() <= 63
            && !name.starts_with(|c: char| c.is_ascii_digit())
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    fn redacted(url: &url::Url) -> String {
        let mut url = url.clone();
        if url.password().is_some() {
            let _ = url.set_password(Some("***"));
        }
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_identifiers() {
        assert!(DatabaseManager::is_valid_identifier("qwc_config"));
        assert!(DatabaseManager::is_valid_identifier("default_url_params"));
        assert!(!DatabaseManager::is_valid_identifier("1abc"));
        assert!(!DatabaseManager::is_valid_identifier("user-infos"));
        assert!(!DatabaseManager::is_valid_identifier("x\"; DROP TABLE users; --"));
    }

    #[test]
    fn quotes_identifiers() {
        assert_eq!(DatabaseManager::quote_identifier("qwc_config").unwrap(), "\"qwc_config\"");
        assert!(matches!(
            DatabaseManager::quote_identifier("a b"),
            Err(DatabaseError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn redacts_password() {
        let url = url::Url::parse("postgres://qwc:secret@db:5432/qwc").unwrap();
        assert_eq!(DatabaseManager::redacted(&url), "postgres://qwc:***@db:5432/qwc");
    }

    #[tokio::test]
    async fn rejects_non_postgres_urls() {
        assert!(matches!(
            DatabaseManager::pool("mysql://localhost/db").await,
            Err(DatabaseError::InvalidDatabaseUrl)
        ));
        assert!(matches!(
            DatabaseManager::pool("not a url").await,
            Err(DatabaseError::InvalidDatabaseUrl)
        ));
    }
}
