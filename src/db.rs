//! Process-wide PostgreSQL pool.
//!
//! Created once at startup with [`Database::connect`] and drained at shutdown
//! with [`Database::close`]. Every component that touches the database borrows
//! connections from this pool for the duration of one call and returns them on
//! every exit path.

use crate::config::{DatabaseConfig, SslMode};
use crate::executor::QueryExecutor;
use crate::types::{AskError, Result};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use std::time::Duration;

/// How long a caller waits for a free connection before the call fails.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

impl From<SslMode> for PgSslMode {
    fn from(mode: SslMode) -> Self {
        match mode {
            SslMode::Disable => PgSslMode::Disable,
            SslMode::Prefer => PgSslMode::Prefer,
            SslMode::Require => PgSslMode::Require,
            SslMode::VerifyCa => PgSslMode::VerifyCa,
            SslMode::VerifyFull => PgSslMode::VerifyFull,
        }
    }
}

/// Handle to the target database.
///
/// Cheap to clone: clones share the same pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
    name: String,
}

impl Database {
    fn pool_options(config: &DatabaseConfig) -> (PgPoolOptions, PgConnectOptions) {
        let connect = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database)
            .ssl_mode(config.ssl_mode.into());

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(0)
            .idle_timeout(config.idle_timeout)
            .acquire_timeout(ACQUIRE_TIMEOUT);

        (pool, connect)
    }

    /// Open the pool and verify one connection.
    ///
    /// # Errors
    ///
    /// Returns `AskError::DataAccess` if the server is unreachable or rejects
    /// the credentials
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let (pool_options, connect_options) = Self::pool_options(config);

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| AskError::DataAccess(format!("Failed to connect to database: {}", e)))?;

        tracing::info!(
            host = %config.host,
            database = %config.database,
            max_connections = config.max_connections,
            "Database pool ready"
        );

        Ok(Self {
            pool,
            name: config.database.clone(),
        })
    }

    /// Create the pool without opening any connection.
    ///
    /// The first call that needs a connection opens it.
    pub fn connect_lazy(config: &DatabaseConfig) -> Self {
        let (pool_options, connect_options) = Self::pool_options(config);
        Self {
            pool: pool_options.connect_lazy_with(connect_options),
            name: config.database.clone(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Database name, used as `db.namespace` on spans.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Executor sharing this pool.
    pub fn executor(&self) -> QueryExecutor {
        QueryExecutor::new(self.pool.clone(), self.name.clone())
    }

    /// Close every connection and wait for checked-out ones to come back.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!(database = %self.name, "Database pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DatabaseConfig {
        DatabaseConfig {
            host: "localhost".into(),
            port: 5432,
            user: "reader".into(),
            password: "secret".into(),
            database: "hr".into(),
            ssl_mode: SslMode::Disable,
            max_connections: 5,
            idle_timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_ssl_mode_mapping() {
        assert!(matches!(PgSslMode::from(SslMode::Require), PgSslMode::Require));
        assert!(matches!(PgSslMode::from(SslMode::Disable), PgSslMode::Disable));
        assert!(matches!(PgSslMode::from(SslMode::VerifyFull), PgSslMode::VerifyFull));
    }

    #[tokio::test]
    async fn test_lazy_pool_has_no_connections() {
        let db = Database::connect_lazy(&config());
        assert_eq!(db.name(), "hr");
        assert_eq!(db.pool().size(), 0);
        assert!(!db.is_closed());

        db.close().await;
        assert!(db.is_closed());
    }
}
