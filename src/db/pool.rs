//! Connection registry.
//!
//! Holds one pool per logical database using database-specific pools
//! (MySqlPool, PgPool, SqlitePool) to keep full type support. The registry is
//! constructed explicitly at startup and handed to whoever needs it.

use crate::config::DatabaseConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::models::{ConnectionInfo, Dialect};
use sqlx::{
    MySqlPool, PgPool, SqlitePool, mysql::MySqlConnectOptions, mysql::MySqlPoolOptions,
    postgres::PgConnectOptions, postgres::PgPoolOptions, sqlite::SqliteConnectOptions,
    sqlite::SqlitePoolOptions,
};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Database-specific connection pool (avoids AnyPool limitations).
#[derive(Debug, Clone)]
pub enum DbPool {
    MySql(MySqlPool),
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

impl DbPool {
    /// Close the connection pool.
    pub async fn close(&self) {
        impl_db_dispatch!(DbPool, self, {
            MySql(pool) => pool.close().await,
            Postgres(pool) => pool.close().await,
            Sqlite(pool) => pool.close().await,
        })
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            DbPool::MySql(_) => Dialect::MySql,
            DbPool::Postgres(_) => Dialect::Postgres,
            DbPool::Sqlite(_) => Dialect::Sqlite,
        }
    }

    /// Round-trip `SELECT 1` to prove the handle is usable.
    pub async fn ping(&self) -> BridgeResult<()> {
        let value: i64 = impl_db_dispatch!(DbPool, self, {
            MySql(pool) => sqlx::query_scalar("SELECT 1").fetch_one(pool).await?,
            Postgres(pool) => sqlx::query_scalar("SELECT 1::BIGINT").fetch_one(pool).await?,
            Sqlite(pool) => sqlx::query_scalar("SELECT 1").fetch_one(pool).await?,
        });
        debug!(value, "Probe succeeded");
        Ok(())
    }

    /// Get the server version from the connected database.
    async fn server_version(&self) -> Option<String> {
        let result: Result<String, sqlx::Error> = impl_db_dispatch!(DbPool, self, {
            MySql(pool) => sqlx::query_scalar("SELECT version()").fetch_one(pool).await,
            Postgres(pool) => sqlx::query_scalar("SELECT version()").fetch_one(pool).await,
            Sqlite(pool) => sqlx::query_scalar("SELECT sqlite_version()").fetch_one(pool).await,
        });
        match result {
            Ok(version) => {
                debug!(version = %version, "Got server version");
                Some(version)
            }
            Err(e) => {
                warn!(error = %e, "Failed to get server version");
                None
            }
        }
    }
}

#[derive(Debug)]
struct PoolEntry {
    pool: DbPool,
    info: ConnectionInfo,
}

/// Outcome of registering a batch of databases.
#[derive(Debug, Default)]
pub struct RegistrationReport {
    pub registered: Vec<ConnectionInfo>,
    /// (logical name, error) for each database that failed
    pub failed: Vec<(String, BridgeError)>,
}

#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    pools: Arc<RwLock<HashMap<String, PoolEntry>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect to a database, validate it with `SELECT 1`, and register the pool.
    pub async fn register(&self, config: &DatabaseConfig) -> BridgeResult<ConnectionInfo> {
        let name = config.name.clone();

        // Early check for existing registration
        if self.pools.read().await.contains_key(&name) {
            return Err(Self::duplicate(&name));
        }

        info!(
            database = %name,
            dialect = %config.dialect,
            url = %config.masked_url(),
            "Connecting to database"
        );

        let pool = Self::create_pool(config).await?;
        if let Err(e) = pool.ping().await {
            pool.close().await;
            return Err(BridgeError::connection(
                format!("Probe query failed for '{}': {}", name, e),
                Self::connection_suggestion(config.dialect, &e.to_string()),
            ));
        }
        let server_version = pool.server_version().await;

        let info = ConnectionInfo {
            name: name.clone(),
            dialect: config.dialect,
            database: config.database.clone(),
            server_version,
        };

        // Re-check after async work to prevent TOCTOU race
        let duplicate_pool = {
            let mut pools = self.pools.write().await;
            if pools.contains_key(&name) {
                Some(pool)
            } else {
                pools.insert(
                    name.clone(),
                    PoolEntry {
                        pool,
                        info: info.clone(),
                    },
                );
                None
            }
        }; // Lock released here

        if let Some(pool) = duplicate_pool {
            pool.close().await;
            return Err(Self::duplicate(&name));
        }

        info!(
            database = %name,
            server_version = ?info.server_version,
            "Connected successfully"
        );
        Ok(info)
    }

    /// Register every config; a failing database does not stop the others.
    pub async fn register_all(&self, configs: &[DatabaseConfig]) -> RegistrationReport {
        let mut report = RegistrationReport::default();
        for config in configs {
            match self.register(config).await {
                Ok(info) => report.registered.push(info),
                Err(e) => {
                    error!(
                        database = %config.name,
                        error = %e,
                        suggestion = ?e.suggestion(),
                        "Database unavailable, continuing without it"
                    );
                    report.failed.push((config.name.clone(), e));
                }
            }
        }
        report
    }

    /// Get the pool for a logical database.
    pub async fn lookup(&self, name: &str) -> BridgeResult<DbPool> {
        let pools = self.pools.read().await;
        pools
            .get(name)
            .map(|entry| entry.pool.clone())
            .ok_or_else(|| BridgeError::database_not_found(name))
    }

    /// Run the round-trip probe against a registered database.
    pub async fn probe(&self, name: &str) -> BridgeResult<()> {
        let pool = self.lookup(name).await?;
        pool.ping().await.map_err(|e| match e {
            BridgeError::Connection { .. } => e,
            other => BridgeError::connection(
                format!("Probe query failed for '{}': {}", name, other),
                Self::connection_suggestion(pool.dialect(), &other.to_string()),
            ),
        })
    }

    pub async fn info(&self, name: &str) -> BridgeResult<ConnectionInfo> {
        let pools = self.pools.read().await;
        pools
            .get(name)
            .map(|entry| entry.info.clone())
            .ok_or_else(|| BridgeError::database_not_found(name))
    }

    /// Registered logical names, sorted.
    pub async fn names(&self) -> Vec<String> {
        let pools = self.pools.read().await;
        let mut names: Vec<String> = pools.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn len(&self) -> usize {
        self.pools.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pools.read().await.is_empty()
    }

    /// Close all pools and clear the registry.
    pub async fn close_all(&self) {
        let mut pools = self.pools.write().await;
        for (name, entry) in pools.drain() {
            info!(database = %name, "Closing connection");
            entry.pool.close().await;
        }
        info!("All connections closed");
    }

    fn duplicate(name: &str) -> BridgeError {
        BridgeError::connection(
            format!("Database '{}' is already registered", name),
            "Use a different logical name",
        )
    }

    /// Create a connection pool for the given configuration.
    async fn create_pool(config: &DatabaseConfig) -> BridgeResult<DbPool> {
        let pool_opts = &config.pool_options;
        let dialect = config.dialect;
        let acquire_timeout = Duration::from_secs(pool_opts.acquire_timeout_or_default());
        let idle_timeout = Some(Duration::from_secs(pool_opts.idle_timeout_or_default()));
        let url = config
            .connection_url()
            .map_err(|e| BridgeError::connection(e, "Check the database host and credentials"))?;
        let connect_err = |e: sqlx::Error| {
            BridgeError::connection(
                format!("Failed to connect to '{}': {}", config.name, e),
                Self::connection_suggestion(dialect, &e.to_string()),
            )
        };

        match dialect {
            Dialect::MySql => {
                let options = MySqlConnectOptions::from_str(&url)
                    .map_err(|e| {
                        BridgeError::connection(
                            format!("Invalid MySQL settings: {}", e),
                            "Check host, port, user and database",
                        )
                    })?
                    .charset("utf8mb4");

                let pool = MySqlPoolOptions::new()
                    .min_connections(pool_opts.min_connections_or_default())
                    .max_connections(pool_opts.max_connections_or_default(dialect))
                    .acquire_timeout(acquire_timeout)
                    .idle_timeout(idle_timeout)
                    .test_before_acquire(pool_opts.test_before_acquire_or_default())
                    .connect_with(options)
                    .await
                    .map_err(connect_err)?;
                Ok(DbPool::MySql(pool))
            }
            Dialect::Postgres => {
                let options = PgConnectOptions::from_str(&url).map_err(|e| {
                    BridgeError::connection(
                        format!("Invalid PostgreSQL settings: {}", e),
                        "Check host, port, user and database",
                    )
                })?;

                let pool = PgPoolOptions::new()
                    .min_connections(pool_opts.min_connections_or_default())
                    .max_connections(pool_opts.max_connections_or_default(dialect))
                    .acquire_timeout(acquire_timeout)
                    .idle_timeout(idle_timeout)
                    .test_before_acquire(pool_opts.test_before_acquire_or_default())
                    .connect_with(options)
                    .await
                    .map_err(connect_err)?;
                Ok(DbPool::Postgres(pool))
            }
            Dialect::Sqlite => {
                let options = SqliteConnectOptions::from_str(&url)
                    .map_err(|e| {
                        BridgeError::connection(
                            format!("Invalid SQLite settings: {}", e),
                            "Check the database file path",
                        )
                    })?
                    .create_if_missing(true);

                let pool = SqlitePoolOptions::new()
                    .min_connections(pool_opts.min_connections_or_default())
                    .max_connections(pool_opts.max_connections_or_default(dialect))
                    .acquire_timeout(acquire_timeout)
                    .idle_timeout(idle_timeout)
                    .test_before_acquire(pool_opts.test_before_acquire_or_default())
                    .connect_with(options)
                    .await
                    .map_err(connect_err)?;
                Ok(DbPool::Sqlite(pool))
            }
        }
    }

    /// Generate a helpful suggestion for connection errors.
    fn connection_suggestion(dialect: Dialect, error: &str) -> String {
        let error_str = error.to_lowercase();

        if error_str.contains("connection refused") {
            return format!("Check that the {} server is running and accessible", dialect);
        }

        if error_str.contains("authentication") || error_str.contains("password") {
            return "Verify the user and password".to_string();
        }

        if error_str.contains("does not exist") || error_str.contains("unknown database") {
            return "Check that the database exists".to_string();
        }

        if error_str.contains("tls") || error_str.contains("ssl") {
            return "Check TLS/SSL configuration or try disabling it".to_string();
        }

        match dialect {
            Dialect::Postgres => "Verify host, port and database name (default port 5432)".to_string(),
            Dialect::MySql => "Verify host, port and database name (default port 3306)".to_string(),
            Dialect::Sqlite => "Verify the file path is writable".to_string(),
        }
    }
}
