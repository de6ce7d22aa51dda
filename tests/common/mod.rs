//! Shared fixtures: a registry backed by a throwaway SQLite file.

#![allow(dead_code)]

use std::sync::Arc;
use table_bridge::config::{DatabaseConfig, PoolOptions};
use table_bridge::db::{ConnectionRegistry, Session, Statement};
use table_bridge::dispatch::CrudDispatcher;
use tempfile::TempDir;

pub const DB: &str = "main";

const SCHEMA: &[&str] = &[
    "CREATE TABLE items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        value INTEGER,
        active INTEGER NOT NULL DEFAULT 1,
        deleted INTEGER NOT NULL DEFAULT 0,
        deleted_by_guid INTEGER,
        deleted_at INTEGER
    )",
    "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)",
];

/// Keeps the temp directory alive for as long as the fixture is in scope.
pub struct Fixture {
    pub dispatcher: CrudDispatcher,
    pub registry: Arc<ConnectionRegistry>,
    _dir: TempDir,
}

pub async fn setup() -> Fixture {
    setup_with_pool(PoolOptions::default()).await
}

pub async fn setup_with_pool(pool_options: PoolOptions) -> Fixture {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bridge.db");
    let registry = Arc::new(ConnectionRegistry::new());
    let config =
        DatabaseConfig::sqlite(DB, path.to_str().unwrap()).with_pool_options(pool_options);
    registry.register(&config).await.unwrap();

    run_sql(&registry, SCHEMA).await;

    Fixture {
        dispatcher: CrudDispatcher::new(registry.clone()),
        registry,
        _dir: dir,
    }
}

/// Execute raw statements in one committed session.
pub async fn run_sql(registry: &ConnectionRegistry, statements: &[&str]) {
    let pool = registry.lookup(DB).await.unwrap();
    let mut session = Session::begin(&pool).await.unwrap();
    for sql in statements {
        session
            .execute(&Statement {
                sql: sql.to_string(),
                params: vec![],
            })
            .await
            .unwrap();
    }
    session.commit().await.unwrap();
}
