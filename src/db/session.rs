//! Per-request database session.
//!
//! Each request opens one transaction on the target pool, runs all of its
//! statements (schema inspection included) through it, then commits on
//! success or rolls back on failure. Holding a single connection for the
//! whole request keeps single-connection pools from waiting on themselves.
//!
//! SQLite sessions start with `BEGIN IMMEDIATE` so the write lock is taken
//! up front. A deferred transaction that reads the catalog first cannot
//! upgrade to a writer while another connection holds the lock, and SQLite
//! fails it with `database is locked` instead of waiting.

use crate::db::params::{bind_mysql_param, bind_postgres_param, bind_sqlite_param};
use crate::db::pool::DbPool;
use crate::db::statement::Statement;
use crate::db::types::RowDecode;
use crate::error::BridgeResult;
use crate::models::{Dialect, Record, TableSchema};
use sqlx::{MySql, Postgres, Row, Sqlite, Transaction};
use tracing::{debug, warn};

const SQLITE_BEGIN: &str = "BEGIN IMMEDIATE";

/// An open transaction on one of the supported dialects.
pub enum Session {
    MySql(Transaction<'static, MySql>),
    Postgres(Transaction<'static, Postgres>),
    Sqlite(Transaction<'static, Sqlite>),
}

impl Session {
    /// Acquire a connection from the pool and start a transaction.
    pub async fn begin(pool: &DbPool) -> BridgeResult<Self> {
        let session = impl_db_dispatch!(DbPool, pool, {
            MySql(p) => Session::MySql(p.begin().await?),
            Postgres(p) => Session::Postgres(p.begin().await?),
            Sqlite(p) => Session::Sqlite(p.begin_with(SQLITE_BEGIN).await?),
        });
        debug!(dialect = %session.dialect(), "Transaction started");
        Ok(session)
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            Session::MySql(_) => Dialect::MySql,
            Session::Postgres(_) => Dialect::Postgres,
            Session::Sqlite(_) => Dialect::Sqlite,
        }
    }

    /// Run a statement that returns no rows; yields the affected row count.
    pub async fn execute(&mut self, stmt: &Statement) -> BridgeResult<u64> {
        debug!(sql = %stmt.sql, params = stmt.params.len(), "Executing statement");
        let affected = impl_db_dispatch!(Session, self, {
            MySql(tx) => {
                let mut query = sqlx::query(&stmt.sql);
                for param in &stmt.params {
                    query = bind_mysql_param(query, param);
                }
                query.execute(&mut **tx).await?.rows_affected()
            },
            Postgres(tx) => {
                let mut query = sqlx::query(&stmt.sql);
                for param in &stmt.params {
                    query = bind_postgres_param(query, param);
                }
                query.execute(&mut **tx).await?.rows_affected()
            },
            Sqlite(tx) => {
                let mut query = sqlx::query(&stmt.sql);
                for param in &stmt.params {
                    query = bind_sqlite_param(query, param);
                }
                query.execute(&mut **tx).await?.rows_affected()
            },
        });
        debug!(affected, "Statement executed");
        Ok(affected)
    }

    /// Run a SELECT and pair each value with the table's column names.
    pub async fn fetch_records(
        &mut self,
        stmt: &Statement,
        schema: &TableSchema,
    ) -> BridgeResult<Vec<Record>> {
        debug!(sql = %stmt.sql, params = stmt.params.len(), "Fetching rows");
        let rows: Vec<Vec<_>> = impl_db_dispatch!(Session, self, {
            MySql(tx) => {
                let mut query = sqlx::query(&stmt.sql);
                for param in &stmt.params {
                    query = bind_mysql_param(query, param);
                }
                query
                    .fetch_all(&mut **tx)
                    .await?
                    .iter()
                    .map(|row| row.decode_values())
                    .collect()
            },
            Postgres(tx) => {
                let mut query = sqlx::query(&stmt.sql);
                for param in &stmt.params {
                    query = bind_postgres_param(query, param);
                }
                query
                    .fetch_all(&mut **tx)
                    .await?
                    .iter()
                    .map(|row| row.decode_values())
                    .collect()
            },
            Sqlite(tx) => {
                let mut query = sqlx::query(&stmt.sql);
                for param in &stmt.params {
                    query = bind_sqlite_param(query, param);
                }
                query
                    .fetch_all(&mut **tx)
                    .await?
                    .iter()
                    .map(|row| row.decode_values())
                    .collect()
            },
        });

        let names = schema.column_names();
        let records = rows
            .into_iter()
            .map(|values| {
                Record::from_fields(
                    names
                        .iter()
                        .map(|name| name.to_string())
                        .zip(values)
                        .collect(),
                )
            })
            .collect::<Vec<_>>();
        debug!(rows = records.len(), "Rows fetched");
        Ok(records)
    }

    /// Run a `SELECT COUNT(*)` style statement.
    pub async fn fetch_count(&mut self, stmt: &Statement) -> BridgeResult<u64> {
        debug!(sql = %stmt.sql, "Counting rows");
        let count: i64 = impl_db_dispatch!(Session, self, {
            MySql(tx) => {
                let mut query = sqlx::query(&stmt.sql);
                for param in &stmt.params {
                    query = bind_mysql_param(query, param);
                }
                query.fetch_one(&mut **tx).await?.try_get(0)?
            },
            Postgres(tx) => {
                let mut query = sqlx::query(&stmt.sql);
                for param in &stmt.params {
                    query = bind_postgres_param(query, param);
                }
                query.fetch_one(&mut **tx).await?.try_get(0)?
            },
            Sqlite(tx) => {
                let mut query = sqlx::query(&stmt.sql);
                for param in &stmt.params {
                    query = bind_sqlite_param(query, param);
                }
                query.fetch_one(&mut **tx).await?.try_get(0)?
            },
        });
        Ok(u64::try_from(count).unwrap_or(0))
    }

    pub async fn commit(self) -> BridgeResult<()> {
        impl_db_dispatch!(Session, self, {
            MySql(tx) => tx.commit().await?,
            Postgres(tx) => tx.commit().await?,
            Sqlite(tx) => tx.commit().await?,
        });
        debug!("Transaction committed");
        Ok(())
    }

    pub async fn rollback(self) -> BridgeResult<()> {
        impl_db_dispatch!(Session, self, {
            MySql(tx) => tx.rollback().await?,
            Postgres(tx) => tx.rollback().await?,
            Sqlite(tx) => tx.rollback().await?,
        });
        debug!("Transaction rolled back");
        Ok(())
    }

    /// Commit if `outcome` succeeded, roll back otherwise.
    ///
    /// A failed commit replaces the successful outcome. A failed rollback is
    /// logged and the original error is returned.
    pub async fn finish<T>(self, outcome: BridgeResult<T>) -> BridgeResult<T> {
        match outcome {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Session").field(&self.dialect()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::pool::ConnectionRegistry;
    use crate::error::BridgeError;
    use crate::models::{ColumnInfo, RecordValue};

    async fn memory_pool() -> (ConnectionRegistry, DbPool) {
        let registry = ConnectionRegistry::new();
        registry
            .register(&DatabaseConfig::sqlite("mem", ":memory:"))
            .await
            .unwrap();
        let pool = registry.lookup("mem").await.unwrap();
        (registry, pool)
    }

    fn stmt(sql: &str, params: Vec<RecordValue>) -> Statement {
        Statement {
            sql: sql.to_string(),
            params,
        }
    }

    #[tokio::test]
    async fn test_commit_persists_and_rollback_discards() {
        let (_registry, pool) = memory_pool().await;

        let mut session = Session::begin(&pool).await.unwrap();
        assert_eq!(session.dialect(), Dialect::Sqlite);
        session
            .execute(&stmt("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)", vec![]))
            .await
            .unwrap();
        let affected = session
            .execute(&stmt(
                "INSERT INTO t (name) VALUES (?)",
                vec![RecordValue::from("kept")],
            ))
            .await
            .unwrap();
        assert_eq!(affected, 1);
        session.commit().await.unwrap();

        let mut session = Session::begin(&pool).await.unwrap();
        session
            .execute(&stmt(
                "INSERT INTO t (name) VALUES (?)",
                vec![RecordValue::from("dropped")],
            ))
            .await
            .unwrap();
        let failed: BridgeResult<()> = Err(BridgeError::internal("boom"));
        assert!(session.finish(failed).await.is_err());

        let mut session = Session::begin(&pool).await.unwrap();
        let count = session
            .fetch_count(&stmt("SELECT COUNT(*) FROM t", vec![]))
            .await
            .unwrap();
        assert_eq!(count, 1);

        let schema = TableSchema::new(
            Dialect::Sqlite,
            "t",
            vec![
                ColumnInfo::new("id", "INTEGER", false).with_primary_key(true),
                ColumnInfo::new("name", "TEXT", true),
            ],
        );
        let records = session
            .fetch_records(&stmt("SELECT id, name FROM t", vec![]), &schema)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("name"), Some(&RecordValue::from("kept")));
        assert_eq!(records[0].get("id"), Some(&RecordValue::Int(1)));
        session.finish(Ok(())).await.unwrap();
    }

    #[tokio::test]
    async fn test_execution_error_is_reported() {
        let (_registry, pool) = memory_pool().await;
        let mut session = Session::begin(&pool).await.unwrap();
        let err = session
            .execute(&stmt("INSERT INTO missing (x) VALUES (1)", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Execution { .. }));
        session.rollback().await.unwrap();
    }
}
