//! CRUD dispatcher.
//!
//! Resolves `{db, table}` for each request, inspects the table inside a fresh
//! session, builds the statement and shapes the response. Every operation
//! ends in `Session::finish`, so a failure at any step rolls back before the
//! error leaves this module.

use crate::config::DEFAULT_MAX_PAGE_SIZE;
use crate::db::{ConnectionRegistry, SchemaInspector, Session, StatementBuilder};
use crate::error::{BridgeError, BridgeResult};
use crate::models::{
    DEFAULT_PAGE_SIZE, ListResponse, MessageResponse, PageRequest, RecordPayload,
    SoftDeleteResponse, TableSchema,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct CrudDispatcher {
    registry: Arc<ConnectionRegistry>,
    default_page_size: u64,
    max_page_size: u64,
}

impl CrudDispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }

    /// Override the list defaults. Both values are raised to at least 1 and
    /// the default never exceeds the maximum.
    pub fn with_page_sizes(mut self, default_page_size: u64, max_page_size: u64) -> Self {
        self.max_page_size = max_page_size.max(1);
        self.default_page_size = default_page_size.clamp(1, self.max_page_size);
        self
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Round-trip probe against a registered database.
    pub async fn test_connection(&self, db: &str) -> BridgeResult<MessageResponse> {
        self.registry.probe(db).await?;
        info!(database = %db, "Connection test passed");
        Ok(MessageResponse::new(format!(
            "Database {} connection successful",
            db
        )))
    }

    /// One page of rows plus pagination metadata, read in a single session.
    pub async fn list(
        &self,
        db: &str,
        table: &str,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> BridgeResult<ListResponse> {
        let request = self.page_request(page, limit);
        let mut session = self.begin(db).await?;
        let outcome = Self::run_list(&mut session, table, request).await;
        let response = session.finish(outcome).await?;
        debug!(
            database = %db,
            table = %table,
            rows = response.data.len(),
            total = response.pagination.total_records,
            "Listed records"
        );
        Ok(response)
    }

    pub async fn create(
        &self,
        db: &str,
        table: &str,
        payload: &RecordPayload,
    ) -> BridgeResult<MessageResponse> {
        let mut session = self.begin(db).await?;
        let outcome = Self::run_create(&mut session, table, payload).await;
        let rows_affected = session.finish(outcome).await?;
        info!(database = %db, table = %table, rows_affected, "Record created");
        Ok(MessageResponse::new(format!(
            "Record added to {} in {}",
            table, db
        )))
    }

    /// Full replacement (PUT) of the supplied columns.
    pub async fn update(
        &self,
        db: &str,
        table: &str,
        id: i64,
        payload: &RecordPayload,
    ) -> BridgeResult<MessageResponse> {
        let mut session = self.begin(db).await?;
        let outcome = Self::run_update(&mut session, table, id, payload).await;
        let rows_affected = session.finish(outcome).await?;
        info!(database = %db, table = %table, id, rows_affected, "Record updated");
        Ok(MessageResponse::new(format!(
            "Record {} updated in {} in {}",
            id, table, db
        )))
    }

    /// Partial update (PATCH); same mechanics as `update`.
    pub async fn patch(
        &self,
        db: &str,
        table: &str,
        id: i64,
        payload: &RecordPayload,
    ) -> BridgeResult<MessageResponse> {
        let mut session = self.begin(db).await?;
        let outcome = Self::run_update(&mut session, table, id, payload).await;
        let rows_affected = session.finish(outcome).await?;
        info!(database = %db, table = %table, id, rows_affected, "Record patched");
        Ok(MessageResponse::new(format!(
            "Record {} patched in {}",
            id, table
        )))
    }

    /// Flag a row as deleted and stamp who/when.
    pub async fn soft_delete(
        &self,
        db: &str,
        table: &str,
        id: i64,
        deleted_by_guid: i64,
    ) -> BridgeResult<SoftDeleteResponse> {
        let deleted_at = Utc::now();
        let mut session = self.begin(db).await?;
        let outcome =
            Self::run_soft_delete(&mut session, table, id, deleted_by_guid, deleted_at).await;
        let rows_affected = session.finish(outcome).await?;
        info!(
            database = %db,
            table = %table,
            id,
            deleted_by_guid,
            rows_affected,
            "Record soft deleted"
        );
        Ok(SoftDeleteResponse {
            message: format!("Record {} soft deleted from {}", id, table),
            deleted_at: deleted_at.timestamp(),
            deleted_by: deleted_by_guid,
        })
    }

    /// Physically remove a row.
    pub async fn hard_delete(
        &self,
        db: &str,
        table: &str,
        id: i64,
    ) -> BridgeResult<MessageResponse> {
        let mut session = self.begin(db).await?;
        let outcome = Self::run_hard_delete(&mut session, table, id).await;
        let rows_affected = session.finish(outcome).await?;
        info!(database = %db, table = %table, id, rows_affected, "Record deleted");
        Ok(MessageResponse::new(format!(
            "Record {} deleted from {} in {}",
            id, table, db
        )))
    }

    async fn begin(&self, db: &str) -> BridgeResult<Session> {
        let pool = self.registry.lookup(db).await?;
        Session::begin(&pool).await
    }

    fn page_request(&self, page: Option<i64>, limit: Option<i64>) -> PageRequest {
        let default_limit = i64::try_from(self.default_page_size).unwrap_or(i64::MAX);
        let mut request = PageRequest::new(page.unwrap_or(1), limit.unwrap_or(default_limit));
        request.limit = request.limit.min(self.max_page_size);
        request
    }

    async fn run_list(
        session: &mut Session,
        table: &str,
        request: PageRequest,
    ) -> BridgeResult<ListResponse> {
        let schema = SchemaInspector::columns(session, table).await?;
        let builder = StatementBuilder::new(&schema);

        let total = session.fetch_count(&builder.count()).await?;
        let data = session
            .fetch_records(&builder.select_page(request.limit, request.offset()), &schema)
            .await?;

        Ok(ListResponse {
            data,
            pagination: request.meta(total),
        })
    }

    async fn run_create(
        session: &mut Session,
        table: &str,
        payload: &RecordPayload,
    ) -> BridgeResult<u64> {
        let schema = SchemaInspector::columns(session, table).await?;
        let stmt = StatementBuilder::new(&schema).insert(payload)?;
        session.execute(&stmt).await
    }

    async fn run_update(
        session: &mut Session,
        table: &str,
        id: i64,
        payload: &RecordPayload,
    ) -> BridgeResult<u64> {
        let schema = SchemaInspector::columns(session, table).await?;
        let stmt = StatementBuilder::new(&schema).update(id, payload)?;
        let affected = session.execute(&stmt).await?;
        Self::ensure_matched(session, &schema, id, affected).await
    }

    async fn run_soft_delete(
        session: &mut Session,
        table: &str,
        id: i64,
        deleted_by_guid: i64,
        deleted_at: DateTime<Utc>,
    ) -> BridgeResult<u64> {
        let schema = SchemaInspector::columns(session, table).await?;
        let stmt = StatementBuilder::new(&schema).soft_delete(id, deleted_by_guid, deleted_at)?;
        let affected = session.execute(&stmt).await?;
        Self::ensure_matched(session, &schema, id, affected).await
    }

    async fn run_hard_delete(session: &mut Session, table: &str, id: i64) -> BridgeResult<u64> {
        let schema = SchemaInspector::columns(session, table).await?;
        let stmt = StatementBuilder::new(&schema).delete(id)?;
        match session.execute(&stmt).await? {
            0 => Err(BridgeError::record_not_found(table, id)),
            n => Ok(n),
        }
    }

    /// Turn a zero affected-row count into `RecordNotFound` unless the row
    /// exists and the write simply changed nothing.
    async fn ensure_matched(
        session: &mut Session,
        schema: &TableSchema,
        id: i64,
        affected: u64,
    ) -> BridgeResult<u64> {
        if affected > 0 {
            return Ok(affected);
        }
        let stmt = StatementBuilder::new(schema).exists(id)?;
        if session.fetch_count(&stmt).await? > 0 {
            debug!(table = %schema.table_name, id, "Row matched but unchanged");
            Ok(0)
        } else {
            Err(BridgeError::record_not_found(&schema.table_name, id))
        }
    }
}
