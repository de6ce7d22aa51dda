//! REST routes over the CRUD dispatcher.
//!
//! Extractor rejections are folded into `BridgeError::InvalidInput` so every
//! failure leaves the service as `{status, {"detail": ...}}`.
//!
//! Mutating handlers run the dispatcher call on a spawned task. A client that
//! disconnects mid-request drops the handler future, but the write it started
//! still commits or rolls back on its own.

use crate::dispatch::CrudDispatcher;
use crate::error::{BridgeError, BridgeResult};
use crate::models::{ListResponse, MessageResponse, RecordPayload, SoftDeleteResponse};
use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    routing::{delete, get, put},
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use tower_http::trace::TraceLayer;

/// Body of the soft delete request.
#[derive(Debug, Clone, Deserialize)]
pub struct SoftDeletePayload {
    pub deleted_by_guid: i64,
}

/// Build the application router, nested under `base_path`.
pub fn router(dispatcher: CrudDispatcher, base_path: &str) -> Router {
    let routes = Router::new()
        .route("/{db}/{table}/test", get(test_connection))
        .route("/{db}/{table}", get(list_records).post(create_record))
        .route(
            "/{db}/{table}/{id}",
            put(update_record).patch(patch_record).delete(soft_delete_record),
        )
        .route("/{db}/{table}/{id}/hard", delete(hard_delete_record))
        .with_state(dispatcher);

    // axum cannot nest at "/", so root-mounted routes are used as-is
    let app = match normalize_base_path(base_path) {
        Some(prefix) => Router::new().nest(&prefix, routes),
        None => routes,
    };
    app.layer(TraceLayer::new_for_http())
}

/// `"api/"` -> `Some("/api")`, `"/"` or `""` -> `None`.
pub fn normalize_base_path(base_path: &str) -> Option<String> {
    let trimmed = base_path.trim().trim_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("/{}", trimmed))
    }
}

async fn test_connection(
    State(dispatcher): State<CrudDispatcher>,
    path: Result<Path<(String, String)>, PathRejection>,
) -> BridgeResult<Json<MessageResponse>> {
    let Path((db, _table)) = path.map_err(path_error)?;
    Ok(Json(dispatcher.test_connection(&db).await?))
}

async fn list_records(
    State(dispatcher): State<CrudDispatcher>,
    path: Result<Path<(String, String)>, PathRejection>,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> BridgeResult<Json<ListResponse>> {
    let Path((db, table)) = path.map_err(path_error)?;
    let Query(params) =
        query.map_err(|e| BridgeError::invalid_input(format!("Invalid query string: {}", e)))?;
    let page = parse_int_param(&params, "page")?;
    let limit = parse_int_param(&params, "limit")?;
    Ok(Json(dispatcher.list(&db, &table, page, limit).await?))
}

async fn create_record(
    State(dispatcher): State<CrudDispatcher>,
    path: Result<Path<(String, String)>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> BridgeResult<Json<MessageResponse>> {
    let Path((db, table)) = path.map_err(path_error)?;
    let payload = payload_from(body)?;
    let response = detached(async move { dispatcher.create(&db, &table, &payload).await }).await?;
    Ok(Json(response))
}

async fn update_record(
    State(dispatcher): State<CrudDispatcher>,
    path: Result<Path<(String, String, i64)>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> BridgeResult<Json<MessageResponse>> {
    let Path((db, table, id)) = path.map_err(path_error)?;
    let payload = payload_from(body)?;
    let response =
        detached(async move { dispatcher.update(&db, &table, id, &payload).await }).await?;
    Ok(Json(response))
}

async fn patch_record(
    State(dispatcher): State<CrudDispatcher>,
    path: Result<Path<(String, String, i64)>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> BridgeResult<Json<MessageResponse>> {
    let Path((db, table, id)) = path.map_err(path_error)?;
    let payload = payload_from(body)?;
    let response =
        detached(async move { dispatcher.patch(&db, &table, id, &payload).await }).await?;
    Ok(Json(response))
}

async fn soft_delete_record(
    State(dispatcher): State<CrudDispatcher>,
    path: Result<Path<(String, String, i64)>, PathRejection>,
    body: Result<Json<SoftDeletePayload>, JsonRejection>,
) -> BridgeResult<Json<SoftDeleteResponse>> {
    let Path((db, table, id)) = path.map_err(path_error)?;
    let Json(body) = body.map_err(json_error)?;
    let response = detached(async move {
        dispatcher
            .soft_delete(&db, &table, id, body.deleted_by_guid)
            .await
    })
    .await?;
    Ok(Json(response))
}

async fn hard_delete_record(
    State(dispatcher): State<CrudDispatcher>,
    path: Result<Path<(String, String, i64)>, PathRejection>,
) -> BridgeResult<Json<MessageResponse>> {
    let Path((db, table, id)) = path.map_err(path_error)?;
    let response = detached(async move { dispatcher.hard_delete(&db, &table, id).await }).await?;
    Ok(Json(response))
}

/// Run `work` on its own task and wait for it.
///
/// Dropping the returned future leaves the task running to completion.
async fn detached<T, F>(work: F) -> BridgeResult<T>
where
    F: Future<Output = BridgeResult<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(work)
        .await
        .map_err(|e| BridgeError::internal(format!("Request task failed: {}", e)))?
}

fn payload_from(body: Result<Json<Value>, JsonRejection>) -> BridgeResult<RecordPayload> {
    let Json(value) = body.map_err(json_error)?;
    RecordPayload::from_json(value)
}

fn parse_int_param(params: &HashMap<String, String>, key: &str) -> BridgeResult<Option<i64>> {
    params
        .get(key)
        .map(|raw| {
            raw.trim().parse::<i64>().map_err(|_| {
                BridgeError::invalid_input(format!("Query parameter '{}' must be an integer", key))
            })
        })
        .transpose()
}

fn path_error(rejection: PathRejection) -> BridgeError {
    BridgeError::invalid_input(format!("Invalid path: {}", rejection.body_text()))
}

fn json_error(rejection: JsonRejection) -> BridgeError {
    BridgeError::invalid_input(format!("Invalid JSON body: {}", rejection.body_text()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[test]
    fn test_normalize_base_path() {
        assert_eq!(normalize_base_path("/api"), Some("/api".to_string()));
        assert_eq!(normalize_base_path("api/"), Some("/api".to_string()));
        assert_eq!(normalize_base_path("/v1/crud/"), Some("/v1/crud".to_string()));
        assert_eq!(normalize_base_path("/"), None);
        assert_eq!(normalize_base_path(""), None);
    }

    #[test]
    fn test_parse_int_param() {
        let mut params = HashMap::new();
        assert_eq!(parse_int_param(&params, "page").unwrap(), None);

        params.insert("page".to_string(), "3".to_string());
        assert_eq!(parse_int_param(&params, "page").unwrap(), Some(3));

        params.insert("limit".to_string(), "ten".to_string());
        let err = parse_int_param(&params, "limit").unwrap_err();
        assert!(matches!(err, BridgeError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_detached_work_outlives_a_dropped_caller() {
        let (started_tx, started_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let (done_tx, done_rx) = oneshot::channel();

        let caller = tokio::spawn(detached(async move {
            let _ = started_tx.send(());
            let _ = release_rx.await;
            let _ = done_tx.send(7);
            Ok::<_, BridgeError>(())
        }));
        started_rx.await.unwrap();

        caller.abort();
        assert!(caller.await.unwrap_err().is_cancelled());

        release_tx.send(()).unwrap();
        assert_eq!(done_rx.await.unwrap(), 7);
    }

    async fn explode() -> BridgeResult<()> {
        panic!("boom")
    }

    #[tokio::test]
    async fn test_detached_reports_a_panicked_task() {
        let result = detached(explode()).await;
        assert!(matches!(result, Err(BridgeError::Internal { .. })));
    }
}
