//! JSON response bodies.

use crate::models::{PaginationMeta, Record};
use serde::Serialize;

/// `GET /{db}/{table}`
#[derive(Debug, Clone, Serialize)]
pub struct ListResponse {
    pub data: Vec<Record>,
    pub pagination: PaginationMeta,
}

/// Plain acknowledgement for test/create/update/patch/hard delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Soft delete acknowledgement with audit fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoftDeleteResponse {
    pub message: String,
    /// Unix epoch seconds
    pub deleted_at: i64,
    pub deleted_by: i64,
}
