//! Data models for the table bridge.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod pagination;
pub mod record;
pub mod response;
pub mod schema;

// Re-export commonly used types
pub use connection::{ConnectionInfo, Dialect};
pub use pagination::{DEFAULT_PAGE_SIZE, PageRequest, PaginationMeta, paginate};
pub use record::{Record, RecordPayload, RecordValue};
pub use response::{ListResponse, MessageResponse, SoftDeleteResponse};
pub use schema::{ColumnInfo, TableSchema};
