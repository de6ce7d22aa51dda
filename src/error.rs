//! Error types for the table bridge.
//!
//! Every failure on the data path is folded into [`BridgeError`] and translated
//! into a `{"detail": ...}` body with a matching HTTP status at the boundary.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database {database} not found")]
    DatabaseNotFound { database: String },

    #[error("Invalid table name: {table}")]
    TableNotFound { table: String },

    #[error("Table {table} has no usable key column (expected a single-column primary key or 'id')")]
    MissingKeyColumn { table: String },

    #[error("Unknown column '{column}' for table {table}")]
    UnknownColumn { table: String, column: String },

    #[error("Record {id} not found in {table}")]
    RecordNotFound { table: String, id: i64 },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Execution failed: {message}")]
    Execution {
        message: String,
        /// e.g. "23000" for an integrity constraint violation
        sql_state: Option<String>,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl BridgeError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn database_not_found(database: impl Into<String>) -> Self {
        Self::DatabaseNotFound {
            database: database.into(),
        }
    }

    pub fn table_not_found(table: impl Into<String>) -> Self {
        Self::TableNotFound {
            table: table.into(),
        }
    }

    pub fn missing_key_column(table: impl Into<String>) -> Self {
        Self::MissingKeyColumn {
            table: table.into(),
        }
    }

    pub fn unknown_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::UnknownColumn {
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn record_not_found(table: impl Into<String>, id: i64) -> Self {
        Self::RecordNotFound {
            table: table.into(),
            id,
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an execution error with optional SQL state.
    pub fn execution(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Execution {
            message: message.into(),
            sql_state,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// HTTP status this error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Connection { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::DatabaseNotFound { .. } | Self::RecordNotFound { .. } => StatusCode::NOT_FOUND,
            Self::TableNotFound { .. }
            | Self::MissingKeyColumn { .. }
            | Self::UnknownColumn { .. }
            | Self::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            Self::Execution { .. } | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text placed in the `detail` field of the response body.
    pub fn detail(&self) -> String {
        match self {
            Self::Execution {
                message,
                sql_state: Some(code),
            } => format!("Execution failed: {} (SQLSTATE: {})", message, code),
            _ => self.to_string(),
        }
    }
}

/// Convert sqlx errors to BridgeError.
impl From<sqlx::Error> for BridgeError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => BridgeError::connection(
                msg.to_string(),
                "Check the connection settings and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                BridgeError::execution(db_err.message(), code)
            }
            sqlx::Error::RowNotFound => BridgeError::execution("No rows returned", None),
            sqlx::Error::PoolTimedOut => BridgeError::connection(
                "Timed out acquiring a connection from the pool",
                "The database is saturated or unreachable; check acquire_timeout and max_connections",
            ),
            sqlx::Error::PoolClosed => {
                BridgeError::connection("Connection pool is closed", "Restart the service")
            }
            sqlx::Error::Io(io_err) => BridgeError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => BridgeError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => BridgeError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnDecode { index, source } => {
                BridgeError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => {
                BridgeError::internal(format!("Decode error: {}", source))
            }
            sqlx::Error::WorkerCrashed => BridgeError::internal("Database worker crashed"),
            _ => BridgeError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = self.detail();

        if status.is_server_error() {
            error!(status = status.as_u16(), suggestion = ?self.suggestion(), "{}", detail);
        } else {
            debug!(status = status.as_u16(), "{}", detail);
        }

        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}
