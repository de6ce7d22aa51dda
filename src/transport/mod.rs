//! HTTP transport.
//!
//! - `routes`: axum router and handlers over the CRUD dispatcher
//! - `http`: listener, graceful shutdown and pool teardown

pub mod http;
pub mod routes;

pub use http::HttpTransport;
pub use routes::{SoftDeletePayload, router};
