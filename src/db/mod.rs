//! Database abstraction layer.
//!
//! - Connection registry and per-dialect pools
//! - Per-request transactional sessions
//! - Catalog introspection
//! - Parameterized statement construction
//! - Type mappings and row decoding

#[macro_use]
mod macros;
pub mod params;
pub mod pool;
pub mod schema;
pub mod session;
pub mod statement;
pub mod types;

pub use pool::{ConnectionRegistry, DbPool, RegistrationReport};
pub use schema::SchemaInspector;
pub use session::Session;
pub use statement::{Statement, StatementBuilder};
pub use types::TypeCategory;
