//! Table Bridge library.
//!
//! Generic CRUD REST operations over MySQL, PostgreSQL and SQLite tables.
//! Table shape is read from the live catalog on every request, so no
//! per-table code is needed.

pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod models;
pub mod transport;

pub use config::Config;
pub use dispatch::CrudDispatcher;
pub use error::{BridgeError, BridgeResult};
