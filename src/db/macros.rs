//! Dispatch macro for the per-dialect enums.
//!
//! `DbPool` and `Session` both wrap one sqlx type per dialect; this macro
//! spells out the three match arms so call sites stay linear.

/// Generate match arms over a per-dialect enum.
///
/// The enum must be in scope at the call site.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(DbPool, pool, {
///     MySql(p) => do_mysql(p),
///     Postgres(p) => do_postgres(p),
///     Sqlite(p) => do_sqlite(p),
/// });
/// ```
macro_rules! impl_db_dispatch {
    ($ty:ident, $value:expr, { $($variant:ident($p:ident) => $body:expr),+ $(,)? }) => {
        match $value {
            $(
                $ty::$variant($p) => $body,
            )+
        }
    };
}
