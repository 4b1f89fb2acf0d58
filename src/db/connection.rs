//! Backend selection and the shared connection pool.
//!
//! Exactly one backend is compiled in. `SQLite` connections are synchronous
//! Diesel connections driven on a worker thread; PostgreSQL uses the native
//! async driver. Both are pooled with bb8.

use cfg_if::cfg_if;
use diesel_async::pooled_connection::{AsyncDieselConnectionManager, PoolError, bb8::Pool};
#[cfg(feature = "sqlite")]
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_migrations::{EmbeddedMigrations, embed_migrations};
use tracing::debug;

cfg_if! {
    if #[cfg(all(feature = "sqlite", feature = "postgres", not(feature = "lint")))] {
        compile_error!("enable exactly one of the 'sqlite' and 'postgres' features");
    } else if #[cfg(feature = "sqlite")] {
        use diesel::sqlite::{Sqlite, SqliteConnection};
        /// Query backend used by boxed queries.
        pub type Backend = Sqlite;
        /// Schema migrations for `SQLite`.
        pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/sqlite");
        /// The unit-of-work handle every query helper takes.
        pub type DbConnection = SyncConnectionWrapper<SqliteConnection>;
    } else if #[cfg(all(feature = "postgres", not(feature = "sqlite")))] {
        use diesel::pg::Pg;
        use diesel_async::AsyncPgConnection;
        /// Query backend used by boxed queries.
        pub type Backend = Pg;
        /// Schema migrations for PostgreSQL.
        pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/postgres");
        /// The unit-of-work handle every query helper takes.
        pub type DbConnection = AsyncPgConnection;
    } else {
        compile_error!("enable exactly one of the 'sqlite' and 'postgres' features");
    }
}

/// Pool of [`DbConnection`]s shared by request handlers.
pub type DbPool = Pool<DbConnection>;

/// Build a connection pool for `database_url` (a `SQLite` path or a
/// PostgreSQL URL).
///
/// # Errors
/// Returns any error reported while the pool opens its first connections.
pub async fn establish_pool(database_url: &str) -> Result<DbPool, PoolError> {
    debug!(database = database_url, "building connection pool");
    let manager = AsyncDieselConnectionManager::<DbConnection>::new(database_url);
    Pool::builder().build(manager).await
}
