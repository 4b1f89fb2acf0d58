//! Embedded schema migrations.
//!
//! The migration harness is blocking. `SQLite` runs it on the wrapped
//! connection's worker thread; PostgreSQL opens a short-lived synchronous
//! connection on the blocking pool. Either way a run is bounded by
//! [`MIGRATION_TIMEOUT`].

use std::{error::Error as StdError, time::Duration};

use diesel::{ConnectionError, result::Error as DieselError};
use diesel_async::AsyncConnection;
use diesel_migrations::MigrationHarness;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info};

use super::connection::{DbConnection, MIGRATIONS};

/// Longest a single migration run may take.
pub const MIGRATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Failures while bringing the schema up to date.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The database could not be opened.
    #[error("could not open database: {0}")]
    Connect(#[from] ConnectionError),
    /// A statement failed outside the harness.
    #[error("database error during migration: {0}")]
    Query(#[from] DieselError),
    /// The harness rejected or failed a migration.
    #[error("migration failed: {0}")]
    Harness(#[source] Box<dyn StdError + Send + Sync>),
    /// The run exceeded [`MIGRATION_TIMEOUT`].
    #[error("migrations did not finish within {0:?}")]
    Timeout(Duration),
    /// The blocking task panicked or was cancelled.
    #[cfg(all(feature = "postgres", not(feature = "sqlite")))]
    #[error("migration task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}

fn report(applied: usize) {
    if applied == 0 {
        debug!("schema already up to date");
    } else {
        info!(applied, "applied pending migrations");
    }
}

/// Apply every pending migration on `conn`.
///
/// # Errors
/// Returns [`MigrationError`] when the harness fails or the run times out.
#[cfg(feature = "sqlite")]
#[must_use = "handle the result"]
pub async fn run_migrations(conn: &mut DbConnection) -> Result<(), MigrationError> {
    let run = conn.spawn_blocking(|c| {
        Ok(c.run_pending_migrations(MIGRATIONS).map(|done| done.len()))
    });
    let applied = timeout(MIGRATION_TIMEOUT, run)
        .await
        .map_err(|_| MigrationError::Timeout(MIGRATION_TIMEOUT))??
        .map_err(MigrationError::Harness)?;
    report(applied);
    Ok(())
}

/// Apply every pending migration against `database_url`.
///
/// # Errors
/// Returns [`MigrationError`] when connecting fails, the harness fails or the
/// run times out.
#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
#[must_use = "handle the result"]
pub async fn run_migrations(database_url: &str) -> Result<(), MigrationError> {
    use diesel::{Connection, pg::PgConnection};

    let url = database_url.to_owned();
    let run = tokio::task::spawn_blocking(move || -> Result<usize, MigrationError> {
        let mut conn = PgConnection::establish(&url)?;
        conn.run_pending_migrations(MIGRATIONS)
            .map(|done| done.len())
            .map_err(MigrationError::Harness)
    });
    let applied = timeout(MIGRATION_TIMEOUT, run)
        .await
        .map_err(|_| MigrationError::Timeout(MIGRATION_TIMEOUT))???;
    report(applied);
    Ok(())
}

/// Apply pending migrations for whichever backend is compiled in.
///
/// # Errors
/// See [`run_migrations`].
#[cfg(feature = "sqlite")]
#[must_use = "handle the result"]
pub async fn apply_migrations(conn: &mut DbConnection, _database_url: &str) -> Result<(), MigrationError> {
    run_migrations(conn).await
}

/// Apply pending migrations for whichever backend is compiled in.
///
/// # Errors
/// See [`run_migrations`].
#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
#[must_use = "handle the result"]
pub async fn apply_migrations(_conn: &mut DbConnection, database_url: &str) -> Result<(), MigrationError> {
    run_migrations(database_url).await
}

/// Open a single connection with the schema brought up to date, as the
/// operator commands and test fixtures need.
///
/// # Errors
/// Returns [`MigrationError`] when the database cannot be opened or migrated.
#[must_use = "handle the result"]
pub async fn open_migrated(database_url: &str) -> Result<DbConnection, MigrationError> {
    let mut conn = DbConnection::establish(database_url).await?;
    apply_migrations(&mut conn, database_url).await?;
    Ok(conn)
}
