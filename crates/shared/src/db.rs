//! Database utilities and connection management

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::{str::FromStr, time::Duration};

/// Create a database connection pool
///
/// The pool is handed to whoever needs it at construction time; nothing
/// in the workspace keeps a process-wide handle.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let options = PgConnectOptions::from_str(database_url)?;

    PgPoolOptions::new()
        .max_connections(max_connections.max(1))
        .min_connections(0)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(60))
        .max_lifetime(Duration::from_secs(300))
        .connect_with(options)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}

/// PostgreSQL SQLSTATE for a unique constraint violation
pub const UNIQUE_VIOLATION: &str = "23505";

/// Whether a sqlx error is a unique violation, returning the constraint name if so
pub fn unique_violation_constraint(err: &sqlx::Error) -> Option<Option<&str>> {
    let db_err = err.as_database_error()?;
    if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
        Some(db_err.constraint())
    } else {
        None
    }
}
