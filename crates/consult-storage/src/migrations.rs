//! Database schema migrations.

use rusqlite::Connection;
use tracing::info;

use consult_core::error::ConsultError;

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), ConsultError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| ConsultError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| ConsultError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: consultations");
    }

    Ok(())
}

/// Version 1: per-user consultation history.
///
/// `timestamp` is milliseconds since the epoch and unique per user, which
/// keeps newest-first ordering total.
fn apply_v1(conn: &Connection) -> Result<(), ConsultError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS consultations (
            id              TEXT PRIMARY KEY NOT NULL,
            user_id         TEXT NOT NULL,
            session_id      TEXT NOT NULL,
            symptoms        TEXT NOT NULL DEFAULT '[]',
            disease         TEXT NOT NULL,
            description     TEXT NOT NULL DEFAULT '',
            precautions     TEXT NOT NULL DEFAULT '',
            timestamp       INTEGER NOT NULL,
            created_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            UNIQUE (user_id, timestamp)
        );

        CREATE INDEX IF NOT EXISTS idx_consultations_user_timestamp
            ON consultations (user_id, timestamp DESC);

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'consultations');
        ",
    )
    .map_err(|e| ConsultError::Storage(format!("Migration v1 failed: {}", e)))
}
