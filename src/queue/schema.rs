//! Database schema for the shared queue
//!
//! The table is created lazily: backends run their statement, and create
//! the schema only when SQLite reports the table missing.

/// SQL schema for the queue table
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS queue (
    uri TEXT PRIMARY KEY NOT NULL,
    processing INTEGER NOT NULL DEFAULT 0,
    completed INTEGER NOT NULL DEFAULT 0,
    error TEXT
);

CREATE INDEX IF NOT EXISTS idx_queue_pending ON queue(processing, completed);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// Returns true if the error means the queue table does not exist yet
pub fn is_missing_table(error: &rusqlite::Error) -> bool {
    match error {
        rusqlite::Error::SqliteFailure(_, Some(message)) => message.contains("no such table"),
        _ => false,
    }
}

/// Returns true if the error is a uniqueness/primary key violation
///
/// Other constraint failures (NOT NULL, CHECK) are not matched.
pub fn is_unique_violation(error: &rusqlite::Error) -> bool {
    use rusqlite::ffi::{SQLITE_CONSTRAINT_PRIMARYKEY, SQLITE_CONSTRAINT_UNIQUE};

    matches!(
        error,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.extended_code == SQLITE_CONSTRAINT_PRIMARYKEY
                || inner.extended_code == SQLITE_CONSTRAINT_UNIQUE
    )
}
