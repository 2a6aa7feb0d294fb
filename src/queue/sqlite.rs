//! SQLite queue backend
//!
//! The database file may be opened by several crawler processes at once;
//! they share one queue. Claims run as a single conditional
//! `UPDATE ... RETURNING` inside an immediate transaction, so concurrent
//! claimers never receive the same row.

use crate::queue::schema::{initialize_schema, is_missing_table, is_unique_violation};
use crate::queue::traits::{QueueBackend, QueueError, QueueResult};
use crate::queue::{QueueItem, QueueStats};
use crate::url::normalize_uri;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const CLAIM_SQL: &str = "
    UPDATE queue SET processing = 1
    WHERE uri = (
        SELECT uri FROM queue
        WHERE processing = 0 AND completed = 0
        ORDER BY rowid
        LIMIT 1
    )
    AND processing = 0 AND completed = 0
    RETURNING uri, processing, completed, error
";

/// Polling behaviour for `get` on a shared queue
#[derive(Debug, Clone, Copy)]
pub struct SqliteQueueOptions {
    /// Delay between claim attempts when the queue looks empty
    pub get_interval: Duration,

    /// Extra claim attempts before reporting the queue empty
    pub max_get_attempts: u32,
}

impl Default for SqliteQueueOptions {
    fn default() -> Self {
        Self {
            get_interval: Duration::from_millis(250),
            max_get_attempts: 4,
        }
    }
}

/// SQLite queue backend
pub struct SqliteQueue {
    conn: Mutex<Connection>,
    options: SqliteQueueOptions,
}

impl SqliteQueue {
    /// Opens (or creates) a queue database file
    ///
    /// The queue table itself is only created when first needed.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `options` - Polling behaviour for `get`
    pub fn open(path: &Path, options: SqliteQueueOptions) -> QueueResult<Self> {
        let conn = Connection::open(path)?;

        conn.busy_timeout(Duration::from_secs(5))?;
        // journal_mode answers with a row, so it cannot go through execute
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;

        tracing::debug!("Opened queue database at {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
            options,
        })
    }

    /// Creates a private in-memory queue database
    pub fn open_in_memory(options: SqliteQueueOptions) -> QueueResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
            options,
        })
    }

    fn lock(&self) -> QueueResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| QueueError::Poisoned)
    }

    /// Runs a statement, creating the schema and retrying once if the
    /// queue table does not exist yet
    fn with_schema<T>(
        &self,
        op: impl Fn(&mut Connection) -> rusqlite::Result<T>,
    ) -> QueueResult<T> {
        let mut conn = self.lock()?;

        match op(&mut conn) {
            Err(e) if is_missing_table(&e) => {
                tracing::debug!("Queue table missing, creating schema");
                initialize_schema(&conn)?;
                Ok(op(&mut conn)?)
            }
            other => Ok(other?),
        }
    }

    /// Makes one atomic claim attempt
    fn try_claim(&self) -> QueueResult<Option<QueueItem>> {
        self.with_schema(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let item = tx.query_row(CLAIM_SQL, [], row_to_item).optional()?;
            tx.commit()?;
            Ok(item)
        })
    }
}

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<QueueItem> {
    Ok(QueueItem {
        uri: row.get(0)?,
        processing: row.get(1)?,
        completed: row.get(2)?,
        error: row.get(3)?,
    })
}

#[async_trait]
impl QueueBackend for SqliteQueue {
    async fn add(&self, uri: &str) -> QueueResult<Option<QueueItem>> {
        let uri = normalize_uri(uri)?;

        self.with_schema(|conn| {
            let inserted = conn.execute(
                "INSERT INTO queue (uri, processing, completed, error) VALUES (?1, 0, 0, NULL)",
                params![uri],
            );

            match inserted {
                Ok(_) => Ok(Some(QueueItem::new(uri.clone()))),
                // Another instance (or process) already added it
                Err(e) if is_unique_violation(&e) => Ok(None),
                Err(e) => Err(e),
            }
        })
    }

    async fn get(&self) -> QueueResult<Option<QueueItem>> {
        let mut attempts = 0;

        loop {
            if let Some(item) = self.try_claim()? {
                return Ok(Some(item));
            }

            if attempts >= self.options.max_get_attempts {
                return Ok(None);
            }

            attempts += 1;
            tracing::trace!(
                "Queue empty, retrying claim ({}/{}) in {:?}",
                attempts,
                self.options.max_get_attempts,
                self.options.get_interval
            );
            tokio::time::sleep(self.options.get_interval).await;
        }
    }

    async fn end(&self, item: &QueueItem, error: Option<&str>) -> QueueResult<QueueItem> {
        let changed = self.with_schema(|conn| {
            conn.execute(
                "UPDATE queue SET processing = 0, completed = 1, error = ?2
                 WHERE uri = ?1 AND processing = 1",
                params![item.uri, error],
            )
        })?;

        if changed == 0 {
            return Err(QueueError::NotClaimed(item.uri.clone()));
        }

        Ok(QueueItem {
            uri: item.uri.clone(),
            processing: false,
            completed: true,
            error: error.map(str::to_string),
        })
    }

    async fn release(&self, item: &QueueItem) -> QueueResult<QueueItem> {
        let changed = self.with_schema(|conn| {
            conn.execute(
                "UPDATE queue SET processing = 0
                 WHERE uri = ?1 AND processing = 1 AND completed = 0",
                params![item.uri],
            )
        })?;

        if changed == 0 {
            return Err(QueueError::NotClaimed(item.uri.clone()));
        }

        Ok(QueueItem::new(item.uri.clone()))
    }

    async fn item(&self, uri: &str) -> QueueResult<Option<QueueItem>> {
        let uri = normalize_uri(uri)?;

        self.with_schema(|conn| {
            conn.query_row(
                "SELECT uri, processing, completed, error FROM queue WHERE uri = ?1",
                params![uri],
                row_to_item,
            )
            .optional()
        })
    }

    async fn stats(&self) -> QueueResult<QueueStats> {
        self.with_schema(|conn| {
            conn.query_row(
                "SELECT
                    COALESCE(SUM(CASE WHEN processing = 0 AND completed = 0 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN processing = 1 AND completed = 0 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN completed = 1 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN completed = 1 AND error IS NOT NULL THEN 1 ELSE 0 END), 0)
                 FROM queue",
                [],
                |row| {
                    Ok(QueueStats {
                        pending: row.get::<_, i64>(0)? as u64,
                        processing: row.get::<_, i64>(1)? as u64,
                        completed: row.get::<_, i64>(2)? as u64,
                        failed: row.get::<_, i64>(3)? as u64,
                    })
                },
            )
        })
    }
}
