//! The database handle and its read and write scopes.
//!
//! A [`Database`] owns one SQLite connection behind a lock that is held
//! for one statement at a time, never for a whole scope. A [`Writer`] runs
//! inside a transaction that commits when it finishes successfully and
//! rolls back otherwise. Opening a writer while a transaction is open
//! joins that transaction. A top-level writer dropped without finishing
//! is rolled back right away by a task that holds the connection lock.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{Connection, Row as _};
use tokio::runtime::Handle;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::config::{ConnectOptions, JournalMode};
use crate::error::{Result, StoreError};

/// Exclusive access to the connection for the statements at hand.
///
/// Drop it before calling back into the [`Database`] or a store; the lock
/// is not reentrant.
pub type ConnectionGuard<'a> = MappedMutexGuard<'a, SqliteConnection>;

#[derive(Debug)]
struct Session {
    conn: SqliteConnection,
    in_transaction: bool,
}

/// An open SQLite database.
#[derive(Debug)]
pub struct Database {
    session: Arc<Mutex<Option<Session>>>,
    pending_rollback: AtomicBool,
    location: String,
}

impl Database {
    /// Opens the database described by `options`.
    ///
    /// When `options.initialize` is set, the journal mode and foreign-key
    /// pragmas are issued before the handle is returned.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] when the database cannot be opened
    /// or a pragma fails, and [`StoreError::InvalidOption`] for a malformed
    /// `sqlite:` URL.
    pub async fn open(options: &ConnectOptions) -> Result<Self> {
        let connect_options = connect_options(&options.location)?;
        let connection_error = |source| StoreError::Connection {
            location: options.location.clone(),
            source,
        };

        let mut conn = SqliteConnection::connect_with(&connect_options)
            .await
            .map_err(connection_error)?;

        if options.initialize {
            let journal_mode = format!("PRAGMA journal_mode={}", options.journal_mode);
            let foreign_keys = format!(
                "PRAGMA foreign_keys={}",
                if options.enforce_foreign_keys { "ON" } else { "OFF" }
            );
            for pragma in [journal_mode, foreign_keys] {
                debug!(sql = %pragma, "Executing SQL");
                sqlx::query(&pragma)
                    .execute(&mut conn)
                    .await
                    .map_err(connection_error)?;
            }
        }

        info!(
            location = %options.location,
            initialize = options.initialize,
            "Opened database"
        );

        Ok(Self {
            session: Arc::new(Mutex::new(Some(Session {
                conn,
                in_transaction: false,
            }))),
            pending_rollback: AtomicBool::new(false),
            location: options.location.clone(),
        })
    }

    /// Opens a private in-memory database with default options.
    ///
    /// # Errors
    ///
    /// See [`Database::open`].
    pub async fn open_in_memory() -> Result<Self> {
        Self::open(&ConnectOptions::default()).await
    }

    /// Returns the location the database was opened from.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Closes the connection. Closing twice is a no-op.
    ///
    /// An open transaction is discarded by the engine.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] when the engine fails to close.
    pub async fn close(&self) -> Result<()> {
        let session = self.session.lock().await.take();
        if let Some(session) = session {
            session.conn.close().await?;
            info!(location = %self.location, "Closed database");
        }
        Ok(())
    }

    /// Returns whether [`Database::close`] has been called.
    pub async fn is_closed(&self) -> bool {
        self.session.lock().await.is_none()
    }

    /// Returns whether a write transaction is open.
    pub async fn in_transaction(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(|session| session.in_transaction)
    }

    /// Opens a read scope.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] after `close`.
    pub async fn reader(&self) -> Result<Reader<'_>> {
        drop(self.lock_session().await?);
        Ok(Reader { db: self })
    }

    /// Opens a write scope.
    ///
    /// Begins a transaction, or joins the one already open. A joined
    /// scope neither commits nor rolls back.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] after `close`, or
    /// [`StoreError::Database`] when the transaction cannot begin.
    pub async fn writer(&self) -> Result<Writer<'_>> {
        let mut session = self.lock_session().await?;
        if session.in_transaction {
            debug!(location = %self.location, "Joined open write scope");
            return Ok(Writer {
                db: self,
                top_level: false,
                finished: false,
            });
        }
        sqlx::query("BEGIN").execute(&mut session.conn).await?;
        session.in_transaction = true;
        debug!(location = %self.location, "Began write scope");
        Ok(Writer {
            db: self,
            top_level: true,
            finished: false,
        })
    }

    /// Reads the current journal mode.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidOption`] if the engine reports a mode
    /// outside [`JournalMode`], or any read failure.
    pub async fn journal_mode(&self) -> Result<JournalMode> {
        let mut conn = self.connection().await?;
        let row = sqlx::query("PRAGMA journal_mode")
            .fetch_one(&mut *conn)
            .await?;
        let mode: String = row.try_get(0)?;
        mode.parse()
    }

    /// Reads whether foreign keys are enforced.
    ///
    /// # Errors
    ///
    /// Returns any read failure.
    pub async fn foreign_keys_enabled(&self) -> Result<bool> {
        let mut conn = self.connection().await?;
        let row = sqlx::query("PRAGMA foreign_keys")
            .fetch_one(&mut *conn)
            .await?;
        let enabled: i64 = row.try_get(0)?;
        Ok(enabled != 0)
    }

    async fn connection(&self) -> Result<ConnectionGuard<'_>> {
        let session = self.lock_session().await?;
        Ok(MappedMutexGuard::map(session, |session| &mut session.conn))
    }

    async fn lock_session(&self) -> Result<MappedMutexGuard<'_, Session>> {
        let guard = self.session.lock().await;
        let mut session =
            MutexGuard::try_map(guard, Option::as_mut).map_err(|_| StoreError::Closed)?;

        if self.pending_rollback.swap(false, Ordering::AcqRel) {
            roll_back_abandoned(&mut session, &self.location).await;
        }

        Ok(session)
    }

    fn abandon_transaction(&self) {
        let Ok(handle) = Handle::try_current() else {
            self.pending_rollback.store(true, Ordering::Release);
            return;
        };
        let location = self.location.clone();
        match Arc::clone(&self.session).try_lock_owned() {
            Ok(guard) => {
                handle.spawn(roll_back_owned(guard, location));
            }
            Err(_) => {
                let session = Arc::clone(&self.session);
                handle.spawn(async move {
                    roll_back_owned(session.lock_owned().await, location).await;
                });
            }
        }
    }
}

async fn roll_back_owned(mut guard: OwnedMutexGuard<Option<Session>>, location: String) {
    if let Some(session) = guard.as_mut() {
        roll_back_abandoned(session, &location).await;
    }
}

async fn roll_back_abandoned(session: &mut Session, location: &str) {
    if !session.in_transaction {
        return;
    }
    warn!(
        location = %location,
        "Rolling back a write scope that was dropped before finishing"
    );
    if let Err(error) = sqlx::query("ROLLBACK").execute(&mut session.conn).await {
        warn!(error = %error, "Rollback of abandoned write scope failed");
    }
    session.in_transaction = false;
}

/// A read scope. Opens no transaction.
#[derive(Debug, Clone, Copy)]
pub struct Reader<'a> {
    db: &'a Database,
}

impl<'a> Reader<'a> {
    /// Locks the connection for the statements at hand.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] after `close`.
    pub async fn connection(&self) -> Result<ConnectionGuard<'a>> {
        self.db.connection().await
    }
}

/// A write scope.
///
/// Finish it with [`Writer::commit`], [`Writer::rollback`] or
/// [`Writer::finish`]. A nested or joined writer shares the outer
/// transaction and its commit and rollback are no-ops.
#[derive(Debug)]
pub struct Writer<'a> {
    db: &'a Database,
    top_level: bool,
    finished: bool,
}

impl<'a> Writer<'a> {
    /// Opens a scope inside this writer's transaction.
    #[must_use]
    pub const fn nested(&self) -> Writer<'a> {
        Writer {
            db: self.db,
            top_level: false,
            finished: false,
        }
    }

    /// Returns whether this writer owns the transaction.
    #[must_use]
    pub const fn is_top_level(&self) -> bool {
        self.top_level
    }

    /// Locks the connection for the statements at hand.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] after `close`.
    pub async fn connection(&self) -> Result<ConnectionGuard<'a>> {
        self.db.connection().await
    }

    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] when the commit fails. The
    /// transaction is then rolled back.
    pub async fn commit(mut self) -> Result<()> {
        if self.top_level {
            let mut session = self.db.lock_session().await?;
            sqlx::query("COMMIT").execute(&mut session.conn).await?;
            session.in_transaction = false;
            debug!("Committed write scope");
        }
        self.finished = true;
        Ok(())
    }

    /// Rolls the transaction back.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] when the rollback fails.
    pub async fn rollback(mut self) -> Result<()> {
        self.finished = true;
        if self.top_level {
            let mut session = self.db.lock_session().await?;
            let result = sqlx::query("ROLLBACK").execute(&mut session.conn).await;
            session.in_transaction = false;
            result?;
            debug!("Rolled back write scope");
        }
        Ok(())
    }

    /// Commits on `Ok` and rolls back on `Err`, returning `result`.
    ///
    /// A failed rollback is logged and the original error is returned.
    ///
    /// # Errors
    ///
    /// Returns the error in `result`, or the commit failure.
    pub async fn finish<T>(self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(error) => {
                if let Err(rollback_error) = self.rollback().await {
                    warn!(error = %rollback_error, "Rollback failed");
                }
                Err(error)
            }
        }
    }
}

impl Drop for Writer<'_> {
    fn drop(&mut self) {
        if self.top_level && !self.finished {
            self.db.abandon_transaction();
        }
    }
}

fn connect_options(location: &str) -> Result<SqliteConnectOptions> {
    if location == ":memory:" {
        return parse_url("sqlite::memory:");
    }
    if location.starts_with("sqlite:") {
        return parse_url(location);
    }
    Ok(SqliteConnectOptions::new()
        .filename(location)
        .create_if_missing(true))
}

fn parse_url(url: &str) -> Result<SqliteConnectOptions> {
    SqliteConnectOptions::from_str(url)
        .map_err(|e| StoreError::InvalidOption(format!("invalid database URL '{url}': {e}")))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sqlx::Row as _;

    use super::*;

    #[tokio::test]
    async fn test_open_in_memory_applies_pragmas() {
        let db = Database::open(&ConnectOptions::default().enforce_foreign_keys(false))
            .await
            .unwrap();
        assert!(!db.foreign_keys_enabled().await.unwrap());
        // In-memory databases only support the MEMORY journal.
        assert_eq!(db.journal_mode().await.unwrap(), JournalMode::Memory);
    }

    #[tokio::test]
    async fn test_closed_database_rejects_scopes() {
        let db = Database::open_in_memory().await.unwrap();
        db.close().await.unwrap();
        db.close().await.unwrap();
        assert!(db.is_closed().await);
        assert!(matches!(db.reader().await, Err(StoreError::Closed)));
        assert!(matches!(db.writer().await, Err(StoreError::Closed)));
    }

    #[tokio::test]
    async fn test_writer_inside_open_transaction_joins_it() {
        let db = Database::open_in_memory().await.unwrap();
        let outer = db.writer().await.unwrap();
        assert!(outer.is_top_level());
        assert!(db.in_transaction().await);

        let joined = tokio::time::timeout(Duration::from_secs(2), db.writer())
            .await
            .expect("writer blocked inside an open transaction")
            .unwrap();
        assert!(!joined.is_top_level());
        joined.commit().await.unwrap();
        assert!(db.in_transaction().await);

        let reader = db.reader().await.unwrap();
        drop(reader.connection().await.unwrap());

        outer.rollback().await.unwrap();
        assert!(!db.in_transaction().await);
    }

    #[tokio::test]
    async fn test_dropped_writer_rolls_back_on_exit() {
        let db = Database::open_in_memory().await.unwrap();
        {
            let mut conn = db.connection().await.unwrap();
            sqlx::query("CREATE TABLE t (n INTEGER)")
                .execute(&mut *conn)
                .await
                .unwrap();
        }
        {
            let writer = db.writer().await.unwrap();
            let mut conn = writer.connection().await.unwrap();
            sqlx::query("INSERT INTO t VALUES (1)")
                .execute(&mut *conn)
                .await
                .unwrap();
        }

        // Waits on the lock held by the rollback task.
        assert!(!db.in_transaction().await);
        assert!(!db.pending_rollback.load(Ordering::Acquire));
        let mut conn = db.connection().await.unwrap();
        let count: i64 = sqlx::query("SELECT COUNT(*) FROM t")
            .fetch_one(&mut *conn)
            .await
            .unwrap()
            .get(0);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_malformed_url_is_invalid_option() {
        assert!(matches!(
            connect_options("sqlite:data.db?mode=sideways"),
            Err(StoreError::InvalidOption(_))
        ));
    }
}
