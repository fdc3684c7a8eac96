//! [`Database`] — the single shared connection handle.

use std::{
  path::Path,
  sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
  },
};

use tracing::debug;

use crate::{Error, Result};

/// Pragmas applied on every open. `foreign_keys` cannot be changed inside a
/// transaction, so this runs before any migration.
const PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
";

/// The one connection to the exam bank database, plus a cooperative
/// "closing" flag.
///
/// Cloning is cheap; every clone shares the connection thread, the flag, and
/// the round-trip counter.
#[derive(Clone)]
pub struct Database {
  conn:    tokio_rusqlite::Connection,
  closing: Arc<AtomicBool>,
  calls:   Arc<AtomicU64>,
}

impl Database {
  /// Open (or create) a database file. Does not migrate.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open a private in-memory database for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(PRAGMAS)?;
        Ok(())
      })
      .await?;
    Ok(Self {
      conn,
      closing: Arc::new(AtomicBool::new(false)),
      calls: Arc::new(AtomicU64::new(0)),
    })
  }

  pub fn is_closing(&self) -> bool { self.closing.load(Ordering::Acquire) }

  /// Begin shutdown: new operations fail with [`Error::Closing`] from now on,
  /// then the connection thread is stopped.
  pub async fn close(&self) -> Result<()> {
    if self.closing.swap(true, Ordering::AcqRel) {
      return Ok(());
    }
    debug!("closing database connection");
    self.conn.clone().close().await?;
    Ok(())
  }

  /// Number of closures sent to the connection thread so far. Each
  /// repository or aggregation query is one round trip.
  pub fn calls_issued(&self) -> u64 { self.calls.load(Ordering::Relaxed) }

  /// Fail with [`Error::Closing`] once shutdown has begun. Entry points call
  /// this before any other work, validation included.
  pub(crate) fn ensure_open(&self) -> Result<()> {
    if self.is_closing() {
      return Err(Error::Closing);
    }
    Ok(())
  }

  /// Run `f` on the connection thread, failing fast if shutdown has begun.
  pub(crate) async fn call<F, R>(&self, f: F) -> Result<R>
  where
    F: FnOnce(&mut rusqlite::Connection) -> tokio_rusqlite::Result<R> + Send + 'static,
    R: Send + 'static,
  {
    self.ensure_open()?;
    self.calls.fetch_add(1, Ordering::Relaxed);
    Ok(self.conn.call(f).await?)
  }
}
