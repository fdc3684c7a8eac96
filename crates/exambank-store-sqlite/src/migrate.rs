//! Versioned schema migrator.
//!
//! Migrations are applied in ascending version order, each inside its own
//! transaction together with its `schema_version` row. A failure rolls that
//! migration back and aborts the run; later migrations are not attempted.
//!
//! Reverse actions are best-effort: a migration without one is skipped with a
//! warning during rollback, leaving its version row in place.

use tracing::{debug, info, warn};

use crate::{
  Database, Error, Result,
  schema::{
    V1_CORE_TABLES, V2_INDEXES, V2_INDEXES_DOWN, V3_PRIMARY_KA_TRIGGER,
    V3_PRIMARY_KA_TRIGGER_DOWN,
  },
};

/// A single schema change.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
  pub version:     u32,
  pub description: &'static str,
  /// Forward SQL batch. Must be idempotent.
  pub up:          &'static str,
  /// Reverse SQL batch, if the change can be undone.
  pub down:        Option<&'static str>,
}

/// The migrations shipped with this crate, in version order.
const BUILTIN: &[Migration] = &[
  Migration {
    version:     1,
    description: "core tables",
    up:          V1_CORE_TABLES,
    down:        None,
  },
  Migration {
    version:     2,
    description: "junction lookup indexes",
    up:          V2_INDEXES,
    down:        Some(V2_INDEXES_DOWN),
  },
  Migration {
    version:     3,
    description: "clear primary system KA when its link is removed",
    up:          V3_PRIMARY_KA_TRIGGER,
    down:        Some(V3_PRIMARY_KA_TRIGGER_DOWN),
  },
];

/// Outcome of [`Migrator::rollback`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackReport {
  /// Versions whose reverse action ran, in the order they ran.
  pub rolled_back: Vec<u32>,
  /// Versions with no reverse action; their version rows remain.
  pub skipped:     Vec<u32>,
}

impl RollbackReport {
  /// True when a skipped version sits above a reverted one. The skipped
  /// version row keeps [`Migrator::current_version`] at or above it, so
  /// [`Migrator::migrate`] will not re-apply the reverted versions below.
  pub fn leaves_gap(&self) -> bool {
    match (self.skipped.iter().max(), self.rolled_back.iter().min()) {
      (Some(skipped), Some(reverted)) => skipped > reverted,
      _ => false,
    }
  }
}

/// An ordered list of migrations with unique versions.
#[derive(Debug, Clone)]
pub struct Migrator {
  migrations: Vec<Migration>,
}

impl Migrator {
  /// Sort `migrations` by version. Version `0` and duplicate versions are
  /// rejected.
  pub fn new(mut migrations: Vec<Migration>) -> Result<Self> {
    migrations.sort_by_key(|m| m.version);
    for pair in migrations.windows(2) {
      if pair[0].version == pair[1].version {
        return Err(Error::Migration {
          version: pair[0].version,
          message: "duplicate migration version".into(),
        });
      }
    }
    if let Some(first) = migrations.first()
      && first.version == 0
    {
      return Err(Error::Migration {
        version: 0,
        message: "version 0 is reserved for an empty store".into(),
      });
    }
    Ok(Self { migrations })
  }

  /// The migrations shipped with this crate.
  pub fn builtin() -> Self { Self { migrations: BUILTIN.to_vec() } }

  pub fn migrations(&self) -> &[Migration] { &self.migrations }

  /// The version the schema must end up at: the highest declared version.
  pub fn target_version(&self) -> u32 {
    self.migrations.last().map_or(0, |m| m.version)
  }

  /// Highest applied version; `0` for a fresh store with no `schema_version`
  /// table or an empty one.
  pub async fn current_version(&self, db: &Database) -> Result<u32> {
    let version = db
      .call(|conn| {
        let exists: bool = conn.query_row(
          "SELECT EXISTS (
             SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'
           )",
          [],
          |row| row.get(0),
        )?;
        if !exists {
          return Ok(0);
        }
        let version: u32 = conn.query_row(
          "SELECT COALESCE(MAX(version), 0) FROM schema_version",
          [],
          |row| row.get(0),
        )?;
        Ok(version)
      })
      .await
      .map_err(|e| migration_error(0, e))?;
    Ok(version)
  }

  /// Bring the schema from its current version to [`Self::target_version`].
  /// Returns the versions applied.
  pub async fn migrate(&self, db: &Database) -> Result<Vec<u32>> {
    let current = self.current_version(db).await?;
    self.apply(db, current, self.target_version()).await
  }

  /// Apply every migration with `from < version <= to`, ascending. A no-op
  /// when `from >= to`.
  pub async fn apply(&self, db: &Database, from: u32, to: u32) -> Result<Vec<u32>> {
    if from >= to {
      debug!(from, to, "schema up to date");
      return Ok(vec![]);
    }

    ensure_version_table(db).await?;

    let mut applied = Vec::new();
    for migration in self
      .migrations
      .iter()
      .filter(|m| m.version > from && m.version <= to)
    {
      info!(
        version = migration.version,
        description = migration.description,
        "applying migration"
      );
      apply_one(db, *migration).await?;
      applied.push(migration.version);
    }

    if !applied.is_empty() {
      info!(applied = applied.len(), version = to, "migrations complete");
    }
    Ok(applied)
  }

  /// Undo migrations from the current version down to `to + 1`, descending.
  pub async fn rollback(&self, db: &Database, to: u32) -> Result<RollbackReport> {
    let current = self.current_version(db).await?;
    let mut report = RollbackReport::default();

    for migration in self
      .migrations
      .iter()
      .rev()
      .filter(|m| m.version > to && m.version <= current)
    {
      let Some(down) = migration.down else {
        warn!(
          version = migration.version,
          description = migration.description,
          "migration has no reverse action, skipping"
        );
        report.skipped.push(migration.version);
        continue;
      };

      info!(
        version = migration.version,
        description = migration.description,
        "reverting migration"
      );
      let version = migration.version;
      db.call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute_batch(down)?;
        tx.execute(
          "DELETE FROM schema_version WHERE version = ?1",
          rusqlite::params![version],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await
      .map_err(|e| migration_error(version, e))?;
      report.rolled_back.push(version);
    }

    if report.leaves_gap() {
      warn!(
        rolled_back = ?report.rolled_back,
        skipped = ?report.skipped,
        "rollback left reverted versions below a skipped one; migrate will not re-apply them"
      );
    }
    Ok(report)
  }
}

impl Default for Migrator {
  fn default() -> Self { Self::builtin() }
}

// ─── Internal ────────────────────────────────────────────────────────────────

async fn ensure_version_table(db: &Database) -> Result<()> {
  db.call(|conn| {
    conn.execute_batch(
      "CREATE TABLE IF NOT EXISTS schema_version (
         version     INTEGER PRIMARY KEY,
         applied_at  TIMESTAMP NOT NULL
       );",
    )?;
    Ok(())
  })
  .await
  .map_err(|e| migration_error(0, e))
}

async fn apply_one(db: &Database, migration: Migration) -> Result<()> {
  let applied_at = chrono::Utc::now().to_rfc3339();
  let version = migration.version;

  db.call(move |conn| {
    // Dropped without commit on any early return, rolling everything back.
    let tx = conn.transaction()?;
    tx.execute_batch(migration.up)?;
    tx.execute(
      "INSERT OR REPLACE INTO schema_version (version, applied_at) VALUES (?1, ?2)",
      rusqlite::params![version, applied_at],
    )?;
    tx.commit()?;
    Ok(())
  })
  .await
  .map_err(|e| migration_error(version, e))
}

/// Every failure inside the migrator is a migration failure, except an
/// attempt on a closing store.
fn migration_error(version: u32, e: Error) -> Error {
  match e {
    Error::Closing | Error::Migration { .. } => e,
    other => Error::Migration { version, message: other.to_string() },
  }
}
