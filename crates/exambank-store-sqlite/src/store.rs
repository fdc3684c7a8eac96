//! [`ExamBank`] — the migrated store and its repositories.

use std::path::Path;

use exambank_core::{
  exam::{Exam, ExamQuestion, Plant},
  question::Question,
  taxonomy::{KnowledgeArea, Stem, System, SystemKa},
};
use tracing::info;

use crate::{Database, Migrator, QuestionAggregator, Repo, Result};

/// The exam bank, backed by a single SQLite file.
///
/// Opening always brings the schema to the latest version first. Cloning is
/// cheap; every clone shares the connection.
#[derive(Clone)]
pub struct ExamBank {
  db: Database,
}

impl ExamBank {
  /// Open (or create) the store at `path` and apply pending migrations.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let db = Database::open(path).await?;
    info!(path = %path.display(), "opened exam bank");
    Self::migrated(db).await
  }

  /// Open a migrated in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    Self::migrated(Database::open_in_memory().await?).await
  }

  /// Wrap an already-migrated database, e.g. one brought to a specific
  /// version with [`Migrator::apply`].
  pub fn from_database(db: Database) -> Self { Self { db } }

  async fn migrated(db: Database) -> Result<Self> {
    Migrator::builtin().migrate(&db).await?;
    Ok(Self { db })
  }

  pub fn database(&self) -> &Database { &self.db }

  pub fn plants(&self) -> Repo<Plant> { Repo::new(self.db.clone()) }

  pub fn exams(&self) -> Repo<Exam> { Repo::new(self.db.clone()) }

  pub fn questions(&self) -> Repo<Question> { Repo::new(self.db.clone()) }

  pub fn systems(&self) -> Repo<System> { Repo::new(self.db.clone()) }

  pub fn kas(&self) -> Repo<KnowledgeArea> { Repo::new(self.db.clone()) }

  pub fn stems(&self) -> Repo<Stem> { Repo::new(self.db.clone()) }

  pub fn system_kas(&self) -> Repo<SystemKa> { Repo::new(self.db.clone()) }

  pub fn exam_questions(&self) -> Repo<ExamQuestion> { Repo::new(self.db.clone()) }

  pub fn aggregator(&self) -> QuestionAggregator { QuestionAggregator::new(self.db.clone()) }

  pub async fn schema_version(&self) -> Result<u32> {
    Migrator::builtin().current_version(&self.db).await
  }

  /// Stop accepting operations and shut the connection down.
  pub async fn close(&self) -> Result<()> { self.db.close().await }
}
