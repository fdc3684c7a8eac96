//! Error type for `exambank-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A get returned no row, or an update/delete affected zero rows.
  #[error("{entity} not found: {key}")]
  NotFound {
    entity: &'static str,
    key:    String,
  },

  /// Input rejected before (or instead of) writing to the database.
  #[error("validation error: {0}")]
  Validation(#[from] exambank_core::Error),

  /// The connection has begun shutting down.
  #[error("store is closing")]
  Closing,

  /// SQLite rejected a write on a foreign-key, uniqueness, or check
  /// constraint. Carries SQLite's own message.
  #[error("constraint violation: {0}")]
  Constraint(String),

  #[error("migration v{version} failed: {message}")]
  Migration { version: u32, message: String },

  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

/// Coarse classification of an [`Error`] for callers that only need to decide
/// how to report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  NotFound,
  Validation,
  Closing,
  Constraint,
  Migration,
  Internal,
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::NotFound { .. } => ErrorKind::NotFound,
      Self::Validation(_) => ErrorKind::Validation,
      Self::Closing => ErrorKind::Closing,
      Self::Constraint(_) => ErrorKind::Constraint,
      Self::Migration { .. } => ErrorKind::Migration,
      Self::Database(_) | Self::Json(_) => ErrorKind::Internal,
    }
  }

  pub(crate) fn not_found(entity: &'static str, key: impl std::fmt::Debug) -> Self {
    Self::NotFound { entity, key: format!("{key:?}") }
  }
}

/// Failures raised from inside a connection closure.
///
/// Closures passed to [`tokio_rusqlite::Connection::call`] can only return
/// `tokio_rusqlite::Error`; these travel as `Error::Other` and are recovered
/// by downcast in `From<tokio_rusqlite::Error>`.
#[derive(Debug, Error)]
pub(crate) enum Abort {
  #[error(transparent)]
  Invalid(#[from] exambank_core::Error),

  #[error("{entity} not found: {key}")]
  Missing {
    entity: &'static str,
    key:    String,
  },
}

impl Abort {
  pub(crate) fn missing(entity: &'static str, key: impl std::fmt::Debug) -> Self {
    Self::Missing { entity, key: format!("{key:?}") }
  }
}

impl From<Abort> for tokio_rusqlite::Error {
  fn from(a: Abort) -> Self { tokio_rusqlite::Error::Other(Box::new(a)) }
}

impl From<Abort> for Error {
  fn from(a: Abort) -> Self {
    match a {
      Abort::Invalid(e) => Error::Validation(e),
      Abort::Missing { entity, key } => Error::NotFound { entity, key },
    }
  }
}

impl From<tokio_rusqlite::Error> for Error {
  fn from(e: tokio_rusqlite::Error) -> Self {
    match e {
      tokio_rusqlite::Error::Other(boxed) => match boxed.downcast::<Abort>() {
        Ok(abort) => (*abort).into(),
        Err(other) => match other.downcast::<serde_json::Error>() {
          Ok(json) => Error::Json(*json),
          Err(other) => Error::Database(tokio_rusqlite::Error::Other(other)),
        },
      },
      tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(failure, message))
        if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
      {
        Error::Constraint(message.unwrap_or_else(|| failure.to_string()))
      }
      tokio_rusqlite::Error::ConnectionClosed => Error::Closing,
      other => Error::Database(other),
    }
  }
}

impl From<rusqlite::Error> for Error {
  fn from(e: rusqlite::Error) -> Self { tokio_rusqlite::Error::Rusqlite(e).into() }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
