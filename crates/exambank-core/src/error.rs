//! Error types for `exambank-core`.
//!
//! These are domain validation failures: they are raised before any statement
//! reaches the database, or by application-level consistency checks that no
//! database constraint captures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("{entity} is missing required field `{field}`")]
  MissingField {
    entity: &'static str,
    field:  &'static str,
  },

  #[error("{entity}.{field} is invalid: {reason}")]
  InvalidField {
    entity: &'static str,
    field:  &'static str,
    reason: String,
  },

  #[error("unknown answer letter: {0:?}")]
  UnknownAnswerLetter(String),

  #[error("unknown exam level: {0}")]
  UnknownExamLevel(i64),

  #[error("unknown cognitive level: {0}")]
  UnknownCognitiveLevel(i64),

  /// An exam placement names a primary system KA that the question itself
  /// is not classified under. `question_id` is `None` for a question that
  /// is still being created.
  #[error("primary system KA {system_ka_number:?} is not linked to the question")]
  PrimarySystemKaNotLinked {
    question_id:      Option<i64>,
    system_ka_number: String,
  },

  /// Unlinking the system KA would leave an exam placement's primary
  /// pointer dangling.
  #[error(
    "system KA {system_ka_number:?} is the primary classification of question \
     {question_id} on exam {exam_id}"
  )]
  PrimarySystemKaInUse {
    question_id:      i64,
    exam_id:          i64,
    system_ka_number: String,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Reject an empty (or whitespace-only) required text field.
pub(crate) fn require_text(
  entity: &'static str,
  field: &'static str,
  value: &str,
) -> Result<()> {
  if value.trim().is_empty() {
    return Err(Error::MissingField { entity, field });
  }
  Ok(())
}
