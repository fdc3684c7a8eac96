//! Encoding and decoding helpers between domain types and the column
//! representations stored in SQLite.
//!
//! Answer letters are stored as `'A'..'D'`, exam and cognitive levels as
//! `0` / `1`, and exam reference URLs as a compact JSON array.

use exambank_core::question::{AnswerLetter, CognitiveLevel, ExamLevel};
use rusqlite::{Row, types::Type};

/// Wrap a decode failure so it can be returned from a row-mapping closure.
fn conversion_error(
  column: usize,
  ty: Type,
  e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
  rusqlite::Error::FromSqlConversionFailure(column, ty, Box::new(e))
}

// ─── Codes ───────────────────────────────────────────────────────────────────

pub fn answer_letter(row: &Row<'_>, column: usize) -> rusqlite::Result<AnswerLetter> {
  let raw: String = row.get(column)?;
  raw.parse().map_err(|e| conversion_error(column, Type::Text, e))
}

pub fn exam_level(row: &Row<'_>, column: usize) -> rusqlite::Result<ExamLevel> {
  ExamLevel::from_flag(row.get(column)?)
    .map_err(|e| conversion_error(column, Type::Integer, e))
}

pub fn cognitive_level(row: &Row<'_>, column: usize) -> rusqlite::Result<CognitiveLevel> {
  CognitiveLevel::from_flag(row.get(column)?)
    .map_err(|e| conversion_error(column, Type::Integer, e))
}

// ─── URL lists ───────────────────────────────────────────────────────────────

pub fn encode_urls(urls: &[String]) -> serde_json::Result<String> {
  serde_json::to_string(urls)
}

pub fn urls(row: &Row<'_>, column: usize) -> rusqlite::Result<Vec<String>> {
  let raw: String = row.get(column)?;
  serde_json::from_str(&raw).map_err(|e| conversion_error(column, Type::Text, e))
}
