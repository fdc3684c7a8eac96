//! Plants, exams, and the placement of questions within an exam.

use serde::{Deserialize, Serialize};

use crate::{Error, Result, error::require_text};

// ─── Plants ──────────────────────────────────────────────────────────────────

/// A nuclear plant; owns zero or more exams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plant {
  pub plant_id: i64,
  pub name:     String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPlant {
  pub name: String,
}

impl NewPlant {
  pub fn new(name: impl Into<String>) -> Self { Self { name: name.into() } }

  pub fn validate(&self) -> Result<()> { require_text("plant", "name", &self.name) }
}

impl Plant {
  pub fn validate(&self) -> Result<()> { require_text("plant", "name", &self.name) }
}

// ─── Exams ───────────────────────────────────────────────────────────────────

/// An exam administered at a plant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exam {
  pub exam_id:        i64,
  pub name:           String,
  pub plant_id:       i64,
  /// External reference links (exam report, answer key, ...).
  #[serde(default)]
  pub reference_urls: Vec<String>,
}

impl Exam {
  pub fn validate(&self) -> Result<()> { require_text("exam", "name", &self.name) }
}

/// Input for creating an [`Exam`].
///
/// `plant_id` is optional only so that a payload lacking it is reported as a
/// validation failure instead of a decode failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewExam {
  pub name:           String,
  #[serde(default)]
  pub plant_id:       Option<i64>,
  #[serde(default)]
  pub reference_urls: Vec<String>,
}

impl NewExam {
  pub fn new(name: impl Into<String>, plant_id: i64) -> Self {
    Self { name: name.into(), plant_id: Some(plant_id), reference_urls: vec![] }
  }

  pub fn validate(&self) -> Result<()> {
    require_text("exam", "name", &self.name)?;
    if self.plant_id.is_none() {
      return Err(Error::MissingField { entity: "exam", field: "plant_id" });
    }
    Ok(())
  }
}

// ─── Exam questions ──────────────────────────────────────────────────────────

/// Composite primary key of an [`ExamQuestion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExamQuestionKey {
  pub exam_id:     i64,
  pub question_id: i64,
}

/// A question's appearance on one exam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamQuestion {
  pub exam_id:                 i64,
  pub question_id:             i64,
  /// 1-based position of the question within this exam.
  pub question_number:         i64,
  /// The system KA this question primarily tests in this exam. Must be one
  /// of the question's own linked system KAs.
  #[serde(default)]
  pub main_system_ka_number:   Option<String>,
  #[serde(default)]
  pub ka_match_justification:  Option<String>,
  #[serde(default)]
  pub sro_match_justification: Option<String>,
  /// Shuffle order of the four answers as presented, e.g. `"CADB"`.
  #[serde(default)]
  pub answers_order:           Option<String>,
}

impl ExamQuestion {
  pub fn key(&self) -> ExamQuestionKey {
    ExamQuestionKey { exam_id: self.exam_id, question_id: self.question_id }
  }

  pub fn validate(&self) -> Result<()> {
    validate_question_number(self.question_number)?;
    validate_answers_order(self.answers_order.as_deref())
  }
}

/// An exam placement supplied while creating a question; the question id is
/// filled in by the store once the question row exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
  pub exam_id:                 i64,
  pub question_number:         i64,
  #[serde(default)]
  pub main_system_ka_number:   Option<String>,
  #[serde(default)]
  pub ka_match_justification:  Option<String>,
  #[serde(default)]
  pub sro_match_justification: Option<String>,
  #[serde(default)]
  pub answers_order:           Option<String>,
}

impl Placement {
  pub fn new(exam_id: i64, question_number: i64) -> Self {
    Self {
      exam_id,
      question_number,
      main_system_ka_number: None,
      ka_match_justification: None,
      sro_match_justification: None,
      answers_order: None,
    }
  }

  pub fn validate(&self) -> Result<()> {
    validate_question_number(self.question_number)?;
    validate_answers_order(self.answers_order.as_deref())
  }

  pub fn into_exam_question(self, question_id: i64) -> ExamQuestion {
    ExamQuestion {
      exam_id: self.exam_id,
      question_id,
      question_number: self.question_number,
      main_system_ka_number: self.main_system_ka_number,
      ka_match_justification: self.ka_match_justification,
      sro_match_justification: self.sro_match_justification,
      answers_order: self.answers_order,
    }
  }
}

fn validate_question_number(n: i64) -> Result<()> {
  if n < 1 {
    return Err(Error::InvalidField {
      entity: "exam question",
      field:  "question_number",
      reason: format!("must be at least 1, got {n}"),
    });
  }
  Ok(())
}

/// An answer order is a permutation of `ABCD`.
fn validate_answers_order(order: Option<&str>) -> Result<()> {
  let Some(order) = order else { return Ok(()) };
  let mut letters: Vec<char> = order.chars().collect();
  letters.sort_unstable();
  if letters != ['A', 'B', 'C', 'D'] {
    return Err(Error::InvalidField {
      entity: "exam question",
      field:  "answers_order",
      reason: format!("{order:?} is not a permutation of ABCD"),
    });
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn new_exam_without_plant_is_invalid() {
    let exam = NewExam { name: "2025-RO".into(), plant_id: None, reference_urls: vec![] };
    assert!(matches!(
      exam.validate(),
      Err(Error::MissingField { entity: "exam", field: "plant_id" })
    ));
  }

  #[test]
  fn answers_order_must_be_permutation() {
    let mut p = Placement::new(1, 1);
    p.answers_order = Some("DCBA".into());
    assert!(p.validate().is_ok());

    p.answers_order = Some("AABC".into());
    assert!(p.validate().is_err());
  }

  #[test]
  fn question_number_starts_at_one() {
    assert!(Placement::new(1, 0).validate().is_err());
  }
}
