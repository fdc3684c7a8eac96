//! Typed equality filters, one per entity.
//!
//! Every filter field is optional; an all-`None` filter matches every row.
//! Column names come from the field declarations here, never from callers, so
//! a filter cannot smuggle arbitrary text into a query. Storage backends turn
//! the [`Filter::conditions`] list into bound parameters.

use serde::{Deserialize, Serialize};

use crate::{
  exam::ExamQuestionKey,
  question::{AnswerLetter, CognitiveLevel, ExamLevel},
  taxonomy::SystemKaKey,
};

/// A value a filter compares a column against.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
  Integer(i64),
  Text(String),
}

impl From<i64> for FilterValue {
  fn from(v: i64) -> Self { Self::Integer(v) }
}

impl From<String> for FilterValue {
  fn from(v: String) -> Self { Self::Text(v) }
}

impl From<&str> for FilterValue {
  fn from(v: &str) -> Self { Self::Text(v.to_owned()) }
}

/// A set of `column = value` conditions, joined with `AND`.
pub trait Filter {
  /// The populated conditions, in field declaration order. Order matters: it
  /// determines positional parameter binding.
  fn conditions(&self) -> Vec<(&'static str, FilterValue)>;
}

/// Push `(column, value)` for each populated field, in order.
macro_rules! conditions {
  ($self:ident; $($field:ident $(=> $map:expr)?),* $(,)?) => {{
    let mut out: Vec<(&'static str, FilterValue)> = Vec::new();
    $(
      if let Some(v) = &$self.$field {
        out.push((stringify!($field), conditions!(@value v $(, $map)?)));
      }
    )*
    out
  }};
  (@value $v:ident) => { FilterValue::from($v.clone()) };
  (@value $v:ident, $map:expr) => { FilterValue::from(($map)($v)) };
}

// ─── Plants / exams ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlantFilter {
  pub plant_id: Option<i64>,
  pub name:     Option<String>,
}

impl PlantFilter {
  pub fn by_id(plant_id: i64) -> Self { Self { plant_id: Some(plant_id), ..Self::default() } }
}

impl Filter for PlantFilter {
  fn conditions(&self) -> Vec<(&'static str, FilterValue)> {
    conditions!(self; plant_id, name)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExamFilter {
  pub exam_id:  Option<i64>,
  pub name:     Option<String>,
  pub plant_id: Option<i64>,
}

impl ExamFilter {
  pub fn by_id(exam_id: i64) -> Self { Self { exam_id: Some(exam_id), ..Self::default() } }
}

impl Filter for ExamFilter {
  fn conditions(&self) -> Vec<(&'static str, FilterValue)> {
    conditions!(self; exam_id, name, plant_id)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExamQuestionFilter {
  pub exam_id:               Option<i64>,
  pub question_id:           Option<i64>,
  pub question_number:       Option<i64>,
  pub main_system_ka_number: Option<String>,
}

impl ExamQuestionFilter {
  pub fn by_key(key: ExamQuestionKey) -> Self {
    Self {
      exam_id: Some(key.exam_id),
      question_id: Some(key.question_id),
      ..Self::default()
    }
  }
}

impl Filter for ExamQuestionFilter {
  fn conditions(&self) -> Vec<(&'static str, FilterValue)> {
    conditions!(self; exam_id, question_id, question_number, main_system_ka_number)
  }
}

// ─── Questions ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionFilter {
  pub question_id:     Option<i64>,
  pub correct_answer:  Option<AnswerLetter>,
  pub exam_level:      Option<ExamLevel>,
  pub cognitive_level: Option<CognitiveLevel>,
}

impl QuestionFilter {
  pub fn by_id(question_id: i64) -> Self {
    Self { question_id: Some(question_id), ..Self::default() }
  }
}

impl Filter for QuestionFilter {
  fn conditions(&self) -> Vec<(&'static str, FilterValue)> {
    conditions!(self;
      question_id,
      correct_answer => |v: &AnswerLetter| v.as_str(),
      exam_level => |v: &ExamLevel| v.as_flag(),
      cognitive_level => |v: &CognitiveLevel| v.as_flag(),
    )
  }
}

// ─── Taxonomy ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemFilter {
  pub system_number: Option<String>,
  pub name:          Option<String>,
}

impl SystemFilter {
  pub fn by_number(system_number: impl Into<String>) -> Self {
    Self { system_number: Some(system_number.into()), ..Self::default() }
  }
}

impl Filter for SystemFilter {
  fn conditions(&self) -> Vec<(&'static str, FilterValue)> {
    conditions!(self; system_number, name)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StemFilter {
  pub stem_id: Option<String>,
}

impl StemFilter {
  pub fn by_id(stem_id: impl Into<String>) -> Self { Self { stem_id: Some(stem_id.into()) } }
}

impl Filter for StemFilter {
  fn conditions(&self) -> Vec<(&'static str, FilterValue)> { conditions!(self; stem_id) }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeAreaFilter {
  pub ka_number: Option<String>,
  pub stem_id:   Option<String>,
}

impl KnowledgeAreaFilter {
  pub fn by_number(ka_number: impl Into<String>) -> Self {
    Self { ka_number: Some(ka_number.into()), ..Self::default() }
  }
}

impl Filter for KnowledgeAreaFilter {
  fn conditions(&self) -> Vec<(&'static str, FilterValue)> {
    conditions!(self; ka_number, stem_id)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemKaFilter {
  pub system_number:    Option<String>,
  pub ka_number:        Option<String>,
  pub system_ka_number: Option<String>,
  pub category:         Option<String>,
}

impl SystemKaFilter {
  pub fn by_key(key: &SystemKaKey) -> Self {
    Self {
      system_number: Some(key.system_number.clone()),
      ka_number: Some(key.ka_number.clone()),
      ..Self::default()
    }
  }
}

impl Filter for SystemKaFilter {
  fn conditions(&self) -> Vec<(&'static str, FilterValue)> {
    conditions!(self; system_number, ka_number, system_ka_number, category)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_filter_has_no_conditions() {
    assert!(ExamFilter::default().conditions().is_empty());
  }

  #[test]
  fn conditions_follow_declaration_order() {
    let filter = ExamFilter {
      exam_id:  None,
      name:     Some("2025-RO".into()),
      plant_id: Some(7),
    };
    assert_eq!(
      filter.conditions(),
      vec![
        ("name", FilterValue::Text("2025-RO".into())),
        ("plant_id", FilterValue::Integer(7)),
      ]
    );
  }

  #[test]
  fn enum_fields_use_stored_encoding() {
    let filter = QuestionFilter {
      correct_answer: Some(AnswerLetter::C),
      exam_level: Some(ExamLevel::Sro),
      ..QuestionFilter::default()
    };
    assert_eq!(
      filter.conditions(),
      vec![
        ("correct_answer", FilterValue::Text("C".into())),
        ("exam_level", FilterValue::Integer(1)),
      ]
    );
  }
}
