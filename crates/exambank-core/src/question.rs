//! Questions and the "complete question" read model.
//!
//! A [`Question`] row holds only its own content. The nested
//! [`CompleteQuestion`] is assembled on read from the exam, system-KA, and
//! exam-placement tables.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  error::require_text,
  exam::{Exam, ExamQuestion, Placement},
  taxonomy::{KnowledgeArea, Stem, System, SystemKa},
};

// ─── Codes ───────────────────────────────────────────────────────────────────

/// The letter of the correct answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnswerLetter {
  A,
  B,
  C,
  D,
}

impl AnswerLetter {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::A => "A",
      Self::B => "B",
      Self::C => "C",
      Self::D => "D",
    }
  }
}

impl FromStr for AnswerLetter {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim() {
      "A" | "a" => Ok(Self::A),
      "B" | "b" => Ok(Self::B),
      "C" | "c" => Ok(Self::C),
      "D" | "d" => Ok(Self::D),
      other => Err(Error::UnknownAnswerLetter(other.to_owned())),
    }
  }
}

impl fmt::Display for AnswerLetter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Which licence exam the question targets. Stored as `0` / `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExamLevel {
  /// Reactor operator.
  Ro,
  /// Senior reactor operator.
  Sro,
}

impl ExamLevel {
  pub fn as_flag(self) -> i64 {
    match self {
      Self::Ro => 0,
      Self::Sro => 1,
    }
  }

  pub fn from_flag(flag: i64) -> Result<Self> {
    match flag {
      0 => Ok(Self::Ro),
      1 => Ok(Self::Sro),
      other => Err(Error::UnknownExamLevel(other)),
    }
  }
}

/// Cognitive level of the question. Stored as `0` / `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CognitiveLevel {
  /// Memory or fundamental knowledge.
  Memory,
  /// Comprehension or analysis.
  Comprehension,
}

impl CognitiveLevel {
  pub fn as_flag(self) -> i64 {
    match self {
      Self::Memory => 0,
      Self::Comprehension => 1,
    }
  }

  pub fn from_flag(flag: i64) -> Result<Self> {
    match flag {
      0 => Ok(Self::Memory),
      1 => Ok(Self::Comprehension),
      other => Err(Error::UnknownCognitiveLevel(other)),
    }
  }
}

// ─── Question content ────────────────────────────────────────────────────────

/// Everything a question row stores besides its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionBody {
  pub question_text:          String,
  pub answer_a:               String,
  pub answer_b:               String,
  pub answer_c:               String,
  pub answer_d:               String,
  #[serde(default)]
  pub answer_a_justification: String,
  #[serde(default)]
  pub answer_b_justification: String,
  #[serde(default)]
  pub answer_c_justification: String,
  #[serde(default)]
  pub answer_d_justification: String,
  pub correct_answer:         AnswerLetter,
  pub exam_level:             ExamLevel,
  pub cognitive_level:        CognitiveLevel,
  #[serde(default)]
  pub technical_references:   Option<String>,
  #[serde(default)]
  pub references_provided:    Option<String>,
  #[serde(default)]
  pub objective:              Option<String>,
}

impl QuestionBody {
  pub fn validate(&self) -> Result<()> {
    require_text("question", "question_text", &self.question_text)?;
    require_text("question", "answer_a", &self.answer_a)?;
    require_text("question", "answer_b", &self.answer_b)?;
    require_text("question", "answer_c", &self.answer_c)?;
    require_text("question", "answer_d", &self.answer_d)
  }
}

/// A persisted question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
  pub question_id: i64,
  #[serde(flatten)]
  pub body:        QuestionBody,
}

/// Input for creating a question together with its classification and its
/// initial exam placements. The store writes all of it or none of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQuestion {
  #[serde(flatten)]
  pub body:              QuestionBody,
  /// Derived keys (`system_number + ka_number`) of the system KAs to link.
  #[serde(default)]
  pub system_ka_numbers: Vec<String>,
  #[serde(default)]
  pub placements:        Vec<Placement>,
}

impl NewQuestion {
  pub fn new(body: QuestionBody) -> Self {
    Self { body, system_ka_numbers: vec![], placements: vec![] }
  }

  /// Checks that need no database access, including that every placement's
  /// primary system KA is among the KAs being linked.
  pub fn validate(&self) -> Result<()> {
    self.body.validate()?;
    for placement in &self.placements {
      placement.validate()?;
      if let Some(main) = &placement.main_system_ka_number
        && !self.system_ka_numbers.contains(main)
      {
        return Err(Error::PrimarySystemKaNotLinked {
          question_id:      None,
          system_ka_number: main.clone(),
        });
      }
    }
    Ok(())
  }
}

// ─── Complete question ───────────────────────────────────────────────────────

/// A system KA with its system, knowledge area, and stem resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteSystemKa {
  #[serde(flatten)]
  pub system_ka:      SystemKa,
  pub system:         System,
  pub knowledge_area: KnowledgeArea,
  pub stem:           Stem,
}

/// A question with every association resolved into one graph.
///
/// Empty association lists are valid; a question need not appear on any exam
/// or be classified under any system KA.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteQuestion {
  #[serde(flatten)]
  pub question:       Question,
  pub exams:          Vec<Exam>,
  pub system_kas:     Vec<CompleteSystemKa>,
  pub exam_questions: Vec<ExamQuestion>,
}

impl CompleteQuestion {
  /// The placement of this question on `exam_id`, if any.
  pub fn placement(&self, exam_id: i64) -> Option<&ExamQuestion> {
    self.exam_questions.iter().find(|eq| eq.exam_id == exam_id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn body() -> QuestionBody {
    QuestionBody {
      question_text:          "Which pump trips first?".into(),
      answer_a:               "A".into(),
      answer_b:               "B".into(),
      answer_c:               "C".into(),
      answer_d:               "D".into(),
      answer_a_justification: String::new(),
      answer_b_justification: String::new(),
      answer_c_justification: String::new(),
      answer_d_justification: String::new(),
      correct_answer:         AnswerLetter::B,
      exam_level:             ExamLevel::Ro,
      cognitive_level:        CognitiveLevel::Memory,
      technical_references:   None,
      references_provided:    None,
      objective:              None,
    }
  }

  #[test]
  fn answer_letter_parses_case_insensitively() {
    assert_eq!("b".parse::<AnswerLetter>().unwrap(), AnswerLetter::B);
    assert!("E".parse::<AnswerLetter>().is_err());
  }

  #[test]
  fn flags_round_trip() {
    assert_eq!(ExamLevel::from_flag(ExamLevel::Sro.as_flag()).unwrap(), ExamLevel::Sro);
    assert!(CognitiveLevel::from_flag(2).is_err());
  }

  #[test]
  fn levels_serialize_as_codes() {
    let json = serde_json::to_value(body()).unwrap();
    assert_eq!(json["correct_answer"], "B");
    assert_eq!(json["exam_level"], "RO");
    assert_eq!(json["cognitive_level"], "memory");
  }

  #[test]
  fn placement_primary_must_be_linked() {
    let mut input = NewQuestion::new(body());
    let mut placement = Placement::new(1, 1);
    placement.main_system_ka_number = Some("301G.2".into());
    input.placements.push(placement);

    assert!(matches!(
      input.validate(),
      Err(Error::PrimarySystemKaNotLinked { .. })
    ));

    input.system_ka_numbers.push("301G.2".into());
    assert!(input.validate().is_ok());
  }

  #[test]
  fn blank_question_text_is_missing() {
    let mut b = body();
    b.question_text = "  ".into();
    assert!(matches!(
      b.validate(),
      Err(Error::MissingField { field: "question_text", .. })
    ));
  }
}
