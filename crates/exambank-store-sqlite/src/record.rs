//! [`Record`] — how each entity maps onto its table.
//!
//! The generic [`Repo`](crate::Repo) builds reads and deletes from the
//! metadata here; inserts and updates are spelled out per entity.

use std::fmt;

use exambank_core::{
  Error as CoreError,
  exam::{Exam, ExamQuestion, ExamQuestionKey, NewExam, NewPlant, Plant},
  filter::{
    ExamFilter, ExamQuestionFilter, Filter, KnowledgeAreaFilter, PlantFilter, QuestionFilter,
    StemFilter, SystemFilter, SystemKaFilter,
  },
  question::{NewQuestion, Question, QuestionBody},
  taxonomy::{KnowledgeArea, NewSystemKa, Stem, System, SystemKa, SystemKaKey},
};
use rusqlite::{Connection, Row, Transaction, params};

use crate::{encode, error::Abort};

/// An entity stored in one table.
pub trait Record: Sized + Send + 'static {
  /// Human-readable name used in errors and logs.
  const ENTITY: &'static str;
  const TABLE: &'static str;
  /// Selected columns, in [`Record::from_row`] order. Also the whitelist of
  /// filterable columns.
  const COLUMNS: &'static [&'static str];
  const ORDER_BY: &'static str;

  type Key: fmt::Debug + Send + 'static;
  type New: Send + 'static;
  type Filter: Filter + fmt::Debug + Send + 'static;

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

  fn key(&self) -> Self::Key;

  /// A filter matching exactly the row with `key`.
  fn key_filter(key: &Self::Key) -> Self::Filter;

  fn validate_new(new: &Self::New) -> exambank_core::Result<()>;

  fn validate(&self) -> exambank_core::Result<()>;

  /// Insert `new` and return its key. Runs inside a transaction owned by the
  /// caller, so multi-row inserts are all-or-nothing.
  fn insert(tx: &Transaction<'_>, new: Self::New) -> tokio_rusqlite::Result<Self::Key>;

  /// Full-replace update of the non-key columns. Returns the affected row
  /// count.
  fn update(tx: &Transaction<'_>, record: &Self) -> tokio_rusqlite::Result<usize>;

  /// `SELECT <columns> FROM <table>`.
  fn select_sql() -> String {
    let columns: Vec<String> =
      Self::COLUMNS.iter().map(|c| format!("{}.{c}", Self::TABLE)).collect();
    format!("SELECT {} FROM {}", columns.join(", "), Self::TABLE)
  }
}

fn json_error(e: serde_json::Error) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(Box::new(e))
}

/// The primary system KA of an exam placement must be one of the question's
/// linked system KAs.
pub(crate) fn ensure_primary_linked(
  conn: &Connection,
  question_id: i64,
  main_system_ka_number: Option<&str>,
) -> tokio_rusqlite::Result<()> {
  let Some(main) = main_system_ka_number else {
    return Ok(());
  };
  let linked: bool = conn.query_row(
    "SELECT EXISTS (
       SELECT 1 FROM question_system_kas
        WHERE question_id = ?1 AND system_number || ka_number = ?2
     )",
    params![question_id, main],
    |row| row.get(0),
  )?;
  if !linked {
    return Err(
      Abort::Invalid(CoreError::PrimarySystemKaNotLinked {
        question_id:      Some(question_id),
        system_ka_number: main.to_owned(),
      })
      .into(),
    );
  }
  Ok(())
}

/// Link `question_id` to the system KA whose derived key is
/// `system_ka_number`. Fails with a not-found abort if no such system KA
/// exists.
pub(crate) fn link_system_ka(
  conn: &Connection,
  question_id: i64,
  system_ka_number: &str,
) -> tokio_rusqlite::Result<()> {
  let inserted = conn.execute(
    "INSERT OR IGNORE INTO question_system_kas (question_id, system_number, ka_number)
     SELECT ?1, system_number, ka_number FROM system_kas WHERE system_ka_number = ?2",
    params![question_id, system_ka_number],
  )?;
  if inserted == 0 {
    let exists: bool = conn.query_row(
      "SELECT EXISTS (SELECT 1 FROM system_kas WHERE system_ka_number = ?1)",
      params![system_ka_number],
      |row| row.get(0),
    )?;
    if !exists {
      return Err(Abort::missing(SystemKa::ENTITY, system_ka_number).into());
    }
  }
  Ok(())
}

fn insert_exam_question(tx: &Transaction<'_>, eq: &ExamQuestion) -> tokio_rusqlite::Result<()> {
  tx.execute(
    "INSERT INTO exam_questions (
       exam_id, question_id, question_number, main_system_ka_number,
       ka_match_justification, sro_match_justification, answers_order
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    params![
      eq.exam_id,
      eq.question_id,
      eq.question_number,
      eq.main_system_ka_number,
      eq.ka_match_justification,
      eq.sro_match_justification,
      eq.answers_order,
    ],
  )?;
  Ok(())
}

// ─── Plant ───────────────────────────────────────────────────────────────────

impl Record for Plant {
  const ENTITY: &'static str = "plant";
  const TABLE: &'static str = "plants";
  const COLUMNS: &'static [&'static str] = &["plant_id", "name"];
  const ORDER_BY: &'static str = "plant_id";

  type Key = i64;
  type New = NewPlant;
  type Filter = PlantFilter;

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Plant { plant_id: row.get(0)?, name: row.get(1)? })
  }

  fn key(&self) -> i64 { self.plant_id }

  fn key_filter(key: &i64) -> PlantFilter { PlantFilter::by_id(*key) }

  fn validate_new(new: &NewPlant) -> exambank_core::Result<()> { new.validate() }

  fn validate(&self) -> exambank_core::Result<()> { Plant::validate(self) }

  fn insert(tx: &Transaction<'_>, new: NewPlant) -> tokio_rusqlite::Result<i64> {
    tx.execute("INSERT INTO plants (name) VALUES (?1)", params![new.name])?;
    Ok(tx.last_insert_rowid())
  }

  fn update(tx: &Transaction<'_>, p: &Plant) -> tokio_rusqlite::Result<usize> {
    Ok(tx.execute(
      "UPDATE plants SET name = ?2 WHERE plant_id = ?1",
      params![p.plant_id, p.name],
    )?)
  }
}

// ─── Exam ────────────────────────────────────────────────────────────────────

impl Record for Exam {
  const ENTITY: &'static str = "exam";
  const TABLE: &'static str = "exams";
  const COLUMNS: &'static [&'static str] = &["exam_id", "name", "plant_id", "reference_urls"];
  const ORDER_BY: &'static str = "exam_id";

  type Key = i64;
  type New = NewExam;
  type Filter = ExamFilter;

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Exam {
      exam_id:        row.get(0)?,
      name:           row.get(1)?,
      plant_id:       row.get(2)?,
      reference_urls: encode::urls(row, 3)?,
    })
  }

  fn key(&self) -> i64 { self.exam_id }

  fn key_filter(key: &i64) -> ExamFilter { ExamFilter::by_id(*key) }

  fn validate_new(new: &NewExam) -> exambank_core::Result<()> { new.validate() }

  fn validate(&self) -> exambank_core::Result<()> { Exam::validate(self) }

  fn insert(tx: &Transaction<'_>, new: NewExam) -> tokio_rusqlite::Result<i64> {
    let plant_id = new.plant_id.ok_or(Abort::Invalid(CoreError::MissingField {
      entity: Self::ENTITY,
      field:  "plant_id",
    }))?;
    let urls = encode::encode_urls(&new.reference_urls).map_err(json_error)?;
    tx.execute(
      "INSERT INTO exams (name, plant_id, reference_urls) VALUES (?1, ?2, ?3)",
      params![new.name, plant_id, urls],
    )?;
    Ok(tx.last_insert_rowid())
  }

  fn update(tx: &Transaction<'_>, e: &Exam) -> tokio_rusqlite::Result<usize> {
    let urls = encode::encode_urls(&e.reference_urls).map_err(json_error)?;
    Ok(tx.execute(
      "UPDATE exams SET name = ?2, plant_id = ?3, reference_urls = ?4 WHERE exam_id = ?1",
      params![e.exam_id, e.name, e.plant_id, urls],
    )?)
  }
}

// ─── Question ────────────────────────────────────────────────────────────────

impl Record for Question {
  const ENTITY: &'static str = "question";
  const TABLE: &'static str = "questions";
  const COLUMNS: &'static [&'static str] = &[
    "question_id",
    "question_text",
    "answer_a",
    "answer_b",
    "answer_c",
    "answer_d",
    "answer_a_justification",
    "answer_b_justification",
    "answer_c_justification",
    "answer_d_justification",
    "correct_answer",
    "exam_level",
    "cognitive_level",
    "technical_references",
    "references_provided",
    "objective",
  ];
  const ORDER_BY: &'static str = "question_id";

  type Key = i64;
  type New = NewQuestion;
  type Filter = QuestionFilter;

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Question {
      question_id: row.get(0)?,
      body:        QuestionBody {
        question_text:          row.get(1)?,
        answer_a:               row.get(2)?,
        answer_b:               row.get(3)?,
        answer_c:               row.get(4)?,
        answer_d:               row.get(5)?,
        answer_a_justification: row.get(6)?,
        answer_b_justification: row.get(7)?,
        answer_c_justification: row.get(8)?,
        answer_d_justification: row.get(9)?,
        correct_answer:         encode::answer_letter(row, 10)?,
        exam_level:             encode::exam_level(row, 11)?,
        cognitive_level:        encode::cognitive_level(row, 12)?,
        technical_references:   row.get(13)?,
        references_provided:    row.get(14)?,
        objective:              row.get(15)?,
      },
    })
  }

  fn key(&self) -> i64 { self.question_id }

  fn key_filter(key: &i64) -> QuestionFilter { QuestionFilter::by_id(*key) }

  fn validate_new(new: &NewQuestion) -> exambank_core::Result<()> { new.validate() }

  fn validate(&self) -> exambank_core::Result<()> { self.body.validate() }

  /// Inserts the question row, its system KA links, then its exam
  /// placements.
  fn insert(tx: &Transaction<'_>, new: NewQuestion) -> tokio_rusqlite::Result<i64> {
    let b = &new.body;
    tx.execute(
      "INSERT INTO questions (
         question_text, answer_a, answer_b, answer_c, answer_d,
         answer_a_justification, answer_b_justification,
         answer_c_justification, answer_d_justification,
         correct_answer, exam_level, cognitive_level,
         technical_references, references_provided, objective
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
      params![
        b.question_text,
        b.answer_a,
        b.answer_b,
        b.answer_c,
        b.answer_d,
        b.answer_a_justification,
        b.answer_b_justification,
        b.answer_c_justification,
        b.answer_d_justification,
        b.correct_answer.as_str(),
        b.exam_level.as_flag(),
        b.cognitive_level.as_flag(),
        b.technical_references,
        b.references_provided,
        b.objective,
      ],
    )?;
    let question_id = tx.last_insert_rowid();

    for number in &new.system_ka_numbers {
      link_system_ka(tx, question_id, number)?;
    }
    for placement in new.placements {
      let eq = placement.into_exam_question(question_id);
      ensure_primary_linked(tx, question_id, eq.main_system_ka_number.as_deref())?;
      insert_exam_question(tx, &eq)?;
    }

    Ok(question_id)
  }

  fn update(tx: &Transaction<'_>, q: &Question) -> tokio_rusqlite::Result<usize> {
    let b = &q.body;
    Ok(tx.execute(
      "UPDATE questions SET
         question_text = ?2, answer_a = ?3, answer_b = ?4, answer_c = ?5, answer_d = ?6,
         answer_a_justification = ?7, answer_b_justification = ?8,
         answer_c_justification = ?9, answer_d_justification = ?10,
         correct_answer = ?11, exam_level = ?12, cognitive_level = ?13,
         technical_references = ?14, references_provided = ?15, objective = ?16
       WHERE question_id = ?1",
      params![
        q.question_id,
        b.question_text,
        b.answer_a,
        b.answer_b,
        b.answer_c,
        b.answer_d,
        b.answer_a_justification,
        b.answer_b_justification,
        b.answer_c_justification,
        b.answer_d_justification,
        b.correct_answer.as_str(),
        b.exam_level.as_flag(),
        b.cognitive_level.as_flag(),
        b.technical_references,
        b.references_provided,
        b.objective,
      ],
    )?)
  }
}

// ─── System ──────────────────────────────────────────────────────────────────

impl Record for System {
  const ENTITY: &'static str = "system";
  const TABLE: &'static str = "systems";
  const COLUMNS: &'static [&'static str] = &["system_number", "name"];
  const ORDER_BY: &'static str = "system_number";

  type Key = String;
  type New = System;
  type Filter = SystemFilter;

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(System { system_number: row.get(0)?, name: row.get(1)? })
  }

  fn key(&self) -> String { self.system_number.clone() }

  fn key_filter(key: &String) -> SystemFilter { SystemFilter::by_number(key.clone()) }

  fn validate_new(new: &System) -> exambank_core::Result<()> { new.validate() }

  fn validate(&self) -> exambank_core::Result<()> { System::validate(self) }

  fn insert(tx: &Transaction<'_>, new: System) -> tokio_rusqlite::Result<String> {
    tx.execute(
      "INSERT INTO systems (system_number, name) VALUES (?1, ?2)",
      params![new.system_number, new.name],
    )?;
    Ok(new.system_number)
  }

  fn update(tx: &Transaction<'_>, s: &System) -> tokio_rusqlite::Result<usize> {
    Ok(tx.execute(
      "UPDATE systems SET name = ?2 WHERE system_number = ?1",
      params![s.system_number, s.name],
    )?)
  }
}

// ─── Stem ────────────────────────────────────────────────────────────────────

impl Record for Stem {
  const ENTITY: &'static str = "stem";
  const TABLE: &'static str = "stems";
  const COLUMNS: &'static [&'static str] = &["stem_id", "statement"];
  const ORDER_BY: &'static str = "stem_id";

  type Key = String;
  type New = Stem;
  type Filter = StemFilter;

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Stem { stem_id: row.get(0)?, statement: row.get(1)? })
  }

  fn key(&self) -> String { self.stem_id.clone() }

  fn key_filter(key: &String) -> StemFilter { StemFilter::by_id(key.clone()) }

  fn validate_new(new: &Stem) -> exambank_core::Result<()> { new.validate() }

  fn validate(&self) -> exambank_core::Result<()> { Stem::validate(self) }

  fn insert(tx: &Transaction<'_>, new: Stem) -> tokio_rusqlite::Result<String> {
    tx.execute(
      "INSERT INTO stems (stem_id, statement) VALUES (?1, ?2)",
      params![new.stem_id, new.statement],
    )?;
    Ok(new.stem_id)
  }

  fn update(tx: &Transaction<'_>, s: &Stem) -> tokio_rusqlite::Result<usize> {
    Ok(tx.execute(
      "UPDATE stems SET statement = ?2 WHERE stem_id = ?1",
      params![s.stem_id, s.statement],
    )?)
  }
}

// ─── Knowledge area ──────────────────────────────────────────────────────────

impl Record for KnowledgeArea {
  const ENTITY: &'static str = "knowledge area";
  const TABLE: &'static str = "kas";
  const COLUMNS: &'static [&'static str] = &["ka_number", "stem_id"];
  const ORDER_BY: &'static str = "ka_number";

  type Key = String;
  type New = KnowledgeArea;
  type Filter = KnowledgeAreaFilter;

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(KnowledgeArea { ka_number: row.get(0)?, stem_id: row.get(1)? })
  }

  fn key(&self) -> String { self.ka_number.clone() }

  fn key_filter(key: &String) -> KnowledgeAreaFilter { KnowledgeAreaFilter::by_number(key.clone()) }

  fn validate_new(new: &KnowledgeArea) -> exambank_core::Result<()> { new.validate() }

  fn validate(&self) -> exambank_core::Result<()> { KnowledgeArea::validate(self) }

  fn insert(tx: &Transaction<'_>, new: KnowledgeArea) -> tokio_rusqlite::Result<String> {
    tx.execute(
      "INSERT INTO kas (ka_number, stem_id) VALUES (?1, ?2)",
      params![new.ka_number, new.stem_id],
    )?;
    Ok(new.ka_number)
  }

  fn update(tx: &Transaction<'_>, ka: &KnowledgeArea) -> tokio_rusqlite::Result<usize> {
    Ok(tx.execute(
      "UPDATE kas SET stem_id = ?2 WHERE ka_number = ?1",
      params![ka.ka_number, ka.stem_id],
    )?)
  }
}

// ─── System KA ───────────────────────────────────────────────────────────────

impl Record for SystemKa {
  const ENTITY: &'static str = "system KA";
  const TABLE: &'static str = "system_kas";
  const COLUMNS: &'static [&'static str] = &[
    "system_number",
    "ka_number",
    "system_ka_number",
    "category",
    "ro_importance",
    "sro_importance",
    "cfr_content",
  ];
  const ORDER_BY: &'static str = "system_number, ka_number";

  type Key = SystemKaKey;
  type New = NewSystemKa;
  type Filter = SystemKaFilter;

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(SystemKa {
      system_number:    row.get(0)?,
      ka_number:        row.get(1)?,
      system_ka_number: row.get(2)?,
      category:         row.get(3)?,
      ro_importance:    row.get(4)?,
      sro_importance:   row.get(5)?,
      cfr_content:      row.get(6)?,
    })
  }

  fn key(&self) -> SystemKaKey { SystemKa::key(self) }

  fn key_filter(key: &SystemKaKey) -> SystemKaFilter { SystemKaFilter::by_key(key) }

  fn validate_new(new: &NewSystemKa) -> exambank_core::Result<()> { new.validate() }

  fn validate(&self) -> exambank_core::Result<()> { SystemKa::validate(self) }

  fn insert(tx: &Transaction<'_>, new: NewSystemKa) -> tokio_rusqlite::Result<SystemKaKey> {
    tx.execute(
      "INSERT INTO system_kas (
         system_number, ka_number, category, ro_importance, sro_importance, cfr_content
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
      params![
        new.system_number,
        new.ka_number,
        new.category,
        new.ro_importance,
        new.sro_importance,
        new.cfr_content,
      ],
    )?;
    Ok(new.key())
  }

  /// The derived `system_ka_number` is computed by SQLite and never written.
  fn update(tx: &Transaction<'_>, ska: &SystemKa) -> tokio_rusqlite::Result<usize> {
    Ok(tx.execute(
      "UPDATE system_kas
          SET category = ?3, ro_importance = ?4, sro_importance = ?5, cfr_content = ?6
        WHERE system_number = ?1 AND ka_number = ?2",
      params![
        ska.system_number,
        ska.ka_number,
        ska.category,
        ska.ro_importance,
        ska.sro_importance,
        ska.cfr_content,
      ],
    )?)
  }
}

// ─── Exam question ───────────────────────────────────────────────────────────

impl Record for ExamQuestion {
  const ENTITY: &'static str = "exam question";
  const TABLE: &'static str = "exam_questions";
  const COLUMNS: &'static [&'static str] = &[
    "exam_id",
    "question_id",
    "question_number",
    "main_system_ka_number",
    "ka_match_justification",
    "sro_match_justification",
    "answers_order",
  ];
  const ORDER_BY: &'static str = "exam_id, question_id";

  type Key = ExamQuestionKey;
  type New = ExamQuestion;
  type Filter = ExamQuestionFilter;

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(ExamQuestion {
      exam_id:                 row.get(0)?,
      question_id:             row.get(1)?,
      question_number:         row.get(2)?,
      main_system_ka_number:   row.get(3)?,
      ka_match_justification:  row.get(4)?,
      sro_match_justification: row.get(5)?,
      answers_order:           row.get(6)?,
    })
  }

  fn key(&self) -> ExamQuestionKey { ExamQuestion::key(self) }

  fn key_filter(key: &ExamQuestionKey) -> ExamQuestionFilter { ExamQuestionFilter::by_key(*key) }

  fn validate_new(new: &ExamQuestion) -> exambank_core::Result<()> { new.validate() }

  fn validate(&self) -> exambank_core::Result<()> { ExamQuestion::validate(self) }

  fn insert(tx: &Transaction<'_>, new: ExamQuestion) -> tokio_rusqlite::Result<ExamQuestionKey> {
    ensure_primary_linked(tx, new.question_id, new.main_system_ka_number.as_deref())?;
    insert_exam_question(tx, &new)?;
    Ok(new.key())
  }

  /// A missing placement reports zero affected rows before the primary
  /// pointer is checked.
  fn update(tx: &Transaction<'_>, eq: &ExamQuestion) -> tokio_rusqlite::Result<usize> {
    let exists: bool = tx.query_row(
      "SELECT EXISTS (
         SELECT 1 FROM exam_questions WHERE exam_id = ?1 AND question_id = ?2
       )",
      params![eq.exam_id, eq.question_id],
      |row| row.get(0),
    )?;
    if !exists {
      return Ok(0);
    }
    ensure_primary_linked(tx, eq.question_id, eq.main_system_ka_number.as_deref())?;
    Ok(tx.execute(
      "UPDATE exam_questions
          SET question_number = ?3, main_system_ka_number = ?4,
              ka_match_justification = ?5, sro_match_justification = ?6,
              answers_order = ?7
        WHERE exam_id = ?1 AND question_id = ?2",
      params![
        eq.exam_id,
        eq.question_id,
        eq.question_number,
        eq.main_system_ka_number,
        eq.ka_match_justification,
        eq.sro_match_justification,
        eq.answers_order,
      ],
    )?)
  }
}
