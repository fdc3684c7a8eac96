//! [`QuestionAggregator`] — assembles [`CompleteQuestion`] graphs.
//!
//! However many questions are requested, the related tables are read with a
//! fixed number of queries: one for exams, one for system KAs (joined with
//! their system, knowledge area, and stem), one for exam placements. Each is
//! keyed on `question_id IN (...)` over the whole set of matched questions,
//! then grouped per question in row order.

use std::collections::HashMap;

use exambank_core::{
  exam::{Exam, ExamQuestion},
  filter::{Filter as _, QuestionFilter},
  question::{CompleteQuestion, CompleteSystemKa, Question},
  taxonomy::{KnowledgeArea, Stem, System, SystemKa},
};
use rusqlite::{Row, params_from_iter, types::Value};
use tracing::debug;

use crate::{
  Database, Error, Record, Result,
  query::{QueryBuilder, in_list},
};

/// Related rows for a set of questions, grouped by question id.
type Grouped<T> = HashMap<i64, Vec<T>>;

#[derive(Clone)]
pub struct QuestionAggregator {
  db: Database,
}

impl QuestionAggregator {
  pub fn new(db: Database) -> Self { Self { db } }

  /// One question with all of its associations. The base row and the three
  /// association reads run concurrently; any failure fails the whole call.
  pub async fn get_complete(&self, question_id: i64) -> Result<CompleteQuestion> {
    let ids = vec![question_id];
    let (base, mut exams, mut system_kas, mut placements) = tokio::try_join!(
      self.base_rows(
        format!("{} WHERE questions.question_id = ?1", Question::select_sql()),
        vec![Value::Integer(question_id)],
      ),
      self.exams_for(&ids),
      self.system_kas_for(&ids),
      self.exam_questions_for(&ids),
    )?;

    let question = base
      .into_iter()
      .next()
      .ok_or_else(|| Error::not_found(Question::ENTITY, question_id))?;

    Ok(CompleteQuestion {
      question,
      exams: exams.remove(&question_id).unwrap_or_default(),
      system_kas: system_kas.remove(&question_id).unwrap_or_default(),
      exam_questions: placements.remove(&question_id).unwrap_or_default(),
    })
  }

  /// Every question matching `filter`, in question-id order, fully
  /// assembled with one base query plus three batched queries.
  pub async fn get_complete_many(&self, filter: &QuestionFilter) -> Result<Vec<CompleteQuestion>> {
    self.db.ensure_open()?;
    let clause = QueryBuilder::new(Question::TABLE, Question::COLUMNS).build(filter.conditions())?;
    let sql = format!(
      "{} {} ORDER BY {}",
      Question::select_sql(),
      clause.sql,
      Question::ORDER_BY
    );
    let base = self.base_rows(sql, clause.params).await?;
    self.assemble(base).await
  }

  /// Questions placed on `exam_id`, in question-number order.
  pub async fn get_questions_by_exam(&self, exam_id: i64) -> Result<Vec<CompleteQuestion>> {
    let sql = format!(
      "{} JOIN exam_questions eq ON eq.question_id = questions.question_id
       WHERE eq.exam_id = ?1
       ORDER BY eq.question_number",
      Question::select_sql()
    );
    let base = self.base_rows(sql, vec![Value::Integer(exam_id)]).await?;
    self.assemble(base).await
  }

  /// Attach associations to `base`, preserving its order.
  async fn assemble(&self, base: Vec<Question>) -> Result<Vec<CompleteQuestion>> {
    if base.is_empty() {
      return Ok(vec![]);
    }
    let ids: Vec<i64> = base.iter().map(|q| q.question_id).collect();
    let (mut exams, mut system_kas, mut placements) = tokio::try_join!(
      self.exams_for(&ids),
      self.system_kas_for(&ids),
      self.exam_questions_for(&ids),
    )?;
    debug!(questions = ids.len(), "assembled complete questions");

    Ok(
      base
        .into_iter()
        .map(|question| {
          let id = question.question_id;
          CompleteQuestion {
            question,
            exams: exams.remove(&id).unwrap_or_default(),
            system_kas: system_kas.remove(&id).unwrap_or_default(),
            exam_questions: placements.remove(&id).unwrap_or_default(),
          }
        })
        .collect(),
    )
  }

  async fn base_rows(&self, sql: String, params: Vec<Value>) -> Result<Vec<Question>> {
    self
      .db
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params_from_iter(params), Question::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
  }

  async fn exams_for(&self, ids: &[i64]) -> Result<Grouped<Exam>> {
    let sql = format!(
      "SELECT e.exam_id, e.name, e.plant_id, e.reference_urls, eq.question_id
         FROM exam_questions eq
         JOIN exams e ON e.exam_id = eq.exam_id
        WHERE eq.question_id IN ({})
        ORDER BY eq.question_id, e.exam_id",
      in_list(1, ids.len())
    );
    self.grouped(sql, ids, 4, Exam::from_row).await
  }

  async fn system_kas_for(&self, ids: &[i64]) -> Result<Grouped<CompleteSystemKa>> {
    let sql = format!(
      "SELECT sk.system_number, sk.ka_number, sk.system_ka_number, sk.category,
              sk.ro_importance, sk.sro_importance, sk.cfr_content,
              s.name, k.stem_id, st.statement,
              qsk.question_id
         FROM question_system_kas qsk
         JOIN system_kas sk
           ON sk.system_number = qsk.system_number AND sk.ka_number = qsk.ka_number
         JOIN systems s ON s.system_number = sk.system_number
         JOIN kas k     ON k.ka_number = sk.ka_number
         JOIN stems st  ON st.stem_id = k.stem_id
        WHERE qsk.question_id IN ({})
        ORDER BY qsk.question_id, sk.system_number, sk.ka_number",
      in_list(1, ids.len())
    );
    self.grouped(sql, ids, 10, complete_system_ka).await
  }

  async fn exam_questions_for(&self, ids: &[i64]) -> Result<Grouped<ExamQuestion>> {
    let sql = format!(
      "{} WHERE exam_questions.question_id IN ({})
       ORDER BY exam_questions.question_id, exam_questions.exam_id",
      ExamQuestion::select_sql(),
      in_list(1, ids.len())
    );
    self.grouped(sql, ids, 1, ExamQuestion::from_row).await
  }

  /// Run one batched read and fold its rows into per-question lists.
  /// `id_column` is the index of the `question_id` column in each row.
  async fn grouped<T, F>(
    &self,
    sql: String,
    ids: &[i64],
    id_column: usize,
    map: F,
  ) -> Result<Grouped<T>>
  where
    T: Send + 'static,
    F: Fn(&Row<'_>) -> rusqlite::Result<T> + Send + 'static,
  {
    let params: Vec<Value> = ids.iter().copied().map(Value::Integer).collect();
    self
      .db
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(params))?;
        let mut grouped: Grouped<T> = HashMap::new();
        while let Some(row) = rows.next()? {
          let question_id: i64 = row.get(id_column)?;
          grouped.entry(question_id).or_default().push(map(row)?);
        }
        Ok(grouped)
      })
      .await
  }
}

fn complete_system_ka(row: &Row<'_>) -> rusqlite::Result<CompleteSystemKa> {
  let system_ka = SystemKa::from_row(row)?;
  let system = System {
    system_number: system_ka.system_number.clone(),
    name:          row.get(7)?,
  };
  let stem = Stem { stem_id: row.get(8)?, statement: row.get(9)? };
  let knowledge_area = KnowledgeArea {
    ka_number: system_ka.ka_number.clone(),
    stem_id:   stem.stem_id.clone(),
  };
  Ok(CompleteSystemKa { system_ka, system, knowledge_area, stem })
}
