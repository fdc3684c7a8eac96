//! [`Repo`] — add / get / get_many / update / delete for any [`Record`], plus
//! the entity-specific lookups.

use std::marker::PhantomData;

use exambank_core::{
  Error as CoreError,
  exam::{Exam, ExamQuestion},
  filter::{Filter as _, SystemKaFilter},
  question::Question,
  taxonomy::SystemKa,
};
use rusqlite::{Connection, params, params_from_iter, types::Value};
use tracing::debug;

use crate::{
  Database, Error, Record, Result,
  error::Abort,
  query::{QueryBuilder, WhereClause, in_list},
  record::link_system_ka,
};

/// Repository over the table behind `T`.
///
/// Cloning is cheap; all repositories share one [`Database`].
pub struct Repo<T> {
  db:      Database,
  _record: PhantomData<fn() -> T>,
}

impl<T> Clone for Repo<T> {
  fn clone(&self) -> Self { Self { db: self.db.clone(), _record: PhantomData } }
}

impl<T: Record> Repo<T> {
  pub fn new(db: Database) -> Self { Self { db, _record: PhantomData } }

  fn builder() -> QueryBuilder { QueryBuilder::new(T::TABLE, T::COLUMNS) }

  /// Validate and insert `new`, returning its key. Nothing is written when
  /// validation fails.
  pub async fn add(&self, new: T::New) -> Result<T::Key> {
    self.db.ensure_open()?;
    T::validate_new(&new)?;
    let key = self
      .db
      .call(move |conn| {
        let tx = conn.transaction()?;
        let key = T::insert(&tx, new)?;
        tx.commit()?;
        Ok(key)
      })
      .await?;
    debug!(entity = T::ENTITY, ?key, "added");
    Ok(key)
  }

  /// The first row (in primary-key order) matching `filter`.
  pub async fn get(&self, filter: &T::Filter) -> Result<T> {
    self.db.ensure_open()?;
    let clause = Self::builder().build(filter.conditions())?;
    self
      .select(clause, Some(1))
      .await?
      .pop()
      .ok_or_else(|| Error::not_found(T::ENTITY, filter))
  }

  /// Every row matching `filter`, in primary-key order. The default filter
  /// scans the whole table.
  pub async fn get_many(&self, filter: &T::Filter) -> Result<Vec<T>> {
    self.db.ensure_open()?;
    let clause = Self::builder().build(filter.conditions())?;
    self.select(clause, None).await
  }

  /// Replace every non-key column of the row keyed by `record`.
  pub async fn update(&self, record: T) -> Result<()> {
    self.db.ensure_open()?;
    record.validate()?;
    let key = record.key();
    let affected = self
      .db
      .call(move |conn| {
        let tx = conn.transaction()?;
        let affected = T::update(&tx, &record)?;
        tx.commit()?;
        Ok(affected)
      })
      .await?;
    if affected == 0 {
      return Err(Error::not_found(T::ENTITY, key));
    }
    debug!(entity = T::ENTITY, ?key, "updated");
    Ok(())
  }

  /// Delete the row keyed by `key`; dependent rows cascade.
  pub async fn delete(&self, key: T::Key) -> Result<()> {
    self.db.ensure_open()?;
    let clause = Self::builder().build(T::key_filter(&key).conditions())?;
    if clause.is_empty() {
      return Err(Error::not_found(T::ENTITY, key));
    }
    let sql = format!("DELETE FROM {} {}", T::TABLE, clause.sql);
    let affected = self
      .db
      .call(move |conn| Ok(conn.execute(&sql, params_from_iter(clause.params))?))
      .await?;
    if affected == 0 {
      return Err(Error::not_found(T::ENTITY, key));
    }
    debug!(entity = T::ENTITY, ?key, "deleted");
    Ok(())
  }

  async fn select(&self, clause: WhereClause, limit: Option<usize>) -> Result<Vec<T>> {
    let mut sql = format!("{} {} ORDER BY {}", T::select_sql(), clause.sql, T::ORDER_BY);
    if let Some(limit) = limit {
      sql.push_str(&format!(" LIMIT {limit}"));
    }
    self.query(sql, clause.params).await
  }

  /// Run a read whose selected columns match [`Record::COLUMNS`].
  async fn query(&self, sql: String, params: Vec<Value>) -> Result<Vec<T>> {
    self
      .db
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params_from_iter(params), T::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
  }
}

// ─── Exams ───────────────────────────────────────────────────────────────────

impl Repo<Exam> {
  /// Exams the question appears on, by exam id.
  pub async fn get_by_question_id(&self, question_id: i64) -> Result<Vec<Exam>> {
    let sql = format!(
      "{} JOIN exam_questions eq ON eq.exam_id = exams.exam_id
       WHERE eq.question_id = ?1
       ORDER BY exams.exam_id",
      Exam::select_sql()
    );
    self.query(sql, vec![Value::Integer(question_id)]).await
  }
}

// ─── System KAs ──────────────────────────────────────────────────────────────

impl Repo<SystemKa> {
  /// System KAs the question is classified under, in key order.
  pub async fn get_by_question_id(&self, question_id: i64) -> Result<Vec<SystemKa>> {
    let sql = format!(
      "{} JOIN question_system_kas qsk
         ON qsk.system_number = system_kas.system_number
        AND qsk.ka_number = system_kas.ka_number
       WHERE qsk.question_id = ?1
       ORDER BY system_kas.system_number, system_kas.ka_number",
      SystemKa::select_sql()
    );
    self.query(sql, vec![Value::Integer(question_id)]).await
  }

  /// Look a system KA up by its derived key, e.g. `"301G.2"`.
  pub async fn get_by_number(&self, system_ka_number: &str) -> Result<SystemKa> {
    self
      .get(&SystemKaFilter {
        system_ka_number: Some(system_ka_number.to_owned()),
        ..SystemKaFilter::default()
      })
      .await
  }
}

// ─── Exam questions ──────────────────────────────────────────────────────────

impl Repo<ExamQuestion> {
  /// Placements on one exam, in question-number order.
  pub async fn get_by_exam(&self, exam_id: i64) -> Result<Vec<ExamQuestion>> {
    let sql = format!(
      "{} WHERE exam_questions.exam_id = ?1 ORDER BY exam_questions.question_number",
      ExamQuestion::select_sql()
    );
    self.query(sql, vec![Value::Integer(exam_id)]).await
  }
}

// ─── Question ↔ system KA junction ───────────────────────────────────────────

fn ensure_question_exists(conn: &Connection, question_id: i64) -> tokio_rusqlite::Result<()> {
  let exists: bool = conn.query_row(
    "SELECT EXISTS (SELECT 1 FROM questions WHERE question_id = ?1)",
    params![question_id],
    |row| row.get(0),
  )?;
  if !exists {
    return Err(Abort::missing(Question::ENTITY, question_id).into());
  }
  Ok(())
}

/// Placements of `question_id` whose primary system KA is not in `keep`.
fn primaries_outside(
  conn: &Connection,
  question_id: i64,
  keep: &[String],
) -> tokio_rusqlite::Result<Option<(i64, String)>> {
  let mut stmt = conn.prepare(
    "SELECT exam_id, main_system_ka_number FROM exam_questions
      WHERE question_id = ?1 AND main_system_ka_number IS NOT NULL
      ORDER BY exam_id",
  )?;
  let primaries = stmt
    .query_map(params![question_id], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(primaries.into_iter().find(|(_, number)| !keep.contains(number)))
}

impl Repo<Question> {
  /// Derived keys of the system KAs linked to the question.
  pub async fn system_ka_numbers(&self, question_id: i64) -> Result<Vec<String>> {
    self
      .db
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT system_number || ka_number FROM question_system_kas
            WHERE question_id = ?1
            ORDER BY system_number, ka_number",
        )?;
        let rows = stmt
          .query_map(params![question_id], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await
  }

  /// Classify the question under a system KA. Linking twice is a no-op.
  pub async fn link_system_ka(&self, question_id: i64, system_ka_number: &str) -> Result<()> {
    let number = system_ka_number.to_owned();
    self
      .db
      .call(move |conn| {
        let tx = conn.transaction()?;
        ensure_question_exists(&tx, question_id)?;
        link_system_ka(&tx, question_id, &number)?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    debug!(question_id, system_ka_number, "linked system KA");
    Ok(())
  }

  /// Remove a classification. Refused while any exam placement of the
  /// question still names it as primary.
  pub async fn unlink_system_ka(&self, question_id: i64, system_ka_number: &str) -> Result<()> {
    let number = system_ka_number.to_owned();
    let removed = self
      .db
      .call(move |conn| {
        let tx = conn.transaction()?;
        let others: Vec<String> = {
          let mut stmt = tx.prepare(
            "SELECT system_number || ka_number FROM question_system_kas
              WHERE question_id = ?1 AND system_number || ka_number != ?2",
          )?;
          stmt
            .query_map(params![question_id, number], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?
        };
        if let Some((exam_id, main)) = primaries_outside(&tx, question_id, &others)? {
          return Err(
            Abort::Invalid(CoreError::PrimarySystemKaInUse {
              question_id,
              exam_id,
              system_ka_number: main,
            })
            .into(),
          );
        }
        let removed = tx.execute(
          "DELETE FROM question_system_kas
            WHERE question_id = ?1 AND system_number || ka_number = ?2",
          params![question_id, number],
        )?;
        tx.commit()?;
        Ok(removed)
      })
      .await?;
    if removed == 0 {
      return Err(Error::not_found(
        "question system KA link",
        (question_id, system_ka_number),
      ));
    }
    debug!(question_id, system_ka_number, "unlinked system KA");
    Ok(())
  }

  /// Replace the question's classifications with exactly `system_ka_numbers`,
  /// atomically. Refused if a current primary pointer would be dropped.
  pub async fn set_system_kas(
    &self,
    question_id: i64,
    system_ka_numbers: Vec<String>,
  ) -> Result<()> {
    let count = system_ka_numbers.len();
    self
      .db
      .call(move |conn| {
        let tx = conn.transaction()?;
        ensure_question_exists(&tx, question_id)?;
        if let Some((exam_id, main)) = primaries_outside(&tx, question_id, &system_ka_numbers)? {
          return Err(
            Abort::Invalid(CoreError::PrimarySystemKaInUse {
              question_id,
              exam_id,
              system_ka_number: main,
            })
            .into(),
          );
        }

        // Only drop links that are going away; deleting a kept link would fire
        // the unlink trigger and clear a primary pointer that is still valid.
        if system_ka_numbers.is_empty() {
          tx.execute(
            "DELETE FROM question_system_kas WHERE question_id = ?1",
            params![question_id],
          )?;
        } else {
          let sql = format!(
            "DELETE FROM question_system_kas
              WHERE question_id = ?1 AND system_number || ka_number NOT IN ({})",
            in_list(2, system_ka_numbers.len())
          );
          let mut values = vec![Value::Integer(question_id)];
          values.extend(system_ka_numbers.iter().cloned().map(Value::Text));
          tx.execute(&sql, params_from_iter(values))?;
        }

        for number in &system_ka_numbers {
          link_system_ka(&tx, question_id, number)?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    debug!(question_id, count, "replaced system KA links");
    Ok(())
  }
}
