//! Parameterized `WHERE` clause construction.
//!
//! Every repository read and delete funnels through [`QueryBuilder`]. Values
//! are always bound positionally; column names must appear in the table's
//! code-defined whitelist.

use exambank_core::filter::FilterValue;
use rusqlite::types::Value;

use crate::{Error, Result};

/// A `WHERE ...` fragment and the parameters it binds, in placeholder order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
  /// Empty when there are no conditions.
  pub sql:    String,
  pub params: Vec<Value>,
}

impl WhereClause {
  pub fn is_empty(&self) -> bool { self.params.is_empty() }
}

#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder {
  table:   &'static str,
  allowed: &'static [&'static str],
}

impl QueryBuilder {
  pub const fn new(table: &'static str, allowed: &'static [&'static str]) -> Self {
    Self { table, allowed }
  }

  /// Build `WHERE table.c1 = ?1 AND table.c2 = ?2 ...`, binding values in the
  /// order given.
  pub fn build(
    &self,
    conditions: Vec<(&'static str, FilterValue)>,
  ) -> Result<WhereClause> {
    let mut terms = Vec::with_capacity(conditions.len());
    let mut params = Vec::with_capacity(conditions.len());

    for (i, (column, value)) in conditions.into_iter().enumerate() {
      if !self.allowed.contains(&column) {
        return Err(Error::Validation(exambank_core::Error::InvalidField {
          entity: self.table,
          field:  column,
          reason: "not a filterable column".into(),
        }));
      }
      terms.push(format!("{}.{column} = ?{}", self.table, i + 1));
      params.push(sql_value(value));
    }

    let sql = if terms.is_empty() {
      String::new()
    } else {
      format!("WHERE {}", terms.join(" AND "))
    };
    Ok(WhereClause { sql, params })
  }
}

pub(crate) fn sql_value(value: FilterValue) -> Value {
  match value {
    FilterValue::Integer(i) => Value::Integer(i),
    FilterValue::Text(s) => Value::Text(s),
  }
}

/// `n` placeholders for an `IN (...)` list, numbered from `?start`.
pub(crate) fn in_list(start: usize, n: usize) -> String {
  (start..start + n).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
  use super::*;

  const EXAMS: QueryBuilder = QueryBuilder::new("exams", &["exam_id", "name", "plant_id"]);

  #[test]
  fn empty_conditions_select_everything() {
    let clause = EXAMS.build(vec![]).unwrap();
    assert_eq!(clause.sql, "");
    assert!(clause.is_empty());
  }

  #[test]
  fn conditions_bind_positionally_in_order() {
    let clause = EXAMS
      .build(vec![
        ("plant_id", FilterValue::Integer(3)),
        ("name", FilterValue::Text("2025-RO'; DROP TABLE exams; --".into())),
      ])
      .unwrap();

    assert_eq!(clause.sql, "WHERE exams.plant_id = ?1 AND exams.name = ?2");
    assert_eq!(
      clause.params,
      vec![
        Value::Integer(3),
        Value::Text("2025-RO'; DROP TABLE exams; --".into()),
      ]
    );
  }

  #[test]
  fn unknown_column_is_rejected() {
    let err = EXAMS
      .build(vec![("1=1 OR name", FilterValue::Integer(1))])
      .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
  }

  #[test]
  fn in_list_numbers_placeholders() {
    assert_eq!(in_list(1, 3), "?1, ?2, ?3");
    assert_eq!(in_list(2, 2), "?2, ?3");
  }
}
