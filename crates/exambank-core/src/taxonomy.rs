//! The classification taxonomy: systems, knowledge areas, their stems, and
//! the system/KA pairings that questions are filed under.

use serde::{Deserialize, Serialize};

use crate::{Result, error::require_text};

// ─── Systems ─────────────────────────────────────────────────────────────────

/// A plant system, identified by its system number (e.g. `"301"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct System {
  pub system_number: String,
  pub name:          String,
}

impl System {
  pub fn validate(&self) -> Result<()> {
    require_text("system", "system_number", &self.system_number)?;
    require_text("system", "name", &self.name)
  }
}

// ─── Stems ───────────────────────────────────────────────────────────────────

/// The long-form statement shared by one or more knowledge areas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stem {
  pub stem_id:   String,
  pub statement: String,
}

impl Stem {
  pub fn validate(&self) -> Result<()> {
    require_text("stem", "stem_id", &self.stem_id)?;
    require_text("stem", "statement", &self.statement)
  }
}

// ─── Knowledge areas ─────────────────────────────────────────────────────────

/// A knowledge area (e.g. `"G.2"`), worded by exactly one stem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeArea {
  pub ka_number: String,
  pub stem_id:   String,
}

impl KnowledgeArea {
  pub fn validate(&self) -> Result<()> {
    require_text("knowledge area", "ka_number", &self.ka_number)?;
    require_text("knowledge area", "stem_id", &self.stem_id)
  }
}

// ─── System KAs ──────────────────────────────────────────────────────────────

/// Composite primary key of a [`SystemKa`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SystemKaKey {
  pub system_number: String,
  pub ka_number:     String,
}

impl SystemKaKey {
  pub fn new(system_number: impl Into<String>, ka_number: impl Into<String>) -> Self {
    Self { system_number: system_number.into(), ka_number: ka_number.into() }
  }

  /// The denormalised lookup key: system number immediately followed by the
  /// KA number, e.g. `"301"` + `"G.2"` = `"301G.2"`.
  pub fn system_ka_number(&self) -> String {
    format!("{}{}", self.system_number, self.ka_number)
  }
}

/// Input for creating a [`SystemKa`]. The derived `system_ka_number` is not
/// part of the input; the store computes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSystemKa {
  pub system_number:  String,
  pub ka_number:      String,
  #[serde(default)]
  pub category:       Option<String>,
  #[serde(default)]
  pub ro_importance:  Option<f64>,
  #[serde(default)]
  pub sro_importance: Option<f64>,
  #[serde(default)]
  pub cfr_content:    Option<String>,
}

impl NewSystemKa {
  pub fn validate(&self) -> Result<()> {
    require_text("system KA", "system_number", &self.system_number)?;
    require_text("system KA", "ka_number", &self.ka_number)?;
    validate_importance("ro_importance", self.ro_importance)?;
    validate_importance("sro_importance", self.sro_importance)
  }

  pub fn key(&self) -> SystemKaKey {
    SystemKaKey::new(self.system_number.clone(), self.ka_number.clone())
  }
}

/// A system/knowledge-area pairing with its exam-relevance metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemKa {
  pub system_number:    String,
  pub ka_number:        String,
  /// Always `system_number + ka_number`. Ignored on update.
  pub system_ka_number: String,
  pub category:         Option<String>,
  pub ro_importance:    Option<f64>,
  pub sro_importance:   Option<f64>,
  pub cfr_content:      Option<String>,
}

impl SystemKa {
  pub fn key(&self) -> SystemKaKey {
    SystemKaKey::new(self.system_number.clone(), self.ka_number.clone())
  }

  pub fn validate(&self) -> Result<()> {
    validate_importance("ro_importance", self.ro_importance)?;
    validate_importance("sro_importance", self.sro_importance)
  }
}

fn validate_importance(field: &'static str, value: Option<f64>) -> Result<()> {
  match value {
    Some(v) if !v.is_finite() || v < 0.0 => Err(crate::Error::InvalidField {
      entity: "system KA",
      field,
      reason: format!("importance must be a non-negative number, got {v}"),
    }),
    _ => Ok(()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn derived_key_is_plain_concatenation() {
    let key = SystemKaKey::new("301", "G.2");
    assert_eq!(key.system_ka_number(), "301G.2");
  }

  #[test]
  fn negative_importance_is_rejected() {
    let input = NewSystemKa {
      system_number:  "301".into(),
      ka_number:      "G.2".into(),
      category:       None,
      ro_importance:  Some(-1.0),
      sro_importance: None,
      cfr_content:    None,
    };
    assert!(matches!(
      input.validate(),
      Err(crate::Error::InvalidField { field: "ro_importance", .. })
    ));
  }
}
