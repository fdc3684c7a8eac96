//! The operation dispatcher.
//!
//! Every call names an operation `<entity>.<method>` and carries one JSON
//! payload. Entities are `plants`, `exams`, `questions`, `systems`, `kas`,
//! `stems`, `systemKas`, and `examQuestions`; each supports:
//!
//! | Method    | Payload                      | Data on success      |
//! |-----------|------------------------------|----------------------|
//! | `add`     | the entity's "new" input     | the assigned key     |
//! | `get`     | the entity's filter          | one entity           |
//! | `getMany` | the entity's filter or null  | a list of entities   |
//! | `update`  | the full entity              | null                 |
//! | `delete`  | the entity's key             | null                 |
//!
//! Keys are a bare number (`plants`, `exams`, `questions`), a bare string
//! (`systems`, `kas`, `stems`), or an object of the key columns (`systemKas`,
//! `examQuestions`). The remaining operations are listed on [`execute`].

use exambank_core::{filter::QuestionFilter, question::CompleteQuestion};
use exambank_store_sqlite::{ExamBank, Record, Repo};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, warn};

use crate::ApiError;

/// The envelope every operation answers with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResponse {
  pub success: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub data:    Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error:   Option<String>,
}

impl DispatchResponse {
  pub fn ok(data: Value) -> Self { Self { success: true, data: Some(data), error: None } }

  pub fn failure(error: &ApiError) -> Self {
    Self { success: false, data: None, error: Some(error.to_string()) }
  }
}

/// Run `op` and wrap the outcome in a [`DispatchResponse`]. Never fails;
/// every error becomes `success: false` with a message.
pub async fn dispatch(bank: &ExamBank, op: &str, payload: Value) -> DispatchResponse {
  match execute(bank, op, payload).await {
    Ok(data) => DispatchResponse::ok(data),
    Err(e) => {
      warn!(op, error = %e, "operation failed");
      DispatchResponse::failure(&e)
    }
  }
}

#[derive(Deserialize)]
struct ByQuestion {
  question_id: i64,
}

#[derive(Deserialize)]
struct ByExam {
  exam_id: i64,
}

#[derive(Deserialize)]
struct ByNumber {
  system_ka_number: String,
}

#[derive(Deserialize)]
struct Link {
  question_id:      i64,
  system_ka_number: String,
}

#[derive(Deserialize)]
struct LinkSet {
  question_id:       i64,
  system_ka_numbers: Vec<String>,
}

/// Run `op`, returning its data.
///
/// Besides the CRUD methods every entity has:
///
/// - `exams.getByQuestionId`, `systemKas.getByQuestionId`: `{question_id}`
/// - `systemKas.getByNumber`: `{system_ka_number}`
/// - `examQuestions.getByExam`, `questions.getByExam`: `{exam_id}`
/// - `questions.getComplete`: `{question_id}`
/// - `questions.getCompleteMany`: a question filter
/// - `questions.linkSystemKa`, `questions.unlinkSystemKa`:
///   `{question_id, system_ka_number}`
/// - `questions.setSystemKas`: `{question_id, system_ka_numbers}`
/// - `schema.version`: no payload
pub async fn execute(bank: &ExamBank, op: &str, payload: Value) -> Result<Value, ApiError> {
  debug!(op, "dispatching");
  let Some((entity, method)) = op.split_once('.') else {
    return Err(ApiError::UnknownOperation(op.to_owned()));
  };

  match (entity, method) {
    ("exams", "getByQuestionId") => {
      let args: ByQuestion = decode(op, payload)?;
      encode(&bank.exams().get_by_question_id(args.question_id).await?)
    }
    ("systemKas", "getByQuestionId") => {
      let args: ByQuestion = decode(op, payload)?;
      encode(&bank.system_kas().get_by_question_id(args.question_id).await?)
    }
    ("systemKas", "getByNumber") => {
      let args: ByNumber = decode(op, payload)?;
      encode(&bank.system_kas().get_by_number(&args.system_ka_number).await?)
    }
    ("examQuestions", "getByExam") => {
      let args: ByExam = decode(op, payload)?;
      encode(&bank.exam_questions().get_by_exam(args.exam_id).await?)
    }
    ("questions", "getComplete") => {
      let args: ByQuestion = decode(op, payload)?;
      encode(&bank.aggregator().get_complete(args.question_id).await?)
    }
    ("questions", "getCompleteMany") => {
      let filter: QuestionFilter = decode(op, payload)?;
      let complete: Vec<CompleteQuestion> =
        bank.aggregator().get_complete_many(&filter).await?;
      encode(&complete)
    }
    ("questions", "getByExam") => {
      let args: ByExam = decode(op, payload)?;
      encode(&bank.aggregator().get_questions_by_exam(args.exam_id).await?)
    }
    ("questions", "linkSystemKa") => {
      let args: Link = decode(op, payload)?;
      bank
        .questions()
        .link_system_ka(args.question_id, &args.system_ka_number)
        .await?;
      Ok(Value::Null)
    }
    ("questions", "unlinkSystemKa") => {
      let args: Link = decode(op, payload)?;
      bank
        .questions()
        .unlink_system_ka(args.question_id, &args.system_ka_number)
        .await?;
      Ok(Value::Null)
    }
    ("questions", "setSystemKas") => {
      let args: LinkSet = decode(op, payload)?;
      bank
        .questions()
        .set_system_kas(args.question_id, args.system_ka_numbers)
        .await?;
      Ok(Value::Null)
    }
    ("schema", "version") => encode(&bank.schema_version().await?),

    ("plants", method) => crud(bank.plants(), op, method, payload).await,
    ("exams", method) => crud(bank.exams(), op, method, payload).await,
    ("questions", method) => crud(bank.questions(), op, method, payload).await,
    ("systems", method) => crud(bank.systems(), op, method, payload).await,
    ("kas", method) => crud(bank.kas(), op, method, payload).await,
    ("stems", method) => crud(bank.stems(), op, method, payload).await,
    ("systemKas", method) => crud(bank.system_kas(), op, method, payload).await,
    ("examQuestions", method) => crud(bank.exam_questions(), op, method, payload).await,

    _ => Err(ApiError::UnknownOperation(op.to_owned())),
  }
}

/// The five methods every repository supports.
async fn crud<T>(repo: Repo<T>, op: &str, method: &str, payload: Value) -> Result<Value, ApiError>
where
  T: Record + Serialize + DeserializeOwned,
  T::New: DeserializeOwned,
  T::Key: Serialize + DeserializeOwned,
  T::Filter: DeserializeOwned,
{
  match method {
    "add" => encode(&repo.add(decode(op, payload)?).await?),
    "get" => {
      let filter: T::Filter = decode(op, payload)?;
      encode(&repo.get(&filter).await?)
    }
    "getMany" => {
      let filter: T::Filter = decode(op, payload)?;
      encode(&repo.get_many(&filter).await?)
    }
    "update" => {
      repo.update(decode(op, payload)?).await?;
      Ok(Value::Null)
    }
    "delete" => {
      repo.delete(decode(op, payload)?).await?;
      Ok(Value::Null)
    }
    _ => Err(ApiError::UnknownOperation(op.to_owned())),
  }
}

/// Decode an operation payload. A missing (`null`) payload reads as an empty
/// object, so filters and argument-free calls may omit it.
fn decode<T: DeserializeOwned>(op: &str, payload: Value) -> Result<T, ApiError> {
  let payload = match payload {
    Value::Null => Value::Object(Default::default()),
    other => other,
  };
  serde_json::from_value(payload)
    .map_err(|source| ApiError::BadPayload { op: op.to_owned(), source })
}

fn encode<T: Serialize>(value: &T) -> Result<Value, ApiError> {
  serde_json::to_value(value)
    .map_err(|e| ApiError::Store(exambank_store_sqlite::Error::Json(e)))
}
