//! Dispatcher and router tests against an in-memory store.

use std::sync::Arc;

use axum::{
  body::Body,
  http::{Request, StatusCode},
};
use exambank_store_sqlite::ExamBank;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use super::*;

async fn bank() -> ExamBank {
  ExamBank::open_in_memory().await.unwrap()
}

fn question(text: &str) -> Value {
  json!({
    "question_text": text,
    "answer_a": "Pump A",
    "answer_b": "Pump B",
    "answer_c": "Pump C",
    "answer_d": "Pump D",
    "correct_answer": "B",
    "exam_level": "RO",
    "cognitive_level": "memory",
  })
}

async fn ok(bank: &ExamBank, op: &str, payload: Value) -> Value {
  let response = dispatch(bank, op, payload).await;
  assert!(response.success, "{op} failed: {:?}", response.error);
  response.data.unwrap()
}

// ─── Dispatcher ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn crud_round_trip_through_the_envelope() {
  let bank = bank().await;

  let plant_id = ok(&bank, "plants.add", json!({ "name": "Davis-Besse" })).await;
  let exam_id = ok(
    &bank,
    "exams.add",
    json!({ "name": "2025-RO", "plant_id": plant_id, "reference_urls": ["https://example.org/key"] }),
  )
  .await;

  let exam = ok(&bank, "exams.get", json!({ "exam_id": exam_id })).await;
  assert_eq!(exam["name"], "2025-RO");
  assert_eq!(exam["reference_urls"], json!(["https://example.org/key"]));

  ok(
    &bank,
    "exams.update",
    json!({ "exam_id": exam_id, "name": "2025-SRO", "plant_id": plant_id }),
  )
  .await;
  let exams = ok(&bank, "exams.getMany", Value::Null).await;
  assert_eq!(exams.as_array().unwrap().len(), 1);
  assert_eq!(exams[0]["name"], "2025-SRO");

  assert_eq!(ok(&bank, "exams.delete", exam_id).await, Value::Null);
  assert_eq!(ok(&bank, "exams.getMany", json!({})).await, json!([]));
}

#[tokio::test]
async fn davis_besse_complete_question() {
  let bank = bank().await;
  let plant_id = ok(&bank, "plants.add", json!({ "name": "Davis-Besse" })).await;
  let exam_id = ok(&bank, "exams.add", json!({ "name": "2025-RO", "plant_id": plant_id })).await;
  ok(&bank, "systems.add", json!({ "system_number": "301", "name": "Main Steam" })).await;
  ok(&bank, "stems.add", json!({ "stem_id": "G", "statement": "Generic" })).await;
  ok(&bank, "kas.add", json!({ "ka_number": "G.2", "stem_id": "G" })).await;
  let key = ok(
    &bank,
    "systemKas.add",
    json!({ "system_number": "301", "ka_number": "G.2", "ro_importance": 3.1 }),
  )
  .await;
  assert_eq!(key, json!({ "system_number": "301", "ka_number": "G.2" }));

  let mut new = question("Which pump trips first?");
  new["system_ka_numbers"] = json!(["301G.2"]);
  new["placements"] = json!([
    { "exam_id": exam_id, "question_number": 1, "main_system_ka_number": "301G.2" }
  ]);
  let question_id = ok(&bank, "questions.add", new).await;

  let complete = ok(&bank, "questions.getComplete", json!({ "question_id": question_id })).await;
  assert_eq!(complete["correct_answer"], "B");
  assert_eq!(complete["exams"][0]["name"], "2025-RO");
  assert_eq!(complete["system_kas"][0]["system_ka_number"], "301G.2");
  assert_eq!(complete["system_kas"][0]["stem"]["statement"], "Generic");
  assert_eq!(complete["exam_questions"][0]["main_system_ka_number"], "301G.2");

  let by_exam = ok(&bank, "questions.getByExam", json!({ "exam_id": exam_id })).await;
  assert_eq!(by_exam[0]["question_id"], question_id);

  let many = ok(&bank, "questions.getCompleteMany", json!({ "correct_answer": "B" })).await;
  assert_eq!(many.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn junction_operations() {
  let bank = bank().await;
  ok(&bank, "systems.add", json!({ "system_number": "301", "name": "Main Steam" })).await;
  ok(&bank, "stems.add", json!({ "stem_id": "G", "statement": "Generic" })).await;
  for ka in ["G.2", "G.3"] {
    ok(&bank, "kas.add", json!({ "ka_number": ka, "stem_id": "G" })).await;
    ok(&bank, "systemKas.add", json!({ "system_number": "301", "ka_number": ka })).await;
  }
  let question_id = ok(&bank, "questions.add", question("Links")).await;

  let link = json!({ "question_id": question_id, "system_ka_number": "301G.2" });
  ok(&bank, "questions.linkSystemKa", link.clone()).await;
  let linked = ok(&bank, "systemKas.getByQuestionId", json!({ "question_id": question_id })).await;
  assert_eq!(linked[0]["system_ka_number"], "301G.2");

  ok(
    &bank,
    "questions.setSystemKas",
    json!({ "question_id": question_id, "system_ka_numbers": ["301G.3"] }),
  )
  .await;
  let one = ok(&bank, "systemKas.getByNumber", json!({ "system_ka_number": "301G.3" })).await;
  assert_eq!(one["ka_number"], "G.3");

  let response = dispatch(&bank, "questions.unlinkSystemKa", link).await;
  assert!(!response.success);
  assert!(response.error.unwrap().contains("not found"));
}

#[tokio::test]
async fn not_found_becomes_a_failure_envelope() {
  let bank = bank().await;
  let response = dispatch(&bank, "plants.get", json!({ "plant_id": 7 })).await;
  assert!(!response.success);
  assert_eq!(response.data, None);
  assert!(response.error.unwrap().contains("plant not found"));
}

#[tokio::test]
async fn unknown_operations_are_rejected() {
  let bank = bank().await;
  for op in ["plants.explode", "reactors.get", "noseparator"] {
    let response = dispatch(&bank, op, Value::Null).await;
    assert!(!response.success);
    assert_eq!(response.error.unwrap(), format!("unknown operation: {op}"));
  }
}

#[tokio::test]
async fn malformed_payloads_are_validation_failures() {
  let bank = bank().await;

  let err = execute(&bank, "plants.add", json!({ "label": 3 })).await.unwrap_err();
  assert!(matches!(err, ApiError::BadPayload { .. }));
  assert_eq!(err.status(), StatusCode::BAD_REQUEST);

  let response = dispatch(&bank, "exams.add", json!({ "name": "2025-RO" })).await;
  assert!(!response.success);
  assert!(response.error.unwrap().starts_with("validation error"));

  let response = dispatch(&bank, "plants.update", json!({ "name": "no key" })).await;
  assert!(response.error.unwrap().starts_with("validation error"));
}

#[tokio::test]
async fn schema_version_reports_the_target() {
  let bank = bank().await;
  assert_eq!(ok(&bank, "schema.version", Value::Null).await, json!(3));
}

// ─── Router ───────────────────────────────────────────────────────────────────

async fn call(bank: Arc<ExamBank>, uri: &str, body: &str) -> (StatusCode, Value) {
  let req = Request::builder()
    .method("POST")
    .uri(uri)
    .header("content-type", "application/json")
    .body(Body::from(body.to_string()))
    .unwrap();
  let resp = router(bank).oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn rpc_route_wraps_results() {
  let bank = Arc::new(bank().await);

  let (status, body) = call(bank.clone(), "/rpc/plants.add", r#"{"name":"Perry"}"#).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!({ "success": true, "data": 1 }));

  let (status, body) = call(bank.clone(), "/rpc/plants.getMany", "").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["data"][0]["name"], "Perry");

  let (status, body) = call(bank.clone(), "/rpc/plants.get", r#"{"plant_id":99}"#).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["success"], false);

  let (status, _) = call(bank.clone(), "/rpc/exams.add", r#"{"name":"x","plant_id":42}"#).await;
  assert_eq!(status, StatusCode::CONFLICT);

  let (status, _) = call(bank, "/rpc/plants.add", "{not json").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reports_schema_version() {
  let bank = Arc::new(bank().await);
  let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
  let resp = router(bank.clone()).oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::OK);

  bank.close().await.unwrap();
  let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
  let resp = router(bank).oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}
