//! Boundary layer for the exam bank.
//!
//! [`dispatch`] maps an operation name and JSON payload onto the store and
//! answers with a [`DispatchResponse`] envelope. [`router`] exposes the same
//! dispatcher over HTTP.
//!
//! # Routes
//!
//! | Method | Path        | Notes |
//! |--------|-------------|-------|
//! | `POST` | `/rpc/{op}` | Body: the operation payload (may be empty) |
//! | `GET`  | `/health`   | Reports the schema version |

pub mod dispatch;
pub mod error;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Json, Router,
  body::Bytes,
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  routing::{get, post},
};
use exambank_store_sqlite::ExamBank;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

pub use dispatch::{DispatchResponse, dispatch, execute};
pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `exambank.toml` and
/// `EXAMBANK_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:          String,
  pub port:          u16,
  pub database_path: PathBuf,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the HTTP router over `bank`.
pub fn router(bank: Arc<ExamBank>) -> Router {
  Router::new()
    .route("/rpc/{op}", post(rpc))
    .route("/health", get(health))
    .layer(TraceLayer::new_for_http())
    .with_state(bank)
}

/// `POST /rpc/{op}`. An empty body is a `null` payload.
async fn rpc(
  State(bank): State<Arc<ExamBank>>,
  Path(op): Path<String>,
  body: Bytes,
) -> Response {
  let payload = if body.is_empty() {
    Value::Null
  } else {
    match serde_json::from_slice(&body) {
      Ok(payload) => payload,
      Err(source) => return ApiError::BadPayload { op, source }.into_response(),
    }
  };

  match execute(&bank, &op, payload).await {
    Ok(data) => Json(DispatchResponse::ok(data)).into_response(),
    Err(e) => {
      tracing::warn!(op = %op, error = %e, "operation failed");
      e.into_response()
    }
  }
}

/// `GET /health`
async fn health(State(bank): State<Arc<ExamBank>>) -> Response {
  match bank.schema_version().await {
    Ok(version) => Json(json!({ "status": "ok", "schema_version": version })).into_response(),
    Err(e) => (
      StatusCode::SERVICE_UNAVAILABLE,
      Json(json!({ "status": "unavailable", "error": e.to_string() })),
    )
      .into_response(),
  }
}

#[cfg(test)]
mod tests;
