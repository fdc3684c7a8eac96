//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use exambank_store_sqlite::ErrorKind;
use thiserror::Error;

use crate::DispatchResponse;

/// An error returned by the dispatcher.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unknown operation: {0}")]
  UnknownOperation(String),

  /// The payload did not decode into the operation's input type. Reported
  /// the same way as a validation failure.
  #[error("validation error: invalid payload for {op}: {source}")]
  BadPayload {
    op:     String,
    #[source]
    source: serde_json::Error,
  },

  #[error(transparent)]
  Store(#[from] exambank_store_sqlite::Error),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::UnknownOperation(_) => StatusCode::NOT_FOUND,
      ApiError::BadPayload { .. } => StatusCode::BAD_REQUEST,
      ApiError::Store(e) => match e.kind() {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Constraint => StatusCode::CONFLICT,
        ErrorKind::Closing => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Migration | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    (self.status(), Json(DispatchResponse::failure(&self))).into_response()
  }
}
