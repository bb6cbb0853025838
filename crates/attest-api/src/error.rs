//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("internal error: {0}")]
  Internal(String),
}

impl From<attest_core::Error> for ApiError {
  fn from(e: attest_core::Error) -> Self {
    use attest_core::Error as E;
    match &e {
      E::Validation(_) => Self::BadRequest(e.to_string()),

      E::IssuerNotAuthorized { .. } | E::ReauthorizationDisabled => {
        Self::Forbidden(e.to_string())
      }

      E::SubjectNotFound(_)
      | E::DocumentNotFound(_)
      | E::AuthorizationNotFound(_)
      | E::NoOriginalDocument(_)
      | E::VerificationNotFound(_) => Self::NotFound(e.to_string()),

      E::SubjectExists(_)
      | E::FingerprintOwnedByOther(_)
      | E::AlreadyAuthorized { .. }
      | E::InvalidTransition { .. }
      | E::OriginalAlreadyRecorded(_)
      | E::OriginalRetained(_) => Self::Conflict(e.to_string()),

      E::Serialization(_) | E::Store(_) | E::Storage(_) => {
        Self::Internal(e.to_string())
      }
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
