//! Handlers for `/subjects` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/subjects` | Body: `{"subject_id":"EMP001"}`; mints the subject hash |
//! | `GET`  | `/subjects/:id` | 404 if not found |

use std::sync::Arc;

use attest_core::{
  ProvenanceEngine, storage::DocumentStorage, store::ProvenanceStore,
  subject::Subject,
};
use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub subject_id: String,
}

/// `POST /subjects` — body: `{"subject_id":"EMP001"}`
pub async fn create<S, D>(
  State(engine): State<Arc<ProvenanceEngine<S, D>>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ProvenanceStore,
  D: DocumentStorage,
{
  let subject = engine.register_subject(&body.subject_id).await?;
  Ok((StatusCode::CREATED, Json(subject)))
}

/// `GET /subjects/:id`
pub async fn get_one<S, D>(
  State(engine): State<Arc<ProvenanceEngine<S, D>>>,
  Path(id): Path<String>,
) -> Result<Json<Subject>, ApiError>
where
  S: ProvenanceStore,
  D: DocumentStorage,
{
  Ok(Json(engine.subject(&id).await?))
}
