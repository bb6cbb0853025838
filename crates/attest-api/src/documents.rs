//! Handlers for the document ledger endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/documents` | Body: [`SubmitBody`]; content is base64 |
//! | `GET`  | `/subjects/:id/documents` | Insertion-ordered history |
//! | `GET`  | `/documents/:fingerprint/content` | Raw bytes, original media type |
//! | `POST` | `/documents/:fingerprint/retract` | 409 for the recorded original |
//! | `POST` | `/documents/:fingerprint/promote` | Audited re-promotion |

use std::sync::Arc;

use attest_core::{
  ProvenanceEngine,
  document::Document,
  engine::DocumentSubmission,
  storage::DocumentStorage,
  store::ProvenanceStore,
};
use axum::{
  Json,
  extract::{Path, State},
  http::{HeaderMap, StatusCode, header},
  response::IntoResponse,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use serde::Deserialize;

use crate::{actor_headers, error::ApiError};

// ─── Submit ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
  pub subject_id:         String,
  /// Base64-encoded document bytes.
  pub content:            String,
  pub declared_name:      String,
  pub media_type:         String,
  #[serde(default)]
  pub designate_original: bool,
}

/// `POST /documents` — returns 201 + the recorded [`Document`].
pub async fn create<S, D>(
  State(engine): State<Arc<ProvenanceEngine<S, D>>>,
  Json(body): Json<SubmitBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ProvenanceStore,
  D: DocumentStorage,
{
  let content = B64
    .decode(&body.content)
    .map_err(|e| ApiError::BadRequest(format!("content is not valid base64: {e}")))?;

  let document = engine
    .submit_document(DocumentSubmission {
      subject_id:         body.subject_id,
      content,
      declared_name:      body.declared_name,
      media_type:         body.media_type,
      designate_original: body.designate_original,
    })
    .await?;
  Ok((StatusCode::CREATED, Json(document)))
}

// ─── History ──────────────────────────────────────────────────────────────────

/// `GET /subjects/:id/documents`
pub async fn history<S, D>(
  State(engine): State<Arc<ProvenanceEngine<S, D>>>,
  Path(id): Path<String>,
) -> Result<Json<Vec<Document>>, ApiError>
where
  S: ProvenanceStore,
  D: DocumentStorage,
{
  Ok(Json(engine.document_history(&id).await?))
}

// ─── Content ──────────────────────────────────────────────────────────────────

/// `GET /documents/:fingerprint/content` — the stored bytes, served with the
/// media type declared at upload.
pub async fn content<S, D>(
  State(engine): State<Arc<ProvenanceEngine<S, D>>>,
  Path(fingerprint): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ProvenanceStore,
  D: DocumentStorage,
{
  let document = engine.document(&fingerprint).await?;
  let bytes = engine.fetch_document(&fingerprint).await?;
  Ok(([(header::CONTENT_TYPE, document.media_type)], bytes))
}

// ─── Retract ──────────────────────────────────────────────────────────────────

/// `POST /documents/:fingerprint/retract`
pub async fn retract<S, D>(
  State(engine): State<Arc<ProvenanceEngine<S, D>>>,
  Path(fingerprint): Path<String>,
) -> Result<StatusCode, ApiError>
where
  S: ProvenanceStore,
  D: DocumentStorage,
{
  engine.retract_document(&fingerprint).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Promote ──────────────────────────────────────────────────────────────────

/// `POST /documents/:fingerprint/promote`
pub async fn promote<S, D>(
  State(engine): State<Arc<ProvenanceEngine<S, D>>>,
  Path(fingerprint): Path<String>,
  headers: HeaderMap,
) -> Result<Json<Document>, ApiError>
where
  S: ProvenanceStore,
  D: DocumentStorage,
{
  let (actor, ip) = actor_headers(&headers);
  let document = engine
    .promote_original(&fingerprint, actor.as_deref(), ip.as_deref())
    .await?;
  Ok(Json(document))
}
