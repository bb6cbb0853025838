//! Handlers for the verification protocol endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/verify` | Body: [`VerifyBody`]; 200 for match *and* mismatch |
//! | `GET`  | `/subjects/:id/verifications` | Newest first |
//! | `GET`  | `/verifications/:id/audit` | Newest first |
//!
//! A mismatch is a completed check with a negative verdict and still returns
//! 200. Only a check that could not be performed — malformed input, unknown
//! subject, no original on record, unauthorized issuer — maps to an error
//! status.

use std::sync::Arc;

use attest_core::{
  ProvenanceEngine,
  audit::AuditLogEntry,
  storage::DocumentStorage,
  store::ProvenanceStore,
  verification::{VerificationOutcome, VerificationRequest},
};
use axum::{
  Json,
  extract::{Path, State},
  http::HeaderMap,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{actor_headers, error::ApiError};

// ─── Verify ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct VerifyBody {
  pub subject_id:  String,
  pub fingerprint: String,
  /// If set, the issuer must hold an approved authorization for the subject.
  pub issuer_id:   Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
  pub request_id:        Uuid,
  pub is_valid:          bool,
  pub message:           String,
  pub verification_date: Option<DateTime<Utc>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub subject_details:   Option<serde_json::Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub preview_ref:       Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub download_ref:      Option<String>,
}

impl From<VerificationOutcome> for VerifyResponse {
  fn from(outcome: VerificationOutcome) -> Self {
    let message = outcome.message().to_owned();
    let VerificationOutcome { request, result } = outcome;
    let (subject_details, preview_ref, download_ref) = match result {
      Some(r) => (Some(r.subject_details), Some(r.preview_ref), Some(r.download_ref)),
      None => (None, None, None),
    };
    Self {
      request_id: request.request_id,
      is_valid: request.is_valid,
      message,
      verification_date: request.verification_date,
      subject_details,
      preview_ref,
      download_ref,
    }
  }
}

/// `POST /verify`
pub async fn verify<S, D>(
  State(engine): State<Arc<ProvenanceEngine<S, D>>>,
  headers: HeaderMap,
  Json(body): Json<VerifyBody>,
) -> Result<Json<VerifyResponse>, ApiError>
where
  S: ProvenanceStore,
  D: DocumentStorage,
{
  let (_, ip) = actor_headers(&headers);
  let outcome = engine
    .verify(
      &body.subject_id,
      &body.fingerprint,
      ip.as_deref(),
      body.issuer_id.as_deref(),
    )
    .await?;
  Ok(Json(VerifyResponse::from(outcome)))
}

// ─── History ──────────────────────────────────────────────────────────────────

/// `GET /subjects/:id/verifications`
pub async fn list_for_subject<S, D>(
  State(engine): State<Arc<ProvenanceEngine<S, D>>>,
  Path(id): Path<String>,
) -> Result<Json<Vec<VerificationRequest>>, ApiError>
where
  S: ProvenanceStore,
  D: DocumentStorage,
{
  Ok(Json(engine.subject_verifications(&id).await?))
}

/// `GET /verifications/:id/audit`
pub async fn audit<S, D>(
  State(engine): State<Arc<ProvenanceEngine<S, D>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<AuditLogEntry>>, ApiError>
where
  S: ProvenanceStore,
  D: DocumentStorage,
{
  Ok(Json(engine.verification_audit(id).await?))
}
