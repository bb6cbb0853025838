//! Handlers for issuer-authorization endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/authorizations` | Body: `{issuer_id, subject_id, reason?}` |
//! | `POST`   | `/authorizations/:id/approve` | Body: `{reason?}` |
//! | `POST`   | `/authorizations/:id/reject` | Body: `{reason?}` |
//! | `POST`   | `/authorizations/:id/reauthorize` | 403 unless the policy allows |
//! | `DELETE` | `/issuers/:id/authorizations/:subject_id` | Revoke |
//! | `GET`    | `/authorizations/:id/audit` | Newest first |
//! | `GET`    | `/issuers/:id/authorizations` | All rows for an issuer |
//! | `GET`    | `/issuers/:id/policy` | `{auto_approve}` |
//! | `PUT`    | `/issuers/:id/policy` | `{auto_approve}` |

use std::sync::Arc;

use attest_core::{
  ProvenanceEngine,
  audit::AuditLogEntry,
  authorization::{Authorization, IssuerPolicy},
  storage::DocumentStorage,
  store::ProvenanceStore,
};
use axum::{
  Json,
  extract::{Path, State},
  http::{HeaderMap, StatusCode},
  response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{actor_headers, error::ApiError};

// ─── Request ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub issuer_id:  String,
  pub subject_id: String,
  pub reason:     Option<String>,
}

/// `POST /authorizations` — returns 201 + the `Pending` (or auto-approved)
/// authorization.
pub async fn create<S, D>(
  State(engine): State<Arc<ProvenanceEngine<S, D>>>,
  headers: HeaderMap,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ProvenanceStore,
  D: DocumentStorage,
{
  let (actor, ip) = actor_headers(&headers);
  let auth = engine
    .request_authorization(
      &body.issuer_id,
      &body.subject_id,
      body.reason,
      actor.as_deref(),
      ip.as_deref(),
    )
    .await?;
  Ok((StatusCode::CREATED, Json(auth)))
}

// ─── Transitions ──────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct TransitionBody {
  pub reason: Option<String>,
}

/// `POST /authorizations/:id/approve`
pub async fn approve<S, D>(
  State(engine): State<Arc<ProvenanceEngine<S, D>>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  Json(body): Json<TransitionBody>,
) -> Result<Json<Authorization>, ApiError>
where
  S: ProvenanceStore,
  D: DocumentStorage,
{
  let (actor, ip) = actor_headers(&headers);
  let auth = engine
    .approve_authorization(id, body.reason, actor.as_deref(), ip.as_deref())
    .await?;
  Ok(Json(auth))
}

/// `POST /authorizations/:id/reject`
pub async fn reject<S, D>(
  State(engine): State<Arc<ProvenanceEngine<S, D>>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  Json(body): Json<TransitionBody>,
) -> Result<Json<Authorization>, ApiError>
where
  S: ProvenanceStore,
  D: DocumentStorage,
{
  let (actor, ip) = actor_headers(&headers);
  let auth = engine
    .reject_authorization(id, body.reason, actor.as_deref(), ip.as_deref())
    .await?;
  Ok(Json(auth))
}

/// `POST /authorizations/:id/reauthorize` — resets a terminal row to
/// `Pending`; refused with 403 under the default policy.
pub async fn reauthorize<S, D>(
  State(engine): State<Arc<ProvenanceEngine<S, D>>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  Json(body): Json<TransitionBody>,
) -> Result<Json<Authorization>, ApiError>
where
  S: ProvenanceStore,
  D: DocumentStorage,
{
  let (actor, ip) = actor_headers(&headers);
  let auth = engine
    .reauthorize(id, body.reason, actor.as_deref(), ip.as_deref())
    .await?;
  Ok(Json(auth))
}

/// `DELETE /authorizations/:issuer_id/:subject_id`
pub async fn revoke<S, D>(
  State(engine): State<Arc<ProvenanceEngine<S, D>>>,
  Path((issuer_id, subject_id)): Path<(String, String)>,
  headers: HeaderMap,
) -> Result<Json<Authorization>, ApiError>
where
  S: ProvenanceStore,
  D: DocumentStorage,
{
  let (actor, ip) = actor_headers(&headers);
  let auth = engine
    .revoke_authorization(&issuer_id, &subject_id, None, actor.as_deref(), ip.as_deref())
    .await?;
  Ok(Json(auth))
}

// ─── Queries ──────────────────────────────────────────────────────────────────

/// `GET /issuers/:id/authorizations`
pub async fn list_for_issuer<S, D>(
  State(engine): State<Arc<ProvenanceEngine<S, D>>>,
  Path(id): Path<String>,
) -> Result<Json<Vec<Authorization>>, ApiError>
where
  S: ProvenanceStore,
  D: DocumentStorage,
{
  Ok(Json(engine.issuer_authorizations(&id).await?))
}

/// `GET /authorizations/:id/audit`
pub async fn audit<S, D>(
  State(engine): State<Arc<ProvenanceEngine<S, D>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<AuditLogEntry>>, ApiError>
where
  S: ProvenanceStore,
  D: DocumentStorage,
{
  Ok(Json(engine.authorization_audit(id).await?))
}

// ─── Issuer policy ────────────────────────────────────────────────────────────

/// `GET /issuers/:id/policy`
pub async fn get_policy<S, D>(
  State(engine): State<Arc<ProvenanceEngine<S, D>>>,
  Path(id): Path<String>,
) -> Result<Json<IssuerPolicy>, ApiError>
where
  S: ProvenanceStore,
  D: DocumentStorage,
{
  Ok(Json(engine.issuer_policy(&id).await?))
}

/// `PUT /issuers/:id/policy` — body: `{"auto_approve":true}`
pub async fn set_policy<S, D>(
  State(engine): State<Arc<ProvenanceEngine<S, D>>>,
  Path(id): Path<String>,
  Json(policy): Json<IssuerPolicy>,
) -> Result<StatusCode, ApiError>
where
  S: ProvenanceStore,
  D: DocumentStorage,
{
  engine.set_issuer_policy(&id, policy).await?;
  Ok(StatusCode::NO_CONTENT)
}
