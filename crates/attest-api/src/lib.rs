//! JSON REST API for Attest.
//!
//! Exposes an axum [`Router`] backed by a
//! [`ProvenanceEngine`] over any store and storage pair.
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", attest_api::api_router(engine.clone()))
//! ```

pub mod authorizations;
pub mod documents;
pub mod error;
pub mod subjects;
pub mod verify;

use std::sync::Arc;

use attest_core::{
  ProvenanceEngine, storage::DocumentStorage, store::ProvenanceStore,
};
use axum::{
  Router,
  http::HeaderMap,
  routing::{delete, get, post},
};

pub use error::ApiError;

/// Build a fully-materialised API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, D>(engine: Arc<ProvenanceEngine<S, D>>) -> Router<()>
where
  S: ProvenanceStore + 'static,
  D: DocumentStorage + 'static,
{
  Router::new()
    // Subjects
    .route("/subjects", post(subjects::create::<S, D>))
    .route("/subjects/{id}", get(subjects::get_one::<S, D>))
    // Document ledger
    .route("/documents", post(documents::create::<S, D>))
    .route("/subjects/{id}/documents", get(documents::history::<S, D>))
    .route("/documents/{fingerprint}/content", get(documents::content::<S, D>))
    .route("/documents/{fingerprint}/retract", post(documents::retract::<S, D>))
    .route("/documents/{fingerprint}/promote", post(documents::promote::<S, D>))
    // Authorizations
    .route("/authorizations", post(authorizations::create::<S, D>))
    .route("/authorizations/{id}/approve", post(authorizations::approve::<S, D>))
    .route("/authorizations/{id}/reject", post(authorizations::reject::<S, D>))
    .route(
      "/authorizations/{id}/reauthorize",
      post(authorizations::reauthorize::<S, D>),
    )
    .route("/authorizations/{id}/audit", get(authorizations::audit::<S, D>))
    .route("/issuers/{id}/authorizations", get(authorizations::list_for_issuer::<S, D>))
    .route(
      "/issuers/{id}/authorizations/{subject_id}",
      delete(authorizations::revoke::<S, D>),
    )
    .route(
      "/issuers/{id}/policy",
      get(authorizations::get_policy::<S, D>).put(authorizations::set_policy::<S, D>),
    )
    // Verification
    .route("/verify", post(verify::verify::<S, D>))
    .route("/subjects/{id}/verifications", get(verify::list_for_subject::<S, D>))
    .route("/verifications/{id}/audit", get(verify::audit::<S, D>))
    .with_state(engine)
}

/// Pull the acting identity and client address out of request headers.
/// Both are optional; upstream auth middleware is expected to set them.
pub(crate) fn actor_headers(headers: &HeaderMap) -> (Option<String>, Option<String>) {
  let actor = headers
    .get("x-actor")
    .and_then(|v| v.to_str().ok())
    .map(str::to_owned);
  let ip = headers
    .get("x-forwarded-for")
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.split(',').next())
    .map(|v| v.trim().to_owned());
  (actor, ip)
}

#[cfg(test)]
mod tests {
  use super::*;

  use attest_core::storage::MemoryStorage;
  use attest_store_sqlite::SqliteStore;
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  type TestEngine = ProvenanceEngine<SqliteStore, MemoryStorage>;

  async fn make_engine() -> Arc<TestEngine> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    Arc::new(ProvenanceEngine::new(store, MemoryStorage::new()))
  }

  async fn request(
    engine: Arc<TestEngine>,
    method: &str,
    uri:    &str,
    body:   Option<Value>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
      Some(v) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(v.to_string())
      }
      None => Body::empty(),
    };
    let resp = api_router(engine)
      .oneshot(builder.body(body).unwrap())
      .await
      .unwrap();

    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
  }

  async fn register(engine: &Arc<TestEngine>, subject_id: &str) {
    let (status, _) = request(
      engine.clone(),
      "POST",
      "/subjects",
      Some(json!({ "subject_id": subject_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
  }

  async fn submit(engine: &Arc<TestEngine>, subject_id: &str, content: &[u8]) -> Value {
    let (status, body) = request(
      engine.clone(),
      "POST",
      "/documents",
      Some(json!({
        "subject_id":    subject_id,
        "content":       B64.encode(content),
        "declared_name": "cv.pdf",
        "media_type":    "application/pdf",
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "submit failed: {body}");
    body
  }

  // ── Subjects ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn register_returns_201_with_hash() {
    let engine = make_engine().await;
    let (status, body) = request(
      engine.clone(),
      "POST",
      "/subjects",
      Some(json!({ "subject_id": "EMP1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["subject_id"], "EMP1");
    assert_eq!(body["subject_hash"].as_str().unwrap().len(), 64);

    let (status, body) = request(engine, "GET", "/subjects/EMP1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subject_id"], "EMP1");
  }

  #[tokio::test]
  async fn duplicate_registration_is_409() {
    let engine = make_engine().await;
    register(&engine, "EMP1").await;
    let (status, _) = request(
      engine,
      "POST",
      "/subjects",
      Some(json!({ "subject_id": "EMP1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
  }

  #[tokio::test]
  async fn invalid_subject_id_is_400() {
    let engine = make_engine().await;
    let (status, _) = request(
      engine,
      "POST",
      "/subjects",
      Some(json!({ "subject_id": "not a valid id!" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn unknown_subject_is_404() {
    let engine = make_engine().await;
    let (status, _) = request(engine, "GET", "/subjects/GHOST", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  // ── Documents ───────────────────────────────────────────────────────────

  #[tokio::test]
  async fn submit_and_download_roundtrip() {
    let engine = make_engine().await;
    register(&engine, "EMP1").await;

    let doc = submit(&engine, "EMP1", b"%PDF-1.7 body").await;
    assert_eq!(doc["is_original"], true);
    let fingerprint = doc["fingerprint"].as_str().unwrap().to_owned();

    let resp = api_router(engine)
      .oneshot(
        Request::builder()
          .method("GET")
          .uri(format!("/documents/{fingerprint}/content"))
          .body(Body::empty())
          .unwrap(),
      )
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
      resp.headers().get(header::CONTENT_TYPE).unwrap(),
      "application/pdf"
    );
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"%PDF-1.7 body");
  }

  #[tokio::test]
  async fn bad_base64_is_400() {
    let engine = make_engine().await;
    register(&engine, "EMP1").await;
    let (status, _) = request(
      engine,
      "POST",
      "/documents",
      Some(json!({
        "subject_id":    "EMP1",
        "content":       "@@not-base64@@",
        "declared_name": "cv.pdf",
        "media_type":    "application/pdf",
      })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn history_lists_in_order() {
    let engine = make_engine().await;
    register(&engine, "EMP1").await;
    submit(&engine, "EMP1", b"%PDF one").await;
    submit(&engine, "EMP1", b"%PDF two").await;

    let (status, body) = request(engine, "GET", "/subjects/EMP1/documents", None).await;
    assert_eq!(status, StatusCode::OK);
    let docs = body.as_array().unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0]["is_original"], true);
    assert_eq!(docs[1]["is_original"], false);
  }

  #[tokio::test]
  async fn retracting_the_original_is_409() {
    let engine = make_engine().await;
    register(&engine, "EMP1").await;
    let doc = submit(&engine, "EMP1", b"%PDF one").await;
    let fingerprint = doc["fingerprint"].as_str().unwrap();

    let (status, _) = request(
      engine,
      "POST",
      &format!("/documents/{fingerprint}/retract"),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
  }

  #[tokio::test]
  async fn promote_moves_the_designation() {
    let engine = make_engine().await;
    register(&engine, "EMP1").await;
    submit(&engine, "EMP1", b"%PDF one").await;
    let second = submit(&engine, "EMP1", b"%PDF two").await;
    let fingerprint = second["fingerprint"].as_str().unwrap();

    let (status, body) = request(
      engine.clone(),
      "POST",
      &format!("/documents/{fingerprint}/promote"),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_original"], true);

    // The former original can now be retracted.
    let (_, docs) = request(engine.clone(), "GET", "/subjects/EMP1/documents", None).await;
    let old = docs[0]["fingerprint"].as_str().unwrap();
    let (status, _) = request(
      engine,
      "POST",
      &format!("/documents/{old}/retract"),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
  }

  #[tokio::test]
  async fn designation_against_recorded_original_is_409() {
    let engine = make_engine().await;
    register(&engine, "EMP1").await;
    submit(&engine, "EMP1", b"%PDF one").await;

    let (status, body) = request(
      engine.clone(),
      "POST",
      "/documents",
      Some(json!({
        "subject_id":         "EMP1",
        "content":            B64.encode(b"%PDF two"),
        "declared_name":      "cv.pdf",
        "media_type":         "application/pdf",
        "designate_original": true,
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("recorded original"));

    // The first upload keeps the designation.
    let (_, docs) = request(engine, "GET", "/subjects/EMP1/documents", None).await;
    assert_eq!(docs.as_array().unwrap().len(), 1);
    assert_eq!(docs[0]["is_original"], true);
  }

  // ── Authorizations ──────────────────────────────────────────────────────

  async fn request_auth(engine: &Arc<TestEngine>) -> Value {
    let (status, body) = request(
      engine.clone(),
      "POST",
      "/authorizations",
      Some(json!({ "issuer_id": "ISS1", "subject_id": "EMP1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "authorization failed: {body}");
    body
  }

  #[tokio::test]
  async fn authorization_request_approve_revoke() {
    let engine = make_engine().await;
    register(&engine, "EMP1").await;

    let auth = request_auth(&engine).await;
    assert_eq!(auth["status"], "pending");
    let id = auth["auth_id"].as_str().unwrap().to_owned();

    let (status, body) = request(
      engine.clone(),
      "POST",
      &format!("/authorizations/{id}/approve"),
      Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "approved");
    assert_eq!(body["permission_granted"], true);

    let (status, body) = request(
      engine.clone(),
      "DELETE",
      "/issuers/ISS1/authorizations/EMP1",
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "revoked");

    let (status, body) = request(
      engine,
      "GET",
      &format!("/authorizations/{id}/audit"),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let actions: Vec<_> = body
      .as_array()
      .unwrap()
      .iter()
      .map(|e| e["action"].as_str().unwrap().to_owned())
      .collect();
    assert_eq!(
      actions,
      vec![
        "authorization_revoked",
        "authorization_approved",
        "authorization_requested",
      ]
    );
  }

  #[tokio::test]
  async fn duplicate_authorization_is_409() {
    let engine = make_engine().await;
    register(&engine, "EMP1").await;
    request_auth(&engine).await;

    let (status, _) = request(
      engine,
      "POST",
      "/authorizations",
      Some(json!({ "issuer_id": "ISS1", "subject_id": "EMP1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
  }

  #[tokio::test]
  async fn revoking_a_pending_authorization_is_409() {
    let engine = make_engine().await;
    register(&engine, "EMP1").await;
    request_auth(&engine).await;

    let (status, _) = request(
      engine,
      "DELETE",
      "/issuers/ISS1/authorizations/EMP1",
      None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
  }

  #[tokio::test]
  async fn reauthorize_is_403_under_default_policy() {
    let engine = make_engine().await;
    register(&engine, "EMP1").await;
    let auth = request_auth(&engine).await;
    let id = auth["auth_id"].as_str().unwrap().to_owned();

    request(
      engine.clone(),
      "POST",
      &format!("/authorizations/{id}/reject"),
      Some(json!({ "reason": "insufficient grounds" })),
    )
    .await;

    let (status, _) = request(
      engine,
      "POST",
      &format!("/authorizations/{id}/reauthorize"),
      Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
  }

  #[tokio::test]
  async fn issuer_policy_roundtrip_and_auto_approve() {
    let engine = make_engine().await;
    register(&engine, "EMP1").await;

    let (status, _) = request(
      engine.clone(),
      "PUT",
      "/issuers/ISS1/policy",
      Some(json!({ "auto_approve": true })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, policy) = request(engine.clone(), "GET", "/issuers/ISS1/policy", None).await;
    assert_eq!(policy["auto_approve"], true);

    let auth = request_auth(&engine).await;
    assert_eq!(auth["status"], "approved");

    let (_, list) = request(engine, "GET", "/issuers/ISS1/authorizations", None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
  }

  // ── Verification ────────────────────────────────────────────────────────

  #[tokio::test]
  async fn verify_match_and_mismatch_both_return_200() {
    let engine = make_engine().await;
    register(&engine, "EMP1").await;
    let doc = submit(&engine, "EMP1", b"%PDF-1.7 body").await;
    let fingerprint = doc["fingerprint"].as_str().unwrap().to_owned();

    let (status, body) = request(
      engine.clone(),
      "POST",
      "/verify",
      Some(json!({ "subject_id": "EMP1", "fingerprint": fingerprint })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_valid"], true);
    assert_eq!(body["message"], "document verified successfully");
    assert_eq!(body["subject_details"]["subject_id"], "EMP1");
    assert!(body["download_ref"].as_str().unwrap().contains(&fingerprint));

    let (status, body) = request(
      engine,
      "POST",
      "/verify",
      Some(json!({ "subject_id": "EMP1", "fingerprint": "a".repeat(64) })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_valid"], false);
    assert_eq!(body["message"], "document does not match original");
    assert!(body.get("subject_details").is_none());
  }

  #[tokio::test]
  async fn verify_error_paths_map_to_statuses() {
    let engine = make_engine().await;

    // Malformed input.
    let (status, _) = request(
      engine.clone(),
      "POST",
      "/verify",
      Some(json!({ "subject_id": "bad id!", "fingerprint": "xyz" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Unknown subject.
    let (status, _) = request(
      engine.clone(),
      "POST",
      "/verify",
      Some(json!({ "subject_id": "GHOST1", "fingerprint": "a".repeat(64) })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // No original on record.
    register(&engine, "EMP1").await;
    let (status, _) = request(
      engine,
      "POST",
      "/verify",
      Some(json!({ "subject_id": "EMP1", "fingerprint": "a".repeat(64) })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn verify_with_unauthorized_issuer_is_403() {
    let engine = make_engine().await;
    register(&engine, "EMP1").await;
    let doc = submit(&engine, "EMP1", b"%PDF-1.7 body").await;
    let fingerprint = doc["fingerprint"].as_str().unwrap().to_owned();

    let (status, _) = request(
      engine.clone(),
      "POST",
      "/verify",
      Some(json!({
        "subject_id":  "EMP1",
        "fingerprint": fingerprint,
        "issuer_id":   "ISS1",
      })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Every failed attempt is still on record.
    let (_, requests) = request(engine, "GET", "/subjects/EMP1/verifications", None).await;
    assert_eq!(requests.as_array().unwrap().len(), 1);
    assert_eq!(requests[0]["result_message"], "issuer not authorized");
  }

  #[tokio::test]
  async fn verification_audit_trail_is_listed() {
    let engine = make_engine().await;
    register(&engine, "EMP1").await;
    let doc = submit(&engine, "EMP1", b"%PDF-1.7 body").await;
    let fingerprint = doc["fingerprint"].as_str().unwrap().to_owned();

    let (_, body) = request(
      engine.clone(),
      "POST",
      "/verify",
      Some(json!({ "subject_id": "EMP1", "fingerprint": fingerprint })),
    )
    .await;
    let request_id = body["request_id"].as_str().unwrap().to_owned();

    let (status, trail) = request(
      engine,
      "GET",
      &format!("/verifications/{request_id}/audit"),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let actions: Vec<_> = trail
      .as_array()
      .unwrap()
      .iter()
      .map(|e| e["action"].as_str().unwrap().to_owned())
      .collect();
    assert_eq!(actions, vec!["verification_succeeded", "verification_attempted"]);
  }
}
