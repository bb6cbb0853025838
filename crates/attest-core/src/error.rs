//! Error taxonomy for `attest-core`.
//!
//! Each variant falls into one of five families the boundary layer maps to
//! transport semantics: validation (caller's fault), not-found, conflict,
//! forbidden, and internal (collaborator failure). A negative verification
//! verdict is not represented here at all — it is a successful outcome.

use thiserror::Error;

use crate::authorization::AuthorizationStatus;

#[derive(Debug, Error)]
pub enum Error {
  // ── Validation ────────────────────────────────────────────────────────
  #[error("validation error: {0}")]
  Validation(String),

  // ── Not found ─────────────────────────────────────────────────────────
  #[error("subject not found: {0}")]
  SubjectNotFound(String),

  #[error("document not found: {0}")]
  DocumentNotFound(String),

  #[error("authorization not found: {0}")]
  AuthorizationNotFound(String),

  #[error("no original document on record for subject {0}")]
  NoOriginalDocument(String),

  #[error("verification request not found: {0}")]
  VerificationNotFound(String),

  // ── Conflict ──────────────────────────────────────────────────────────
  #[error("subject already registered: {0}")]
  SubjectExists(String),

  #[error("fingerprint {0} already recorded for a different subject")]
  FingerprintOwnedByOther(String),

  #[error("issuer {issuer_id} already holds an authorization for subject {subject_id}")]
  AlreadyAuthorized {
    issuer_id:  String,
    subject_id: String,
  },

  #[error("invalid authorization transition: {from} -> {to}")]
  InvalidTransition {
    from: AuthorizationStatus,
    to:   AuthorizationStatus,
  },

  #[error("re-authorization is disabled by policy")]
  ReauthorizationDisabled,

  /// Ordinary upload never displaces a recorded original; displacement goes
  /// through the explicit, audited promotion path.
  #[error("subject {0} already has a recorded original; use explicit promotion")]
  OriginalAlreadyRecorded(String),

  /// The document flagged original is permanently retained as the
  /// verification baseline; retraction is rejected.
  #[error("document {0} is the recorded original and cannot be retracted")]
  OriginalRetained(String),

  // ── Forbidden ─────────────────────────────────────────────────────────
  #[error("issuer {issuer_id} is not authorized for subject {subject_id}")]
  IssuerNotAuthorized {
    issuer_id:  String,
    subject_id: String,
  },

  // ── Internal ──────────────────────────────────────────────────────────
  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
