//! Verification request and result records.
//!
//! Every verification call persists a [`VerificationRequest`], including
//! calls that fail input validation, so the audit trail has no gaps. A
//! request is immutable once resolved; resolution happens through exactly
//! one of the two terminal-marking store operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Result messages ─────────────────────────────────────────────────────────

pub const MSG_INVALID_INPUT: &str = "invalid input";
pub const MSG_SUBJECT_NOT_FOUND: &str = "subject not found";
pub const MSG_NO_ORIGINAL: &str = "no original document on record";
pub const MSG_ISSUER_NOT_AUTHORIZED: &str = "issuer not authorized";
pub const MSG_MISMATCH: &str = "document does not match original";
pub const MSG_VERIFIED: &str = "document verified successfully";

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
  Pending,
  Verified,
  Failed,
  Expired,
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// One row per verification call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRequest {
  pub request_id:          Uuid,
  /// The claimed subject identifier, persisted even when malformed.
  pub subject_id:          String,
  pub claimed_fingerprint: String,
  pub issuer_id:           Option<String>,
  pub status:              VerificationStatus,
  pub is_valid:            bool,
  pub verification_date:   Option<DateTime<Utc>>,
  pub result_message:      Option<String>,
  pub requester_ip:        Option<String>,
  pub created_at:          DateTime<Utc>,
}

/// Input to [`crate::store::ProvenanceStore::create_verification_request`].
#[derive(Debug, Clone)]
pub struct NewVerificationRequest {
  pub subject_id:          String,
  pub claimed_fingerprint: String,
  pub issuer_id:           Option<String>,
  pub requester_ip:        Option<String>,
}

/// Detail snapshot attached 1:1 to a request that resolved `Verified`.
/// Created only on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
  pub request_id:      Uuid,
  /// Subject details at the time of verification.
  pub subject_details: serde_json::Value,
  pub preview_ref:     String,
  pub download_ref:    String,
  /// Method used and the original fingerprint matched against.
  pub metadata:        serde_json::Value,
}

/// What `verify` returns on the non-error paths: the resolved request, plus
/// the success snapshot when the fingerprints matched. A mismatch is a
/// successful determination with a negative outcome, not an error.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationOutcome {
  pub request: VerificationRequest,
  pub result:  Option<VerificationResult>,
}

impl VerificationOutcome {
  pub fn is_valid(&self) -> bool { self.request.is_valid }

  pub fn message(&self) -> &str {
    self.request.result_message.as_deref().unwrap_or_default()
  }
}
