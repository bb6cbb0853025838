//! The `ProvenanceStore` trait — persistent state behind the engine.
//!
//! Implemented by storage backends (e.g. `attest-store-sqlite`). The engine
//! and the API layer depend on this abstraction, not on any concrete
//! backend. Methods return the core [`Error`](crate::Error) taxonomy so the
//! engine can distinguish conflicts and absences from backend failures;
//! backend-internal errors arrive wrapped in [`Error::Store`](crate::Error).
//!
//! Atomicity contract: `record_document` (including the original-promotion
//! decision and the history append) and `create_authorization` (the natural
//! key check-and-create) must each execute atomically. Timestamps are passed
//! in by the caller so backends stay deterministic under test.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Result,
  audit::{AuditLogEntry, AuditScope, NewAuditEntry},
  authorization::{
    Authorization, AuthorizationStatus, IssuerPolicy, NewAuthorization,
  },
  document::{Document, NewDocument, SubjectDocumentIndex},
  subject::Subject,
  verification::{
    NewVerificationRequest, VerificationRequest, VerificationResult,
    VerificationStatus,
  },
};

/// Abstraction over the provenance engine's persistent state.
///
/// All write operations are append-only or explicit state transitions;
/// nothing is ever silently overwritten. All methods return `Send` futures
/// so the trait can be used from multi-threaded async runtimes.
pub trait ProvenanceStore: Send + Sync {
  // ── Subjects ──────────────────────────────────────────────────────────

  /// Persist a new subject reference. Errors with
  /// [`Error::SubjectExists`](crate::Error) on a duplicate identifier.
  fn register_subject(
    &self,
    subject: Subject,
  ) -> impl Future<Output = Result<Subject>> + Send;

  fn get_subject(
    &self,
    subject_id: &str,
  ) -> impl Future<Output = Result<Option<Subject>>> + Send;

  // ── Document ledger ───────────────────────────────────────────────────

  /// Record one upload event. Decides `is_original` atomically: true iff
  /// the subject has no recorded original yet. Appends the fingerprint to
  /// the subject's history (idempotent). Errors with
  /// [`Error::OriginalAlreadyRecorded`](crate::Error) when
  /// `designate_original` is set but an original is already on record
  /// (displacement goes through [`promote_original`](Self::promote_original)),
  /// [`Error::FingerprintOwnedByOther`](crate::Error) if the fingerprint
  /// exists under another subject, and
  /// [`Error::SubjectNotFound`](crate::Error) for an unknown subject.
  fn record_document(
    &self,
    input: NewDocument,
    now:   DateTime<Utc>,
  ) -> impl Future<Output = Result<Document>> + Send;

  /// Move the original designation to an existing document of the same
  /// subject, clearing the flag on the previous original. This is the
  /// explicit administrative re-promotion path; ordinary submission never
  /// displaces an original.
  fn promote_original(
    &self,
    fingerprint: &str,
  ) -> impl Future<Output = Result<Document>> + Send;

  fn get_document(
    &self,
    fingerprint: &str,
  ) -> impl Future<Output = Result<Option<Document>>> + Send;

  fn get_index(
    &self,
    subject_id: &str,
  ) -> impl Future<Output = Result<Option<SubjectDocumentIndex>>> + Send;

  /// All documents for a subject in insertion order.
  fn get_history(
    &self,
    subject_id: &str,
  ) -> impl Future<Output = Result<Vec<Document>>> + Send;

  /// Delete a non-original document. Errors with
  /// [`Error::OriginalRetained`](crate::Error) for the current original.
  /// The subject's fingerprint history is left untouched.
  fn retract_document(
    &self,
    fingerprint: &str,
  ) -> impl Future<Output = Result<()>> + Send;

  // ── Authorization ─────────────────────────────────────────────────────

  /// Create the (issuer, subject) row in `Pending` state. Errors with
  /// [`Error::AlreadyAuthorized`](crate::Error) if any row exists for the
  /// pair; the natural-key check and the insert are atomic.
  fn create_authorization(
    &self,
    input: NewAuthorization,
    now:   DateTime<Utc>,
  ) -> impl Future<Output = Result<Authorization>> + Send;

  fn get_authorization(
    &self,
    auth_id: Uuid,
  ) -> impl Future<Output = Result<Option<Authorization>>> + Send;

  fn find_authorization(
    &self,
    issuer_id:  &str,
    subject_id: &str,
  ) -> impl Future<Output = Result<Option<Authorization>>> + Send;

  /// Apply a state-machine transition, stamping `granted_at`/`revoked_at`
  /// and `permission_granted` as appropriate. Errors with
  /// [`Error::InvalidTransition`](crate::Error) for illegal moves.
  fn transition_authorization(
    &self,
    auth_id: Uuid,
    to:      AuthorizationStatus,
    reason:  Option<String>,
    now:     DateTime<Utc>,
  ) -> impl Future<Output = Result<Authorization>> + Send;

  /// Reset a terminal (`Rejected`/`Revoked`) row back to `Pending`. Policy
  /// gating happens in the engine; the store only enforces that the row is
  /// currently terminal.
  fn reset_authorization(
    &self,
    auth_id: Uuid,
    reason:  Option<String>,
  ) -> impl Future<Output = Result<Authorization>> + Send;

  fn list_authorizations(
    &self,
    issuer_id: &str,
  ) -> impl Future<Output = Result<Vec<Authorization>>> + Send;

  /// True iff an authorization exists for the pair with `status = approved`
  /// and `permission_granted = true`.
  fn is_permitted(
    &self,
    issuer_id:  &str,
    subject_id: &str,
  ) -> impl Future<Output = Result<bool>> + Send;

  fn issuer_policy(
    &self,
    issuer_id: &str,
  ) -> impl Future<Output = Result<IssuerPolicy>> + Send;

  fn set_issuer_policy(
    &self,
    issuer_id: &str,
    policy:    IssuerPolicy,
  ) -> impl Future<Output = Result<()>> + Send;

  // ── Verification ──────────────────────────────────────────────────────

  /// Persist a new request in `Pending` state. Always succeeds for
  /// well-typed input — malformed claimed identifiers are stored as-is.
  fn create_verification_request(
    &self,
    input: NewVerificationRequest,
    now:   DateTime<Utc>,
  ) -> impl Future<Output = Result<VerificationRequest>> + Send;

  /// Resolve a pending request, stamping `verification_date` and the
  /// result message.
  fn resolve_verification(
    &self,
    request_id: Uuid,
    status:     VerificationStatus,
    is_valid:   bool,
    message:    &str,
    date:       DateTime<Utc>,
  ) -> impl Future<Output = Result<VerificationRequest>> + Send;

  /// Attach the 1:1 success snapshot to a `Verified` request.
  fn attach_verification_result(
    &self,
    result: VerificationResult,
  ) -> impl Future<Output = Result<()>> + Send;

  fn list_verifications(
    &self,
    subject_id: &str,
  ) -> impl Future<Output = Result<Vec<VerificationRequest>>> + Send;

  // ── Audit log ─────────────────────────────────────────────────────────

  fn append_audit(
    &self,
    entry: NewAuditEntry,
    now:   DateTime<Utc>,
  ) -> impl Future<Output = Result<AuditLogEntry>> + Send;

  /// Entries for one scope and related id, newest first.
  fn list_audit(
    &self,
    scope:      AuditScope,
    related_id: &str,
  ) -> impl Future<Output = Result<Vec<AuditLogEntry>>> + Send;
}
