//! The provenance engine — submission, authorization, and the verification
//! protocol, orchestrated over a [`ProvenanceStore`] and a
//! [`DocumentStorage`] backend.
//!
//! The engine is request-scoped and stateless between calls: every
//! operation is an independent transaction over the shared store. Nothing
//! here spawns background work; any concurrency is caller-driven.

use std::sync::Arc;

use uuid::Uuid;

use crate::{
  Error, Result,
  audit::{AuditLogEntry, AuditScope, NewAuditEntry},
  authorization::{
    Authorization, AuthorizationStatus, IssuerPolicy, NewAuthorization,
    ReauthorizePolicy,
  },
  document::{self, Document, NewDocument},
  fingerprint::{self, Clock, OsSaltSource, SaltSource, SystemClock},
  storage::DocumentStorage,
  store::ProvenanceStore,
  subject::{Subject, validate_id},
  verification::{
    MSG_INVALID_INPUT, MSG_ISSUER_NOT_AUTHORIZED, MSG_MISMATCH,
    MSG_NO_ORIGINAL, MSG_SUBJECT_NOT_FOUND, MSG_VERIFIED,
    NewVerificationRequest, VerificationOutcome, VerificationRequest,
    VerificationResult, VerificationStatus,
  },
};

// ─── Submission input ────────────────────────────────────────────────────────

/// Everything the caller provides for one document upload.
#[derive(Debug, Clone)]
pub struct DocumentSubmission {
  pub subject_id:         String,
  pub content:            Vec<u8>,
  pub declared_name:      String,
  pub media_type:         String,
  /// Explicitly designate this upload as the original at submission time.
  pub designate_original: bool,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Orchestrates the document ledger, the authorization state machine, and
/// the verification protocol. Cheap to clone when its backends are.
#[derive(Clone)]
pub struct ProvenanceEngine<S, D> {
  store:       S,
  storage:     D,
  clock:       Arc<dyn Clock>,
  salts:       Arc<dyn SaltSource>,
  reauthorize: ReauthorizePolicy,
}

impl<S, D> ProvenanceEngine<S, D>
where
  S: ProvenanceStore,
  D: DocumentStorage,
{
  pub fn new(store: S, storage: D) -> Self {
    Self {
      store,
      storage,
      clock: Arc::new(SystemClock),
      salts: Arc::new(OsSaltSource),
      reauthorize: ReauthorizePolicy::default(),
    }
  }

  /// Replace the wall clock (for deterministic tests).
  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  /// Replace the salt source (for deterministic tests).
  pub fn with_salt_source(mut self, salts: Arc<dyn SaltSource>) -> Self {
    self.salts = salts;
    self
  }

  pub fn with_reauthorize_policy(mut self, policy: ReauthorizePolicy) -> Self {
    self.reauthorize = policy;
    self
  }

  fn storage_err(e: D::Error) -> Error { Error::Storage(Box::new(e)) }

  // ── Subjects ──────────────────────────────────────────────────────────

  /// Register a subject, minting its random non-reversible `subject_hash`
  /// (64 hex chars, generated exactly once).
  pub async fn register_subject(&self, subject_id: &str) -> Result<Subject> {
    validate_id(subject_id, "subject id")?;

    let mut material = Vec::with_capacity(32);
    material.extend_from_slice(&self.salts.salt16());
    material.extend_from_slice(&self.salts.salt16());

    let subject = Subject {
      subject_id:   subject_id.to_owned(),
      subject_hash: hex::encode(material),
      created_at:   self.clock.now(),
    };

    let subject = self.store.register_subject(subject).await?;
    tracing::info!(subject_id, "subject registered");
    Ok(subject)
  }

  pub async fn subject(&self, subject_id: &str) -> Result<Subject> {
    self
      .store
      .get_subject(subject_id)
      .await?
      .ok_or_else(|| Error::SubjectNotFound(subject_id.to_owned()))
  }

  // ── Document ledger ───────────────────────────────────────────────────

  /// Submit one document: fingerprint the content, persist the bytes, and
  /// record the upload event. The store decides `is_original` atomically —
  /// first upload wins, later uploads join the history, and a
  /// `designate_original` request against a recorded original is rejected.
  /// Rejected submissions do not leave their bytes behind.
  pub async fn submit_document(
    &self,
    submission: DocumentSubmission,
  ) -> Result<Document> {
    validate_id(&submission.subject_id, "subject id")?;
    document::validate_upload(&submission.content, &submission.media_type)?;

    // Resolve the subject before touching storage.
    self.subject(&submission.subject_id).await?;

    let (fingerprint, _salt) = fingerprint::fingerprint(
      &submission.content,
      &submission.declared_name,
      self.clock.as_ref(),
      self.salts.as_ref(),
    )?;

    let storage_pointer = self
      .storage
      .put(&submission.content)
      .await
      .map_err(Self::storage_err)?;

    let record = self
      .store
      .record_document(
        NewDocument {
          fingerprint,
          subject_id: submission.subject_id.clone(),
          declared_name: submission.declared_name,
          byte_size: submission.content.len() as u64,
          media_type: submission.media_type,
          storage_pointer: storage_pointer.clone(),
          designate_original: submission.designate_original,
        },
        self.clock.now(),
      )
      .await;

    let document = match record {
      Ok(document) => document,
      Err(e) => {
        // Pointers are unique per upload, so removing this one cannot
        // touch another document's bytes.
        if let Err(cleanup) = self.storage.delete(&storage_pointer).await {
          tracing::warn!(
            %storage_pointer,
            error = %cleanup,
            "blob left behind by rejected submission"
          );
        }
        return Err(e);
      }
    };

    tracing::info!(
      subject_id = %submission.subject_id,
      fingerprint = %document.fingerprint,
      is_original = document.is_original,
      "document recorded"
    );
    Ok(document)
  }

  /// The recorded original fingerprint for a subject.
  pub async fn original_fingerprint(&self, subject_id: &str) -> Result<String> {
    self.subject(subject_id).await?;
    self
      .store
      .get_index(subject_id)
      .await?
      .and_then(|index| index.original_fingerprint)
      .ok_or_else(|| Error::NoOriginalDocument(subject_id.to_owned()))
  }

  /// All documents for a subject in insertion order.
  pub async fn document_history(&self, subject_id: &str) -> Result<Vec<Document>> {
    self.subject(subject_id).await?;
    self.store.get_history(subject_id).await
  }

  /// Retract a non-original document. The original is permanently retained
  /// as the subject's verification baseline.
  pub async fn retract_document(&self, fingerprint: &str) -> Result<()> {
    self.store.retract_document(fingerprint).await
  }

  /// Explicit, audited administrative re-promotion of an existing document
  /// to original. Never happens as a side effect of ordinary upload.
  pub async fn promote_original(
    &self,
    fingerprint: &str,
    actor:       Option<&str>,
    ip:          Option<&str>,
  ) -> Result<Document> {
    let document = self.store.promote_original(fingerprint).await?;
    self
      .audit(
        AuditScope::Ledger,
        fingerprint,
        "original_promoted",
        actor,
        ip,
        Some(format!(
          "original designation moved to {fingerprint} for subject {}",
          document.subject_id
        )),
      )
      .await?;
    tracing::info!(fingerprint, subject_id = %document.subject_id, "original re-promoted");
    Ok(document)
  }

  pub async fn document(&self, fingerprint: &str) -> Result<Document> {
    self
      .store
      .get_document(fingerprint)
      .await?
      .ok_or_else(|| Error::DocumentNotFound(fingerprint.to_owned()))
  }

  /// Fetch the stored bytes for a document.
  pub async fn fetch_document(&self, fingerprint: &str) -> Result<Vec<u8>> {
    let document = self.document(fingerprint).await?;

    self
      .storage
      .get(&document.storage_pointer)
      .await
      .map_err(Self::storage_err)?
      .ok_or_else(|| Error::DocumentNotFound(fingerprint.to_owned()))
  }

  // ── Authorization ─────────────────────────────────────────────────────

  /// Request authorization for the (issuer, subject) pair. The row is
  /// created `Pending` unless the issuer's `auto_approve` policy promotes
  /// it immediately. Any existing row for the pair is a conflict.
  pub async fn request_authorization(
    &self,
    issuer_id:  &str,
    subject_id: &str,
    reason:     Option<String>,
    created_by: Option<&str>,
    ip:         Option<&str>,
  ) -> Result<Authorization> {
    validate_id(issuer_id, "issuer id")?;
    validate_id(subject_id, "subject id")?;
    self.subject(subject_id).await?;

    let auth = self
      .store
      .create_authorization(
        NewAuthorization {
          issuer_id:  issuer_id.to_owned(),
          subject_id: subject_id.to_owned(),
          reason,
          created_by: created_by.map(str::to_owned),
        },
        self.clock.now(),
      )
      .await?;

    self
      .audit_authorization(auth.auth_id, "authorization_requested", created_by, ip, None)
      .await?;

    if self.store.issuer_policy(issuer_id).await?.auto_approve {
      let auth = self
        .store
        .transition_authorization(
          auth.auth_id,
          AuthorizationStatus::Approved,
          Some("auto-approved by issuer policy".into()),
          self.clock.now(),
        )
        .await?;
      self
        .audit_authorization(auth.auth_id, "authorization_auto_approved", created_by, ip, None)
        .await?;
      return Ok(auth);
    }

    Ok(auth)
  }

  pub async fn approve_authorization(
    &self,
    auth_id: Uuid,
    reason:  Option<String>,
    actor:   Option<&str>,
    ip:      Option<&str>,
  ) -> Result<Authorization> {
    let auth = self
      .store
      .transition_authorization(
        auth_id,
        AuthorizationStatus::Approved,
        reason,
        self.clock.now(),
      )
      .await?;
    self
      .audit_authorization(auth_id, "authorization_approved", actor, ip, None)
      .await?;
    Ok(auth)
  }

  pub async fn reject_authorization(
    &self,
    auth_id: Uuid,
    reason:  Option<String>,
    actor:   Option<&str>,
    ip:      Option<&str>,
  ) -> Result<Authorization> {
    let auth = self
      .store
      .transition_authorization(
        auth_id,
        AuthorizationStatus::Rejected,
        reason,
        self.clock.now(),
      )
      .await?;
    self
      .audit_authorization(auth_id, "authorization_rejected", actor, ip, None)
      .await?;
    Ok(auth)
  }

  /// Revoke the approved authorization for the pair. Only `Approved` rows
  /// may be revoked.
  pub async fn revoke_authorization(
    &self,
    issuer_id:  &str,
    subject_id: &str,
    reason:     Option<String>,
    actor:      Option<&str>,
    ip:         Option<&str>,
  ) -> Result<Authorization> {
    let existing = self
      .store
      .find_authorization(issuer_id, subject_id)
      .await?
      .ok_or_else(|| {
        Error::AuthorizationNotFound(format!("{issuer_id}/{subject_id}"))
      })?;

    let auth = self
      .store
      .transition_authorization(
        existing.auth_id,
        AuthorizationStatus::Revoked,
        reason,
        self.clock.now(),
      )
      .await?;
    self
      .audit_authorization(auth.auth_id, "authorization_revoked", actor, ip, None)
      .await?;
    Ok(auth)
  }

  /// Reset a rejected or revoked authorization back to `Pending`. Gated by
  /// the engine's [`ReauthorizePolicy`]; `ManualOnly` refuses outright.
  pub async fn reauthorize(
    &self,
    auth_id: Uuid,
    reason:  Option<String>,
    actor:   Option<&str>,
    ip:      Option<&str>,
  ) -> Result<Authorization> {
    if self.reauthorize == ReauthorizePolicy::ManualOnly {
      return Err(Error::ReauthorizationDisabled);
    }

    let auth = self.store.reset_authorization(auth_id, reason).await?;
    self
      .audit_authorization(auth_id, "authorization_reset", actor, ip, None)
      .await?;
    Ok(auth)
  }

  pub async fn is_permitted(
    &self,
    issuer_id:  &str,
    subject_id: &str,
  ) -> Result<bool> {
    self.store.is_permitted(issuer_id, subject_id).await
  }

  pub async fn issuer_authorizations(
    &self,
    issuer_id: &str,
  ) -> Result<Vec<Authorization>> {
    self.store.list_authorizations(issuer_id).await
  }

  pub async fn issuer_policy(&self, issuer_id: &str) -> Result<IssuerPolicy> {
    self.store.issuer_policy(issuer_id).await
  }

  pub async fn set_issuer_policy(
    &self,
    issuer_id: &str,
    policy:    IssuerPolicy,
  ) -> Result<()> {
    self.store.set_issuer_policy(issuer_id, policy).await
  }

  // ── Verification protocol ─────────────────────────────────────────────

  /// Determine whether a claimed fingerprint matches the subject's recorded
  /// original. Every call persists a [`VerificationRequest`] and audit
  /// entries, including malformed input. Failure to *perform* the check
  /// surfaces as a typed error; a mismatch is a successful negative
  /// outcome, returned as `Ok` with `is_valid = false`.
  pub async fn verify(
    &self,
    claimed_subject_id:  &str,
    claimed_fingerprint: &str,
    requester_ip:        Option<&str>,
    requesting_issuer:   Option<&str>,
  ) -> Result<VerificationOutcome> {
    let request = self
      .store
      .create_verification_request(
        NewVerificationRequest {
          subject_id:          claimed_subject_id.to_owned(),
          claimed_fingerprint: claimed_fingerprint.to_owned(),
          issuer_id:           requesting_issuer.map(str::to_owned),
          requester_ip:        requester_ip.map(str::to_owned),
        },
        self.clock.now(),
      )
      .await?;
    let request_id = request.request_id;

    self
      .audit(
        AuditScope::Verification,
        &request_id.to_string(),
        "verification_attempted",
        requesting_issuer,
        requester_ip,
        Some(format!(
          "subject {claimed_subject_id}, fingerprint {claimed_fingerprint}"
        )),
      )
      .await?;

    // Step 1: input shape. No lookups happen for malformed input.
    if validate_id(claimed_subject_id, "subject id").is_err()
      || !fingerprint::is_well_formed(claimed_fingerprint)
    {
      self
        .fail_verification(request_id, MSG_INVALID_INPUT, requesting_issuer, requester_ip)
        .await?;
      return Err(Error::Validation(
        "malformed subject identifier or fingerprint".into(),
      ));
    }

    // Step 2: resolve the claimed subject.
    let subject = match self.store.get_subject(claimed_subject_id).await {
      Ok(Some(subject)) => subject,
      Ok(None) => {
        self
          .fail_verification(request_id, MSG_SUBJECT_NOT_FOUND, requesting_issuer, requester_ip)
          .await?;
        return Err(Error::SubjectNotFound(claimed_subject_id.to_owned()));
      }
      Err(e) => return Err(self.abort_verification(request_id, requesting_issuer, requester_ip, e).await),
    };

    // Step 3: the recorded original.
    let original = match self.store.get_index(claimed_subject_id).await {
      Ok(index) => match index.and_then(|i| i.original_fingerprint) {
        Some(original) => original,
        None => {
          self
            .fail_verification(request_id, MSG_NO_ORIGINAL, requesting_issuer, requester_ip)
            .await?;
          return Err(Error::NoOriginalDocument(claimed_subject_id.to_owned()));
        }
      },
      Err(e) => return Err(self.abort_verification(request_id, requesting_issuer, requester_ip, e).await),
    };

    // Step 4: authorization gates disclosure before any comparison.
    if let Some(issuer_id) = requesting_issuer {
      let permitted = match self.store.is_permitted(issuer_id, claimed_subject_id).await {
        Ok(permitted) => permitted,
        Err(e) => return Err(self.abort_verification(request_id, requesting_issuer, requester_ip, e).await),
      };
      if !permitted {
        self
          .fail_verification(request_id, MSG_ISSUER_NOT_AUTHORIZED, requesting_issuer, requester_ip)
          .await?;
        return Err(Error::IssuerNotAuthorized {
          issuer_id:  issuer_id.to_owned(),
          subject_id: claimed_subject_id.to_owned(),
        });
      }
    }

    // Step 5: the comparison itself. A mismatch is a completed check.
    if claimed_fingerprint != original {
      let request = self
        .fail_verification(request_id, MSG_MISMATCH, requesting_issuer, requester_ip)
        .await?;
      tracing::info!(subject_id = claimed_subject_id, "verification resolved: mismatch");
      return Ok(VerificationOutcome { request, result: None });
    }

    // Step 6: match. Resolve, snapshot, log.
    let now = self.clock.now();
    let request = self
      .store
      .resolve_verification(request_id, VerificationStatus::Verified, true, MSG_VERIFIED, now)
      .await?;

    let result = VerificationResult {
      request_id,
      subject_details: serde_json::json!({
        "subject_id": subject.subject_id,
        "subject_hash": subject.subject_hash,
        "registered_at": subject.created_at,
        "has_original_document": true,
      }),
      preview_ref:  format!("/documents/{original}/preview"),
      download_ref: format!("/documents/{original}/content"),
      metadata: serde_json::json!({
        "verification_method": "fingerprint_comparison",
        "original_fingerprint": original,
        "verified_at": now,
      }),
    };
    self.store.attach_verification_result(result.clone()).await?;

    self
      .audit(
        AuditScope::Verification,
        &request_id.to_string(),
        "verification_succeeded",
        requesting_issuer,
        requester_ip,
        Some(format!("matched original {original}")),
      )
      .await?;

    tracing::info!(subject_id = claimed_subject_id, "verification resolved: match");
    Ok(VerificationOutcome { request, result: Some(result) })
  }

  /// All verification requests recorded against a subject identifier.
  pub async fn subject_verifications(
    &self,
    subject_id: &str,
  ) -> Result<Vec<VerificationRequest>> {
    self.store.list_verifications(subject_id).await
  }

  /// Audit entries for one verification request, newest first.
  pub async fn verification_audit(
    &self,
    request_id: Uuid,
  ) -> Result<Vec<AuditLogEntry>> {
    self
      .store
      .list_audit(AuditScope::Verification, &request_id.to_string())
      .await
  }

  /// Audit entries for one authorization, newest first.
  pub async fn authorization_audit(
    &self,
    auth_id: Uuid,
  ) -> Result<Vec<AuditLogEntry>> {
    self
      .store
      .list_audit(AuditScope::Authorization, &auth_id.to_string())
      .await
  }

  // ── Internal helpers ──────────────────────────────────────────────────

  async fn audit(
    &self,
    scope:      AuditScope,
    related_id: &str,
    action:     &str,
    actor:      Option<&str>,
    ip:         Option<&str>,
    details:    Option<String>,
  ) -> Result<AuditLogEntry> {
    self
      .store
      .append_audit(
        NewAuditEntry {
          scope,
          related_id: related_id.to_owned(),
          action: action.to_owned(),
          actor: actor.map(str::to_owned),
          ip_address: ip.map(str::to_owned),
          details,
        },
        self.clock.now(),
      )
      .await
  }

  async fn audit_authorization(
    &self,
    auth_id: Uuid,
    action:  &str,
    actor:   Option<&str>,
    ip:      Option<&str>,
    details: Option<String>,
  ) -> Result<AuditLogEntry> {
    self
      .audit(AuditScope::Authorization, &auth_id.to_string(), action, actor, ip, details)
      .await
  }

  /// Resolve a request as `Failed` with `message` and write the audit
  /// entry. Used for every non-success path after the request exists.
  async fn fail_verification(
    &self,
    request_id: Uuid,
    message:    &str,
    actor:      Option<&str>,
    ip:         Option<&str>,
  ) -> Result<VerificationRequest> {
    let request = self
      .store
      .resolve_verification(
        request_id,
        VerificationStatus::Failed,
        false,
        message,
        self.clock.now(),
      )
      .await?;
    self
      .audit(
        AuditScope::Verification,
        &request_id.to_string(),
        "verification_failed",
        actor,
        ip,
        Some(message.to_owned()),
      )
      .await?;
    Ok(request)
  }

  /// A collaborator failed mid-protocol. Best-effort: still resolve the
  /// request as failed so the audit trail has no silent gap, then surface
  /// the underlying error.
  async fn abort_verification(
    &self,
    request_id: Uuid,
    actor:      Option<&str>,
    ip:         Option<&str>,
    err:        Error,
  ) -> Error {
    if let Err(mark_err) = self
      .fail_verification(request_id, "verification failed due to internal error", actor, ip)
      .await
    {
      tracing::warn!(%request_id, error = %mark_err, "could not mark verification failed");
    }
    err
  }
}
