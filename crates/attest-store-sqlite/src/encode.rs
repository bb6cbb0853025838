//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Status enums and the
//! audit scope are stored as their lowercase names. JSON snapshots are
//! stored as compact JSON text. UUIDs are stored as hyphenated lowercase
//! strings.

use attest_core::{
  audit::{AuditLogEntry, AuditScope},
  authorization::{Authorization, AuthorizationStatus},
  document::Document,
  subject::Subject,
  verification::{VerificationRequest, VerificationStatus},
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_dt_opt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

// ─── AuthorizationStatus ─────────────────────────────────────────────────────

pub fn encode_auth_status(s: AuthorizationStatus) -> &'static str {
  match s {
    AuthorizationStatus::Pending => "pending",
    AuthorizationStatus::Approved => "approved",
    AuthorizationStatus::Rejected => "rejected",
    AuthorizationStatus::Revoked => "revoked",
  }
}

pub fn decode_auth_status(s: &str) -> Result<AuthorizationStatus> {
  match s {
    "pending" => Ok(AuthorizationStatus::Pending),
    "approved" => Ok(AuthorizationStatus::Approved),
    "rejected" => Ok(AuthorizationStatus::Rejected),
    "revoked" => Ok(AuthorizationStatus::Revoked),
    other => Err(Error::Decode(format!("unknown authorization status: {other:?}"))),
  }
}

// ─── VerificationStatus ──────────────────────────────────────────────────────

pub fn encode_verification_status(s: VerificationStatus) -> &'static str {
  match s {
    VerificationStatus::Pending => "pending",
    VerificationStatus::Verified => "verified",
    VerificationStatus::Failed => "failed",
    VerificationStatus::Expired => "expired",
  }
}

pub fn decode_verification_status(s: &str) -> Result<VerificationStatus> {
  match s {
    "pending" => Ok(VerificationStatus::Pending),
    "verified" => Ok(VerificationStatus::Verified),
    "failed" => Ok(VerificationStatus::Failed),
    "expired" => Ok(VerificationStatus::Expired),
    other => Err(Error::Decode(format!("unknown verification status: {other:?}"))),
  }
}

// ─── AuditScope ──────────────────────────────────────────────────────────────

pub fn encode_scope(s: AuditScope) -> &'static str {
  match s {
    AuditScope::Authorization => "authorization",
    AuditScope::Verification => "verification",
    AuditScope::Ledger => "ledger",
  }
}

pub fn decode_scope(s: &str) -> Result<AuditScope> {
  match s {
    "authorization" => Ok(AuditScope::Authorization),
    "verification" => Ok(AuditScope::Verification),
    "ledger" => Ok(AuditScope::Ledger),
    other => Err(Error::Decode(format!("unknown audit scope: {other:?}"))),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `subjects` row.
pub struct RawSubject {
  pub subject_id:   String,
  pub subject_hash: String,
  pub created_at:   String,
}

impl RawSubject {
  pub fn into_subject(self) -> Result<Subject> {
    Ok(Subject {
      subject_id:   self.subject_id,
      subject_hash: self.subject_hash,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `documents` row.
pub struct RawDocument {
  pub fingerprint:     String,
  pub subject_id:      String,
  pub declared_name:   String,
  pub byte_size:       i64,
  pub media_type:      String,
  pub storage_pointer: String,
  pub is_original:     bool,
  pub created_at:      String,
}

impl RawDocument {
  pub fn into_document(self) -> Result<Document> {
    Ok(Document {
      fingerprint:     self.fingerprint,
      subject_id:      self.subject_id,
      declared_name:   self.declared_name,
      byte_size:       self.byte_size as u64,
      media_type:      self.media_type,
      storage_pointer: self.storage_pointer,
      is_original:     self.is_original,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from an `authorizations` row.
pub struct RawAuthorization {
  pub auth_id:            String,
  pub issuer_id:          String,
  pub subject_id:         String,
  pub status:             String,
  pub permission_granted: bool,
  pub reason:             Option<String>,
  pub granted_at:         Option<String>,
  pub revoked_at:         Option<String>,
  pub created_by:         Option<String>,
  pub created_at:         String,
}

impl RawAuthorization {
  pub fn into_authorization(self) -> Result<Authorization> {
    Ok(Authorization {
      auth_id:            decode_uuid(&self.auth_id)?,
      issuer_id:          self.issuer_id,
      subject_id:         self.subject_id,
      status:             decode_auth_status(&self.status)?,
      permission_granted: self.permission_granted,
      reason:             self.reason,
      granted_at:         decode_dt_opt(self.granted_at.as_deref())?,
      revoked_at:         decode_dt_opt(self.revoked_at.as_deref())?,
      created_by:         self.created_by,
      created_at:         decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `verification_requests` row.
pub struct RawVerificationRequest {
  pub request_id:          String,
  pub subject_id:          String,
  pub claimed_fingerprint: String,
  pub issuer_id:           Option<String>,
  pub status:              String,
  pub is_valid:            bool,
  pub verification_date:   Option<String>,
  pub result_message:      Option<String>,
  pub requester_ip:        Option<String>,
  pub created_at:          String,
}

impl RawVerificationRequest {
  pub fn into_request(self) -> Result<VerificationRequest> {
    Ok(VerificationRequest {
      request_id:          decode_uuid(&self.request_id)?,
      subject_id:          self.subject_id,
      claimed_fingerprint: self.claimed_fingerprint,
      issuer_id:           self.issuer_id,
      status:              decode_verification_status(&self.status)?,
      is_valid:            self.is_valid,
      verification_date:   decode_dt_opt(self.verification_date.as_deref())?,
      result_message:      self.result_message,
      requester_ip:        self.requester_ip,
      created_at:          decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from an `audit_log` row.
pub struct RawAuditEntry {
  pub entry_id:   String,
  pub scope:      String,
  pub related_id: String,
  pub action:     String,
  pub actor:      Option<String>,
  pub ip_address: Option<String>,
  pub timestamp:  String,
  pub details:    Option<String>,
}

impl RawAuditEntry {
  pub fn into_entry(self) -> Result<AuditLogEntry> {
    Ok(AuditLogEntry {
      entry_id:   decode_uuid(&self.entry_id)?,
      scope:      decode_scope(&self.scope)?,
      related_id: self.related_id,
      action:     self.action,
      actor:      self.actor,
      ip_address: self.ip_address,
      timestamp:  decode_dt(&self.timestamp)?,
      details:    self.details,
    })
  }
}
