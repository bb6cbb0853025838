//! Append-only audit log types.
//!
//! Every authorization state change, every verification attempt (including
//! failures), and every explicit original re-promotion writes one entry.
//! Entries are never updated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditScope {
  Authorization,
  Verification,
  /// Administrative ledger actions (original re-promotion).
  Ledger,
}

/// One append-only audit entry. `related_id` is the scope's natural key:
/// an authorization id, a verification request id, or a fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
  pub entry_id:   Uuid,
  pub scope:      AuditScope,
  pub related_id: String,
  pub action:     String,
  pub actor:      Option<String>,
  pub ip_address: Option<String>,
  pub timestamp:  DateTime<Utc>,
  pub details:    Option<String>,
}

/// Input to [`crate::store::ProvenanceStore::append_audit`].
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
  pub scope:      AuditScope,
  pub related_id: String,
  pub action:     String,
  pub actor:      Option<String>,
  pub ip_address: Option<String>,
  pub details:    Option<String>,
}
