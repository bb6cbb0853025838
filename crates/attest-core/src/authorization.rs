//! The per-(issuer, subject) authorization record and its state machine.
//!
//! Legal transitions: `Pending → Approved`, `Pending → Rejected`,
//! `Approved → Revoked`. `Rejected` and `Revoked` are terminal for ordinary
//! transitions; the only way back is the explicit `reauthorize` operation,
//! which resets the row to `Pending` and is gated by [`ReauthorizePolicy`].
//! Rows are never deleted, only transitioned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationStatus {
  Pending,
  Approved,
  Rejected,
  Revoked,
}

impl AuthorizationStatus {
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Rejected | Self::Revoked)
  }

  /// Whether `self → to` is a legal ordinary transition.
  pub fn can_transition_to(self, to: Self) -> bool {
    matches!(
      (self, to),
      (Self::Pending, Self::Approved)
        | (Self::Pending, Self::Rejected)
        | (Self::Approved, Self::Revoked)
    )
  }
}

impl std::fmt::Display for AuthorizationStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      Self::Pending => "pending",
      Self::Approved => "approved",
      Self::Rejected => "rejected",
      Self::Revoked => "revoked",
    };
    f.write_str(s)
  }
}

/// Validate a requested transition, or explain why it is illegal.
pub fn check_transition(
  from: AuthorizationStatus,
  to:   AuthorizationStatus,
) -> Result<()> {
  if from.can_transition_to(to) {
    Ok(())
  } else {
    Err(Error::InvalidTransition { from, to })
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// One row per (issuer, subject) pair. The natural key is the pair itself,
/// enforced by the store, so duplicate live grants cannot exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Authorization {
  pub auth_id:            Uuid,
  pub issuer_id:          String,
  pub subject_id:         String,
  pub status:             AuthorizationStatus,
  pub permission_granted: bool,
  pub reason:             Option<String>,
  pub granted_at:         Option<DateTime<Utc>>,
  pub revoked_at:         Option<DateTime<Utc>>,
  pub created_by:         Option<String>,
  pub created_at:         DateTime<Utc>,
}

impl Authorization {
  /// The single predicate the verification protocol consults.
  pub fn permits(&self) -> bool {
    self.status == AuthorizationStatus::Approved && self.permission_granted
  }
}

/// Input to [`crate::store::ProvenanceStore::create_authorization`].
#[derive(Debug, Clone)]
pub struct NewAuthorization {
  pub issuer_id:  String,
  pub subject_id: String,
  pub reason:     Option<String>,
  pub created_by: Option<String>,
}

// ─── Issuer policy ───────────────────────────────────────────────────────────

/// Per-issuer settings consulted at request time.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct IssuerPolicy {
  /// If set, `request` transitions straight to `Approved`.
  #[serde(default)]
  pub auto_approve: bool,
}

/// Engine-level switch for re-authorization after a terminal status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReauthorizePolicy {
  /// A rejected or revoked issuer never regains access through the API.
  #[default]
  ManualOnly,
  /// `reauthorize` may reset a terminal row to `Pending`.
  Allowed,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn legal_transitions() {
    use AuthorizationStatus::*;
    assert!(check_transition(Pending, Approved).is_ok());
    assert!(check_transition(Pending, Rejected).is_ok());
    assert!(check_transition(Approved, Revoked).is_ok());
  }

  #[test]
  fn illegal_transitions() {
    use AuthorizationStatus::*;
    for (from, to) in [
      (Pending, Revoked),
      (Approved, Rejected),
      (Rejected, Approved),
      (Rejected, Pending),
      (Revoked, Approved),
      (Approved, Approved),
    ] {
      assert!(
        matches!(
          check_transition(from, to),
          Err(Error::InvalidTransition { .. })
        ),
        "{from} -> {to} should be rejected"
      );
    }
  }

  #[test]
  fn permits_requires_approved_and_granted() {
    let mut auth = Authorization {
      auth_id:            Uuid::new_v4(),
      issuer_id:          "ISS1".into(),
      subject_id:         "EMP1".into(),
      status:             AuthorizationStatus::Approved,
      permission_granted: true,
      reason:             None,
      granted_at:         Some(Utc::now()),
      revoked_at:         None,
      created_by:         None,
      created_at:         Utc::now(),
    };
    assert!(auth.permits());

    auth.permission_granted = false;
    assert!(!auth.permits());

    auth.permission_granted = true;
    auth.status = AuthorizationStatus::Pending;
    assert!(!auth.permits());
  }
}
