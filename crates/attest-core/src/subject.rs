//! Subject — the individual whose documents and authorizations are tracked.
//!
//! A subject is owned by the identity collaborator; the engine treats both
//! of its labels as immutable reference keys. The `subject_hash` is a random,
//! non-reversible label distinct from the identifier, generated exactly once
//! at registration and never reused.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Maximum accepted length of a subject or issuer identifier.
pub const MAX_ID_LEN: usize = 20;

/// An immutable reference to an externally-owned individual.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
  pub subject_id:   String,
  /// 64 hex chars of random material; opaque and non-reversible.
  pub subject_hash: String,
  pub created_at:   DateTime<Utc>,
}

/// Validate the shape of an opaque subject or issuer identifier:
/// 1–20 ASCII alphanumerics, `-` or `_`.
pub fn validate_id(candidate: &str, label: &str) -> Result<()> {
  if candidate.is_empty() || candidate.len() > MAX_ID_LEN {
    return Err(Error::Validation(format!(
      "{label} must be 1-{MAX_ID_LEN} characters"
    )));
  }
  if !candidate
    .bytes()
    .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
  {
    return Err(Error::Validation(format!(
      "{label} may only contain ASCII alphanumerics, '-' and '_'"
    )));
  }
  Ok(())
}
