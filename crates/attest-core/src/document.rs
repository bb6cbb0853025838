//! Document records and the per-subject index.
//!
//! A document is one upload event. Once written, no field is ever updated
//! except the `is_original` flag, and only through the ledger's promotion
//! rule. The document flagged original is never deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Upload size cap, matching the product's 10 MiB limit.
pub const MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;

/// Media types accepted for upload.
pub const ALLOWED_MEDIA_TYPES: &[&str] =
  &["application/pdf", "image/jpeg", "image/png"];

/// One uploaded artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
  /// 64 lowercase hex chars; globally unique across subjects.
  pub fingerprint:     String,
  pub subject_id:      String,
  pub declared_name:   String,
  pub byte_size:       u64,
  pub media_type:      String,
  pub storage_pointer: String,
  pub is_original:     bool,
  pub created_at:      DateTime<Utc>,
}

/// Input to [`crate::store::ProvenanceStore::record_document`].
/// `created_at` is stamped by the caller-supplied clock, not accepted raw.
#[derive(Debug, Clone)]
pub struct NewDocument {
  pub fingerprint:        String,
  pub subject_id:         String,
  pub declared_name:      String,
  pub byte_size:          u64,
  pub media_type:         String,
  pub storage_pointer:    String,
  /// Explicit request to designate this upload as the original. A subject's
  /// first-ever document becomes original regardless of this flag.
  pub designate_original: bool,
}

/// One row per subject: the recorded original and the append-only,
/// insertion-ordered, duplicate-free fingerprint history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectDocumentIndex {
  pub subject_id:                  String,
  pub original_fingerprint:        Option<String>,
  pub storage_pointer_of_original: Option<String>,
  pub fingerprint_history:         Vec<String>,
}

/// Validate upload constraints: non-empty, size cap, media type allow-list.
pub fn validate_upload(content: &[u8], media_type: &str) -> Result<()> {
  if content.is_empty() {
    return Err(Error::Validation("document content is empty".into()));
  }
  if content.len() > MAX_DOCUMENT_BYTES {
    return Err(Error::Validation(format!(
      "document exceeds {MAX_DOCUMENT_BYTES} bytes"
    )));
  }
  if !ALLOWED_MEDIA_TYPES.contains(&media_type) {
    return Err(Error::Validation(format!(
      "unsupported media type: {media_type}"
    )));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accepts_allowed_upload() {
    assert!(validate_upload(b"%PDF-1.7", "application/pdf").is_ok());
  }

  #[test]
  fn rejects_empty_oversize_and_unknown_type() {
    assert!(validate_upload(b"", "application/pdf").is_err());
    assert!(validate_upload(&vec![0u8; MAX_DOCUMENT_BYTES + 1], "image/png").is_err());
    assert!(validate_upload(b"x", "text/html").is_err());
  }
}
