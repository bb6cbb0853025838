//! Content-addressed document fingerprinting.
//!
//! A fingerprint is the lowercase-hex SHA-256 of the raw content bytes, the
//! UTF-8 declared name, a millisecond-resolution timestamp, and 16 random
//! bytes rendered as hex. Salting by timestamp plus randomness means the
//! same file uploaded twice never produces the same fingerprint: each upload
//! event is a distinct provenance record. This is deliberate policy.

use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore as _};
use sha2::{Digest as _, Sha256};

use crate::{Error, Result};

// ─── Injectable collaborators ────────────────────────────────────────────────

/// Source of the current time. Injectable so fingerprinting and timestamping
/// are deterministic under test.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> { Utc::now() }
}

/// Source of fingerprint salt material.
pub trait SaltSource: Send + Sync {
  fn salt16(&self) -> [u8; 16];
}

/// Operating-system randomness.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsSaltSource;

impl SaltSource for OsSaltSource {
  fn salt16(&self) -> [u8; 16] {
    let mut buf = [0u8; 16];
    OsRng.fill_bytes(&mut buf);
    buf
  }
}

// ─── Fingerprinting ──────────────────────────────────────────────────────────

/// The freshness salt folded into a fingerprint, kept for audit metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaltMaterial {
  pub timestamp_ms: i64,
  /// 32 hex chars (16 random bytes).
  pub salt_hex:     String,
}

/// Derive a fingerprint for one upload event.
///
/// Empty content is rejected; there are no other error conditions.
pub fn fingerprint(
  content:       &[u8],
  declared_name: &str,
  clock:         &dyn Clock,
  salts:         &dyn SaltSource,
) -> Result<(String, SaltMaterial)> {
  if content.is_empty() {
    return Err(Error::Validation("document content is empty".into()));
  }

  let timestamp_ms = clock.now().timestamp_millis();
  let salt_hex     = hex::encode(salts.salt16());

  let mut hasher = Sha256::new();
  hasher.update(content);
  hasher.update(declared_name.as_bytes());
  hasher.update(timestamp_ms.to_string().as_bytes());
  hasher.update(salt_hex.as_bytes());

  let digest = hex::encode(hasher.finalize());
  Ok((digest, SaltMaterial { timestamp_ms, salt_hex }))
}

/// A well-formed fingerprint is exactly 64 lowercase hex characters.
pub fn is_well_formed(candidate: &str) -> bool {
  candidate.len() == 64
    && candidate
      .bytes()
      .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone as _;

  use super::*;

  struct FixedClock(DateTime<Utc>);
  impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> { self.0 }
  }

  struct FixedSalt([u8; 16]);
  impl SaltSource for FixedSalt {
    fn salt16(&self) -> [u8; 16] { self.0 }
  }

  fn fixed_clock() -> FixedClock {
    FixedClock(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
  }

  #[test]
  fn output_is_well_formed() {
    let (fp, salt) =
      fingerprint(b"content", "cv.pdf", &fixed_clock(), &OsSaltSource).unwrap();
    assert!(is_well_formed(&fp));
    assert_eq!(salt.salt_hex.len(), 32);
  }

  #[test]
  fn deterministic_under_fixed_clock_and_salt() {
    let clock = fixed_clock();
    let salts = FixedSalt([7u8; 16]);
    let (a, _) = fingerprint(b"content", "cv.pdf", &clock, &salts).unwrap();
    let (b, _) = fingerprint(b"content", "cv.pdf", &clock, &salts).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn identical_uploads_never_collide() {
    // Same bytes, same name, real salt source: distinct fingerprints.
    let clock = fixed_clock();
    let (a, _) = fingerprint(b"content", "cv.pdf", &clock, &OsSaltSource).unwrap();
    let (b, _) = fingerprint(b"content", "cv.pdf", &clock, &OsSaltSource).unwrap();
    assert_ne!(a, b);
  }

  #[test]
  fn declared_name_is_folded_in() {
    let clock = fixed_clock();
    let salts = FixedSalt([7u8; 16]);
    let (a, _) = fingerprint(b"content", "one.pdf", &clock, &salts).unwrap();
    let (b, _) = fingerprint(b"content", "two.pdf", &clock, &salts).unwrap();
    assert_ne!(a, b);
  }

  #[test]
  fn empty_content_is_rejected() {
    let err = fingerprint(b"", "cv.pdf", &fixed_clock(), &OsSaltSource)
      .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
  }

  #[test]
  fn well_formedness_checks() {
    assert!(is_well_formed(&"a".repeat(64)));
    assert!(!is_well_formed(&"a".repeat(63)));
    assert!(!is_well_formed(&"A".repeat(64)));
    assert!(!is_well_formed(&"g".repeat(64)));
  }
}
