//! Error type for `attest-store-sqlite`.
//!
//! Domain-level outcomes (conflicts, absences, illegal transitions) are
//! reported directly as [`attest_core::Error`] variants by the store; this
//! type covers backend-internal failures, which cross the trait boundary
//! wrapped in [`attest_core::Error::Store`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("decode error: {0}")]
  Decode(String),
}

impl From<Error> for attest_core::Error {
  fn from(e: Error) -> Self { attest_core::Error::Store(Box::new(e)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
