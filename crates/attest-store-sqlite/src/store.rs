//! [`SqliteStore`] — the SQLite implementation of [`ProvenanceStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use attest_core::{
  Error as CoreError, Result as CoreResult,
  audit::{AuditLogEntry, AuditScope, NewAuditEntry},
  authorization::{
    Authorization, AuthorizationStatus, IssuerPolicy, NewAuthorization,
  },
  document::{Document, NewDocument, SubjectDocumentIndex},
  store::ProvenanceStore,
  subject::Subject,
  verification::{
    NewVerificationRequest, VerificationRequest, VerificationResult,
    VerificationStatus,
  },
};

use crate::{
  Error,
  encode::{
    RawAuditEntry, RawAuthorization, RawDocument, RawSubject,
    RawVerificationRequest, decode_auth_status, encode_auth_status,
    encode_dt, encode_scope, encode_uuid, encode_verification_status,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An Attest provenance store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. All calls
/// run on the connection's dedicated thread, so every closure below executes
/// serialized; the explicit transactions additionally make the multi-step
/// writes atomic against process crashes.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> crate::Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> crate::Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> crate::Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Closure outcomes ────────────────────────────────────────────────────────
//
// The `conn.call` closures cannot return the core error taxonomy directly,
// so multi-step writes report a small outcome enum and the mapping to typed
// errors happens on the async side.

enum RecordOutcome {
  Recorded(RawDocument),
  SubjectMissing,
  OwnedByOther,
  OriginalRecorded,
}

enum PromoteOutcome {
  Promoted(RawDocument),
  NotFound,
}

enum RetractOutcome {
  Retracted,
  NotFound,
  IsOriginal,
}

enum CreateAuthOutcome {
  Created(RawAuthorization),
  PairExists,
}

enum TransitionOutcome {
  Done(RawAuthorization),
  NotFound,
  Illegal { from: AuthorizationStatus },
  BadRow(String),
}

// ─── Row mapping helpers ─────────────────────────────────────────────────────

fn subject_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSubject> {
  Ok(RawSubject {
    subject_id:   row.get(0)?,
    subject_hash: row.get(1)?,
    created_at:   row.get(2)?,
  })
}

fn document_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawDocument> {
  Ok(RawDocument {
    fingerprint:     row.get(0)?,
    subject_id:      row.get(1)?,
    declared_name:   row.get(2)?,
    byte_size:       row.get(3)?,
    media_type:      row.get(4)?,
    storage_pointer: row.get(5)?,
    is_original:     row.get(6)?,
    created_at:      row.get(7)?,
  })
}

fn authorization_from_row(
  row: &rusqlite::Row<'_>,
) -> rusqlite::Result<RawAuthorization> {
  Ok(RawAuthorization {
    auth_id:            row.get(0)?,
    issuer_id:          row.get(1)?,
    subject_id:         row.get(2)?,
    status:             row.get(3)?,
    permission_granted: row.get(4)?,
    reason:             row.get(5)?,
    granted_at:         row.get(6)?,
    revoked_at:         row.get(7)?,
    created_by:         row.get(8)?,
    created_at:         row.get(9)?,
  })
}

fn verification_from_row(
  row: &rusqlite::Row<'_>,
) -> rusqlite::Result<RawVerificationRequest> {
  Ok(RawVerificationRequest {
    request_id:          row.get(0)?,
    subject_id:          row.get(1)?,
    claimed_fingerprint: row.get(2)?,
    issuer_id:           row.get(3)?,
    status:              row.get(4)?,
    is_valid:            row.get(5)?,
    verification_date:   row.get(6)?,
    result_message:      row.get(7)?,
    requester_ip:        row.get(8)?,
    created_at:          row.get(9)?,
  })
}

fn audit_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawAuditEntry> {
  Ok(RawAuditEntry {
    entry_id:   row.get(0)?,
    scope:      row.get(1)?,
    related_id: row.get(2)?,
    action:     row.get(3)?,
    actor:      row.get(4)?,
    ip_address: row.get(5)?,
    timestamp:  row.get(6)?,
    details:    row.get(7)?,
  })
}

const DOCUMENT_COLS: &str = "fingerprint, subject_id, declared_name, \
   byte_size, media_type, storage_pointer, is_original, created_at";

const AUTHORIZATION_COLS: &str = "auth_id, issuer_id, subject_id, status, \
   permission_granted, reason, granted_at, revoked_at, created_by, created_at";

const VERIFICATION_COLS: &str = "request_id, subject_id, \
   claimed_fingerprint, issuer_id, status, is_valid, verification_date, \
   result_message, requester_ip, created_at";

// ─── ProvenanceStore impl ────────────────────────────────────────────────────

impl ProvenanceStore for SqliteStore {
  // ── Subjects ──────────────────────────────────────────────────────────

  async fn register_subject(&self, subject: Subject) -> CoreResult<Subject> {
    let subject_id = subject.subject_id.clone();
    let row = RawSubject {
      subject_id:   subject.subject_id.clone(),
      subject_hash: subject.subject_hash.clone(),
      created_at:   encode_dt(subject.created_at),
    };

    let created = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let exists: bool = tx
          .query_row(
            "SELECT 1 FROM subjects WHERE subject_id = ?1",
            rusqlite::params![row.subject_id],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if exists {
          return Ok(false);
        }

        tx.execute(
          "INSERT INTO subjects (subject_id, subject_hash, created_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![row.subject_id, row.subject_hash, row.created_at],
        )?;
        tx.execute(
          "INSERT INTO subject_index (subject_id) VALUES (?1)",
          rusqlite::params![row.subject_id],
        )?;

        tx.commit()?;
        Ok(true)
      })
      .await
      .map_err(Error::Database)?;

    if !created {
      return Err(CoreError::SubjectExists(subject_id));
    }
    Ok(subject)
  }

  async fn get_subject(&self, subject_id: &str) -> CoreResult<Option<Subject>> {
    let id = subject_id.to_owned();
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT subject_id, subject_hash, created_at
               FROM subjects WHERE subject_id = ?1",
              rusqlite::params![id],
              subject_from_row,
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::Database)?;

    Ok(raw.map(RawSubject::into_subject).transpose()?)
  }

  // ── Document ledger ───────────────────────────────────────────────────

  async fn record_document(
    &self,
    input: NewDocument,
    now:   DateTime<Utc>,
  ) -> CoreResult<Document> {
    let fingerprint = input.fingerprint.clone();
    let subject_for_err = input.subject_id.clone();
    let now_str = encode_dt(now);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let subject_exists: bool = tx
          .query_row(
            "SELECT 1 FROM subjects WHERE subject_id = ?1",
            rusqlite::params![input.subject_id],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !subject_exists {
          return Ok(RecordOutcome::SubjectMissing);
        }

        // A fingerprint belongs to exactly one subject, forever.
        let owner: Option<String> = tx
          .query_row(
            "SELECT subject_id FROM documents WHERE fingerprint = ?1",
            rusqlite::params![input.fingerprint],
            |r| r.get(0),
          )
          .optional()?;
        match owner {
          Some(owner) if owner != input.subject_id => {
            return Ok(RecordOutcome::OwnedByOther);
          }
          Some(_) => {
            // Same upload replayed. Return the existing row unchanged.
            let raw = tx.query_row(
              &format!(
                "SELECT {DOCUMENT_COLS} FROM documents WHERE fingerprint = ?1"
              ),
              rusqlite::params![input.fingerprint],
              document_from_row,
            )?;
            tx.commit()?;
            return Ok(RecordOutcome::Recorded(raw));
          }
          None => {}
        }

        let previous_original: Option<String> = tx
          .query_row(
            "SELECT original_fingerprint FROM subject_index
             WHERE subject_id = ?1",
            rusqlite::params![input.subject_id],
            |r| r.get(0),
          )
          .optional()?
          .flatten();

        // First upload wins; once an original is on record, displacement
        // only happens through the explicit promotion path.
        if input.designate_original && previous_original.is_some() {
          return Ok(RecordOutcome::OriginalRecorded);
        }
        let is_original = previous_original.is_none();

        tx.execute(
          "INSERT INTO documents (fingerprint, subject_id, declared_name,
             byte_size, media_type, storage_pointer, is_original, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            input.fingerprint,
            input.subject_id,
            input.declared_name,
            input.byte_size as i64,
            input.media_type,
            input.storage_pointer,
            is_original,
            now_str,
          ],
        )?;

        if is_original {
          tx.execute(
            "INSERT INTO subject_index
               (subject_id, original_fingerprint, storage_pointer_of_original)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(subject_id) DO UPDATE SET
               original_fingerprint        = excluded.original_fingerprint,
               storage_pointer_of_original = excluded.storage_pointer_of_original",
            rusqlite::params![
              input.subject_id,
              input.fingerprint,
              input.storage_pointer,
            ],
          )?;
        }

        // Append-only, insertion-ordered, duplicate-free.
        tx.execute(
          "INSERT OR IGNORE INTO fingerprint_history (subject_id, seq, fingerprint)
           SELECT ?1,
                  COALESCE((SELECT MAX(seq) FROM fingerprint_history
                            WHERE subject_id = ?1), -1) + 1,
                  ?2",
          rusqlite::params![input.subject_id, input.fingerprint],
        )?;

        let raw = tx.query_row(
          &format!(
            "SELECT {DOCUMENT_COLS} FROM documents WHERE fingerprint = ?1"
          ),
          rusqlite::params![input.fingerprint],
          document_from_row,
        )?;

        tx.commit()?;
        Ok(RecordOutcome::Recorded(raw))
      })
      .await
      .map_err(Error::Database)?;

    match outcome {
      RecordOutcome::Recorded(raw) => Ok(raw.into_document()?),
      RecordOutcome::SubjectMissing => {
        Err(CoreError::SubjectNotFound(subject_for_err))
      }
      RecordOutcome::OwnedByOther => {
        Err(CoreError::FingerprintOwnedByOther(fingerprint))
      }
      RecordOutcome::OriginalRecorded => {
        Err(CoreError::OriginalAlreadyRecorded(subject_for_err))
      }
    }
  }

  async fn promote_original(&self, fingerprint: &str) -> CoreResult<Document> {
    let fp = fingerprint.to_owned();
    let fp_for_err = fp.clone();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let subject_id: Option<String> = tx
          .query_row(
            "SELECT subject_id FROM documents WHERE fingerprint = ?1",
            rusqlite::params![fp],
            |r| r.get(0),
          )
          .optional()?;
        let Some(subject_id) = subject_id else {
          return Ok(PromoteOutcome::NotFound);
        };

        tx.execute(
          "UPDATE documents SET is_original = 0
           WHERE subject_id = ?1 AND is_original = 1 AND fingerprint != ?2",
          rusqlite::params![subject_id, fp],
        )?;
        tx.execute(
          "UPDATE documents SET is_original = 1 WHERE fingerprint = ?1",
          rusqlite::params![fp],
        )?;
        tx.execute(
          "UPDATE subject_index SET
             original_fingerprint        = ?2,
             storage_pointer_of_original =
               (SELECT storage_pointer FROM documents WHERE fingerprint = ?2)
           WHERE subject_id = ?1",
          rusqlite::params![subject_id, fp],
        )?;

        let raw = tx.query_row(
          &format!(
            "SELECT {DOCUMENT_COLS} FROM documents WHERE fingerprint = ?1"
          ),
          rusqlite::params![fp],
          document_from_row,
        )?;

        tx.commit()?;
        Ok(PromoteOutcome::Promoted(raw))
      })
      .await
      .map_err(Error::Database)?;

    match outcome {
      PromoteOutcome::Promoted(raw) => Ok(raw.into_document()?),
      PromoteOutcome::NotFound => Err(CoreError::DocumentNotFound(fp_for_err)),
    }
  }

  async fn get_document(&self, fingerprint: &str) -> CoreResult<Option<Document>> {
    let fp = fingerprint.to_owned();
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {DOCUMENT_COLS} FROM documents WHERE fingerprint = ?1"
              ),
              rusqlite::params![fp],
              document_from_row,
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::Database)?;

    Ok(raw.map(RawDocument::into_document).transpose()?)
  }

  async fn get_index(
    &self,
    subject_id: &str,
  ) -> CoreResult<Option<SubjectDocumentIndex>> {
    let id = subject_id.to_owned();
    let index = self
      .conn
      .call(move |conn| {
        let head: Option<(Option<String>, Option<String>)> = conn
          .query_row(
            "SELECT original_fingerprint, storage_pointer_of_original
             FROM subject_index WHERE subject_id = ?1",
            rusqlite::params![id],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )
          .optional()?;
        let Some((original, pointer)) = head else {
          return Ok(None);
        };

        let mut stmt = conn.prepare(
          "SELECT fingerprint FROM fingerprint_history
           WHERE subject_id = ?1 ORDER BY seq",
        )?;
        let history = stmt
          .query_map(rusqlite::params![id], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;

        Ok(Some(SubjectDocumentIndex {
          subject_id:                  id,
          original_fingerprint:        original,
          storage_pointer_of_original: pointer,
          fingerprint_history:         history,
        }))
      })
      .await
      .map_err(Error::Database)?;

    Ok(index)
  }

  async fn get_history(&self, subject_id: &str) -> CoreResult<Vec<Document>> {
    let id = subject_id.to_owned();
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {DOCUMENT_COLS} FROM documents
           WHERE subject_id = ?1 ORDER BY rowid"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id], document_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::Database)?;

    raws
      .into_iter()
      .map(|raw| raw.into_document().map_err(CoreError::from))
      .collect()
  }

  async fn retract_document(&self, fingerprint: &str) -> CoreResult<()> {
    let fp = fingerprint.to_owned();
    let fp_for_err = fp.clone();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let is_original: Option<bool> = tx
          .query_row(
            "SELECT is_original FROM documents WHERE fingerprint = ?1",
            rusqlite::params![fp],
            |r| r.get(0),
          )
          .optional()?;
        let outcome = match is_original {
          None => RetractOutcome::NotFound,
          Some(true) => RetractOutcome::IsOriginal,
          Some(false) => {
            // The fingerprint_history row stays: history is append-only.
            tx.execute(
              "DELETE FROM documents WHERE fingerprint = ?1",
              rusqlite::params![fp],
            )?;
            RetractOutcome::Retracted
          }
        };

        tx.commit()?;
        Ok(outcome)
      })
      .await
      .map_err(Error::Database)?;

    match outcome {
      RetractOutcome::Retracted => Ok(()),
      RetractOutcome::NotFound => Err(CoreError::DocumentNotFound(fp_for_err)),
      RetractOutcome::IsOriginal => Err(CoreError::OriginalRetained(fp_for_err)),
    }
  }

  // ── Authorization ─────────────────────────────────────────────────────

  async fn create_authorization(
    &self,
    input: NewAuthorization,
    now:   DateTime<Utc>,
  ) -> CoreResult<Authorization> {
    let auth_id = Uuid::new_v4();
    let issuer_for_err = input.issuer_id.clone();
    let subject_for_err = input.subject_id.clone();
    let id_str = encode_uuid(auth_id);
    let now_str = encode_dt(now);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // The pair is the natural key; any existing row is a conflict.
        let exists: bool = tx
          .query_row(
            "SELECT 1 FROM authorizations
             WHERE issuer_id = ?1 AND subject_id = ?2",
            rusqlite::params![input.issuer_id, input.subject_id],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if exists {
          return Ok(CreateAuthOutcome::PairExists);
        }

        tx.execute(
          "INSERT INTO authorizations
             (auth_id, issuer_id, subject_id, status, permission_granted,
              reason, created_by, created_at)
           VALUES (?1, ?2, ?3, 'pending', 0, ?4, ?5, ?6)",
          rusqlite::params![
            id_str,
            input.issuer_id,
            input.subject_id,
            input.reason,
            input.created_by,
            now_str,
          ],
        )?;

        let raw = tx.query_row(
          &format!(
            "SELECT {AUTHORIZATION_COLS} FROM authorizations WHERE auth_id = ?1"
          ),
          rusqlite::params![id_str],
          authorization_from_row,
        )?;

        tx.commit()?;
        Ok(CreateAuthOutcome::Created(raw))
      })
      .await
      .map_err(Error::Database)?;

    match outcome {
      CreateAuthOutcome::Created(raw) => Ok(raw.into_authorization()?),
      CreateAuthOutcome::PairExists => Err(CoreError::AlreadyAuthorized {
        issuer_id:  issuer_for_err,
        subject_id: subject_for_err,
      }),
    }
  }

  async fn get_authorization(
    &self,
    auth_id: Uuid,
  ) -> CoreResult<Option<Authorization>> {
    let id_str = encode_uuid(auth_id);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {AUTHORIZATION_COLS} FROM authorizations
                 WHERE auth_id = ?1"
              ),
              rusqlite::params![id_str],
              authorization_from_row,
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::Database)?;

    Ok(raw.map(RawAuthorization::into_authorization).transpose()?)
  }

  async fn find_authorization(
    &self,
    issuer_id:  &str,
    subject_id: &str,
  ) -> CoreResult<Option<Authorization>> {
    let issuer = issuer_id.to_owned();
    let subject = subject_id.to_owned();
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {AUTHORIZATION_COLS} FROM authorizations
                 WHERE issuer_id = ?1 AND subject_id = ?2"
              ),
              rusqlite::params![issuer, subject],
              authorization_from_row,
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::Database)?;

    Ok(raw.map(RawAuthorization::into_authorization).transpose()?)
  }

  async fn transition_authorization(
    &self,
    auth_id: Uuid,
    to:      AuthorizationStatus,
    reason:  Option<String>,
    now:     DateTime<Utc>,
  ) -> CoreResult<Authorization> {
    let id_str = encode_uuid(auth_id);
    let now_str = encode_dt(now);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let status_str: Option<String> = tx
          .query_row(
            "SELECT status FROM authorizations WHERE auth_id = ?1",
            rusqlite::params![id_str],
            |r| r.get(0),
          )
          .optional()?;
        let Some(status_str) = status_str else {
          return Ok(TransitionOutcome::NotFound);
        };
        let from = match decode_auth_status(&status_str) {
          Ok(from) => from,
          Err(e) => return Ok(TransitionOutcome::BadRow(e.to_string())),
        };
        if !from.can_transition_to(to) {
          return Ok(TransitionOutcome::Illegal { from });
        }

        let to_str = encode_auth_status(to);
        match to {
          AuthorizationStatus::Approved => {
            tx.execute(
              "UPDATE authorizations SET
                 status = ?2, permission_granted = 1,
                 granted_at = ?3, reason = COALESCE(?4, reason)
               WHERE auth_id = ?1",
              rusqlite::params![id_str, to_str, now_str, reason],
            )?;
          }
          AuthorizationStatus::Rejected => {
            tx.execute(
              "UPDATE authorizations SET
                 status = ?2, permission_granted = 0,
                 reason = COALESCE(?3, reason)
               WHERE auth_id = ?1",
              rusqlite::params![id_str, to_str, reason],
            )?;
          }
          AuthorizationStatus::Revoked => {
            tx.execute(
              "UPDATE authorizations SET
                 status = ?2, permission_granted = 0,
                 revoked_at = ?3, reason = COALESCE(?4, reason)
               WHERE auth_id = ?1",
              rusqlite::params![id_str, to_str, now_str, reason],
            )?;
          }
          // Unreachable: no ordinary transition targets Pending.
          AuthorizationStatus::Pending => {
            return Ok(TransitionOutcome::Illegal { from });
          }
        }

        let raw = tx.query_row(
          &format!(
            "SELECT {AUTHORIZATION_COLS} FROM authorizations WHERE auth_id = ?1"
          ),
          rusqlite::params![id_str],
          authorization_from_row,
        )?;

        tx.commit()?;
        Ok(TransitionOutcome::Done(raw))
      })
      .await
      .map_err(Error::Database)?;

    match outcome {
      TransitionOutcome::Done(raw) => Ok(raw.into_authorization()?),
      TransitionOutcome::NotFound => {
        Err(CoreError::AuthorizationNotFound(auth_id.to_string()))
      }
      TransitionOutcome::Illegal { from } => {
        Err(CoreError::InvalidTransition { from, to })
      }
      TransitionOutcome::BadRow(detail) => {
        Err(Error::Decode(detail).into())
      }
    }
  }

  async fn reset_authorization(
    &self,
    auth_id: Uuid,
    reason:  Option<String>,
  ) -> CoreResult<Authorization> {
    let id_str = encode_uuid(auth_id);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let status_str: Option<String> = tx
          .query_row(
            "SELECT status FROM authorizations WHERE auth_id = ?1",
            rusqlite::params![id_str],
            |r| r.get(0),
          )
          .optional()?;
        let Some(status_str) = status_str else {
          return Ok(TransitionOutcome::NotFound);
        };
        let from = match decode_auth_status(&status_str) {
          Ok(from) => from,
          Err(e) => return Ok(TransitionOutcome::BadRow(e.to_string())),
        };
        if !from.is_terminal() {
          return Ok(TransitionOutcome::Illegal { from });
        }

        tx.execute(
          "UPDATE authorizations SET
             status = 'pending', permission_granted = 0,
             granted_at = NULL, revoked_at = NULL,
             reason = COALESCE(?2, reason)
           WHERE auth_id = ?1",
          rusqlite::params![id_str, reason],
        )?;

        let raw = tx.query_row(
          &format!(
            "SELECT {AUTHORIZATION_COLS} FROM authorizations WHERE auth_id = ?1"
          ),
          rusqlite::params![id_str],
          authorization_from_row,
        )?;

        tx.commit()?;
        Ok(TransitionOutcome::Done(raw))
      })
      .await
      .map_err(Error::Database)?;

    match outcome {
      TransitionOutcome::Done(raw) => Ok(raw.into_authorization()?),
      TransitionOutcome::NotFound => {
        Err(CoreError::AuthorizationNotFound(auth_id.to_string()))
      }
      TransitionOutcome::Illegal { from } => Err(CoreError::InvalidTransition {
        from,
        to: AuthorizationStatus::Pending,
      }),
      TransitionOutcome::BadRow(detail) => Err(Error::Decode(detail).into()),
    }
  }

  async fn list_authorizations(
    &self,
    issuer_id: &str,
  ) -> CoreResult<Vec<Authorization>> {
    let issuer = issuer_id.to_owned();
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {AUTHORIZATION_COLS} FROM authorizations
           WHERE issuer_id = ?1 ORDER BY created_at, rowid"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![issuer], authorization_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::Database)?;

    raws
      .into_iter()
      .map(|raw| raw.into_authorization().map_err(CoreError::from))
      .collect()
  }

  async fn is_permitted(
    &self,
    issuer_id:  &str,
    subject_id: &str,
  ) -> CoreResult<bool> {
    let issuer = issuer_id.to_owned();
    let subject = subject_id.to_owned();
    let permitted = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM authorizations
               WHERE issuer_id = ?1 AND subject_id = ?2
                 AND status = 'approved' AND permission_granted = 1",
              rusqlite::params![issuer, subject],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await
      .map_err(Error::Database)?;

    Ok(permitted)
  }

  async fn issuer_policy(&self, issuer_id: &str) -> CoreResult<IssuerPolicy> {
    let issuer = issuer_id.to_owned();
    let auto_approve = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT auto_approve FROM issuer_policies WHERE issuer_id = ?1",
              rusqlite::params![issuer],
              |r| r.get(0),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await
      .map_err(Error::Database)?;

    Ok(IssuerPolicy { auto_approve })
  }

  async fn set_issuer_policy(
    &self,
    issuer_id: &str,
    policy:    IssuerPolicy,
  ) -> CoreResult<()> {
    let issuer = issuer_id.to_owned();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO issuer_policies (issuer_id, auto_approve)
           VALUES (?1, ?2)
           ON CONFLICT(issuer_id) DO UPDATE SET
             auto_approve = excluded.auto_approve",
          rusqlite::params![issuer, policy.auto_approve],
        )?;
        Ok(())
      })
      .await
      .map_err(Error::Database)?;

    Ok(())
  }

  // ── Verification ──────────────────────────────────────────────────────

  async fn create_verification_request(
    &self,
    input: NewVerificationRequest,
    now:   DateTime<Utc>,
  ) -> CoreResult<VerificationRequest> {
    let request = VerificationRequest {
      request_id:          Uuid::new_v4(),
      subject_id:          input.subject_id,
      claimed_fingerprint: input.claimed_fingerprint,
      issuer_id:           input.issuer_id,
      status:              VerificationStatus::Pending,
      is_valid:            false,
      verification_date:   None,
      result_message:      None,
      requester_ip:        input.requester_ip,
      created_at:          now,
    };

    let id_str = encode_uuid(request.request_id);
    let subject = request.subject_id.clone();
    let fingerprint = request.claimed_fingerprint.clone();
    let issuer = request.issuer_id.clone();
    let ip = request.requester_ip.clone();
    let now_str = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO verification_requests
             (request_id, subject_id, claimed_fingerprint, issuer_id,
              status, is_valid, requester_ip, created_at)
           VALUES (?1, ?2, ?3, ?4, 'pending', 0, ?5, ?6)",
          rusqlite::params![id_str, subject, fingerprint, issuer, ip, now_str],
        )?;
        Ok(())
      })
      .await
      .map_err(Error::Database)?;

    Ok(request)
  }

  async fn resolve_verification(
    &self,
    request_id: Uuid,
    status:     VerificationStatus,
    is_valid:   bool,
    message:    &str,
    date:       DateTime<Utc>,
  ) -> CoreResult<VerificationRequest> {
    let id_str = encode_uuid(request_id);
    let status_str = encode_verification_status(status);
    let message = message.to_owned();
    let date_str = encode_dt(date);

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let updated = tx.execute(
          "UPDATE verification_requests SET
             status = ?2, is_valid = ?3,
             verification_date = ?4, result_message = ?5
           WHERE request_id = ?1",
          rusqlite::params![id_str, status_str, is_valid, message, date_str],
        )?;
        if updated == 0 {
          tx.commit()?;
          return Ok(None);
        }

        let raw = tx.query_row(
          &format!(
            "SELECT {VERIFICATION_COLS} FROM verification_requests
             WHERE request_id = ?1"
          ),
          rusqlite::params![id_str],
          verification_from_row,
        )?;

        tx.commit()?;
        Ok(Some(raw))
      })
      .await
      .map_err(Error::Database)?;

    match raw {
      Some(raw) => Ok(raw.into_request()?),
      None => Err(CoreError::VerificationNotFound(request_id.to_string())),
    }
  }

  async fn attach_verification_result(
    &self,
    result: VerificationResult,
  ) -> CoreResult<()> {
    let id_str = encode_uuid(result.request_id);
    let subject_details = result.subject_details.to_string();
    let metadata = result.metadata.to_string();
    let preview_ref = result.preview_ref;
    let download_ref = result.download_ref;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO verification_results
             (request_id, subject_details, preview_ref, download_ref, metadata)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![
            id_str,
            subject_details,
            preview_ref,
            download_ref,
            metadata,
          ],
        )?;
        Ok(())
      })
      .await
      .map_err(Error::Database)?;

    Ok(())
  }

  async fn list_verifications(
    &self,
    subject_id: &str,
  ) -> CoreResult<Vec<VerificationRequest>> {
    let id = subject_id.to_owned();
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {VERIFICATION_COLS} FROM verification_requests
           WHERE subject_id = ?1 ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id], verification_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::Database)?;

    raws
      .into_iter()
      .map(|raw| raw.into_request().map_err(CoreError::from))
      .collect()
  }

  // ── Audit log ─────────────────────────────────────────────────────────

  async fn append_audit(
    &self,
    entry: NewAuditEntry,
    now:   DateTime<Utc>,
  ) -> CoreResult<AuditLogEntry> {
    let entry = AuditLogEntry {
      entry_id:   Uuid::new_v4(),
      scope:      entry.scope,
      related_id: entry.related_id,
      action:     entry.action,
      actor:      entry.actor,
      ip_address: entry.ip_address,
      timestamp:  now,
      details:    entry.details,
    };

    let id_str = encode_uuid(entry.entry_id);
    let scope_str = encode_scope(entry.scope);
    let related_id = entry.related_id.clone();
    let action = entry.action.clone();
    let actor = entry.actor.clone();
    let ip = entry.ip_address.clone();
    let ts_str = encode_dt(entry.timestamp);
    let details = entry.details.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO audit_log
             (entry_id, scope, related_id, action, actor, ip_address,
              timestamp, details)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            id_str, scope_str, related_id, action, actor, ip, ts_str, details,
          ],
        )?;
        Ok(())
      })
      .await
      .map_err(Error::Database)?;

    Ok(entry)
  }

  async fn list_audit(
    &self,
    scope:      AuditScope,
    related_id: &str,
  ) -> CoreResult<Vec<AuditLogEntry>> {
    let scope_str = encode_scope(scope);
    let related = related_id.to_owned();
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT entry_id, scope, related_id, action, actor, ip_address,
                  timestamp, details
           FROM audit_log
           WHERE scope = ?1 AND related_id = ?2
           ORDER BY timestamp DESC, rowid DESC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![scope_str, related], audit_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::Database)?;

    raws
      .into_iter()
      .map(|raw| raw.into_entry().map_err(CoreError::from))
      .collect()
  }
}
