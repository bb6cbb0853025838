//! SQL schema for the Attest SQLite store.
//!
//! Executed unconditionally at connection startup; the DDL is idempotent
//! thanks to `IF NOT EXISTS`. The batch stamps `PRAGMA user_version` so
//! future migrations can key off the schema version.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS subjects (
    subject_id   TEXT PRIMARY KEY,
    subject_hash TEXT NOT NULL UNIQUE,
    created_at   TEXT NOT NULL
);

-- One row per upload event. Only is_original ever changes, and only
-- through the ledger's promotion rules.
CREATE TABLE IF NOT EXISTS documents (
    fingerprint     TEXT PRIMARY KEY,
    subject_id      TEXT NOT NULL REFERENCES subjects(subject_id),
    declared_name   TEXT NOT NULL,
    byte_size       INTEGER NOT NULL,
    media_type      TEXT NOT NULL,
    storage_pointer TEXT NOT NULL,
    is_original     INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL
);

-- One row per subject: the recorded original designation.
CREATE TABLE IF NOT EXISTS subject_index (
    subject_id                  TEXT PRIMARY KEY REFERENCES subjects(subject_id),
    original_fingerprint        TEXT,
    storage_pointer_of_original TEXT
);

-- Append-only, insertion-ordered, duplicate-free fingerprint history.
-- Rows survive the retraction of their document.
CREATE TABLE IF NOT EXISTS fingerprint_history (
    subject_id  TEXT NOT NULL REFERENCES subjects(subject_id),
    seq         INTEGER NOT NULL,
    fingerprint TEXT NOT NULL,
    PRIMARY KEY (subject_id, seq),
    UNIQUE (subject_id, fingerprint)
);

-- The (issuer, subject) natural key prevents duplicate live grants.
-- Rows are never deleted, only transitioned.
CREATE TABLE IF NOT EXISTS authorizations (
    auth_id            TEXT PRIMARY KEY,
    issuer_id          TEXT NOT NULL,
    subject_id         TEXT NOT NULL REFERENCES subjects(subject_id),
    status             TEXT NOT NULL DEFAULT 'pending',
    permission_granted INTEGER NOT NULL DEFAULT 0,
    reason             TEXT,
    granted_at         TEXT,
    revoked_at         TEXT,
    created_by         TEXT,
    created_at         TEXT NOT NULL,
    UNIQUE (issuer_id, subject_id)
);

CREATE TABLE IF NOT EXISTS issuer_policies (
    issuer_id    TEXT PRIMARY KEY,
    auto_approve INTEGER NOT NULL DEFAULT 0
);

-- Always written, even for malformed input, so the trail has no gaps.
-- subject_id is the *claimed* identifier and may not resolve.
CREATE TABLE IF NOT EXISTS verification_requests (
    request_id          TEXT PRIMARY KEY,
    subject_id          TEXT NOT NULL,
    claimed_fingerprint TEXT NOT NULL,
    issuer_id           TEXT,
    status              TEXT NOT NULL DEFAULT 'pending',
    is_valid            INTEGER NOT NULL DEFAULT 0,
    verification_date   TEXT,
    result_message      TEXT,
    requester_ip        TEXT,
    created_at          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS verification_results (
    request_id      TEXT PRIMARY KEY REFERENCES verification_requests(request_id),
    subject_details TEXT NOT NULL,   -- JSON snapshot
    preview_ref     TEXT NOT NULL,
    download_ref    TEXT NOT NULL,
    metadata        TEXT NOT NULL    -- JSON
);

-- Strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS audit_log (
    entry_id   TEXT PRIMARY KEY,
    scope      TEXT NOT NULL,       -- 'authorization' | 'verification' | 'ledger'
    related_id TEXT NOT NULL,
    action     TEXT NOT NULL,
    actor      TEXT,
    ip_address TEXT,
    timestamp  TEXT NOT NULL,
    details    TEXT
);

CREATE INDEX IF NOT EXISTS documents_subject_idx     ON documents(subject_id);
CREATE INDEX IF NOT EXISTS authorizations_issuer_idx ON authorizations(issuer_id);
CREATE INDEX IF NOT EXISTS verifications_subject_idx ON verification_requests(subject_id);
CREATE INDEX IF NOT EXISTS audit_scope_idx           ON audit_log(scope, related_id);

PRAGMA user_version = 1;
";
