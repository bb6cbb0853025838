//! SQLite backend for the Attest provenance store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. The single serialized
//! connection, plus explicit transactions around the original-promotion
//! and authorization-creation checks, gives the atomicity the
//! [`attest_core::store::ProvenanceStore`] contract requires.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
