//! Core types and trait definitions for the Attest provenance engine.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod audit;
pub mod authorization;
pub mod document;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod storage;
pub mod store;
pub mod subject;
pub mod verification;

pub use engine::ProvenanceEngine;
pub use error::{Error, Result};
