//! The `DocumentStorage` collaborator trait.
//!
//! Byte durability and replication are delegated to the implementation; the
//! engine only ever holds opaque pointers. Every `put` mints a pointer unique
//! to that upload, so deleting one upload's bytes never affects another's.
//! [`MemoryStorage`] is provided for tests and ephemeral deployments.

use std::{
  collections::HashMap,
  future::Future,
  sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
  },
};

/// Abstraction over a document blob store.
pub trait DocumentStorage: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist `bytes` and return an opaque pointer unique to this upload.
  fn put(
    &self,
    bytes: &[u8],
  ) -> impl Future<Output = Result<String, Self::Error>> + Send;

  /// Fetch the bytes behind `pointer`. Returns `None` if absent.
  fn get(
    &self,
    pointer: &str,
  ) -> impl Future<Output = Result<Option<Vec<u8>>, Self::Error>> + Send;

  fn exists(
    &self,
    pointer: &str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send;

  /// Remove the bytes behind `pointer`. An absent pointer is a no-op.
  fn delete(
    &self,
    pointer: &str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

// ─── In-memory implementation ────────────────────────────────────────────────

/// In-memory storage keyed by a per-upload counter. Cloning shares the
/// underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
  blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
  next:  Arc<AtomicU64>,
}

impl MemoryStorage {
  pub fn new() -> Self { Self::default() }

  /// Number of blobs currently held.
  pub fn len(&self) -> usize {
    self.blobs.lock().expect("storage mutex poisoned").len()
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// `MemoryStorage` cannot fail; the error type exists to satisfy the trait.
#[derive(Debug, thiserror::Error)]
#[error("in-memory storage error")]
pub struct MemoryStorageError;

impl DocumentStorage for MemoryStorage {
  type Error = MemoryStorageError;

  async fn put(&self, bytes: &[u8]) -> Result<String, MemoryStorageError> {
    let pointer = format!("mem:{}", self.next.fetch_add(1, Ordering::Relaxed));
    self
      .blobs
      .lock()
      .expect("storage mutex poisoned")
      .insert(pointer.clone(), bytes.to_vec());
    Ok(pointer)
  }

  async fn get(&self, pointer: &str) -> Result<Option<Vec<u8>>, MemoryStorageError> {
    Ok(
      self
        .blobs
        .lock()
        .expect("storage mutex poisoned")
        .get(pointer)
        .cloned(),
    )
  }

  async fn exists(&self, pointer: &str) -> Result<bool, MemoryStorageError> {
    Ok(
      self
        .blobs
        .lock()
        .expect("storage mutex poisoned")
        .contains_key(pointer),
    )
  }

  async fn delete(&self, pointer: &str) -> Result<(), MemoryStorageError> {
    self
      .blobs
      .lock()
      .expect("storage mutex poisoned")
      .remove(pointer);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn put_get_exists_roundtrip() {
    let storage = MemoryStorage::new();
    let pointer = storage.put(b"bytes").await.unwrap();

    assert!(storage.exists(&pointer).await.unwrap());
    assert_eq!(storage.get(&pointer).await.unwrap().as_deref(), Some(&b"bytes"[..]));
    assert!(!storage.exists("mem:absent").await.unwrap());
  }

  #[tokio::test]
  async fn each_upload_gets_its_own_pointer() {
    let storage = MemoryStorage::new();
    let a = storage.put(b"same").await.unwrap();
    let b = storage.put(b"same").await.unwrap();

    assert_ne!(a, b);
    assert_eq!(storage.len(), 2);
  }

  #[tokio::test]
  async fn delete_removes_only_the_named_blob() {
    let storage = MemoryStorage::new();
    let a = storage.put(b"one").await.unwrap();
    let b = storage.put(b"two").await.unwrap();

    storage.delete(&a).await.unwrap();
    assert!(!storage.exists(&a).await.unwrap());
    assert!(storage.exists(&b).await.unwrap());

    // Absent pointers are a no-op.
    storage.delete(&a).await.unwrap();
  }
}
