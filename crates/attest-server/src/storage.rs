//! Filesystem-backed [`DocumentStorage`].
//!
//! Every upload gets its own file, named by a freshly minted 32-hex id, so
//! deleting one upload's bytes never affects another's. Pointers look like
//! `fs:<hex>`; the store only ever hands them back to us.

use std::path::{Path, PathBuf};

use attest_core::storage::DocumentStorage;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum FsStorageError {
  #[error("storage io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("malformed storage pointer: {0}")]
  BadPointer(String),
}

/// Document bytes on the local filesystem under one directory.
#[derive(Debug, Clone)]
pub struct FsStorage {
  root: PathBuf,
}

impl FsStorage {
  /// Create the storage, making `root` if it does not exist.
  pub fn open(root: impl AsRef<Path>) -> Result<Self, FsStorageError> {
    let root = root.as_ref().to_path_buf();
    std::fs::create_dir_all(&root)?;
    Ok(Self { root })
  }

  fn path_for(&self, pointer: &str) -> Result<PathBuf, FsStorageError> {
    let hex = pointer
      .strip_prefix("fs:")
      .filter(|h| h.len() == 32 && h.bytes().all(|b| b.is_ascii_hexdigit()))
      .ok_or_else(|| FsStorageError::BadPointer(pointer.to_owned()))?;
    Ok(self.root.join(hex))
  }
}

impl DocumentStorage for FsStorage {
  type Error = FsStorageError;

  async fn put(&self, bytes: &[u8]) -> Result<String, FsStorageError> {
    let name = Uuid::new_v4().simple().to_string();
    let path = self.root.join(&name);
    tokio::fs::write(&path, bytes).await?;
    Ok(format!("fs:{name}"))
  }

  async fn get(&self, pointer: &str) -> Result<Option<Vec<u8>>, FsStorageError> {
    let path = self.path_for(pointer)?;
    match tokio::fs::read(&path).await {
      Ok(bytes) => Ok(Some(bytes)),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e.into()),
    }
  }

  async fn exists(&self, pointer: &str) -> Result<bool, FsStorageError> {
    let path = self.path_for(pointer)?;
    Ok(tokio::fs::try_exists(&path).await?)
  }

  async fn delete(&self, pointer: &str) -> Result<(), FsStorageError> {
    let path = self.path_for(pointer)?;
    match tokio::fs::remove_file(&path).await {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e.into()),
    }
  }
}
