//! File storage behind a trait so tests can run without touching disk.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::ServiceError;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("invalid file key: {0}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => ServiceError::NotFound(format!("file {}", key)),
            StorageError::InvalidKey(key) => {
                ServiceError::ValidationError(format!("invalid file key: {}", key))
            }
            StorageError::Io(e) => ServiceError::InternalError(format!("storage I/O: {}", e)),
        }
    }
}

/// Kind of stored document; decides the storage prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    Proforma,
    PurchaseOrder,
    Receipt,
}

impl FileKind {
    fn prefix(&self) -> &'static str {
        match self {
            FileKind::Proforma => "proformas",
            FileKind::PurchaseOrder => "purchase_orders",
            FileKind::Receipt => "receipts",
        }
    }
}

/// Content-addressable-ish blob store. Keys returned by `put` are
/// opaque to callers and persisted on the owning row.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn put(&self, kind: FileKind, name: &str, bytes: &[u8]) -> Result<String, StorageError>;
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;
}

/// Stores files under a root directory on the local filesystem.
#[derive(Clone, Debug)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let path = Path::new(key);
        let safe = path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(path))
    }
}

fn sanitize_name(name: &str) -> String {
    // Keep only the final path component of whatever the client sent.
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .trim_matches('.');
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn put(&self, kind: FileKind, name: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let key = format!("{}/{}-{}", kind.prefix(), Uuid::new_v4(), sanitize_name(name));
        let path = self.resolve(&key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(key)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store used by the integration tests.
#[derive(Debug, Default)]
pub struct InMemoryFileStore {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl FileStore for InMemoryFileStore {
    async fn put(&self, kind: FileKind, name: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let key = format!("{}/{}-{}", kind.prefix(), Uuid::new_v4(), sanitize_name(name));
        self.files.write().await.insert(key.clone(), bytes.to_vec());
        Ok(key)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.files
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}
