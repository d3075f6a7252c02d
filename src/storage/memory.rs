//! In-memory storage

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::{Key, Storage, StorageError};

/// Storage keeping values in a sorted map
#[derive(Default)]
pub struct InMemoryStorage {
    data: RwLock<BTreeMap<Key, Bytes>>,
}

impl InMemoryStorage {
    /// Create an empty storage
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn exists(&self, key: &Key) -> Result<bool, StorageError> {
        Ok(self.data.read().await.contains_key(key))
    }

    async fn value(&self, key: &Key) -> Result<Bytes, StorageError> {
        self.data
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn save(&self, key: &Key, content: Bytes) -> Result<(), StorageError> {
        if key.is_root() {
            return Err(StorageError::InvalidKey("root key has no value".to_string()));
        }
        self.data.write().await.insert(key.clone(), content);
        Ok(())
    }

    async fn delete(&self, key: &Key) -> Result<(), StorageError> {
        self.data
            .write()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn list(&self, prefix: &Key) -> Result<Vec<Key>, StorageError> {
        Ok(self
            .data
            .read()
            .await
            .keys()
            .filter(|key| key.strip_prefix(prefix).is_some())
            .cloned()
            .collect())
    }
}
