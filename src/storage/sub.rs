//! Prefixed view over another storage

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use super::{Key, Storage, StorageError};

/// Storage whose keys live below a prefix of another storage
pub struct SubStorage {
    prefix: Key,
    origin: Arc<dyn Storage>,
}

impl SubStorage {
    /// Create a view of `origin` below `prefix`
    pub fn new(prefix: Key, origin: Arc<dyn Storage>) -> Self {
        Self { prefix, origin }
    }
}

#[async_trait]
impl Storage for SubStorage {
    async fn exists(&self, key: &Key) -> Result<bool, StorageError> {
        self.origin.exists(&self.prefix.join(key)).await
    }

    async fn value(&self, key: &Key) -> Result<Bytes, StorageError> {
        self.origin.value(&self.prefix.join(key)).await
    }

    async fn save(&self, key: &Key, content: Bytes) -> Result<(), StorageError> {
        self.origin.save(&self.prefix.join(key), content).await
    }

    async fn delete(&self, key: &Key) -> Result<(), StorageError> {
        self.origin.delete(&self.prefix.join(key)).await
    }

    async fn list(&self, prefix: &Key) -> Result<Vec<Key>, StorageError> {
        let keys = self.origin.list(&self.prefix.join(prefix)).await?;
        Ok(keys
            .iter()
            .filter_map(|key| key.strip_prefix(&self.prefix))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;

    #[tokio::test]
    async fn test_values_land_below_prefix() {
        let origin = Arc::new(InMemoryStorage::new());
        let sub = SubStorage::new(Key::new("docker/registry").unwrap(), origin.clone());

        sub.save(&Key::new("v2/alpine/tags").unwrap(), Bytes::from("latest"))
            .await
            .unwrap();

        assert!(origin
            .exists(&Key::new("docker/registry/v2/alpine/tags").unwrap())
            .await
            .unwrap());
        assert_eq!(
            sub.list(&Key::root()).await.unwrap(),
            vec![Key::new("v2/alpine/tags").unwrap()]
        );
    }
}
