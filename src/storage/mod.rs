//! Storage layer for repository content and configuration
//!
//! This module defines the `Storage` trait together with:
//! - `FileSystemStorage`: files under a base directory
//! - `InMemoryStorage`: a map, for tests and scratch repositories
//! - `SubStorage`: a key prefix over another storage
//! - `StorageAliases`: named storages shared by repository configurations

pub mod fs;
pub mod memory;
pub mod sub;

pub use fs::FileSystemStorage;
pub use memory::InMemoryStorage;
pub use sub::SubStorage;

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO error during a storage operation
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No value under the key
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Key is not a valid relative path
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

/// Location of a value in a storage
///
/// Keys are `/`-separated relative paths without empty, `.` or `..`
/// segments. The empty key is the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(String);

impl Key {
    /// Parse a key, ignoring leading and trailing slashes
    pub fn new(raw: &str) -> Result<Self, StorageError> {
        let mut parts = Vec::new();
        for part in raw.split('/') {
            match part {
                "" => continue,
                "." | ".." => return Err(StorageError::InvalidKey(raw.to_string())),
                part => parts.push(part),
            }
        }
        Ok(Self(parts.join("/")))
    }

    /// The root key
    pub fn root() -> Self {
        Self::default()
    }

    /// Returns true for the root key
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Append another key
    pub fn join(&self, other: &Key) -> Key {
        match (self.is_root(), other.is_root()) {
            (true, _) => other.clone(),
            (_, true) => self.clone(),
            _ => Key(format!("{}/{}", self.0, other.0)),
        }
    }

    /// Remainder of this key below `prefix`
    pub fn strip_prefix(&self, prefix: &Key) -> Option<Key> {
        if prefix.is_root() {
            return Some(self.clone());
        }
        if self.0 == prefix.0 {
            return Some(Key::root());
        }
        self.0
            .strip_prefix(&format!("{}/", prefix.0))
            .map(|rest| Key(rest.to_string()))
    }

    /// Key as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Backend store for repository content
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Storage: Send + Sync {
    /// Returns true if a value exists under the key
    async fn exists(&self, key: &Key) -> Result<bool, StorageError>;

    /// Read the value under the key
    async fn value(&self, key: &Key) -> Result<Bytes, StorageError>;

    /// Write the value under the key, replacing any previous value
    async fn save(&self, key: &Key, content: Bytes) -> Result<(), StorageError>;

    /// Remove the value under the key
    async fn delete(&self, key: &Key) -> Result<(), StorageError>;

    /// Keys of all values below the prefix, sorted
    async fn list(&self, prefix: &Key) -> Result<Vec<Key>, StorageError>;
}

/// Declarative storage settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Files under a directory
    Fs {
        /// Base directory
        path: PathBuf,
    },

    /// Process memory
    Memory,
}

impl StorageConfig {
    /// Create the storage described by this configuration
    pub fn build(&self) -> Arc<dyn Storage> {
        match self {
            StorageConfig::Fs { path } => Arc::new(FileSystemStorage::new(path.clone())),
            StorageConfig::Memory => Arc::new(InMemoryStorage::new()),
        }
    }
}

/// Named storages shared by repository configurations
///
/// Each alias is built once so that every repository referring to it sees
/// the same storage instance.
#[derive(Clone, Default)]
pub struct StorageAliases {
    storages: HashMap<String, Arc<dyn Storage>>,
}

impl StorageAliases {
    /// Create an empty alias set
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every configured alias
    pub fn from_configs(configs: &HashMap<String, StorageConfig>) -> Self {
        let storages = configs
            .iter()
            .map(|(name, config)| (name.clone(), config.build()))
            .collect();
        Self { storages }
    }

    /// Register an already built storage
    pub fn with(mut self, name: impl Into<String>, storage: Arc<dyn Storage>) -> Self {
        self.storages.insert(name.into(), storage);
        self
    }

    /// Storage of an alias
    pub fn storage(&self, name: &str) -> Option<Arc<dyn Storage>> {
        self.storages.get(name).cloned()
    }

    /// Number of aliases
    pub fn len(&self) -> usize {
        self.storages.len()
    }

    /// Returns true if no alias is defined
    pub fn is_empty(&self) -> bool {
        self.storages.is_empty()
    }
}

impl fmt::Debug for StorageAliases {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.storages.keys().collect();
        names.sort();
        f.debug_struct("StorageAliases")
            .field("names", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_normalizes_slashes() {
        let key = Key::new("/com//acme/lib.jar/").unwrap();
        assert_eq!(key.as_str(), "com/acme/lib.jar");
        assert!(Key::new("/").unwrap().is_root());
    }

    #[test]
    fn test_key_rejects_traversal() {
        assert!(matches!(
            Key::new("a/../../etc/passwd"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(Key::new("./a"), Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn test_key_join_and_strip() {
        let prefix = Key::new("docker/registry").unwrap();
        let key = prefix.join(&Key::new("v2/alpine").unwrap());
        assert_eq!(key.as_str(), "docker/registry/v2/alpine");
        assert_eq!(key.strip_prefix(&prefix).unwrap().as_str(), "v2/alpine");
        assert_eq!(Key::root().join(&prefix), prefix);
        assert!(Key::new("dockerx/a")
            .unwrap()
            .strip_prefix(&Key::new("docker").unwrap())
            .is_none());
    }

    #[test]
    fn test_storage_config_yaml() {
        let fs: StorageConfig = serde_yaml::from_str("type: fs\npath: /data").unwrap();
        assert_eq!(fs, StorageConfig::Fs { path: "/data".into() });

        let memory: StorageConfig = serde_yaml::from_str("type: memory").unwrap();
        assert_eq!(memory, StorageConfig::Memory);

        assert!(serde_yaml::from_str::<StorageConfig>("type: s3").is_err());
    }

    #[tokio::test]
    async fn test_aliases_share_one_instance() {
        let mut configs = HashMap::new();
        configs.insert("default".to_string(), StorageConfig::Memory);
        let aliases = StorageAliases::from_configs(&configs);

        let key = Key::new("a.txt").unwrap();
        aliases
            .storage("default")
            .unwrap()
            .save(&key, Bytes::from("shared"))
            .await
            .unwrap();

        let value = aliases.storage("default").unwrap().value(&key).await.unwrap();
        assert_eq!(value, Bytes::from("shared"));
        assert!(aliases.storage("other").is_none());
    }

    #[tokio::test]
    async fn test_mock_storage() {
        let mut mock = MockStorage::new();
        mock.expect_exists()
            .withf(|key| key.as_str() == "present")
            .returning(|_| Ok(true));

        let result = mock.exists(&Key::new("present").unwrap()).await;
        assert!(result.unwrap());
    }
}
