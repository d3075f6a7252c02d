//! Repository configuration store

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::RepoConfig;
use crate::error::ComposeError;
use crate::storage::{Key, Storage, StorageAliases, StorageError};

/// Source of repository configurations by name
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load the configuration of a repository
    async fn config(
        &self,
        name: &str,
        aliases: &StorageAliases,
    ) -> Result<RepoConfig, ComposeError>;

    /// Names of all configured repositories, sorted
    async fn names(&self) -> Result<Vec<String>, ComposeError>;
}

/// Repository files (`<name>.yaml` or `<name>.yml`) in a settings storage
///
/// Files whose name starts with `_` hold server-wide settings such as
/// `_credentials.yaml` and are not repositories.
pub struct RepositoriesFromStorage {
    storage: Arc<dyn Storage>,
}

impl RepositoriesFromStorage {
    const EXTENSIONS: [&'static str; 2] = ["yaml", "yml"];

    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    fn repo_name(key: &Key) -> Option<&str> {
        let raw = key.as_str();
        if raw.contains('/') || raw.starts_with('_') {
            return None;
        }
        Self::EXTENSIONS
            .iter()
            .find_map(|ext| raw.strip_suffix(ext)?.strip_suffix('.'))
            .filter(|name| !name.is_empty())
    }
}

#[async_trait]
impl ConfigStore for RepositoriesFromStorage {
    async fn config(
        &self,
        name: &str,
        aliases: &StorageAliases,
    ) -> Result<RepoConfig, ComposeError> {
        for ext in Self::EXTENSIONS {
            let key = Key::new(&format!("{}.{}", name, ext))
                .map_err(|_| ComposeError::RepoNotFound(name.to_string()))?;
            match self.storage.value(&key).await {
                Ok(content) => {
                    debug!(repo = %name, key = %key, "Loaded repository configuration");
                    let yaml = String::from_utf8_lossy(&content);
                    return RepoConfig::from_yaml(Some(name), &yaml, aliases);
                }
                Err(StorageError::NotFound(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(ComposeError::RepoNotFound(name.to_string()))
    }

    async fn names(&self) -> Result<Vec<String>, ComposeError> {
        let keys = self.storage.list(&Key::root()).await?;
        let mut names: Vec<String> = keys
            .iter()
            .filter_map(Self::repo_name)
            .map(str::to_string)
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}
