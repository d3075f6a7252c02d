//! Server-wide settings consulted during composition

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::auth::{AnonymousAuth, Authentication, Credentials, EnvCredentials};
use crate::config::{ConfigStore, CredentialsConfig, Layout, MetaConfig, RepositoriesFromStorage};
use crate::error::ComposeError;
use crate::storage::{Key, Storage, StorageAliases};

/// Settings source of the composition engine
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Settings: Send + Sync {
    /// Resolve the authenticator
    async fn auth(&self) -> Result<Arc<dyn Authentication>, ComposeError>;

    /// Path layout of the shared namespace
    fn layout(&self) -> Layout;

    /// Repository configurations
    fn repositories(&self) -> Arc<dyn ConfigStore>;

    /// Named storages available to repository configurations
    async fn storage_aliases(&self) -> Result<StorageAliases, ComposeError>;
}

/// Settings from the `meta` section of the main configuration
pub struct YamlSettings {
    meta: MetaConfig,
    storage: Arc<dyn Storage>,
    repositories: Arc<dyn ConfigStore>,
    aliases: StorageAliases,
}

impl YamlSettings {
    /// Settings backed by the storage described in `meta.storage`
    pub fn new(meta: MetaConfig) -> Self {
        let storage = meta.storage.build();
        Self::with_storage(meta, storage)
    }

    /// Settings backed by an existing settings storage
    pub fn with_storage(meta: MetaConfig, storage: Arc<dyn Storage>) -> Self {
        let repositories = Arc::new(RepositoriesFromStorage::new(storage.clone()));
        let aliases = StorageAliases::from_configs(&meta.storages);
        Self {
            meta,
            storage,
            repositories,
            aliases,
        }
    }

    /// Storage holding repository and credentials files
    pub fn storage(&self) -> Arc<dyn Storage> {
        self.storage.clone()
    }
}

#[async_trait]
impl Settings for YamlSettings {
    async fn auth(&self) -> Result<Arc<dyn Authentication>, ComposeError> {
        match &self.meta.credentials {
            CredentialsConfig::Anonymous => Ok(Arc::new(AnonymousAuth)),
            CredentialsConfig::File { path } => {
                let key = Key::new(path)?;
                let content = self
                    .storage
                    .value(&key)
                    .await
                    .map_err(|e| ComposeError::Auth(format!("credentials '{}': {}", path, e)))?;
                let credentials = Credentials::from_yaml(&String::from_utf8_lossy(&content))
                    .map_err(|e| ComposeError::Auth(e.to_string()))?;
                debug!(users = credentials.len(), "Loaded credentials");
                Ok(Arc::new(credentials))
            }
            CredentialsConfig::Env => {
                let credentials =
                    EnvCredentials::from_env().map_err(|e| ComposeError::Auth(e.to_string()))?;
                Ok(Arc::new(credentials))
            }
        }
    }

    fn layout(&self) -> Layout {
        self.meta.layout
    }

    fn repositories(&self) -> Arc<dyn ConfigStore> {
        self.repositories.clone()
    }

    async fn storage_aliases(&self) -> Result<StorageAliases, ComposeError> {
        Ok(self.aliases.clone())
    }
}
