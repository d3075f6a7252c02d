//! Repository configuration
//!
//! A repository file looks like:
//!
//! ```yaml
//! repo:
//!   type: maven
//!   storage: default
//!   permissions:
//!     alice: [read, write]
//!     "*": [read]
//!   content-length-max: 1048576
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use super::{expand_env_vars, ConfigError};
use crate::auth::{Permissions, YamlPermissions};
use crate::error::ComposeError;
use crate::storage::{Storage, StorageAliases, StorageConfig};

#[derive(Debug, Deserialize)]
struct RepoFile {
    repo: RepoSection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RepoSection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    storage: Option<StorageRef>,
    #[serde(default)]
    permissions: Option<HashMap<String, Vec<String>>>,
    #[serde(default)]
    settings: Option<serde_yaml::Value>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    content_length_max: Option<u64>,
}

/// Storage given either as an alias name or inline
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StorageRef {
    Alias(String),
    Inline(StorageConfig),
}

impl StorageRef {
    fn resolve(&self, aliases: &StorageAliases) -> Result<Arc<dyn Storage>, ConfigError> {
        match self {
            StorageRef::Alias(name) => aliases.storage(name).ok_or_else(|| {
                ConfigError::InvalidValue(format!("unknown storage alias '{}'", name))
            }),
            StorageRef::Inline(config) => Ok(config.build()),
        }
    }
}

/// Read-only view of a repository's settings
#[derive(Clone)]
pub struct RepoConfig {
    name: Option<String>,
    kind: String,
    storage: Option<Arc<dyn Storage>>,
    url: Option<String>,
    path: Option<String>,
    permissions: Option<Arc<dyn Permissions>>,
    settings: Option<serde_yaml::Value>,
    content_length_max: Option<u64>,
}

impl RepoConfig {
    /// Create a configuration of the given type with nothing else set
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            name: None,
            kind: kind.into(),
            storage: None,
            url: None,
            path: None,
            permissions: None,
            settings: None,
            content_length_max: None,
        }
    }

    /// Parse a repository file, resolving storage aliases
    pub fn from_yaml(
        name: Option<&str>,
        yaml: &str,
        aliases: &StorageAliases,
    ) -> Result<Self, ComposeError> {
        let expanded = expand_env_vars(yaml);
        let file: RepoFile = serde_yaml::from_str(&expanded).map_err(|e| {
            ConfigError::Parse(format!(
                "repository '{}': {}",
                name.unwrap_or("<unnamed>"),
                e
            ))
        })?;
        let section = file.repo;

        let storage = section
            .storage
            .as_ref()
            .map(|storage| storage.resolve(aliases))
            .transpose()?;
        let permissions = section
            .permissions
            .as_ref()
            .map(YamlPermissions::from_rules)
            .transpose()?
            .map(|permissions| Arc::new(permissions) as Arc<dyn Permissions>);

        Ok(Self {
            name: name.map(str::to_string),
            kind: section.kind,
            storage,
            url: section.url,
            path: section.path,
            permissions,
            settings: section.settings,
            content_length_max: section.content_length_max,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_permissions(mut self, permissions: Arc<dyn Permissions>) -> Self {
        self.permissions = Some(permissions);
        self
    }

    pub fn with_settings(mut self, settings: serde_yaml::Value) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_content_length_max(mut self, limit: u64) -> Self {
        self.content_length_max = Some(limit);
        self
    }

    /// Repository name, when known
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name used in errors and logs
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }

    /// Repository type as written in the configuration
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Repository storage
    pub fn storage(&self) -> Result<Arc<dyn Storage>, ComposeError> {
        self.storage
            .clone()
            .ok_or_else(|| ComposeError::malformed(self.display_name(), "storage is not set"))
    }

    /// Repository storage, if configured
    pub fn storage_opt(&self) -> Option<Arc<dyn Storage>> {
        self.storage.clone()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Configured permissions; `None` means unrestricted
    pub fn permissions(&self) -> Option<Arc<dyn Permissions>> {
        self.permissions.clone()
    }

    /// Type-specific settings node
    pub fn settings(&self) -> Option<&serde_yaml::Value> {
        self.settings.as_ref()
    }

    /// Maximum accepted request body size
    pub fn content_length_max(&self) -> Option<u64> {
        self.content_length_max
    }
}

impl fmt::Debug for RepoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepoConfig")
            .field("name", &self.name)
            .field("type", &self.kind)
            .field("storage", &self.storage.is_some())
            .field("url", &self.url)
            .field("path", &self.path)
            .field("permissions", &self.permissions.is_some())
            .field("settings", &self.settings)
            .field("content_length_max", &self.content_length_max)
            .finish()
    }
}
