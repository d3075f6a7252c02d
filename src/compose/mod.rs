//! Repository composition
//!
//! Turns a repository configuration into the finished slice serving it:
//! 1. Resolve the authenticator and wrap it for auditing
//! 2. Wrap the permission set for auditing (everything allowed when absent)
//! 3. Build the raw slice through the protocol registry, or expand a group
//! 4. Apply the decoration pipeline of the type

pub mod group;

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::auth::{permissions, Authentication, LoggingAuth, LoggingPermissions, Permissions};
use crate::client::HttpClient;
use crate::config::{Layout, RepoConfig};
use crate::error::ComposeError;
use crate::registry::{FactoryContext, ProtocolRegistry, RepoType, Rule};
use crate::settings::Settings;
use crate::slice::{Decoration, Pipeline, SharedSlice};
use crate::storage::StorageAliases;

/// First path segment of every Docker API request
const DOCKER_API_ROOT: &str = "v2";

/// Builds repository slices
#[derive(Clone)]
pub struct Composer {
    settings: Arc<dyn Settings>,
    registry: Arc<ProtocolRegistry>,
    client: Arc<HttpClient>,
}

impl Composer {
    pub fn new(
        settings: Arc<dyn Settings>,
        registry: Arc<ProtocolRegistry>,
        client: Arc<HttpClient>,
    ) -> Self {
        Self {
            settings,
            registry,
            client,
        }
    }

    pub fn settings(&self) -> &Arc<dyn Settings> {
        &self.settings
    }

    pub fn client(&self) -> &Arc<HttpClient> {
        &self.client
    }

    /// Compose the slice of a repository
    pub async fn build(
        &self,
        config: &RepoConfig,
        aliases: &StorageAliases,
        standalone: bool,
    ) -> Result<SharedSlice, ComposeError> {
        self.compose(config, aliases, standalone, Vec::new()).await
    }

    /// Load a repository configuration by name and compose it
    pub async fn build_named(
        &self,
        name: &str,
        aliases: &StorageAliases,
        standalone: bool,
    ) -> Result<SharedSlice, ComposeError> {
        let config = self.settings.repositories().config(name, aliases).await?;
        self.compose(&config, aliases, standalone, Vec::new()).await
    }

    /// Compose every configured repository for the shared namespace
    ///
    /// A repository that fails to compose is logged and left out.
    pub async fn build_all(
        &self,
        aliases: &StorageAliases,
    ) -> Result<Vec<(String, SharedSlice)>, ComposeError> {
        let names = self.settings.repositories().names().await?;
        let mut slices = Vec::with_capacity(names.len());
        for name in names {
            match self.build_named(&name, aliases, false).await {
                Ok(slice) => slices.push((name, slice)),
                Err(e) => warn!(repo = %name, error = %e, "Skipping repository"),
            }
        }
        info!(count = slices.len(), "Repositories composed");
        Ok(slices)
    }

    /// Decorations of a repository, innermost first
    pub fn pipeline(
        ty: RepoType,
        config: &RepoConfig,
        standalone: bool,
        layout: Layout,
    ) -> Result<Pipeline, ComposeError> {
        let pipeline = match ty.rule() {
            Rule::Hosted | Rule::Proxy if !standalone => {
                Pipeline::new().then(Decoration::TrimPath(layout))
            }
            Rule::Docker if !standalone => {
                let name = config.name().ok_or_else(|| {
                    ComposeError::malformed(config.display_name(), "docker repository needs a name")
                })?;
                Pipeline::new()
                    .then(Decoration::DockerTrim(layout, name.to_string()))
                    .then(Decoration::DockerRevert(layout))
            }
            _ => Pipeline::new(),
        };
        Ok(pipeline
            .then_some(config.content_length_max().map(Decoration::ContentLength))
            .then(Decoration::Continue))
    }

    pub(crate) fn compose<'a>(
        &'a self,
        config: &'a RepoConfig,
        aliases: &'a StorageAliases,
        standalone: bool,
        mut chain: Vec<String>,
    ) -> BoxFuture<'a, Result<SharedSlice, ComposeError>> {
        async move {
            let layout = self.settings.layout();
            if let Some(name) = config.name() {
                if !standalone && layout == Layout::Flat && name == DOCKER_API_ROOT {
                    return Err(ComposeError::malformed(
                        name,
                        "name is reserved for the Docker API in the flat layout",
                    ));
                }
                chain.push(name.to_string());
            }

            let auth: Arc<dyn Authentication> =
                Arc::new(LoggingAuth::new(self.settings.auth().await?));
            let permissions: Arc<dyn Permissions> = Arc::new(LoggingPermissions::new(
                config.permissions().unwrap_or_else(permissions::free),
            ));

            let ty: RepoType = config.kind().parse()?;
            let raw = match ty.rule() {
                Rule::Group => group::resolve(self, config, aliases, standalone, &chain).await?,
                _ => {
                    let factory = self
                        .registry
                        .factory(ty)
                        .ok_or_else(|| ComposeError::UnsupportedType(ty.to_string()))?;
                    factory.create(&FactoryContext {
                        config,
                        permissions,
                        auth,
                        client: self.client.clone(),
                        standalone,
                        layout,
                    })?
                }
            };

            let pipeline = Self::pipeline(ty, config, standalone, layout)?;
            debug!(
                repo = %config.display_name(),
                r#type = %ty,
                standalone,
                steps = ?pipeline.steps(),
                "Composed repository"
            );
            Ok(pipeline.apply(raw))
        }
        .boxed()
    }
}
