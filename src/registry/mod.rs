//! Protocol registry
//!
//! Maps every supported repository type to the factory building its raw
//! slice. Real protocol backends replace the default factories with
//! `ProtocolRegistry::register`; the reference factories are:
//! - `HostedSlice` for plain hosted types
//! - `ProxySlice` for `*-proxy` types
//! - `HostedSlice` over the registry root for Docker
//! - `ProxySlice` with its own shared-mode routing for Docker proxies
//!
//! Groups are not built by a factory; the composer expands them.

pub mod hosted;
pub mod proxy;
pub mod traits;
pub mod types;

pub use hosted::HostedSlice;
pub use proxy::{ProxySlice, RemoteSettings};
pub use traits::{FactoryContext, SliceFactory};
pub use types::{RepoType, Rule};

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ComposeError;
use crate::slice::{DockerRoutingSlice, SharedSlice, TrimmedDocker};
use crate::storage::{Key, SubStorage};

/// Storage prefix of Docker registry content
pub const DOCKER_REGISTRY_ROOT: &str = "docker/registry";

/// Factories by repository type
#[derive(Clone, Default)]
pub struct ProtocolRegistry {
    factories: HashMap<RepoType, Arc<dyn SliceFactory>>,
}

impl ProtocolRegistry {
    /// Registry without any factory
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the reference factory of every non-group type
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for ty in RepoType::ALL {
            match ty.rule() {
                Rule::Hosted => {
                    registry.register(ty, move |ctx: &FactoryContext<'_>| hosted(ty, ctx))
                }
                Rule::Proxy => registry.register(ty, proxy),
                Rule::Docker => registry.register(ty, docker),
                Rule::DockerProxy => registry.register(ty, docker_proxy),
                Rule::Group => {}
            }
        }
        registry
    }

    /// Set the factory of a type, replacing any previous one
    pub fn register(&mut self, ty: RepoType, factory: impl SliceFactory + 'static) {
        self.factories.insert(ty, Arc::new(factory));
    }

    /// Factory of a type
    pub fn factory(&self, ty: RepoType) -> Option<Arc<dyn SliceFactory>> {
        self.factories.get(&ty).cloned()
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns true if no factory is registered
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for ProtocolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&str> = self.factories.keys().map(RepoType::as_str).collect();
        types.sort_unstable();
        f.debug_struct("ProtocolRegistry")
            .field("types", &types)
            .finish()
    }
}

fn hosted(ty: RepoType, ctx: &FactoryContext<'_>) -> Result<SharedSlice, ComposeError> {
    let config = ctx.config;
    let slice = HostedSlice::new(config.storage()?, ctx.permissions.clone(), ctx.auth.clone());
    let slice = match ty {
        RepoType::Npm | RepoType::Nuget | RepoType::Helm => {
            let url = config.url().ok_or_else(|| {
                ComposeError::malformed(config.display_name(), format!("{} requires url", ty))
            })?;
            slice.with_base_url(url)
        }
        RepoType::Rpm => {
            if let Some(settings) = config.settings() {
                if !settings.is_mapping() {
                    return Err(ComposeError::malformed(
                        config.display_name(),
                        "rpm settings must be a mapping",
                    ));
                }
            }
            slice
        }
        _ => slice,
    };
    Ok(Arc::new(slice))
}

fn proxy(ctx: &FactoryContext<'_>) -> Result<SharedSlice, ComposeError> {
    let remote = RemoteSettings::from_config(ctx.config)?;
    let slice = ProxySlice::new(
        remote,
        ctx.client.clone(),
        ctx.permissions.clone(),
        ctx.auth.clone(),
    );
    Ok(match ctx.config.storage_opt() {
        Some(storage) => Arc::new(slice.with_cache(storage)),
        None => Arc::new(slice),
    })
}

fn docker(ctx: &FactoryContext<'_>) -> Result<SharedSlice, ComposeError> {
    let root = Key::new(DOCKER_REGISTRY_ROOT)?;
    let storage = Arc::new(SubStorage::new(root, ctx.config.storage()?));
    Ok(Arc::new(HostedSlice::new(
        storage,
        ctx.permissions.clone(),
        ctx.auth.clone(),
    )))
}

fn docker_proxy(ctx: &FactoryContext<'_>) -> Result<SharedSlice, ComposeError> {
    let slice = proxy(ctx)?;
    if ctx.standalone {
        return Ok(slice);
    }
    let name = ctx.config.name().ok_or_else(|| {
        ComposeError::malformed(ctx.config.display_name(), "docker repository needs a name")
    })?;
    let trimmed: SharedSlice = Arc::new(TrimmedDocker::new(slice, ctx.layout, name));
    Ok(Arc::new(DockerRoutingSlice::reverted(ctx.layout, trimmed)))
}
