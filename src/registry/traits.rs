//! Slice factory trait definition

use std::sync::Arc;

use crate::auth::{Authentication, Permissions};
use crate::client::HttpClient;
use crate::config::{Layout, RepoConfig};
use crate::error::ComposeError;
use crate::slice::SharedSlice;

/// Everything a factory may bind into the slice it creates
#[derive(Clone)]
pub struct FactoryContext<'a> {
    /// Repository configuration
    pub config: &'a RepoConfig,

    /// Audited permission set of the repository
    pub permissions: Arc<dyn Permissions>,

    /// Audited authenticator
    pub auth: Arc<dyn Authentication>,

    /// Shared outbound client
    pub client: Arc<HttpClient>,

    /// Whether the repository is served alone at the root
    pub standalone: bool,

    /// Path layout of the shared namespace
    pub layout: Layout,
}

impl std::fmt::Debug for FactoryContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryContext")
            .field("config", self.config)
            .field("standalone", &self.standalone)
            .finish()
    }
}

/// Builds the raw slice of a repository type
///
/// Factories return the slice before any path trimming, size limit or
/// continue wrapping; the composer adds those.
pub trait SliceFactory: Send + Sync {
    /// Create a slice for the repository
    fn create(&self, ctx: &FactoryContext<'_>) -> Result<SharedSlice, ComposeError>;
}

impl<F> SliceFactory for F
where
    F: Fn(&FactoryContext<'_>) -> Result<SharedSlice, ComposeError> + Send + Sync,
{
    fn create(&self, ctx: &FactoryContext<'_>) -> Result<SharedSlice, ComposeError> {
        self(ctx)
    }
}
