//! Remote-forwarding proxy slice
//!
//! Forwards GET/HEAD requests to a remote repository through the shared
//! client. Successful downloads are cached in the repository storage, and
//! the cache answers when the remote cannot be reached.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::auth::{authorize, Action, Authentication, Permissions};
use crate::client::{HttpClient, OutboundRequest};
use crate::config::RepoConfig;
use crate::error::{ClientError, ComposeError};
use crate::slice::{Slice, SliceOutcome, SliceRequest, SliceResponse};
use crate::storage::{Key, Storage, StorageError};

/// Request headers passed on to the remote
const FORWARDED_HEADERS: [&str; 4] = ["accept", "accept-encoding", "if-none-match", "user-agent"];

/// Remote repository settings
///
/// ```yaml
/// settings:
///   remote:
///     url: https://repo1.maven.org/maven2
///     username: bot
///     password: secret
/// ```
///
/// A `remotes` list is accepted as well; its first entry is used.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteSettings {
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl RemoteSettings {
    /// Read the remote from the repository settings
    pub fn from_config(config: &RepoConfig) -> Result<Self, ComposeError> {
        let repo = config.display_name();
        let settings = config
            .settings()
            .ok_or_else(|| ComposeError::malformed(repo, "settings section is required"))?;

        let node = match (settings.get("remote"), settings.get("remotes")) {
            (Some(remote), _) => remote.clone(),
            (None, Some(serde_yaml::Value::Sequence(remotes))) => remotes
                .first()
                .cloned()
                .ok_or_else(|| ComposeError::malformed(repo, "remotes list is empty"))?,
            (None, Some(_)) => {
                return Err(ComposeError::malformed(repo, "remotes must be a list"));
            }
            (None, None) => {
                return Err(ComposeError::malformed(repo, "remote is not configured"));
            }
        };

        let remote: RemoteSettings = serde_yaml::from_value(node)
            .map_err(|e| ComposeError::malformed(repo, format!("invalid remote: {}", e)))?;
        if remote.url.trim().is_empty() {
            return Err(ComposeError::malformed(repo, "remote url is empty"));
        }
        Ok(remote)
    }

    fn target(&self, request: &SliceRequest) -> String {
        let mut url = format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            request.path.trim_start_matches('/')
        );
        if let Some(query) = &request.query {
            url.push('?');
            url.push_str(query);
        }
        url
    }
}

/// Slice forwarding requests to a remote repository
pub struct ProxySlice {
    remote: RemoteSettings,
    client: Arc<HttpClient>,
    cache: Option<Arc<dyn Storage>>,
    permissions: Arc<dyn Permissions>,
    auth: Arc<dyn Authentication>,
}

impl ProxySlice {
    pub fn new(
        remote: RemoteSettings,
        client: Arc<HttpClient>,
        permissions: Arc<dyn Permissions>,
        auth: Arc<dyn Authentication>,
    ) -> Self {
        Self {
            remote,
            client,
            cache: None,
            permissions,
            auth,
        }
    }

    /// Keep successful downloads in `storage`
    pub fn with_cache(mut self, storage: Arc<dyn Storage>) -> Self {
        self.cache = Some(storage);
        self
    }

    fn outbound(&self, request: &SliceRequest) -> OutboundRequest {
        let mut outbound =
            OutboundRequest::new(request.method.clone(), self.remote.target(request));
        for (name, value) in &request.headers {
            if FORWARDED_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name)) {
                outbound = outbound.with_header(name.clone(), value.clone());
            }
        }
        if let Some(username) = &self.remote.username {
            outbound = outbound.with_basic_auth(
                username.clone(),
                self.remote.password.clone().unwrap_or_default(),
            );
        }
        outbound
    }

    async fn store(&self, key: &Key, response: &SliceResponse) {
        let Some(cache) = &self.cache else {
            return;
        };
        if key.is_root() {
            return;
        }
        match cache.save(key, response.body.clone()).await {
            Ok(()) => debug!(key = %key, "Cached remote artifact"),
            Err(e) => warn!(key = %key, error = %e, "Failed to cache remote artifact"),
        }
    }

    async fn cached(&self, key: &Key) -> Option<SliceResponse> {
        let cache = self.cache.as_ref()?;
        match cache.value(key).await {
            Ok(content) => Some(SliceResponse::ok(content)),
            Err(StorageError::NotFound(_)) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read cached artifact");
                None
            }
        }
    }

    async fn fallback(&self, request: &SliceRequest, err: ClientError) -> SliceResponse {
        if let Ok(key) = Key::new(&request.path) {
            if let Some(cached) = self.cached(&key).await {
                warn!(
                    url = %self.remote.url,
                    error = %err,
                    key = %key,
                    "Remote failed, serving cached artifact"
                );
                return if request.method == "HEAD" {
                    SliceResponse::ok(bytes::Bytes::new())
                } else {
                    cached
                };
            }
        }
        warn!(url = %self.remote.url, error = %err, "Remote request failed");
        match err {
            ClientError::Closed => SliceResponse::unavailable("upstream client is shut down"),
            other => SliceResponse::bad_gateway(&other.to_string()),
        }
    }
}

#[async_trait]
impl Slice for ProxySlice {
    async fn response(&self, request: &SliceRequest) -> SliceOutcome {
        if request.method != "GET" && request.method != "HEAD" {
            return SliceResponse::method_not_allowed().into();
        }
        if let Err(denied) = authorize(request, &*self.auth, &*self.permissions, Action::Read) {
            return denied.into();
        }

        let response = match self.client.send(&self.outbound(request)).await {
            Ok(response) => {
                if response.status == 200
                    && request.method == "GET"
                    && !request.path.ends_with('/')
                {
                    if let Ok(key) = Key::new(&request.path) {
                        self.store(&key, &response).await;
                    }
                }
                response
            }
            Err(err) => self.fallback(request, err).await,
        };
        response.into()
    }
}
