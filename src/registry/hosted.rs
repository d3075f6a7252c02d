//! Storage-backed hosting slice
//!
//! Serves the repository storage over plain HTTP: GET/HEAD read a key,
//! PUT/POST/PATCH store the request body, DELETE removes a key. A GET on a
//! directory path (root or trailing `/`) lists the keys below it.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};

use crate::auth::{authorize, Action, Authentication, Permissions};
use crate::slice::{Slice, SliceOutcome, SliceRequest, SliceResponse};
use crate::storage::{Key, Storage, StorageError};

/// Slice serving artifacts from a storage
pub struct HostedSlice {
    storage: Arc<dyn Storage>,
    permissions: Arc<dyn Permissions>,
    auth: Arc<dyn Authentication>,
    base_url: Option<String>,
}

impl HostedSlice {
    pub fn new(
        storage: Arc<dyn Storage>,
        permissions: Arc<dyn Permissions>,
        auth: Arc<dyn Authentication>,
    ) -> Self {
        Self {
            storage,
            permissions,
            auth,
            base_url: None,
        }
    }

    /// Public URL of the repository; uploads answer with a `Location` below it
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    fn location(&self, key: &Key) -> Option<String> {
        self.base_url
            .as_ref()
            .map(|base| format!("{}/{}", base.trim_end_matches('/'), key))
    }

    async fn read(&self, request: &SliceRequest, key: &Key) -> SliceResponse {
        if key.is_root() || request.path.ends_with('/') {
            return self.listing(key).await;
        }
        match self.storage.value(key).await {
            Ok(content) if request.method == "HEAD" => SliceResponse::ok(Bytes::new())
                .with_header("X-Content-Length", content.len().to_string()),
            Ok(content) => SliceResponse::ok(content),
            Err(StorageError::NotFound(_)) => SliceResponse::not_found(),
            Err(e) => storage_failure(key, e),
        }
    }

    async fn listing(&self, prefix: &Key) -> SliceResponse {
        match self.storage.list(prefix).await {
            Ok(keys) if keys.is_empty() => SliceResponse::not_found(),
            Ok(keys) => {
                let body = keys
                    .iter()
                    .map(|key| key.strip_prefix(prefix).unwrap_or_else(|| key.clone()))
                    .map(|key| key.to_string())
                    .collect::<Vec<_>>()
                    .join("\n");
                SliceResponse::ok(body).with_content_type("text/plain")
            }
            Err(e) => storage_failure(prefix, e),
        }
    }

    async fn write(&self, request: &SliceRequest, key: &Key) -> SliceResponse {
        if key.is_root() {
            return SliceResponse::bad_request("cannot write to the repository root");
        }
        match self.storage.save(key, request.body.clone()).await {
            Ok(()) => {
                debug!(key = %key, size = request.body.len(), "Stored artifact");
                match self.location(key) {
                    Some(location) => SliceResponse::created().with_header("Location", location),
                    None => SliceResponse::created(),
                }
            }
            Err(e) => storage_failure(key, e),
        }
    }

    async fn remove(&self, key: &Key) -> SliceResponse {
        match self.storage.delete(key).await {
            Ok(()) => {
                debug!(key = %key, "Deleted artifact");
                SliceResponse::ok(Bytes::new())
            }
            Err(StorageError::NotFound(_)) => SliceResponse::not_found(),
            Err(e) => storage_failure(key, e),
        }
    }
}

fn storage_failure(key: &Key, err: StorageError) -> SliceResponse {
    warn!(key = %key, error = %err, "Storage operation failed");
    SliceResponse::internal_error("storage failure")
}

#[async_trait]
impl Slice for HostedSlice {
    async fn response(&self, request: &SliceRequest) -> SliceOutcome {
        let Some(action) = Action::from_method(&request.method) else {
            return SliceResponse::method_not_allowed().into();
        };
        if let Err(denied) = authorize(request, &*self.auth, &*self.permissions, action) {
            return denied.into();
        }
        let key = match Key::new(&request.path) {
            Ok(key) => key,
            Err(e) => return SliceResponse::bad_request(&e.to_string()).into(),
        };

        let response = match action {
            Action::Read => self.read(request, &key).await,
            Action::Write => self.write(request, &key).await,
            Action::Delete | Action::All => self.remove(&key).await,
        };
        response.into()
    }
}
