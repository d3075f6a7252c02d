//! Request dispatch to composed repositories

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::Layout;
use crate::slice::{
    DockerRoutingSlice, SharedSlice, Slice, SliceOutcome, SliceRequest, SliceResponse,
};

/// Repositories reachable through the front end
#[derive(Clone)]
pub struct RepositorySlices {
    root: SharedSlice,
    names: Vec<String>,
}

impl RepositorySlices {
    /// A single repository answering every request at the root
    pub fn standalone(name: impl Into<String>, slice: SharedSlice) -> Self {
        Self {
            root: slice,
            names: vec![name.into()],
        }
    }

    /// Repositories sharing one namespace, selected by path
    ///
    /// Docker API paths (`/v2/<repo>/...`, or `/v2/<org>/<repo>/...` under
    /// the org layout) are moved to `/<repo>/v2/...` before the lookup.
    pub fn shared(layout: Layout, repos: Vec<(String, SharedSlice)>) -> Self {
        let mut names: Vec<String> = repos.iter().map(|(name, _)| name.clone()).collect();
        names.sort();
        let dispatcher: SharedSlice = Arc::new(ByRepoName {
            layout,
            repos: repos.into_iter().collect(),
        });
        Self {
            root: Arc::new(DockerRoutingSlice::forward(layout, dispatcher)),
            names,
        }
    }

    /// Names of the served repositories, sorted
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Answer a request; a request nobody claims is a `404`
    pub async fn serve(&self, request: &SliceRequest) -> SliceResponse {
        match self.root.response(request).await {
            SliceOutcome::Handled(response) => response,
            SliceOutcome::NotHandled => {
                debug!(
                    method = %request.method,
                    path = %request.path,
                    "No repository claimed request"
                );
                SliceResponse::not_found()
            }
        }
    }
}

/// Selects the repository named by the request path
struct ByRepoName {
    layout: Layout,
    repos: HashMap<String, SharedSlice>,
}

impl ByRepoName {
    fn repo_name<'a>(&self, path: &'a str) -> Option<&'a str> {
        let mut segments = path.trim_start_matches('/').split('/');
        let name = match self.layout {
            Layout::Flat => segments.next(),
            Layout::Org => segments.nth(1),
        }?;
        (!name.is_empty()).then_some(name)
    }
}

#[async_trait]
impl Slice for ByRepoName {
    async fn response(&self, request: &SliceRequest) -> SliceOutcome {
        let Some(slice) = self
            .repo_name(&request.path)
            .and_then(|name| self.repos.get(name))
        else {
            return SliceOutcome::NotHandled;
        };
        slice.response(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slice::testing::RecordingSlice;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_standalone_gets_every_request() {
        let slice = Arc::new(RecordingSlice::ok("only"));
        let slices = RepositorySlices::standalone("files", slice.clone());

        let response = slices.serve(&SliceRequest::get("/any/path")).await;

        assert_eq!(response.body, Bytes::from("only"));
        assert_eq!(slice.calls(), 1);
        assert_eq!(slices.names(), &["files".to_string()]);
    }

    #[tokio::test]
    async fn test_shared_selects_by_first_segment() {
        let maven = Arc::new(RecordingSlice::ok("maven"));
        let npm = Arc::new(RecordingSlice::ok("npm"));
        let slices = RepositorySlices::shared(
            Layout::Flat,
            vec![
                ("npm".to_string(), npm.clone() as SharedSlice),
                ("maven".to_string(), maven.clone() as SharedSlice),
            ],
        );

        let response = slices.serve(&SliceRequest::get("/maven/a/b.jar")).await;

        assert_eq!(response.body, Bytes::from("maven"));
        assert_eq!(npm.calls(), 0);
        assert_eq!(
            maven.last_request().map(|r| r.path),
            Some("/maven/a/b.jar".to_string())
        );
        assert_eq!(slices.names(), &["maven".to_string(), "npm".to_string()]);
    }

    #[tokio::test]
    async fn test_org_layout_selects_second_segment() {
        let maven = Arc::new(RecordingSlice::ok("maven"));
        let slices = RepositorySlices::shared(
            Layout::Org,
            vec![("maven".to_string(), maven as SharedSlice)],
        );

        assert_eq!(slices.serve(&SliceRequest::get("/acme/maven/x")).await.status, 200);
        assert_eq!(slices.serve(&SliceRequest::get("/maven/x")).await.status, 404);
    }

    #[tokio::test]
    async fn test_unknown_repository_is_404() {
        let slices = RepositorySlices::shared(Layout::Flat, Vec::new());

        assert_eq!(slices.serve(&SliceRequest::get("/nope/x")).await.status, 404);
        assert_eq!(slices.serve(&SliceRequest::get("/")).await.status, 404);
    }

    #[tokio::test]
    async fn test_declined_request_is_404() {
        let slices = RepositorySlices::shared(
            Layout::Flat,
            vec![("files".to_string(), Arc::new(RecordingSlice::declining()) as SharedSlice)],
        );

        assert_eq!(slices.serve(&SliceRequest::get("/files/x")).await.status, 404);
    }

    #[tokio::test]
    async fn test_docker_paths_are_forwarded() {
        let registry = Arc::new(RecordingSlice::ok("manifest"));
        let slices = RepositorySlices::shared(
            Layout::Flat,
            vec![("hub".to_string(), registry.clone() as SharedSlice)],
        );

        let response = slices
            .serve(&SliceRequest::get("/v2/hub/alpine/manifests/latest"))
            .await;

        assert_eq!(response.status, 200);
        assert_eq!(
            registry.last_request().map(|r| r.path),
            Some("/hub/v2/alpine/manifests/latest".to_string())
        );
    }

    #[tokio::test]
    async fn test_docker_paths_are_forwarded_in_org_layout() {
        let registry = Arc::new(RecordingSlice::ok("manifest"));
        let slices = RepositorySlices::shared(
            Layout::Org,
            vec![("hub".to_string(), registry.clone() as SharedSlice)],
        );

        let response = slices
            .serve(&SliceRequest::get("/v2/acme/hub/alpine/manifests/latest"))
            .await;

        assert_eq!(response.status, 200);
        assert_eq!(
            registry.last_request().map(|r| r.path),
            Some("/acme/hub/v2/alpine/manifests/latest".to_string())
        );
    }
}
