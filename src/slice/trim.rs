//! Path prefix trimming for repositories sharing one namespace

use async_trait::async_trait;
use regex_lite::Regex;
use tracing::debug;

use crate::config::Layout;

use super::traits::{SharedSlice, Slice, SliceOutcome, SliceRequest, FULL_PATH_HEADER};

/// Path pattern of a layout
///
/// The `flat` layout addresses a repository by its name (`/<repo>/...`), the
/// `org` layout by organization and name (`/<org>/<repo>/...`). The single
/// capture group is the path left for the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathPattern {
    layout: Layout,
}

impl PathPattern {
    /// Create a pattern for a layout
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// Pattern source
    pub fn source(&self) -> &'static str {
        match self.layout {
            Layout::Flat => r"^/[^/]+(/.*)?$",
            Layout::Org => r"^/[^/]+/[^/]+(/.*)?$",
        }
    }

    /// Compiled pattern
    pub fn pattern(&self) -> Regex {
        Regex::new(self.source()).expect("Invalid layout path pattern")
    }
}

/// Slice that strips the repository prefix from request paths
///
/// A request that does not match the pattern is declined.
pub struct TrimPathSlice {
    origin: SharedSlice,
    pattern: Regex,
}

impl TrimPathSlice {
    /// Wrap a slice
    pub fn new(origin: SharedSlice, pattern: Regex) -> Self {
        Self { origin, pattern }
    }

    /// Path left after trimming, or `None` when the path does not match
    pub fn trim(&self, path: &str) -> Option<String> {
        let captures = self.pattern.captures(path)?;
        let rest = captures
            .get(1)
            .map(|m| m.as_str())
            .filter(|rest| !rest.is_empty())
            .unwrap_or("/");
        Some(rest.to_string())
    }
}

#[async_trait]
impl Slice for TrimPathSlice {
    async fn response(&self, request: &SliceRequest) -> SliceOutcome {
        match self.trim(&request.path) {
            Some(rest) => {
                let trimmed = request
                    .with_path(rest)
                    .with_header(FULL_PATH_HEADER, request.path.clone());
                self.origin.response(&trimmed).await
            }
            None => {
                debug!(
                    path = %request.path,
                    pattern = self.pattern.as_str(),
                    "Request path does not match layout pattern"
                );
                SliceOutcome::NotHandled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slice::testing::RecordingSlice;
    use std::sync::Arc;

    fn trimmed(layout: Layout) -> (Arc<RecordingSlice>, TrimPathSlice) {
        let inner = Arc::new(RecordingSlice::ok("inner"));
        let slice = TrimPathSlice::new(inner.clone(), PathPattern::new(layout).pattern());
        (inner, slice)
    }

    #[tokio::test]
    async fn test_flat_layout_strips_repository_name() {
        let (inner, slice) = trimmed(Layout::Flat);

        let outcome = slice
            .response(&SliceRequest::get("/my-maven/com/acme/lib.jar"))
            .await;

        assert!(outcome.is_handled());
        let seen = inner.last_request().unwrap();
        assert_eq!(seen.path, "/com/acme/lib.jar");
        assert_eq!(
            seen.header(FULL_PATH_HEADER),
            Some("/my-maven/com/acme/lib.jar")
        );
    }

    #[tokio::test]
    async fn test_flat_layout_repository_root() {
        let (inner, slice) = trimmed(Layout::Flat);

        slice.response(&SliceRequest::get("/my-maven")).await;
        assert_eq!(inner.last_request().unwrap().path, "/");

        slice.response(&SliceRequest::get("/my-maven/")).await;
        assert_eq!(inner.last_request().unwrap().path, "/");
    }

    #[tokio::test]
    async fn test_org_layout_strips_two_segments() {
        let (inner, slice) = trimmed(Layout::Org);

        slice
            .response(&SliceRequest::get("/acme/npm/left-pad/-/left-pad-1.0.0.tgz"))
            .await;

        assert_eq!(
            inner.last_request().unwrap().path,
            "/left-pad/-/left-pad-1.0.0.tgz"
        );
    }

    #[tokio::test]
    async fn test_non_matching_path_is_not_handled() {
        let (inner, slice) = trimmed(Layout::Org);

        let outcome = slice.response(&SliceRequest::get("/only-one")).await;

        assert_eq!(outcome, SliceOutcome::NotHandled);
        assert_eq!(inner.calls(), 0);
    }

    #[test]
    fn test_pattern_sources() {
        assert_eq!(PathPattern::new(Layout::Flat).source(), r"^/[^/]+(/.*)?$");
        assert!(PathPattern::new(Layout::Org).pattern().is_match("/a/b/c"));
        assert!(!PathPattern::new(Layout::Flat).pattern().is_match("/"));
    }
}
