//! Docker routing for shared deployments
//!
//! Docker clients always address a registry as `/v2/<image>/...`, so several
//! Docker repositories under one namespace are told apart by the leading
//! image name segments: `/v2/<repo>/<image>/...`, or
//! `/v2/<org>/<repo>/<image>/...` under the org layout. The front end moves
//! that prefix in front of `/v2` so that it routes like every other
//! repository (`/<repo>/v2/<image>/...`), and each Docker repository moves it
//! back before its registry handler sees the request.

use async_trait::async_trait;

use crate::config::Layout;

use super::traits::{SharedSlice, Slice, SliceOutcome, SliceRequest};

/// `/v2/<prefix>/<rest>` to `/<prefix>/v2/<rest>`
pub fn forward_path(layout: Layout, path: &str) -> Option<String> {
    let rest = path.strip_prefix("/v2/")?;
    let (prefix, tail) = split_prefix(rest, layout.segments())?;
    Some(format!("/{}/v2/{}", prefix, tail))
}

/// `/<prefix>/v2/<rest>` to `/v2/<prefix>/<rest>`
pub fn reverted_path(layout: Layout, path: &str) -> Option<String> {
    let rest = path.strip_prefix('/')?;
    let (prefix, tail) = split_prefix(rest, layout.segments())?;
    let tail = tail.strip_prefix("v2")?;
    if !(tail.is_empty() || tail.starts_with('/')) {
        return None;
    }
    Some(format!("/v2/{}/{}", prefix, tail.trim_start_matches('/')))
}

/// Split off the first `count` segments, all of which must be non-empty
fn split_prefix(path: &str, count: usize) -> Option<(&str, &str)> {
    let mut end = 0;
    for index in 0..count {
        let start = if index == 0 { 0 } else { end + 1 };
        let segment = path.get(start..)?;
        let len = segment.find('/').unwrap_or(segment.len());
        if len == 0 {
            return None;
        }
        end = start + len;
    }
    let tail = path[end..].strip_prefix('/').unwrap_or("");
    Some((&path[..end], tail))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Reverted,
}

/// Rewrites Docker API paths between the shared and the per-repository form
pub struct DockerRoutingSlice {
    origin: SharedSlice,
    layout: Layout,
    direction: Direction,
}

impl DockerRoutingSlice {
    /// Front end side: `/v2/<repo>/...` becomes `/<repo>/v2/...`
    ///
    /// Other paths pass through unchanged.
    pub fn forward(layout: Layout, origin: SharedSlice) -> Self {
        Self {
            origin,
            layout,
            direction: Direction::Forward,
        }
    }

    /// Repository side: `/<repo>/v2/...` becomes `/v2/<repo>/...`
    ///
    /// Paths not in that form are declined.
    pub fn reverted(layout: Layout, origin: SharedSlice) -> Self {
        Self {
            origin,
            layout,
            direction: Direction::Reverted,
        }
    }
}

#[async_trait]
impl Slice for DockerRoutingSlice {
    async fn response(&self, request: &SliceRequest) -> SliceOutcome {
        let layout = self.layout;
        match self.direction {
            Direction::Forward => match forward_path(layout, &request.path) {
                Some(path) => self
                    .origin
                    .response(&request.with_path(path))
                    .await
                    .map(|response| {
                        response.map_header("location", |value| local_reverted(layout, value))
                    }),
                None => self.origin.response(request).await,
            },
            Direction::Reverted => match reverted_path(layout, &request.path) {
                Some(path) => self
                    .origin
                    .response(&request.with_path(path))
                    .await
                    .map(|response| {
                        response.map_header("location", |value| local_forward(layout, value))
                    }),
                None => SliceOutcome::NotHandled,
            },
        }
    }
}

fn local_forward(layout: Layout, location: &str) -> Option<String> {
    location
        .starts_with('/')
        .then(|| forward_path(layout, location))
        .flatten()
}

fn local_reverted(layout: Layout, location: &str) -> Option<String> {
    location
        .starts_with('/')
        .then(|| reverted_path(layout, location))
        .flatten()
}

/// Hides the repository prefix from the image names a Docker handler sees
///
/// `/v2/<repo>/<image>/...` reaches the inner slice as `/v2/<image>/...` and
/// relative `Location` headers get the prefix back. Under the org layout the
/// prefix is `<org>/<repo>`.
pub struct TrimmedDocker {
    origin: SharedSlice,
    layout: Layout,
    name: String,
}

impl TrimmedDocker {
    /// Wrap a Docker registry slice serving repository `name`
    pub fn new(origin: SharedSlice, layout: Layout, name: impl Into<String>) -> Self {
        Self {
            origin,
            layout,
            name: name.into(),
        }
    }

    fn trim<'p>(&self, path: &'p str) -> Option<(&'p str, String)> {
        let rest = path.strip_prefix("/v2/")?;
        let (prefix, tail) = split_prefix(rest, self.layout.segments())?;
        let name = prefix.rsplit('/').next()?;
        (name == self.name).then(|| (prefix, format!("/v2/{}", tail)))
    }
}

fn restore(prefix: &str, location: &str) -> Option<String> {
    location
        .strip_prefix("/v2/")
        .map(|tail| format!("/v2/{}/{}", prefix, tail))
}

#[async_trait]
impl Slice for TrimmedDocker {
    async fn response(&self, request: &SliceRequest) -> SliceOutcome {
        match self.trim(&request.path) {
            Some((prefix, path)) => self
                .origin
                .response(&request.with_path(path))
                .await
                .map(|response| response.map_header("location", |value| restore(prefix, value))),
            None => SliceOutcome::NotHandled,
        }
    }
}
