//! Ordered decoration of a protocol slice
//!
//! Decorations are kept as data so the wrapping order of a composed
//! repository can be inspected before it is applied.

use std::sync::Arc;

use crate::config::Layout;

use super::content_length::ContentLengthRestriction;
use super::continuation::ContinueSlice;
use super::docker::{DockerRoutingSlice, TrimmedDocker};
use super::traits::SharedSlice;
use super::trim::{PathPattern, TrimPathSlice};

/// One wrapping step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoration {
    /// Strip the repository prefix of the layout
    TrimPath(Layout),

    /// Strip the repository prefix from Docker image names
    DockerTrim(Layout, String),

    /// Map `/<repo>/v2/...` to `/v2/<repo>/...`
    DockerRevert(Layout),

    /// Reject bodies larger than the limit
    ContentLength(u64),

    /// Decline on `404`
    Continue,
}

impl Decoration {
    /// Wrap a slice with this decoration
    pub fn wrap(&self, origin: SharedSlice) -> SharedSlice {
        match self {
            Decoration::TrimPath(layout) => Arc::new(TrimPathSlice::new(
                origin,
                PathPattern::new(*layout).pattern(),
            )),
            Decoration::DockerTrim(layout, name) => {
                Arc::new(TrimmedDocker::new(origin, *layout, name.clone()))
            }
            Decoration::DockerRevert(layout) => {
                Arc::new(DockerRoutingSlice::reverted(*layout, origin))
            }
            Decoration::ContentLength(limit) => {
                Arc::new(ContentLengthRestriction::new(origin, *limit))
            }
            Decoration::Continue => Arc::new(ContinueSlice::new(origin)),
        }
    }
}

/// Decorations applied innermost first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    steps: Vec<Decoration>,
}

impl Pipeline {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step; it wraps everything added before it
    pub fn then(mut self, step: Decoration) -> Self {
        self.steps.push(step);
        self
    }

    /// Append a step when present
    pub fn then_some(self, step: Option<Decoration>) -> Self {
        match step {
            Some(step) => self.then(step),
            None => self,
        }
    }

    /// Steps in application order
    pub fn steps(&self) -> &[Decoration] {
        &self.steps
    }

    /// Wrap a slice with every step in order
    pub fn apply(&self, slice: SharedSlice) -> SharedSlice {
        self.steps
            .iter()
            .fold(slice, |inner, step| step.wrap(inner))
    }
}
