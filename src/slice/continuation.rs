//! Continue-on-no-match adapter

use async_trait::async_trait;

use super::traits::{SharedSlice, Slice, SliceOutcome, SliceRequest};

/// Turns a `404` from the wrapped slice into a decline
///
/// This lets a dispatcher or a group fall through to the next repository
/// when one repository does not have the requested artifact.
pub struct ContinueSlice {
    origin: SharedSlice,
}

impl ContinueSlice {
    /// Wrap a slice
    pub fn new(origin: SharedSlice) -> Self {
        Self { origin }
    }
}

#[async_trait]
impl Slice for ContinueSlice {
    async fn response(&self, request: &SliceRequest) -> SliceOutcome {
        match self.origin.response(request).await {
            SliceOutcome::Handled(response) if response.status == 404 => SliceOutcome::NotHandled,
            outcome => outcome,
        }
    }
}
