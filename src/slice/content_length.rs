//! Request body size enforcement

use async_trait::async_trait;
use tracing::debug;

use super::traits::{SharedSlice, Slice, SliceOutcome, SliceRequest, SliceResponse};

/// Rejects requests declaring a body larger than the limit
///
/// Requests without a `Content-Length` header are forwarded.
pub struct ContentLengthRestriction {
    origin: SharedSlice,
    limit: u64,
}

impl ContentLengthRestriction {
    /// Wrap a slice with a body size limit in bytes
    pub fn new(origin: SharedSlice, limit: u64) -> Self {
        Self { origin, limit }
    }

    /// Configured limit in bytes
    pub fn limit(&self) -> u64 {
        self.limit
    }
}

#[async_trait]
impl Slice for ContentLengthRestriction {
    async fn response(&self, request: &SliceRequest) -> SliceOutcome {
        match request.content_length() {
            Some(Ok(length)) if length > self.limit => {
                debug!(
                    path = %request.path,
                    length,
                    limit = self.limit,
                    "Request body exceeds content length limit"
                );
                SliceResponse::payload_too_large(self.limit).into()
            }
            Some(Err(_)) => SliceResponse::bad_request("invalid Content-Length").into(),
            _ => self.origin.response(request).await,
        }
    }
}
