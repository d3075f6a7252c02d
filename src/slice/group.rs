//! First-match-wins fan-out over member slices

use async_trait::async_trait;
use tracing::debug;

use super::traits::{SharedSlice, Slice, SliceOutcome, SliceRequest};

/// Group of member slices tried in order
///
/// The first member that claims the request answers it and the remaining
/// members are not invoked. When no member claims it the group declines.
pub struct GroupSlice {
    members: Vec<SharedSlice>,
}

impl GroupSlice {
    /// Create a group; member order is match priority
    pub fn new(members: Vec<SharedSlice>) -> Self {
        Self { members }
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns true if the group has no members
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[async_trait]
impl Slice for GroupSlice {
    async fn response(&self, request: &SliceRequest) -> SliceOutcome {
        for (index, member) in self.members.iter().enumerate() {
            let outcome = member.response(request).await;
            if outcome.is_handled() {
                debug!(path = %request.path, member = index, "Group member handled request");
                return outcome;
            }
        }
        SliceOutcome::NotHandled
    }
}
