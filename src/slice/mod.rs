//! Request slices and the decorators wrapped around them
//!
//! This module contains:
//! - The `Slice` trait with its request, response and outcome types
//! - Path trimming for shared namespaces
//! - Content length enforcement
//! - The continue-on-no-match adapter
//! - Docker routing adapters
//! - Group fan-out
//! - The decoration pipeline

pub mod content_length;
pub mod continuation;
pub mod docker;
pub mod group;
pub mod pipeline;
pub mod traits;
pub mod trim;

pub use content_length::ContentLengthRestriction;
pub use continuation::ContinueSlice;
pub use docker::{DockerRoutingSlice, TrimmedDocker};
pub use group::GroupSlice;
pub use pipeline::{Decoration, Pipeline};
pub use traits::{SharedSlice, Slice, SliceOutcome, SliceRequest, SliceResponse, FULL_PATH_HEADER};
pub use trim::{PathPattern, TrimPathSlice};
