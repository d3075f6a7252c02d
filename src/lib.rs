//! registry-composer - Handler composition for a multi-protocol artifact repository server
//!
//! Every configured repository (hosted, proxy, Docker or group) is turned into
//! one request handler, a [`slice::Slice`], decorated for path trimming,
//! upload size limits and fall-through, and served behind one HTTP front end.

pub mod auth;
pub mod client;
pub mod compose;
pub mod config;
pub mod error;
pub mod logging;
pub mod registry;
pub mod server;
pub mod settings;
pub mod slice;
pub mod storage;
