//! Core value types shared by the cache engine and its clients: the persistent
//! store tree, request identifiers, and request status.

/// Cache keys, request ids and the payload pairing them.
pub mod ids;
/// Lifecycle status of one request under one cache key.
pub mod status;
/// Persistent copy-on-write store tree.
pub mod tree;

pub use ids::{CacheKey, RequestId, RequestPayload};
pub use status::Status;
pub use tree::{Branch, Node};
