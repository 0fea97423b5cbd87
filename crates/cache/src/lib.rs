//! Request-cache engine.
//!
//! # Mental Model
//!
//! 1. **Addressing:** [`path`] maps a query and a [`RequestPayload`] to store addresses;
//!    [`codec`] turns parameter lists into [`CacheKey`]s and back; [`RequestIds`] hands out
//!    request ids.
//! 2. **Reduction:** [`RootReducer`] is built once from the registry and is the only code that
//!    produces new trees.
//! 3. **Publication:** [`Store`] serializes dispatches through the reducer and publishes each
//!    resulting tree atomically to readers and watchers.
//!
//! Store layout under each query path:
//!
//! ```text
//! <query path>
//! ├── "[1]"                 cache key
//! │   ├── data              shared by every request id under the key
//! │   └── status
//! │       ├── user_1: "DONE"
//! │       └── user_2: "LOADING"
//! └── "[2]"
//!     ├── data
//!     └── status
//!         └── user_3: "PENDING_REFRESH"
//! ```
//!
//! [`RequestPayload`]: quarry_primitives::RequestPayload
//! [`CacheKey`]: quarry_primitives::CacheKey

pub mod codec;
pub mod ids;
pub mod path;
mod reducer;
mod store;

pub use codec::{CodecError, decode, encode};
pub use ids::{IdPolicy, RequestIds};
pub use reducer::RootReducer;
pub use store::{Slice, SliceWatch, Store};
