//! Client surface of the quarry request cache.
//!
//! # Mental Model
//!
//! A [`Client`] pairs one validated [`Registry`](quarry_registry::Registry) with one
//! [`Store`](quarry_cache::Store). Handles ([`QueryHandle`], [`MultiQueryHandle`],
//! [`PaginatedQuery`], [`ListPaginatedQuery`], [`RequestHandle`]) own request ids for as long
//! as their owner cares about the result and clean up on drop. Underneath, [`QueryRequest`], [`BatchRequest`] and [`MutationRequest`]
//! sequence the store dispatches around each service call.
//!
//! ```no_run
//! use quarry_client::{Client, ClientOptions};
//! use quarry_registry::{QueryDef, Registry, service};
//! use serde_json::json;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let user = QueryDef::new("user", service(|params| async move { Ok::<_, anyhow::Error>(json!({ "id": params[0] })) }));
//! let client = Client::new(Registry::new([user], [])?, ClientOptions::default());
//!
//! let handle = client.query("user", vec![json!(1)])?;
//! handle.refetch().await?;
//! assert_eq!(handle.data(), json!({ "id": 1 }));
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod handle;
pub mod request;
pub mod telemetry;

pub use client::{Client, ClientOptions};
pub use error::UsageError;
pub use handle::{ListPaginatedQuery, MultiQueryHandle, PaginatedQuery, QueryHandle, QueryOptions, RequestHandle};
pub use request::{BatchRequest, MutationRequest, QueryRequest};
