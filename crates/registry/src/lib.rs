//! Query and mutation definitions, and the flat registry the cache engine is built from.
//!
//! # Sub-modules
//!
//! - [`action`] - Store actions and their event names
//! - [`config`] - Nested declaration tree and its flattening
//! - [`def`] - Query and mutation definitions, service and rule closures
//!
//! A [`Registry`] is either assembled directly with [`Registry::new`] or produced by
//! [`ConfigNode::flatten`]. Both validate name and path uniqueness.

pub mod action;
pub mod config;
pub mod def;
mod error;
mod index;

pub use action::{Action, BATCH_EVENT, clean_event, error_event, loading_event, success_event};
pub use config::ConfigNode;
pub use def::{MutationDef, QueryDef, RefreshPredicate, Service, ServiceFuture, SubscribePatch, service};
pub use error::ConfigError;
pub use index::{Registry, RequestKind};
