//! Query and mutation definitions.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::Action;

/// Future returned by a service call.
pub type ServiceFuture = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send + 'static>>;

/// Asynchronous request function taking the ordered parameter list.
pub type Service = Arc<dyn Fn(Vec<Value>) -> ServiceFuture + Send + Sync>;

/// Decides whether a refresh event marks one request as pending.
///
/// Called with the cache entry's current data (if any), the triggering action, and the
/// decoded parameters of the cache entry.
pub type RefreshPredicate = Arc<dyn Fn(Option<&Value>, &Action, &[Value]) -> bool + Send + Sync>;

/// Patches a cache entry's data in response to an event.
///
/// Called with the current data (or the query default), the triggering action, and the
/// decoded parameters of the cache entry; returns the replacement data.
pub type SubscribePatch = Arc<dyn Fn(Value, &Action, &[Value]) -> Value + Send + Sync>;

/// Wraps an async closure as a [`Service`].
pub fn service<F, Fut>(f: F) -> Service
where
	F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
	Arc::new(move |params| -> ServiceFuture { Box::pin(f(params)) })
}

/// A declared read request.
///
/// `path` is the address prefix of the query's cache entries relative to the store root. It
/// defaults to `[name]`; config flattening prefixes it with the enclosing branch keys.
#[derive(Clone)]
pub struct QueryDef {
	pub name: Arc<str>,
	pub path: Vec<String>,
	pub service: Service,
	pub default_value: Value,
	pub refresh: Vec<String>,
	pub refresh_if: IndexMap<String, RefreshPredicate>,
	pub subscribe: IndexMap<String, SubscribePatch>,
}

impl std::fmt::Debug for QueryDef {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("QueryDef")
			.field("name", &self.name)
			.field("path", &self.path)
			.field("default_value", &self.default_value)
			.field("refresh", &self.refresh)
			.field("refresh_if", &self.refresh_if.keys().collect::<Vec<_>>())
			.field("subscribe", &self.subscribe.keys().collect::<Vec<_>>())
			.finish()
	}
}

impl QueryDef {
	pub fn new(name: impl Into<Arc<str>>, service: Service) -> Self {
		let name = name.into();
		Self {
			path: vec![name.to_string()],
			name,
			service,
			default_value: Value::Null,
			refresh: Vec::new(),
			refresh_if: IndexMap::new(),
			subscribe: IndexMap::new(),
		}
	}

	/// Data returned for cache entries that have not resolved yet.
	pub fn default_value(mut self, value: Value) -> Self {
		self.default_value = value;
		self
	}

	/// Overrides the address prefix.
	pub fn path<I, S>(mut self, path: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.path = path.into_iter().map(Into::into).collect();
		self
	}

	/// Marks every live request pending whenever `event` is dispatched.
	pub fn refresh(mut self, event: impl Into<String>) -> Self {
		let event = event.into();
		if !self.refresh.contains(&event) {
			self.refresh.push(event);
		}
		self
	}

	/// Marks live requests pending on `event` when `predicate` holds for their cache entry.
	pub fn refresh_if<F>(mut self, event: impl Into<String>, predicate: F) -> Self
	where
		F: Fn(Option<&Value>, &Action, &[Value]) -> bool + Send + Sync + 'static,
	{
		self.refresh_if.insert(event.into(), Arc::new(predicate));
		self
	}

	/// Patches every cache entry's data whenever `event` is dispatched.
	pub fn subscribe<F>(mut self, event: impl Into<String>, patch: F) -> Self
	where
		F: Fn(Value, &Action, &[Value]) -> Value + Send + Sync + 'static,
	{
		self.subscribe.insert(event.into(), Arc::new(patch));
		self
	}

	/// Refresh rules in handler order: `refresh` events first, then `refresh_if` events not
	/// already listed. An event named in both uses its predicate.
	pub fn refresh_rules(&self) -> Vec<(&str, Option<&RefreshPredicate>)> {
		let mut rules: Vec<(&str, Option<&RefreshPredicate>)> = self
			.refresh
			.iter()
			.map(|event| (event.as_str(), self.refresh_if.get(event)))
			.collect();
		for (event, predicate) in &self.refresh_if {
			if !self.refresh.contains(event) {
				rules.push((event.as_str(), Some(predicate)));
			}
		}
		rules
	}
}

/// A declared write request. Mutations have no cached state.
#[derive(Clone)]
pub struct MutationDef {
	pub name: Arc<str>,
	pub service: Service,
}

impl std::fmt::Debug for MutationDef {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MutationDef").field("name", &self.name).finish()
	}
}

impl MutationDef {
	pub fn new(name: impl Into<Arc<str>>, service: Service) -> Self {
		Self { name: name.into(), service }
	}
}
