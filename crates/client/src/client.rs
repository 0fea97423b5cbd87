//! Client facade over one registry and one store.

use std::sync::Arc;

use quarry_cache::{IdPolicy, RequestIds, RootReducer, Slice, SliceWatch, Store, encode};
use quarry_primitives::{RequestId, RequestPayload};
use quarry_registry::{Action, ConfigError, ConfigNode, MutationDef, QueryDef, Registry, Service};
use serde::Deserialize;
use serde_json::Value;
use tokio::runtime::Handle;

use crate::handle::{ListPaginatedQuery, MultiQueryHandle, PaginatedQuery, QueryHandle, QueryOptions, RequestHandle};
use crate::request::{BatchRequest, MutationRequest, QueryRequest};
use crate::UsageError;

/// Host-provided client settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientOptions {
	/// Address of the cache inside the store tree. Empty places it at the tree root.
	pub root_path: Vec<String>,
	pub id_policy: IdPolicy,
}

impl ClientOptions {
	pub fn root_path<I, S>(mut self, path: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.root_path = path.into_iter().map(Into::into).collect();
		self
	}

	pub fn id_policy(mut self, policy: IdPolicy) -> Self {
		self.id_policy = policy;
		self
	}
}

/// Shared entry point for issuing requests and reading the cache.
///
/// Cloning is cheap; clones share the registry, store and request id counters.
#[derive(Debug, Clone)]
pub struct Client {
	pub(crate) registry: Arc<Registry>,
	pub(crate) store: Arc<Store>,
	pub(crate) ids: RequestIds,
}

impl Client {
	/// Builds the root reducer and an empty store for `registry`.
	pub fn new(registry: Registry, options: ClientOptions) -> Self {
		let reducer = RootReducer::from_registry(&registry);
		let store = Store::with_root(reducer, options.root_path);
		tracing::debug!(
			queries = registry.queries().len(),
			mutations = registry.mutations().len(),
			id_policy = ?options.id_policy,
			"client.new"
		);
		Self {
			registry: Arc::new(registry),
			store: Arc::new(store),
			ids: RequestIds::new(options.id_policy),
		}
	}

	/// Flattens `config` and builds a client for the result.
	pub fn from_config(config: ConfigNode, options: ClientOptions) -> Result<Self, ConfigError> {
		Ok(Self::new(config.flatten()?, options))
	}

	pub fn registry(&self) -> &Registry {
		&self.registry
	}

	pub fn store(&self) -> &Arc<Store> {
		&self.store
	}

	pub fn ids(&self) -> &RequestIds {
		&self.ids
	}

	pub fn dispatch(&self, action: Action) {
		self.store.dispatch(action);
	}

	pub fn select(&self, slices: &[Slice]) -> Vec<Value> {
		self.store.select(slices)
	}

	pub fn watch(&self, slices: Vec<Slice>) -> SliceWatch {
		self.store.watch(slices)
	}

	pub(crate) fn query_def(&self, name: &str) -> Result<&Arc<QueryDef>, UsageError> {
		self.registry
			.query(name)
			.ok_or_else(|| UsageError::UnknownQuery { name: name.to_owned() }.logged())
	}

	fn mutation_def(&self, name: &str) -> Result<&Arc<MutationDef>, UsageError> {
		self.registry
			.mutation(name)
			.ok_or_else(|| UsageError::UnknownMutation { name: name.to_owned() }.logged())
	}

	/// Pairs the cache key of `params` with `request_id`.
	pub fn payload(params: &[Value], request_id: RequestId) -> RequestPayload {
		RequestPayload::new(encode(params), request_id)
	}

	/// Splits a JSON value into a parameter list. Anything but an array is refused.
	pub fn params_from_value(name: &str, params: Value) -> Result<Vec<Value>, UsageError> {
		match params {
			Value::Array(items) => Ok(items),
			other => Err(UsageError::ParamsNotSequence {
				name: name.to_owned(),
				got: json_kind(&other),
			}
			.logged()),
		}
	}

	/// Low-level request for query `name` under a caller-managed payload.
	pub fn query_request(&self, name: &str, payload: RequestPayload) -> Result<QueryRequest, UsageError> {
		let def = self.query_def(name)?;
		Ok(QueryRequest::new(Arc::clone(&self.store), Arc::clone(def), payload))
	}

	/// Low-level batch for query `name` under caller-managed payloads.
	pub fn batch_request(&self, name: &str, payloads: Vec<RequestPayload>) -> Result<BatchRequest, UsageError> {
		let def = self.query_def(name)?;
		Ok(BatchRequest::new(Arc::clone(&self.store), Arc::clone(def), payloads))
	}

	pub fn mutation(&self, name: &str) -> Result<MutationRequest, UsageError> {
		let def = self.mutation_def(name)?;
		Ok(MutationRequest::new(Arc::clone(&self.store), Arc::clone(def)))
	}

	/// The raw service of a query or mutation, bypassing the cache.
	pub fn service(&self, name: &str) -> Result<Service, UsageError> {
		self.registry
			.service(name)
			.cloned()
			.ok_or_else(|| UsageError::UnknownService { name: name.to_owned() }.logged())
	}

	fn runtime(name: &str) -> Result<Handle, UsageError> {
		Handle::try_current().map_err(|_| UsageError::NoRuntime { name: name.to_owned() }.logged())
	}

	/// Allocates a request id for `name` and issues the query on the current Tokio runtime.
	pub fn query(&self, name: &str, params: Vec<Value>) -> Result<QueryHandle, UsageError> {
		self.query_with(name, params, QueryOptions::default())
	}

	/// Like [`query`](Self::query); a disabled handle allocates its id but issues nothing.
	pub fn query_with(&self, name: &str, params: Vec<Value>, options: QueryOptions) -> Result<QueryHandle, UsageError> {
		let def = Arc::clone(self.query_def(name)?);
		let runtime = Self::runtime(name)?;
		let handle = QueryHandle::new(self.clone(), def, runtime, params, options);
		let _ = handle.issue();
		Ok(handle)
	}

	/// Allocates one request id for `name` and issues one batched request per parameter set.
	pub fn multi_query(&self, name: &str, multi_params: Vec<Vec<Value>>) -> Result<MultiQueryHandle, UsageError> {
		self.multi_query_with(name, multi_params, QueryOptions::default())
	}

	pub fn multi_query_with(
		&self,
		name: &str,
		multi_params: Vec<Vec<Value>>,
		options: QueryOptions,
	) -> Result<MultiQueryHandle, UsageError> {
		let def = Arc::clone(self.query_def(name)?);
		let runtime = Self::runtime(name)?;
		let handle = MultiQueryHandle::new(self.clone(), def, runtime, multi_params, options);
		let _ = handle.issue();
		Ok(handle)
	}

	/// Starts an empty paginated query for `name`.
	pub fn paginated(&self, name: &str) -> Result<PaginatedQuery, UsageError> {
		let def = Arc::clone(self.query_def(name)?);
		let runtime = Self::runtime(name)?;
		Ok(PaginatedQuery::new(self.clone(), def, runtime))
	}

	/// Starts a flattened paginated query for `name` and loads its first page unless disabled.
	pub fn list_paginated(
		&self,
		name: &str,
		first: Vec<Value>,
		options: QueryOptions,
	) -> Result<ListPaginatedQuery, UsageError> {
		let list = ListPaginatedQuery::new(self.paginated(name)?, first, options);
		let _ = list.reset();
		Ok(list)
	}

	/// Allocates one request id for `name`, reused by every call of the returned handle.
	pub fn request_handle(&self, name: &str) -> Result<RequestHandle, UsageError> {
		let def = Arc::clone(self.query_def(name)?);
		Ok(RequestHandle::new(self.clone(), def))
	}
}

fn json_kind(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "bool",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}
