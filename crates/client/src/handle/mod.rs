//! RAII request handles.
//!
//! # Purpose
//!
//! A handle owns the request ids it issued under. While it lives, its status entries stay in
//! the tree and refresh events can mark them pending; dropping it cleans those entries and
//! returns the ids to the allocator.
//!
//! # Mental Model
//!
//! | Handle | Ids | Issues |
//! |--------|-----|--------|
//! | [`QueryHandle`] | one | one parameter list, again on dependency change |
//! | [`MultiQueryHandle`] | one, shared | one batch of parameter lists |
//! | [`PaginatedQuery`] | one per page | a page per [`PaginatedQuery::load_more`] |
//! | [`ListPaginatedQuery`] | one per page | first page, reset on dependency change |
//! | [`RequestHandle`] | one | whatever each [`RequestHandle::send`] is given |
//!
//! # Invariants
//!
//! - Every id a handle allocated is cleaned and released exactly once.
//!   - Enforced in: the `Drop` impls and [`PaginatedQuery::clear`] (pages are taken before
//!     they are cleaned).
//!   - Tested by: `handle::tests::drop_cleans_status_and_releases_id`,
//!     `handle::tests::paginated_clear_releases_every_page`
//!   - Failure symptom: status entries accumulate and refresh events re-mark dead requests.
//!
//! - Loading is dispatched on the issuing thread, before the spawned half runs. A handle
//!   dropped right after issuing therefore cleans an entry that already exists, and the
//!   request's late result finds nothing to revive.
//!   - Enforced in: `spawn_single`, [`MultiQueryHandle::refetch`].
//!   - Tested by: `handle::tests::drop_before_the_task_runs_leaves_no_status`
//!
//! - Data outlives the handle.
//!   - Enforced in: clean actions only touch the status group.
//!   - Tested by: `handle::tests::drop_cleans_status_and_releases_id`
//!
//! Spawning handles capture the current Tokio runtime when they are created; creating one
//! outside a runtime is refused with [`UsageError::NoRuntime`].

use std::sync::Arc;

use parking_lot::Mutex;
use quarry_cache::{Slice, path};
use quarry_primitives::{RequestId, RequestPayload, Status};
use quarry_registry::{Action, QueryDef};
use serde::Deserialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::request::{BatchRequest, QueryRequest};
use crate::{Client, UsageError};


/// Issue control for query and multi-query handles.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryOptions {
	/// A disabled handle issues nothing and never reports loading.
	pub disabled: bool,
	/// Opaque values; changing them re-issues the request.
	pub dependencies: Vec<Value>,
}

impl QueryOptions {
	pub fn disabled(mut self, disabled: bool) -> Self {
		self.disabled = disabled;
		self
	}

	pub fn dependencies(mut self, dependencies: Vec<Value>) -> Self {
		self.dependencies = dependencies;
		self
	}
}

fn spawn_single(
	client: &Client,
	runtime: &Handle,
	def: &Arc<QueryDef>,
	payload: &RequestPayload,
	params: Vec<Value>,
) -> JoinHandle<Status> {
	let request = QueryRequest::new(Arc::clone(&client.store), Arc::clone(def), payload.clone());
	request.start();
	runtime.spawn(async move { request.complete(params).await })
}

fn data_slice(def: &QueryDef, payload: &RequestPayload) -> Slice {
	Slice::new(path::data_path(def, &payload.cache_key), def.default_value.clone())
}

fn data_of(client: &Client, def: &QueryDef, payload: &RequestPayload) -> Value {
	let slice = data_slice(def, payload);
	client.select(std::slice::from_ref(&slice)).pop().unwrap_or(slice.default)
}

/// Status of `payload`, or [`Status::Loading`] when no entry exists yet.
fn status_of(client: &Client, def: &QueryDef, payload: &RequestPayload) -> Status {
	client
		.store
		.get(&path::status_path(def, payload))
		.and_then(|node| Status::from_node(&node))
		.unwrap_or(Status::Loading)
}

fn clean_action(def: &QueryDef, payload: &RequestPayload) -> Action {
	Action::Clean {
		query: Arc::clone(&def.name),
		payload: payload.clone(),
	}
}

/// Updates `slot` and reports whether it changed.
fn replace_if_changed<T: PartialEq>(slot: &mut T, next: T) -> bool {
	if *slot == next {
		return false;
	}
	*slot = next;
	true
}

/// One query invocation under one request id.
#[derive(Debug)]
pub struct QueryHandle {
	client: Client,
	def: Arc<QueryDef>,
	runtime: Handle,
	params: Vec<Value>,
	payload: RequestPayload,
	options: QueryOptions,
}

impl QueryHandle {
	pub(crate) fn new(client: Client, def: Arc<QueryDef>, runtime: Handle, params: Vec<Value>, options: QueryOptions) -> Self {
		let request_id = client.ids.allocate(&def.name);
		let payload = Client::payload(&params, request_id);
		Self {
			client,
			def,
			runtime,
			params,
			payload,
			options,
		}
	}

	pub fn request_id(&self) -> &RequestId {
		&self.payload.request_id
	}

	pub fn payload(&self) -> &RequestPayload {
		&self.payload
	}

	pub fn params(&self) -> &[Value] {
		&self.params
	}

	pub fn options(&self) -> &QueryOptions {
		&self.options
	}

	/// Re-issues the request under the same id, disabled or not.
	pub fn refetch(&self) -> JoinHandle<Status> {
		spawn_single(&self.client, &self.runtime, &self.def, &self.payload, self.params.clone())
	}

	pub(crate) fn issue(&self) -> Option<JoinHandle<Status>> {
		(!self.options.disabled).then(|| self.refetch())
	}

	/// Enables or disables the handle. Enabling issues the request.
	pub fn set_disabled(&mut self, disabled: bool) -> Option<JoinHandle<Status>> {
		replace_if_changed(&mut self.options.disabled, disabled)
			.then(|| self.issue())
			.flatten()
	}

	/// Re-issues the request when `dependencies` differ from the last ones seen.
	pub fn set_dependencies(&mut self, dependencies: Vec<Value>) -> Option<JoinHandle<Status>> {
		replace_if_changed(&mut self.options.dependencies, dependencies)
			.then(|| self.issue())
			.flatten()
	}

	/// Cached data for this handle's parameters, or the query default.
	pub fn data(&self) -> Value {
		data_of(&self.client, &self.def, &self.payload)
	}

	pub fn status(&self) -> Status {
		status_of(&self.client, &self.def, &self.payload)
	}

	pub fn is_loading(&self) -> bool {
		!self.options.disabled && self.status() == Status::Loading
	}

	pub fn is_error(&self) -> bool {
		self.status() == Status::Error
	}

	/// Re-issues the request if a refresh event marked it pending.
	pub fn refresh_if_pending(&self) -> Option<JoinHandle<Status>> {
		(self.status() == Status::PendingRefresh).then(|| self.refetch())
	}
}

impl Drop for QueryHandle {
	fn drop(&mut self) {
		self.client.dispatch(clean_action(&self.def, &self.payload));
		self.client.ids.release(&self.payload.request_id);
	}
}

/// One request id spread over several parameter sets of the same query.
#[derive(Debug)]
pub struct MultiQueryHandle {
	client: Client,
	def: Arc<QueryDef>,
	runtime: Handle,
	request_id: RequestId,
	multi_params: Vec<Vec<Value>>,
	payloads: Vec<RequestPayload>,
	options: QueryOptions,
}

impl MultiQueryHandle {
	pub(crate) fn new(
		client: Client,
		def: Arc<QueryDef>,
		runtime: Handle,
		multi_params: Vec<Vec<Value>>,
		options: QueryOptions,
	) -> Self {
		let request_id = client.ids.allocate(&def.name);
		let payloads = multi_params
			.iter()
			.map(|params| Client::payload(params, request_id.clone()))
			.collect();
		Self {
			client,
			def,
			runtime,
			request_id,
			multi_params,
			payloads,
			options,
		}
	}

	pub fn request_id(&self) -> &RequestId {
		&self.request_id
	}

	pub fn payloads(&self) -> &[RequestPayload] {
		&self.payloads
	}

	pub fn options(&self) -> &QueryOptions {
		&self.options
	}

	/// Re-issues every entry as one batch.
	pub fn refetch(&self) -> JoinHandle<Result<Vec<Status>, UsageError>> {
		let batch = BatchRequest::new(Arc::clone(&self.client.store), Arc::clone(&self.def), self.payloads.clone());
		let multi_params = self.multi_params.clone();
		let started = batch.start(multi_params.len());
		self.runtime.spawn(async move {
			match started {
				Ok(()) => Ok(batch.complete(multi_params).await),
				Err(error) => Err(error),
			}
		})
	}

	pub(crate) fn issue(&self) -> Option<JoinHandle<Result<Vec<Status>, UsageError>>> {
		(!self.options.disabled && !self.payloads.is_empty()).then(|| self.refetch())
	}

	/// Enables or disables the handle. Enabling issues the batch.
	pub fn set_disabled(&mut self, disabled: bool) -> Option<JoinHandle<Result<Vec<Status>, UsageError>>> {
		replace_if_changed(&mut self.options.disabled, disabled)
			.then(|| self.issue())
			.flatten()
	}

	/// Re-issues the batch when `dependencies` differ from the last ones seen.
	pub fn set_dependencies(&mut self, dependencies: Vec<Value>) -> Option<JoinHandle<Result<Vec<Status>, UsageError>>> {
		replace_if_changed(&mut self.options.dependencies, dependencies)
			.then(|| self.issue())
			.flatten()
	}

	/// Data per parameter set, in input order.
	pub fn data(&self) -> Vec<Value> {
		let slices: Vec<Slice> = self.payloads.iter().map(|payload| data_slice(&self.def, payload)).collect();
		self.client.select(&slices)
	}

	pub fn statuses(&self) -> Vec<Status> {
		self.payloads
			.iter()
			.map(|payload| status_of(&self.client, &self.def, payload))
			.collect()
	}

	pub fn is_loading(&self) -> bool {
		!self.options.disabled && self.statuses().contains(&Status::Loading)
	}

	pub fn is_error(&self) -> bool {
		self.statuses().contains(&Status::Error)
	}

	/// Re-issues the first entry a refresh event marked pending.
	pub fn refresh_if_pending(&self) -> Option<JoinHandle<Status>> {
		let idx = self
			.payloads
			.iter()
			.position(|payload| status_of(&self.client, &self.def, payload) == Status::PendingRefresh)?;
		let params = self.multi_params.get(idx)?.clone();
		Some(spawn_single(&self.client, &self.runtime, &self.def, &self.payloads[idx], params))
	}
}

impl Drop for MultiQueryHandle {
	fn drop(&mut self) {
		if !self.payloads.is_empty() {
			let cleans = self.payloads.iter().map(|payload| clean_action(&self.def, payload)).collect();
			self.client.dispatch(Action::Batch(cleans));
		}
		self.client.ids.release(&self.request_id);
	}
}

#[derive(Debug, Clone)]
struct Page {
	params: Vec<Value>,
	payload: RequestPayload,
}

/// A growing list of pages of one query, each page under its own request id.
#[derive(Debug)]
pub struct PaginatedQuery {
	client: Client,
	def: Arc<QueryDef>,
	runtime: Handle,
	pages: Mutex<Vec<Page>>,
}

impl PaginatedQuery {
	pub(crate) fn new(client: Client, def: Arc<QueryDef>, runtime: Handle) -> Self {
		Self {
			client,
			def,
			runtime,
			pages: Mutex::new(Vec::new()),
		}
	}

	/// Allocates an id for the next page and issues it.
	pub fn load_more(&self, params: Vec<Value>) -> JoinHandle<Status> {
		let request_id = self.client.ids.allocate(&self.def.name);
		let page = Page {
			payload: Client::payload(&params, request_id),
			params,
		};
		let task = spawn_single(&self.client, &self.runtime, &self.def, &page.payload, page.params.clone());
		self.pages.lock().push(page);
		task
	}

	/// Data of every page, in load order.
	pub fn data(&self) -> Vec<Value> {
		let slices: Vec<Slice> = self
			.pages
			.lock()
			.iter()
			.map(|page| data_slice(&self.def, &page.payload))
			.collect();
		self.client.select(&slices)
	}

	/// Parameters of every page, in load order.
	pub fn sent_params(&self) -> Vec<Vec<Value>> {
		self.pages.lock().iter().map(|page| page.params.clone()).collect()
	}

	pub fn statuses(&self) -> Vec<Status> {
		let pages = self.pages.lock().clone();
		pages
			.iter()
			.map(|page| status_of(&self.client, &self.def, &page.payload))
			.collect()
	}

	pub fn is_loading(&self) -> bool {
		self.statuses().contains(&Status::Loading)
	}

	pub fn is_error(&self) -> bool {
		self.statuses().contains(&Status::Error)
	}

	pub fn len(&self) -> usize {
		self.pages.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.pages.lock().is_empty()
	}

	/// Re-issues every page a refresh event marked pending.
	pub fn refresh_if_pending(&self) -> Vec<JoinHandle<Status>> {
		let pages = self.pages.lock().clone();
		pages
			.iter()
			.filter(|page| status_of(&self.client, &self.def, &page.payload) == Status::PendingRefresh)
			.map(|page| spawn_single(&self.client, &self.runtime, &self.def, &page.payload, page.params.clone()))
			.collect()
	}

	/// Cleans and releases every page in one batch.
	pub fn clear(&self) {
		let pages = std::mem::take(&mut *self.pages.lock());
		if pages.is_empty() {
			return;
		}
		let cleans = pages.iter().map(|page| clean_action(&self.def, &page.payload)).collect();
		self.client.dispatch(Action::Batch(cleans));
		for page in &pages {
			self.client.ids.release(&page.payload.request_id);
		}
	}
}

impl Drop for PaginatedQuery {
	fn drop(&mut self) {
		self.clear();
	}
}

/// A [`PaginatedQuery`] read as one flat list, starting from a fixed first page.
///
/// Page data that is a list contributes its items, anything else contributes itself. When the
/// dependencies change, every page is dropped and the first page is loaded again.
#[derive(Debug)]
pub struct ListPaginatedQuery {
	pages: PaginatedQuery,
	first: Vec<Value>,
	options: QueryOptions,
}

impl ListPaginatedQuery {
	pub(crate) fn new(pages: PaginatedQuery, first: Vec<Value>, options: QueryOptions) -> Self {
		Self { pages, first, options }
	}

	pub(crate) fn reset(&self) -> Option<JoinHandle<Status>> {
		self.pages.clear();
		(!self.options.disabled).then(|| self.pages.load_more(self.first.clone()))
	}

	pub fn load_more(&self, params: Vec<Value>) -> JoinHandle<Status> {
		self.pages.load_more(params)
	}

	/// Re-runs from the first page when `dependencies` differ from the last ones seen.
	pub fn set_dependencies(&mut self, dependencies: Vec<Value>) -> Option<JoinHandle<Status>> {
		replace_if_changed(&mut self.options.dependencies, dependencies)
			.then(|| self.reset())
			.flatten()
	}

	/// Enables or disables the list. Either way the loaded pages are dropped.
	pub fn set_disabled(&mut self, disabled: bool) -> Option<JoinHandle<Status>> {
		replace_if_changed(&mut self.options.disabled, disabled)
			.then(|| self.reset())
			.flatten()
	}

	pub fn data(&self) -> Vec<Value> {
		let mut items = Vec::new();
		for page in self.pages.data() {
			match page {
				Value::Array(list) => items.extend(list),
				other => items.push(other),
			}
		}
		items
	}

	pub fn is_loading(&self) -> bool {
		self.pages.is_loading()
	}

	pub fn is_error(&self) -> bool {
		self.pages.is_error()
	}

	pub fn refresh_if_pending(&self) -> Vec<JoinHandle<Status>> {
		self.pages.refresh_if_pending()
	}

	/// The underlying pages.
	pub fn pages(&self) -> &PaginatedQuery {
		&self.pages
	}
}

/// A reusable issuer of one query, bound to one request id.
///
/// Each [`send`](Self::send) encodes its own cache key. When that key differs from the
/// previous call's, the previous entry's status is cleaned first, so the handle holds at most
/// one status entry at a time.
#[derive(Debug)]
pub struct RequestHandle {
	client: Client,
	def: Arc<QueryDef>,
	request_id: RequestId,
	current: Mutex<Option<RequestPayload>>,
}

impl RequestHandle {
	pub(crate) fn new(client: Client, def: Arc<QueryDef>) -> Self {
		let request_id = client.ids.allocate(&def.name);
		Self {
			client,
			def,
			request_id,
			current: Mutex::new(None),
		}
	}

	pub fn request_id(&self) -> &RequestId {
		&self.request_id
	}

	/// Payload of the latest call, if any.
	pub fn payload(&self) -> Option<RequestPayload> {
		self.current.lock().clone()
	}

	/// Issues the query for `params` under this handle's id.
	pub async fn send(&self, params: Vec<Value>) -> Status {
		let payload = Client::payload(&params, self.request_id.clone());
		let previous = self.current.lock().replace(payload.clone());
		if let Some(previous) = previous.filter(|previous| previous.cache_key != payload.cache_key) {
			self.client.dispatch(clean_action(&self.def, &previous));
		}
		QueryRequest::new(Arc::clone(&self.client.store), Arc::clone(&self.def), payload)
			.send(params)
			.await
	}

	/// Data for the latest call's parameters, or the query default.
	pub fn data(&self) -> Value {
		match self.payload() {
			Some(payload) => data_of(&self.client, &self.def, &payload),
			None => self.def.default_value.clone(),
		}
	}

	/// Status of the latest call; `None` before the first.
	pub fn status(&self) -> Option<Status> {
		self.payload().map(|payload| status_of(&self.client, &self.def, &payload))
	}
}

impl Drop for RequestHandle {
	fn drop(&mut self) {
		if let Some(payload) = self.current.get_mut().take() {
			self.client.dispatch(clean_action(&self.def, &payload));
		}
		self.client.ids.release(&self.request_id);
	}
}
