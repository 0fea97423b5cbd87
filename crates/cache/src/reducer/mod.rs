//! Root reducer built from the query registry.
//!
//! # Purpose
//!
//! [`RootReducer`] is the only code that produces new store trees. It is built once from the
//! registered queries and is a pure function of `(tree, action)`.
//!
//! # Mental Model
//!
//! Each query contributes a fixed list of handlers, each bound to one event name:
//!
//! | Kind | Event | Effect |
//! |------|-------|--------|
//! | success | `<query>` | live status `DONE`, then data written |
//! | loading | `<query>.loading` | status `LOADING` |
//! | error | `<query>.error` | live status `ERROR` |
//! | clean | `<query>.clean` | status entry removed, data kept |
//! | refresh | each `refresh` / `refresh_if` event | matching statuses `PENDING_REFRESH` |
//! | subscribe | each `subscribe` event | data of every entry patched |
//!
//! Handlers are grouped by event name in query registration order, then kind order. An action
//! folds the tree through every handler of its event; a [`Action::Batch`] folds the reducer over
//! its sub-actions, so the whole envelope is one transition.
//!
//! # Invariants
//!
//! - Unknown events leave the tree untouched (same allocation).
//!   - Enforced in: [`RootReducer::reduce`].
//!   - Tested by: `reducer::tests::unknown_event_passes_through`
//!
//! - Results only overwrite status entries that exist. A request cleaned while in flight
//!   still delivers its data, but its status stays gone.
//!   - Enforced in: `settle`.
//!   - Tested by: `reducer::tests::late_result_after_clean_writes_data_only`
//!   - Failure symptom: dropped handles leave `DONE` entries behind that refresh events keep
//!     marking, and a reused request id starts out pending.
//!
//! - Clean is idempotent.
//!   - Enforced in: the clean handler (no-op when the status leaf is absent).
//!   - Tested by: `reducer::tests::clean_twice_is_a_noop`
//!
//! - A batch equals its sub-actions applied in order.
//!   - Enforced in: [`RootReducer::reduce`].
//!   - Tested by: `reducer::tests::batch_matches_sequential_application`
//!
//! - Subscribe handlers never touch statuses.
//!   - Enforced in: the subscribe handler (writes only data addresses).
//!   - Tested by: `reducer::tests::subscribe_patches_data_only`

use std::sync::Arc;

use quarry_primitives::{CacheKey, Node, RequestPayload, Status};
use quarry_registry::{Action, QueryDef, RefreshPredicate, Registry, SubscribePatch, clean_event, error_event, loading_event, success_event};
use rustc_hash::FxHashMap as HashMap;
use serde_json::Value;

use crate::{codec, path};


enum HandlerKind {
	Success,
	Loading,
	Error,
	Clean,
	Refresh(Option<RefreshPredicate>),
	Subscribe(SubscribePatch),
}

impl HandlerKind {
	const fn as_str(&self) -> &'static str {
		match self {
			Self::Success => "success",
			Self::Loading => "loading",
			Self::Error => "error",
			Self::Clean => "clean",
			Self::Refresh(_) => "refresh",
			Self::Subscribe(_) => "subscribe",
		}
	}
}

struct Handler {
	query: Arc<QueryDef>,
	kind: HandlerKind,
}

impl Handler {
	fn apply(&self, state: Node, action: &Action) -> Node {
		let def = &*self.query;
		match (&self.kind, action) {
			(HandlerKind::Success, Action::Success { payload, data, .. }) => {
				settle(def, state, payload, Status::Done)
					.set_in(&path::data_path(def, &payload.cache_key), Node::leaf(data.clone()))
			}
			(HandlerKind::Loading, Action::Loading { payload, .. }) => {
				state.set_in(&path::status_path(def, payload), Status::Loading.into())
			}
			(HandlerKind::Error, Action::Error { payload, .. }) => settle(def, state, payload, Status::Error),
			(HandlerKind::Clean, Action::Clean { payload, .. }) => clean(def, state, payload),
			(HandlerKind::Refresh(predicate), _) => refresh(def, predicate.as_ref(), state, action),
			(HandlerKind::Subscribe(patch), _) => subscribe(def, patch, state, action),
			(kind, _) => {
				tracing::warn!(
					query = %def.name,
					handler = kind.as_str(),
					event = %action.event_type(),
					"reducer.mistyped_action"
				);
				state
			}
		}
	}
}

/// Writes a terminal status, but only over a live entry: a result landing after its request
/// was cleaned must not bring the entry back.
fn settle(def: &QueryDef, state: Node, payload: &RequestPayload, status: Status) -> Node {
	let leaf = path::status_path(def, payload);
	if state.get(&leaf).is_none() {
		tracing::trace!(query = %def.name, request_id = %payload.request_id, "reducer.late_result");
		return state;
	}
	state.set_in(&leaf, status.into())
}

fn clean(def: &QueryDef, state: Node, payload: &RequestPayload) -> Node {
	let leaf = path::status_path(def, payload);
	if state.get(&leaf).is_none() {
		return state;
	}
	state.remove_in(&leaf)
}

fn refresh(def: &QueryDef, predicate: Option<&RefreshPredicate>, state: Node, action: &Action) -> Node {
	let mut pending = Vec::new();
	if let Some(entries) = state.get(path::query_path(def)).and_then(Node::as_branch) {
		for (key, entry) in entries {
			let Some(statuses) = entry.get(&[path::STATUS]).and_then(Node::as_branch) else {
				continue;
			};
			if statuses.is_empty() {
				continue;
			}
			let Some(params) = decode_entry_key(def, key) else {
				continue;
			};
			let data = entry.get(&[path::DATA]).and_then(Node::as_leaf);
			let cache_key = CacheKey::from_encoded(key.as_str());
			for request_id in statuses.keys() {
				if predicate.is_none_or(|holds| holds(data, action, params.as_slice())) {
					let mut target = path::status_group_path(def, &cache_key);
					target.push(request_id.clone());
					pending.push(target);
				}
			}
		}
	}
	pending
		.into_iter()
		.fold(state, |state, target| state.set_in(&target, Status::PendingRefresh.into()))
}

fn subscribe(def: &QueryDef, patch: &SubscribePatch, state: Node, action: &Action) -> Node {
	let keys: Vec<String> = state
		.get(path::query_path(def))
		.and_then(Node::as_branch)
		.map(|entries| entries.keys().cloned().collect())
		.unwrap_or_default();

	keys.into_iter().fold(state, |state, key| {
		let Some(params) = decode_entry_key(def, &key) else {
			return state;
		};
		let data_path = path::data_path(def, &CacheKey::from_encoded(key));
		let current = state
			.get(&data_path)
			.and_then(Node::as_leaf)
			.cloned()
			.unwrap_or_else(|| def.default_value.clone());
		let next: Value = patch(current, action, params.as_slice());
		state.set_in(&data_path, Node::leaf(next))
	})
}

fn decode_entry_key(def: &QueryDef, key: &str) -> Option<Vec<Value>> {
	match codec::decode(key) {
		Ok(params) => Some(params),
		Err(error) => {
			tracing::warn!(query = %def.name, %error, "reducer.skip_entry");
			None
		}
	}
}

/// Pure state-transition function over the store tree.
#[derive(Default)]
pub struct RootReducer {
	handlers: HashMap<Box<str>, Vec<Handler>>,
}

impl std::fmt::Debug for RootReducer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let mut events: Vec<_> = self.handlers.iter().map(|(event, list)| (&**event, list.len())).collect();
		events.sort_unstable();
		f.debug_struct("RootReducer").field("events", &events).finish()
	}
}

impl RootReducer {
	/// Builds the handler table for `queries`, in iteration order.
	pub fn build<'a, I>(queries: I) -> Self
	where
		I: IntoIterator<Item = &'a Arc<QueryDef>>,
	{
		let mut reducer = RootReducer::default();
		for query in queries {
			reducer.register(query);
		}
		tracing::debug!(events = reducer.handlers.len(), "reducer.built");
		reducer
	}

	/// Builds the handler table for every query in `registry`.
	pub fn from_registry(registry: &Registry) -> Self {
		Self::build(registry.queries())
	}

	fn register(&mut self, query: &Arc<QueryDef>) {
		let name = &*query.name;
		self.push(success_event(name), query, HandlerKind::Success);
		self.push(loading_event(name), query, HandlerKind::Loading);
		self.push(error_event(name), query, HandlerKind::Error);
		self.push(clean_event(name), query, HandlerKind::Clean);
		for (event, predicate) in query.refresh_rules() {
			self.push(event.to_owned(), query, HandlerKind::Refresh(predicate.cloned()));
		}
		for (event, patch) in &query.subscribe {
			self.push(event.clone(), query, HandlerKind::Subscribe(patch.clone()));
		}
	}

	fn push(&mut self, event: String, query: &Arc<QueryDef>, kind: HandlerKind) {
		self.handlers.entry(event.into_boxed_str()).or_default().push(Handler {
			query: Arc::clone(query),
			kind,
		});
	}

	/// Applies `action` to `state`.
	pub fn reduce(&self, state: Node, action: &Action) -> Node {
		if let Action::Batch(actions) = action {
			return actions.iter().fold(state, |state, action| self.reduce(state, action));
		}
		let event = action.event_type();
		let Some(handlers) = self.handlers.get(event.as_ref()) else {
			return state;
		};
		handlers.iter().fold(state, |state, handler| handler.apply(state, action))
	}

	/// Number of handlers bound to `event`.
	pub fn handler_count(&self, event: &str) -> usize {
		self.handlers.get(event).map_or(0, Vec::len)
	}
}
