//! Store actions and their event names.
//!
//! Every cache-affecting update is one [`Action`]. The reducer routes actions by their event
//! type string ([`Action::event_type`]), which is what refresh and subscribe rules name.

use std::borrow::Cow;
use std::sync::Arc;

use quarry_primitives::RequestPayload;
use serde_json::Value;

/// Event type of a [`Action::Batch`] envelope.
pub const BATCH_EVENT: &str = "$$BATCH";

const LOADING_SUFFIX: &str = ".loading";
const ERROR_SUFFIX: &str = ".error";
const CLEAN_SUFFIX: &str = ".clean";

/// Event name of a query's success action (the query name itself).
pub fn success_event(query: &str) -> String {
	query.to_owned()
}

pub fn loading_event(query: &str) -> String {
	format!("{query}{LOADING_SUFFIX}")
}

pub fn error_event(query: &str) -> String {
	format!("{query}{ERROR_SUFFIX}")
}

pub fn clean_event(query: &str) -> String {
	format!("{query}{CLEAN_SUFFIX}")
}

/// One store update.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
	/// A query invocation was issued.
	Loading { query: Arc<str>, payload: RequestPayload },
	/// A query service resolved with `data`.
	Success {
		query: Arc<str>,
		payload: RequestPayload,
		data: Value,
	},
	/// A query service rejected.
	Error { query: Arc<str>, payload: RequestPayload },
	/// The owner of a request id released it.
	Clean { query: Arc<str>, payload: RequestPayload },
	/// A mutation service resolved.
	Mutation {
		name: Arc<str>,
		data: Value,
		params: Vec<Value>,
	},
	/// Any other application event, e.g. a push notification feeding subscribe rules.
	Event { kind: Arc<str>, data: Value },
	/// Sub-actions applied in order as one store transition.
	Batch(Vec<Action>),
}

impl Action {
	/// Builds an application event.
	pub fn event(kind: impl Into<Arc<str>>, data: Value) -> Self {
		Action::Event { kind: kind.into(), data }
	}

	/// The event name the reducer routes this action by.
	pub fn event_type(&self) -> Cow<'_, str> {
		match self {
			Action::Success { query, .. } => Cow::Borrowed(query),
			Action::Loading { query, .. } => Cow::Owned(loading_event(query)),
			Action::Error { query, .. } => Cow::Owned(error_event(query)),
			Action::Clean { query, .. } => Cow::Owned(clean_event(query)),
			Action::Mutation { name, .. } => Cow::Borrowed(name),
			Action::Event { kind, .. } => Cow::Borrowed(kind),
			Action::Batch(_) => Cow::Borrowed(BATCH_EVENT),
		}
	}

	/// The data carried by success, mutation and application events.
	pub fn data(&self) -> Option<&Value> {
		match self {
			Action::Success { data, .. } | Action::Mutation { data, .. } | Action::Event { data, .. } => Some(data),
			_ => None,
		}
	}

	/// The request target of query lifecycle actions.
	pub fn payload(&self) -> Option<&RequestPayload> {
		match self {
			Action::Loading { payload, .. }
			| Action::Success { payload, .. }
			| Action::Error { payload, .. }
			| Action::Clean { payload, .. } => Some(payload),
			_ => None,
		}
	}

	/// The parameters a mutation was invoked with.
	pub fn params(&self) -> Option<&[Value]> {
		match self {
			Action::Mutation { params, .. } => Some(params),
			_ => None,
		}
	}
}
