//! Request orchestration.
//!
//! # Purpose
//!
//! Sequences the store dispatches around one service call (or one batch of calls). These
//! types are the only emitters of query lifecycle actions.
//!
//! # Invariants
//!
//! - Loading is dispatched before the service is called, the result after it settles.
//!   - Enforced in: [`QueryRequest::send`], [`BatchRequest::send`]. Handles call the two
//!     halves separately so loading lands while the handle is still alive.
//!   - Tested by: `request::tests::single_request_dispatches_loading_then_result`
//!
//! - A batch produces exactly two store transitions, the second only after every service has
//!   settled.
//!   - Enforced in: [`BatchRequest::send`] (all-settled join).
//!   - Tested by: `request::tests::batch_dispatches_two_envelopes`
//!
//! - A failed mutation dispatches nothing.
//!   - Enforced in: [`MutationRequest::send`].
//!   - Tested by: `request::tests::failed_mutation_is_returned_without_dispatch`

use std::sync::Arc;

use quarry_cache::Store;
use quarry_primitives::{RequestPayload, Status};
use quarry_registry::{Action, MutationDef, QueryDef};
use serde_json::Value;

use crate::UsageError;

/// Turns a settled service call into its result action.
fn settle(def: &QueryDef, payload: &RequestPayload, outcome: anyhow::Result<Value>) -> (Action, Status) {
	let query = Arc::clone(&def.name);
	let payload = payload.clone();
	match outcome {
		Ok(data) => (Action::Success { query, payload, data }, Status::Done),
		Err(error) => {
			tracing::debug!(
				query = %def.name,
				request_id = %payload.request_id,
				%error,
				"request.failed"
			);
			(Action::Error { query, payload }, Status::Error)
		}
	}
}

/// One query invocation under one request id and cache key.
#[derive(Debug, Clone)]
pub struct QueryRequest {
	store: Arc<Store>,
	def: Arc<QueryDef>,
	payload: RequestPayload,
}

impl QueryRequest {
	pub fn new(store: Arc<Store>, def: Arc<QueryDef>, payload: RequestPayload) -> Self {
		Self { store, def, payload }
	}

	pub fn payload(&self) -> &RequestPayload {
		&self.payload
	}

	/// Issues the request and returns the terminal status it wrote.
	///
	/// Service errors are logged and recorded as [`Status::Error`], never returned.
	pub async fn send(&self, params: Vec<Value>) -> Status {
		self.start();
		self.complete(params).await
	}

	pub(crate) fn start(&self) {
		self.store.dispatch(Action::Loading {
			query: Arc::clone(&self.def.name),
			payload: self.payload.clone(),
		});
	}

	pub(crate) async fn complete(&self, params: Vec<Value>) -> Status {
		let outcome = (self.def.service)(params).await;
		let (action, status) = settle(&self.def, &self.payload, outcome);
		self.store.dispatch(action);
		status
	}
}

/// Several invocations of one query, issued and settled as two batched dispatches.
#[derive(Debug, Clone)]
pub struct BatchRequest {
	store: Arc<Store>,
	def: Arc<QueryDef>,
	payloads: Vec<RequestPayload>,
}

impl BatchRequest {
	pub fn new(store: Arc<Store>, def: Arc<QueryDef>, payloads: Vec<RequestPayload>) -> Self {
		Self { store, def, payloads }
	}

	pub fn payloads(&self) -> &[RequestPayload] {
		&self.payloads
	}

	/// Issues one request per payload, `multi_params[i]` feeding `payloads[i]`.
	///
	/// Returns the terminal statuses in input order. The services run concurrently on the
	/// calling task; the result batch is dispatched once all of them have settled.
	pub async fn send(&self, multi_params: Vec<Vec<Value>>) -> Result<Vec<Status>, UsageError> {
		self.start(multi_params.len())?;
		Ok(self.complete(multi_params).await)
	}

	/// Checks arity and dispatches the loading batch.
	pub(crate) fn start(&self, sets: usize) -> Result<(), UsageError> {
		if sets != self.payloads.len() {
			return Err(UsageError::BatchArity {
				query: self.def.name.to_string(),
				requests: self.payloads.len(),
				params: sets,
			}
			.logged());
		}
		if self.payloads.is_empty() {
			return Ok(());
		}

		let loading = self
			.payloads
			.iter()
			.map(|payload| Action::Loading {
				query: Arc::clone(&self.def.name),
				payload: payload.clone(),
			})
			.collect();
		self.store.dispatch(Action::Batch(loading));
		Ok(())
	}

	pub(crate) async fn complete(&self, multi_params: Vec<Vec<Value>>) -> Vec<Status> {
		if self.payloads.is_empty() {
			return Vec::new();
		}
		let outcomes = futures::future::join_all(multi_params.into_iter().map(|params| (self.def.service)(params))).await;

		let (results, statuses): (Vec<Action>, Vec<Status>) = self
			.payloads
			.iter()
			.zip(outcomes)
			.map(|(payload, outcome)| settle(&self.def, payload, outcome))
			.unzip();
		tracing::trace!(query = %self.def.name, batch = results.len(), "request.batch_settled");
		self.store.dispatch(Action::Batch(results));
		statuses
	}
}

/// One mutation invocation.
#[derive(Debug, Clone)]
pub struct MutationRequest {
	store: Arc<Store>,
	def: Arc<MutationDef>,
}

impl MutationRequest {
	pub fn new(store: Arc<Store>, def: Arc<MutationDef>) -> Self {
		Self { store, def }
	}

	/// Calls the service and, on success, dispatches the mutation action and returns its data.
	///
	/// A service error is returned unchanged.
	pub async fn send(&self, params: Vec<Value>) -> anyhow::Result<Value> {
		let data = (self.def.service)(params.clone()).await?;
		self.store.dispatch(Action::Mutation {
			name: Arc::clone(&self.def.name),
			data: data.clone(),
			params,
		});
		Ok(data)
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use quarry_cache::{RootReducer, encode};
	use quarry_primitives::RequestId;
	use quarry_registry::service;
	use serde_json::json;
	use tokio::sync::broadcast::error::TryRecvError;

	use super::*;

	fn user_def() -> Arc<QueryDef> {
		Arc::new(QueryDef::new(
			"user",
			service(|params| async move {
				match params.first() {
					Some(Value::Number(n)) if n.as_i64() == Some(2) => Err(anyhow::anyhow!("user 2 is gone")),
					Some(id) => Ok(json!({ "id": id })),
					None => Ok(Value::Null),
				}
			}),
		))
	}

	fn store_for(def: &Arc<QueryDef>) -> Arc<Store> {
		Arc::new(Store::new(RootReducer::build([def])))
	}

	fn payload(params: &[Value], n: u64) -> RequestPayload {
		RequestPayload::new(encode(params), RequestId::new("user", n))
	}

	#[tokio::test]
	async fn single_request_dispatches_loading_then_result() {
		let def = user_def();
		let store = store_for(&def);
		let mut actions = store.subscribe_actions();

		let status = QueryRequest::new(Arc::clone(&store), def, payload(&[json!(1)], 1))
			.send(vec![json!(1)])
			.await;
		assert_eq!(status, Status::Done);

		assert!(matches!(actions.try_recv(), Ok(Action::Loading { .. })));
		assert!(matches!(actions.try_recv(), Ok(Action::Success { .. })));
		assert_eq!(actions.try_recv(), Err(TryRecvError::Empty));
		assert_eq!(store.state().get_value(&["user", "[1]", "data"]), Some(json!({ "id": 1 })));
	}

	#[tokio::test]
	async fn failed_request_records_error_status() {
		let def = user_def();
		let store = store_for(&def);

		let status = QueryRequest::new(Arc::clone(&store), def, payload(&[json!(2)], 1))
			.send(vec![json!(2)])
			.await;
		assert_eq!(status, Status::Error);
		assert_eq!(store.state().get_value(&["user", "[2]", "status", "user_1"]), Some(json!("ERROR")));
		assert_eq!(store.state().get_value(&["user", "[2]", "data"]), None);
	}

	#[tokio::test]
	async fn batch_dispatches_two_envelopes() {
		let def = user_def();
		let store = store_for(&def);
		let mut actions = store.subscribe_actions();

		let batch = BatchRequest::new(
			Arc::clone(&store),
			def,
			vec![payload(&[json!(1)], 1), payload(&[json!(2)], 1)],
		);
		let statuses = batch.send(vec![vec![json!(1)], vec![json!(2)]]).await.unwrap();
		assert_eq!(statuses, [Status::Done, Status::Error]);

		let Ok(Action::Batch(loading)) = actions.try_recv() else {
			panic!("expected a loading batch");
		};
		assert_eq!(loading.len(), 2);
		assert!(loading.iter().all(|action| matches!(action, Action::Loading { .. })));

		let Ok(Action::Batch(results)) = actions.try_recv() else {
			panic!("expected a result batch");
		};
		assert!(matches!(results.as_slice(), [Action::Success { .. }, Action::Error { .. }]));
		assert_eq!(actions.try_recv(), Err(TryRecvError::Empty));
	}

	#[tokio::test]
	async fn batch_arity_mismatch_is_refused() {
		let def = user_def();
		let store = store_for(&def);
		let before = store.state();

		let batch = BatchRequest::new(Arc::clone(&store), def, vec![payload(&[json!(1)], 1)]);
		let err = batch.send(vec![]).await.unwrap_err();
		assert_eq!(
			err,
			UsageError::BatchArity {
				query: "user".into(),
				requests: 1,
				params: 0,
			}
		);
		assert!(Arc::ptr_eq(&before, &store.state()));
	}

	#[tokio::test]
	async fn empty_batch_dispatches_nothing() {
		let def = user_def();
		let store = store_for(&def);
		let mut actions = store.subscribe_actions();

		let statuses = BatchRequest::new(Arc::clone(&store), def, Vec::new()).send(Vec::new()).await.unwrap();
		assert!(statuses.is_empty());
		assert_eq!(actions.try_recv(), Err(TryRecvError::Empty));
	}

	#[tokio::test]
	async fn mutation_dispatches_its_result() {
		let def = user_def();
		let store = store_for(&def);
		let mut actions = store.subscribe_actions();
		let create = Arc::new(MutationDef::new(
			"createUser",
			service(|params| async move { Ok::<_, anyhow::Error>(json!({ "name": params[0] })) }),
		));

		let data = MutationRequest::new(Arc::clone(&store), create).send(vec![json!("ann")]).await.unwrap();
		assert_eq!(data, json!({ "name": "ann" }));
		assert_eq!(
			actions.try_recv().unwrap(),
			Action::Mutation {
				name: "createUser".into(),
				data,
				params: vec![json!("ann")],
			}
		);
	}

	#[tokio::test]
	async fn failed_mutation_is_returned_without_dispatch() {
		let def = user_def();
		let store = store_for(&def);
		let mut actions = store.subscribe_actions();
		let failing = Arc::new(MutationDef::new(
			"deleteUser",
			service(|_| async { Err::<Value, _>(anyhow::anyhow!("forbidden")) }),
		));

		let err = MutationRequest::new(Arc::clone(&store), failing).send(vec![json!(1)]).await.unwrap_err();
		assert_eq!(err.to_string(), "forbidden");
		assert_eq!(actions.try_recv(), Err(TryRecvError::Empty));
	}
}
