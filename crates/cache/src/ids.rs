//! Request id allocation.
//!
//! Ids are scoped per query name. Under [`IdPolicy::Reuse`] the suffix is the number of
//! outstanding allocations for that name, so suffixes come back into use after release.
//! [`IdPolicy::Monotonic`] never hands out the same suffix twice for a name.

use std::sync::Arc;

use parking_lot::Mutex;
use quarry_primitives::RequestId;
use rustc_hash::FxHashMap as HashMap;
use serde::Deserialize;

/// How request id suffixes are chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdPolicy {
	/// `n` = outstanding allocations for the name, after counting this one.
	#[default]
	Reuse,
	/// `n` = total allocations ever made for the name.
	Monotonic,
}

#[derive(Debug, Default)]
struct Counter {
	outstanding: u64,
	issued: u64,
}

/// Per-name request id allocator. Clones share counters.
#[derive(Debug, Clone, Default)]
pub struct RequestIds {
	policy: IdPolicy,
	counters: Arc<Mutex<HashMap<Box<str>, Counter>>>,
}

impl RequestIds {
	pub fn new(policy: IdPolicy) -> Self {
		Self {
			policy,
			counters: Arc::default(),
		}
	}

	pub fn policy(&self) -> IdPolicy {
		self.policy
	}

	/// Allocates the next id for `query`.
	pub fn allocate(&self, query: &str) -> RequestId {
		let mut counters = self.counters.lock();
		let counter = counters.entry(Box::from(query)).or_default();
		counter.outstanding += 1;
		counter.issued += 1;
		let n = match self.policy {
			IdPolicy::Reuse => counter.outstanding,
			IdPolicy::Monotonic => counter.issued,
		};
		RequestId::new(query, n)
	}

	/// Releases one allocation for the id's query name.
	pub fn release(&self, id: &RequestId) {
		let mut counters = self.counters.lock();
		if let Some(counter) = counters.get_mut(id.query_name()) {
			counter.outstanding = counter.outstanding.saturating_sub(1);
		} else {
			tracing::warn!(request_id = %id, "ids.release_unknown");
		}
	}

	/// Number of ids currently allocated and not released for `query`.
	pub fn outstanding(&self, query: &str) -> u64 {
		self.counters.lock().get(query).map_or(0, |counter| counter.outstanding)
	}
}
