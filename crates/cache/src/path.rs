//! Store addresses of a query's cache entries.
//!
//! All addresses are relative to the store root path. These functions are total: any query
//! and payload map to an address, whether or not anything lives there yet.

use quarry_primitives::{CacheKey, RequestPayload};
use quarry_registry::QueryDef;

/// Segment holding an entry's shared data.
pub const DATA: &str = "data";
/// Segment holding an entry's per-request statuses.
pub const STATUS: &str = "status";

/// Parent of every cache entry of `def`.
pub fn query_path(def: &QueryDef) -> &[String] {
	&def.path
}

/// `path ++ [cache_key, "data"]`
pub fn data_path(def: &QueryDef, cache_key: &CacheKey) -> Vec<String> {
	entry_path(def, cache_key, DATA)
}

/// `path ++ [cache_key, "status"]`
pub fn status_group_path(def: &QueryDef, cache_key: &CacheKey) -> Vec<String> {
	entry_path(def, cache_key, STATUS)
}

/// `path ++ [cache_key, "status", request_id]`
pub fn status_path(def: &QueryDef, payload: &RequestPayload) -> Vec<String> {
	let mut path = status_group_path(def, &payload.cache_key);
	path.push(payload.request_id.to_string());
	path
}

fn entry_path(def: &QueryDef, cache_key: &CacheKey, leaf: &str) -> Vec<String> {
	let mut path = Vec::with_capacity(def.path.len() + 2);
	path.extend_from_slice(&def.path);
	path.push(cache_key.to_string());
	path.push(leaf.to_owned());
	path
}

#[cfg(test)]
mod tests {
	use quarry_primitives::RequestId;
	use quarry_registry::service;
	use serde_json::Value;

	use super::*;

	#[test]
	fn addresses_nest_under_query_path() {
		let def = QueryDef::new("user", service(|_| async { Ok::<_, anyhow::Error>(Value::Null) })).path(["accounts", "user"]);
		let key = CacheKey::from_encoded("[1]");
		let payload = RequestPayload::new(key.clone(), RequestId::new("user", 2));

		assert_eq!(query_path(&def), ["accounts", "user"]);
		assert_eq!(data_path(&def, &key), ["accounts", "user", "[1]", "data"]);
		assert_eq!(status_group_path(&def, &key), ["accounts", "user", "[1]", "status"]);
		assert_eq!(status_path(&def, &payload), ["accounts", "user", "[1]", "status", "user_2"]);
	}
}
