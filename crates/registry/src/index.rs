//! Flat, validated registry of queries and mutations.
//!
//! # Invariants
//!
//! - Names are unique across queries and mutations.
//!   - Enforced in: [`Registry::new`].
//!   - Tested by: `index::tests::rejects_name_shared_by_query_and_mutation`
//!   - Failure symptom: a mutation action also fires a query's success handler.
//!
//! - Query paths are non-empty, unique, and never nested inside one another.
//!   - Enforced in: [`Registry::new`].
//!   - Tested by: `index::tests::rejects_duplicate_paths`, `index::tests::rejects_nested_paths`
//!   - Failure symptom: two queries overwrite each other's cache entries, or the inner
//!     query's subtree shows up as a bogus cache key of the outer one.
//!
//! - Iteration follows registration order.
//!   - Enforced in: [`Registry::new`] (definitions kept in input order).
//!   - Failure symptom: handler order for shared events changes between builds.

use std::sync::Arc;

use rustc_hash::FxHashMap as HashMap;

use crate::{ConfigError, MutationDef, QueryDef, Service};

/// Which table a registered name lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
	Query,
	Mutation,
}

#[derive(Debug, Clone, Copy)]
enum Slot {
	Query(usize),
	Mutation(usize),
}

/// Registered queries and mutations, in registration order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
	queries: Vec<Arc<QueryDef>>,
	mutations: Vec<Arc<MutationDef>>,
	by_name: HashMap<Box<str>, Slot>,
}

impl Registry {
	/// Validates and indexes the definitions.
	pub fn new<Q, M>(queries: Q, mutations: M) -> Result<Self, ConfigError>
	where
		Q: IntoIterator<Item = QueryDef>,
		M: IntoIterator<Item = MutationDef>,
	{
		let mut registry = Registry::default();
		let mut paths: Vec<(Vec<String>, Arc<str>)> = Vec::new();

		for def in queries {
			registry.claim_name(&def.name, &def.path, Slot::Query(registry.queries.len()))?;
			if def.path.is_empty() {
				return Err(ConfigError::EmptyPath { name: def.name.to_string() });
			}
			check_path(&paths, &def)?;
			paths.push((def.path.clone(), def.name.clone()));
			registry.queries.push(Arc::new(def));
		}

		for def in mutations {
			registry.claim_name(&def.name, &[], Slot::Mutation(registry.mutations.len()))?;
			registry.mutations.push(Arc::new(def));
		}

		tracing::debug!(
			queries = registry.queries.len(),
			mutations = registry.mutations.len(),
			"registry.built"
		);
		Ok(registry)
	}

	fn claim_name(&mut self, name: &str, path: &[String], slot: Slot) -> Result<(), ConfigError> {
		if name.is_empty() {
			return Err(ConfigError::EmptyName { path: path.to_vec() });
		}
		if self.by_name.contains_key(name) {
			return Err(ConfigError::DuplicateName { name: name.to_owned() });
		}
		self.by_name.insert(Box::from(name), slot);
		Ok(())
	}

	pub fn query(&self, name: &str) -> Option<&Arc<QueryDef>> {
		match self.by_name.get(name)? {
			Slot::Query(idx) => self.queries.get(*idx),
			Slot::Mutation(_) => None,
		}
	}

	pub fn mutation(&self, name: &str) -> Option<&Arc<MutationDef>> {
		match self.by_name.get(name)? {
			Slot::Mutation(idx) => self.mutations.get(*idx),
			Slot::Query(_) => None,
		}
	}

	/// Returns what kind of request `name` refers to, if registered.
	pub fn kind(&self, name: &str) -> Option<RequestKind> {
		self.by_name.get(name).map(|slot| match slot {
			Slot::Query(_) => RequestKind::Query,
			Slot::Mutation(_) => RequestKind::Mutation,
		})
	}

	/// Service of the query or mutation registered as `name`.
	pub fn service(&self, name: &str) -> Option<&Service> {
		match self.by_name.get(name)? {
			Slot::Query(idx) => self.queries.get(*idx).map(|def| &def.service),
			Slot::Mutation(idx) => self.mutations.get(*idx).map(|def| &def.service),
		}
	}

	pub fn queries(&self) -> &[Arc<QueryDef>] {
		&self.queries
	}

	pub fn mutations(&self) -> &[Arc<MutationDef>] {
		&self.mutations
	}

	pub fn len(&self) -> usize {
		self.by_name.len()
	}

	pub fn is_empty(&self) -> bool {
		self.by_name.is_empty()
	}
}

fn check_path(claimed: &[(Vec<String>, Arc<str>)], def: &QueryDef) -> Result<(), ConfigError> {
	for (path, existing) in claimed {
		if *path == def.path {
			return Err(ConfigError::DuplicatePath {
				path: path.clone(),
				existing: existing.to_string(),
				new: def.name.to_string(),
			});
		}
		if path.starts_with(&def.path) || def.path.starts_with(path) {
			return Err(ConfigError::NestedPath {
				existing_path: path.clone(),
				existing: existing.to_string(),
				new_path: def.path.clone(),
				new: def.name.to_string(),
			});
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use serde_json::Value;

	use super::*;
	use crate::service;

	fn noop() -> Service {
		service(|_| async { Ok::<_, anyhow::Error>(Value::Null) })
	}

	#[test]
	fn looks_up_by_kind() {
		let registry = Registry::new(
			[QueryDef::new("user", noop()), QueryDef::new("posts", noop())],
			[MutationDef::new("createUser", noop())],
		)
		.unwrap();

		assert_eq!(registry.len(), 3);
		assert!(registry.query("user").is_some());
		assert!(registry.mutation("user").is_none());
		assert!(registry.mutation("createUser").is_some());
		assert_eq!(registry.kind("createUser"), Some(RequestKind::Mutation));
		assert_eq!(registry.kind("missing"), None);
		assert!(registry.service("posts").is_some());
		assert!(registry.service("missing").is_none());

		let order: Vec<_> = registry.queries().iter().map(|def| &*def.name).collect();
		assert_eq!(order, ["user", "posts"]);
	}

	#[test]
	fn rejects_name_shared_by_query_and_mutation() {
		let err = Registry::new([QueryDef::new("user", noop())], [MutationDef::new("user", noop())]).unwrap_err();
		assert_eq!(err, ConfigError::DuplicateName { name: "user".into() });
	}

	#[test]
	fn rejects_duplicate_paths() {
		let err = Registry::new(
			[
				QueryDef::new("user", noop()).path(["people", "one"]),
				QueryDef::new("person", noop()).path(["people", "one"]),
			],
			[],
		)
		.unwrap_err();
		assert!(matches!(err, ConfigError::DuplicatePath { ref existing, ref new, .. } if existing == "user" && new == "person"));
	}

	#[test]
	fn rejects_nested_paths() {
		let err = Registry::new(
			[QueryDef::new("user", noop()), QueryDef::new("posts", noop()).path(["user", "posts"])],
			[],
		)
		.unwrap_err();
		assert_eq!(
			err,
			ConfigError::NestedPath {
				existing_path: vec!["user".into()],
				existing: "user".into(),
				new_path: vec!["user".into(), "posts".into()],
				new: "posts".into(),
			}
		);

		let err = Registry::new(
			[QueryDef::new("posts", noop()).path(["user", "posts"]), QueryDef::new("user", noop())],
			[],
		)
		.unwrap_err();
		assert!(matches!(err, ConfigError::NestedPath { ref existing, ref new, .. } if existing == "posts" && new == "user"));

		// Shared prefixes are fine as long as neither path contains the other.
		assert!(
			Registry::new(
				[
					QueryDef::new("user", noop()).path(["people", "user"]),
					QueryDef::new("users", noop()).path(["people", "users"]),
				],
				[],
			)
			.is_ok()
		);
	}

	#[test]
	fn rejects_empty_names_and_paths() {
		let err = Registry::new([QueryDef::new("", noop())], []).unwrap_err();
		assert!(matches!(err, ConfigError::EmptyName { .. }));

		let err = Registry::new([QueryDef::new("user", noop()).path(Vec::<String>::new())], []).unwrap_err();
		assert_eq!(err, ConfigError::EmptyPath { name: "user".into() });
	}
}
