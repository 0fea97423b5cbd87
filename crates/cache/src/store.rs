//! Snapshot store.
//!
//! # Purpose
//!
//! Owns the current tree and serializes dispatches through the [`RootReducer`]. Each
//! dispatch publishes one new root; readers and watchers never observe an intermediate tree.
//!
//! # Mental Model
//!
//! The cache lives under `root` inside the published tree. A dispatch reduces only that
//! subtree, splices it back, and swaps the whole root in with [`ArcSwap::store`]. Watchers
//! receive the new root through a [`watch`] channel and compare only the slices they selected.
//! Every dispatched action is also rebroadcast after publication, for observers that react to
//! events rather than state.
//!
//! # Invariants
//!
//! - Dispatches are applied one at a time, in call order.
//!   - Enforced in: [`Store::dispatch`] (write lock held across reduce and publish).
//!   - Tested by: `store::tests::concurrent_dispatches_are_all_applied`
//!   - Failure symptom: a lost update when two requests settle together.
//!
//! - A dispatch that changes nothing publishes nothing.
//!   - Enforced in: [`Store::dispatch`] (pointer comparison of the reduced subtree).
//!   - Tested by: `store::tests::noop_dispatch_does_not_wake_watchers`
//!   - Failure symptom: every unrelated event re-renders every watcher.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use quarry_primitives::Node;
use quarry_registry::Action;
use serde_json::Value;
use tokio::sync::{broadcast, watch};

use crate::RootReducer;

const ACTION_CAPACITY: usize = 256;

/// One selected address and the value reported while nothing lives there.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
	pub path: Vec<String>,
	pub default: Value,
}

impl Slice {
	pub fn new<I, S>(path: I, default: Value) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			path: path.into_iter().map(Into::into).collect(),
			default,
		}
	}
}

/// Reducer-driven state container.
pub struct Store {
	reducer: RootReducer,
	root: Vec<String>,
	state: ArcSwap<Node>,
	write: Mutex<()>,
	changes: watch::Sender<Arc<Node>>,
	actions: broadcast::Sender<Action>,
}

impl std::fmt::Debug for Store {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Store")
			.field("root", &self.root)
			.field("reducer", &self.reducer)
			.finish_non_exhaustive()
	}
}

impl Store {
	/// Creates a store whose cache sits at the tree root.
	pub fn new(reducer: RootReducer) -> Self {
		Self::with_root(reducer, Vec::new())
	}

	/// Creates a store whose cache sits under `root`.
	pub fn with_root(reducer: RootReducer, root: Vec<String>) -> Self {
		let initial = Arc::new(Node::empty());
		let (changes, _) = watch::channel(Arc::clone(&initial));
		let (actions, _) = broadcast::channel(ACTION_CAPACITY);
		Self {
			reducer,
			root,
			state: ArcSwap::new(initial),
			write: Mutex::new(()),
			changes,
			actions,
		}
	}

	pub fn root(&self) -> &[String] {
		&self.root
	}

	/// Applies `action` and publishes the resulting tree.
	pub fn dispatch(&self, action: Action) {
		{
			let _guard = self.write.lock();
			let current = self.state.load_full();
			let subtree = current.get(&self.root).cloned().unwrap_or_default();
			let reduced = self.reducer.reduce(subtree.clone(), &action);

			if reduced.ptr_eq(&subtree) {
				tracing::trace!(event = %action.event_type(), "store.unchanged");
			} else {
				let next = Arc::new(splice(Node::clone(&current), &self.root, reduced));
				self.state.store(Arc::clone(&next));
				self.changes.send_replace(next);
				tracing::trace!(event = %action.event_type(), "store.published");
			}
		}
		// No receivers is not an error.
		let _ = self.actions.send(action);
	}

	/// The whole published tree.
	pub fn state(&self) -> Arc<Node> {
		self.state.load_full()
	}

	/// The node at `path` relative to the cache root.
	pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<Node> {
		let state = self.state.load();
		state.get(&self.root)?.get(path).cloned()
	}

	/// Resolves each slice against the current tree.
	pub fn select(&self, slices: &[Slice]) -> Vec<Value> {
		let state = self.state.load();
		let cache = state.get(&self.root);
		slices
			.iter()
			.map(|slice| resolve(cache, slice).map_or_else(|| slice.default.clone(), Node::to_value))
			.collect()
	}

	/// Watches `slices` for changes.
	pub fn watch(&self, slices: Vec<Slice>) -> SliceWatch {
		let rx = self.changes.subscribe();
		let last = {
			let state = rx.borrow();
			let cache = state.get(&self.root);
			slices.iter().map(|slice| resolve(cache, slice).cloned()).collect()
		};
		SliceWatch {
			rx,
			root: self.root.clone(),
			slices,
			last,
		}
	}

	/// Receives every action dispatched from now on, after it has been applied.
	pub fn subscribe_actions(&self) -> broadcast::Receiver<Action> {
		self.actions.subscribe()
	}
}

fn resolve<'a>(cache: Option<&'a Node>, slice: &Slice) -> Option<&'a Node> {
	cache?.get(&slice.path)
}

/// Replaces the subtree at `root`; an empty root replaces the whole tree.
fn splice(tree: Node, root: &[String], subtree: Node) -> Node {
	if root.is_empty() { subtree } else { tree.set_in(root, subtree) }
}

/// Change feed over a fixed set of slices.
///
/// A new tree only counts as a change when some selected node differs shallowly from the one
/// last reported.
#[derive(Debug)]
pub struct SliceWatch {
	rx: watch::Receiver<Arc<Node>>,
	root: Vec<String>,
	slices: Vec<Slice>,
	last: Vec<Option<Node>>,
}

impl SliceWatch {
	/// Values of the selected slices in the latest tree.
	pub fn current(&self) -> Vec<Value> {
		let state = self.rx.borrow();
		let cache = state.get(&self.root);
		self.slices
			.iter()
			.map(|slice| resolve(cache, slice).map_or_else(|| slice.default.clone(), Node::to_value))
			.collect()
	}

	/// Waits for the next change to any selected slice.
	///
	/// Returns `None` once the store has been dropped.
	pub async fn changed(&mut self) -> Option<Vec<Value>> {
		loop {
			self.rx.changed().await.ok()?;
			let nodes: Vec<Option<Node>> = {
				let state = self.rx.borrow_and_update();
				let cache = state.get(&self.root);
				self.slices.iter().map(|slice| resolve(cache, slice).cloned()).collect()
			};
			let unchanged = nodes.iter().zip(&self.last).all(|(next, last)| match (next, last) {
				(Some(next), Some(last)) => next.shallow_eq(last),
				(None, None) => true,
				_ => false,
			});
			if unchanged {
				continue;
			}
			self.last = nodes;
			return Some(self.current());
		}
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use pretty_assertions::assert_eq;
	use quarry_primitives::{RequestId, RequestPayload};
	use quarry_registry::{QueryDef, service};
	use serde_json::json;

	use super::*;
	use crate::encode;

	fn store_with_root(root: &[&str]) -> Store {
		let defs = vec![
			Arc::new(QueryDef::new("user", service(|_| async { Ok::<_, anyhow::Error>(Value::Null) }))),
			Arc::new(QueryDef::new("posts", service(|_| async { Ok::<_, anyhow::Error>(Value::Null) }))),
		];
		Store::with_root(RootReducer::build(&defs), root.iter().map(|s| s.to_string()).collect())
	}

	fn success(query: &str, param: Value, n: u64, data: Value) -> Action {
		Action::Success {
			query: query.into(),
			payload: RequestPayload::new(encode(&[param]), RequestId::new(query, n)),
			data,
		}
	}

	#[test]
	fn dispatch_publishes_under_root() {
		let store = store_with_root(&["cache"]);
		store.dispatch(success("user", json!(1), 1, json!("ann")));

		assert_eq!(store.state().get_value(&["cache", "user", "[1]", "data"]), Some(json!("ann")));
		assert_eq!(store.get(&["user", "[1]", "data"]).and_then(|n| n.as_leaf().cloned()), Some(json!("ann")));
		assert_eq!(
			store.select(&[Slice::new(["user", "[1]", "data"], Value::Null), Slice::new(["user", "[2]", "data"], json!("none"))]),
			vec![json!("ann"), json!("none")]
		);
	}

	#[test]
	fn readers_keep_their_snapshot() {
		let store = store_with_root(&[]);
		store.dispatch(success("user", json!(1), 1, json!("ann")));
		let before = store.state();

		store.dispatch(success("user", json!(1), 2, json!("bob")));
		assert_eq!(before.get_value(&["user", "[1]", "data"]), Some(json!("ann")));
		assert_eq!(store.state().get_value(&["user", "[1]", "data"]), Some(json!("bob")));
	}

	#[test]
	fn concurrent_dispatches_are_all_applied() {
		let store = Arc::new(store_with_root(&[]));
		std::thread::scope(|scope| {
			for thread in 0..4u64 {
				let store = Arc::clone(&store);
				scope.spawn(move || {
					for n in 0..25u64 {
						store.dispatch(success("user", json!(thread * 100 + n), 1, json!(n)));
					}
				});
			}
		});
		let entries = store.get(&["user"]).and_then(|node| node.as_branch().map(|b| b.len()));
		assert_eq!(entries, Some(100));
	}

	#[tokio::test]
	async fn watch_reports_only_selected_changes() {
		let store = store_with_root(&[]);
		let mut watch = store.watch(vec![Slice::new(["user", "[1]", "data"], json!("default"))]);
		assert_eq!(watch.current(), vec![json!("default")]);

		store.dispatch(success("posts", json!("a"), 1, json!([1])));
		store.dispatch(success("user", json!(1), 1, json!("ann")));

		let next = tokio::time::timeout(Duration::from_secs(1), watch.changed()).await.unwrap();
		assert_eq!(next, Some(vec![json!("ann")]));

		store.dispatch(success("posts", json!("b"), 1, json!([2])));
		let quiet = tokio::time::timeout(Duration::from_millis(50), watch.changed()).await;
		assert!(quiet.is_err());
	}

	#[tokio::test]
	async fn noop_dispatch_does_not_wake_watchers() {
		let store = store_with_root(&[]);
		let before = store.state();
		let mut rx = store.changes.subscribe();

		store.dispatch(Action::event("unrelated", Value::Null));
		assert!(Arc::ptr_eq(&before, &store.state()));
		assert!(!rx.has_changed().unwrap());
	}

	#[tokio::test]
	async fn actions_are_rebroadcast_after_publication() {
		let store = store_with_root(&[]);
		let mut actions = store.subscribe_actions();

		let action = success("user", json!(1), 1, json!("ann"));
		store.dispatch(action.clone());
		assert_eq!(actions.recv().await.unwrap(), action);
		assert_eq!(store.get(&["user", "[1]", "data"]).and_then(|n| n.as_leaf().cloned()), Some(json!("ann")));
	}

	#[tokio::test]
	async fn watch_ends_when_store_drops() {
		let store = store_with_root(&[]);
		let mut watch = store.watch(vec![Slice::new(["user"], Value::Null)]);
		drop(store);
		assert_eq!(watch.changed().await, None);
	}
}
