//! Persistent string-keyed tree.
//!
//! # Purpose
//!
//! The store holds one [`Node`] tree that is replaced wholesale on every dispatch. Readers keep
//! whichever root they loaded; writers produce a new root without touching the old one.
//!
//! # Mental Model
//!
//! A node is either a [`Branch`] (ordered map of child nodes) or a JSON leaf. Both variants sit
//! behind an [`Arc`], so cloning a node is a pointer copy. [`Node::set_in`] and
//! [`Node::remove_in`] walk the path with [`Arc::make_mut`]: a branch is copied only when it is
//! shared with another root, and only the branches along the written path are copied. Every
//! other subtree stays shared between the old and new roots.
//!
//! # Invariants
//!
//! - Writes never mutate a node reachable from another root.
//!   - Enforced in: [`Node::set_in`], [`Node::remove_in`] (copy-on-write via [`Arc::make_mut`]).
//!   - Tested by: `tree::tests::set_in_leaves_previous_root_untouched`
//!   - Failure symptom: a reader observes a half-applied dispatch.
//!
//! - Untouched siblings are shared, not copied.
//!   - Enforced in: [`Node::set_in`].
//!   - Tested by: `tree::tests::set_in_shares_untouched_siblings`
//!   - Failure symptom: every dispatch costs a full tree copy.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

#[cfg(test)]
mod tests;

/// Ordered children of a branch node.
pub type Branch = IndexMap<String, Node>;

/// One node of the store tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
	Branch(Arc<Branch>),
	Leaf(Arc<Value>),
}

impl Default for Node {
	fn default() -> Self {
		Self::empty()
	}
}

impl From<Value> for Node {
	fn from(value: Value) -> Self {
		Self::leaf(value)
	}
}

impl Node {
	/// Creates an empty branch.
	pub fn empty() -> Self {
		Node::Branch(Arc::new(Branch::new()))
	}

	/// Wraps a JSON value as a leaf.
	pub fn leaf(value: Value) -> Self {
		Node::Leaf(Arc::new(value))
	}

	/// Returns the children if this node is a branch.
	pub fn as_branch(&self) -> Option<&Branch> {
		match self {
			Node::Branch(children) => Some(children),
			Node::Leaf(_) => None,
		}
	}

	/// Returns the JSON value if this node is a leaf.
	pub fn as_leaf(&self) -> Option<&Value> {
		match self {
			Node::Leaf(value) => Some(value),
			Node::Branch(_) => None,
		}
	}

	/// True when both nodes point at the same allocation.
	pub fn ptr_eq(&self, other: &Node) -> bool {
		match (self, other) {
			(Node::Branch(a), Node::Branch(b)) => Arc::ptr_eq(a, b),
			(Node::Leaf(a), Node::Leaf(b)) => Arc::ptr_eq(a, b),
			_ => false,
		}
	}

	/// Shallow structural comparison.
	///
	/// Leaves compare by value. Branches are equal when they hold the same keys and each pair
	/// of children is either pointer-identical or two equal leaves; nested branches are not
	/// descended into.
	pub fn shallow_eq(&self, other: &Node) -> bool {
		if self.ptr_eq(other) {
			return true;
		}
		match (self, other) {
			(Node::Leaf(a), Node::Leaf(b)) => a == b,
			(Node::Branch(a), Node::Branch(b)) => {
				a.len() == b.len()
					&& a.iter().all(|(key, child)| {
						b.get(key).is_some_and(|theirs| match (child, theirs) {
							(Node::Leaf(x), Node::Leaf(y)) => x == y,
							_ => child.ptr_eq(theirs),
						})
					})
			}
			_ => false,
		}
	}

	/// Looks up the node at `path`. An empty path yields `self`.
	pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<&Node> {
		path.iter().try_fold(self, |node, segment| node.as_branch()?.get(segment.as_ref()))
	}

	/// Looks up the node at `path` and converts it to JSON.
	pub fn get_value<S: AsRef<str>>(&self, path: &[S]) -> Option<Value> {
		self.get(path).map(Node::to_value)
	}

	/// Converts the subtree to a JSON value. Branches become objects.
	pub fn to_value(&self) -> Value {
		match self {
			Node::Leaf(value) => Value::clone(value),
			Node::Branch(children) => Value::Object(
				children
					.iter()
					.map(|(key, child)| (key.clone(), child.to_value()))
					.collect(),
			),
		}
	}

	/// Returns a tree with `value` stored at `path`.
	///
	/// Missing intermediates are created as empty branches and leaf intermediates are replaced
	/// by branches. An empty path is not a valid target and returns the tree unchanged.
	pub fn set_in<S: AsRef<str>>(mut self, path: &[S], value: Node) -> Node {
		if !path.is_empty() {
			insert_at(&mut self, path, value);
		}
		self
	}

	/// Returns a tree without the entry at `path`.
	///
	/// Returns the tree unchanged (same allocation) when nothing lives at `path`.
	pub fn remove_in<S: AsRef<str>>(mut self, path: &[S]) -> Node {
		let Some((last, parent)) = path.split_last() else {
			return self;
		};
		if self.get(path).is_none() {
			return self;
		}
		if let Some(children) = branch_at_mut(&mut self, parent) {
			children.shift_remove(last.as_ref());
		}
		self
	}

	fn branch_mut(&mut self) -> &mut Branch {
		match self {
			Node::Branch(children) => Arc::make_mut(children),
			Node::Leaf(_) => {
				*self = Node::empty();
				self.branch_mut()
			}
		}
	}
}

fn branch_at_mut<'a, S: AsRef<str>>(mut node: &'a mut Node, path: &[S]) -> Option<&'a mut Branch> {
	for segment in path {
		let Node::Branch(children) = node else {
			return None;
		};
		node = Arc::make_mut(children).get_mut(segment.as_ref())?;
	}
	match node {
		Node::Branch(children) => Some(Arc::make_mut(children)),
		Node::Leaf(_) => None,
	}
}

fn insert_at<S: AsRef<str>>(node: &mut Node, path: &[S], value: Node) {
	let Some((head, rest)) = path.split_first() else {
		*node = value;
		return;
	};
	let children = node.branch_mut();
	if rest.is_empty() {
		children.insert(head.as_ref().to_owned(), value);
		return;
	}
	let child = children.entry(head.as_ref().to_owned()).or_insert_with(Node::empty);
	insert_at(child, rest, value);
}
