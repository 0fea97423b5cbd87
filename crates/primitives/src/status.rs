use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Node;

/// Lifecycle state of one (cache key, request id) pair.
///
/// Stored in the tree as its upper-case name, e.g. `"PENDING_REFRESH"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
	/// The request was issued and its service has not settled.
	Loading,
	/// The service resolved and its result is in the data cell.
	Done,
	/// The service rejected.
	Error,
	/// A refresh event matched; the owner should re-issue the request.
	PendingRefresh,
}

impl Status {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Loading => "LOADING",
			Self::Done => "DONE",
			Self::Error => "ERROR",
			Self::PendingRefresh => "PENDING_REFRESH",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"LOADING" => Some(Self::Loading),
			"DONE" => Some(Self::Done),
			"ERROR" => Some(Self::Error),
			"PENDING_REFRESH" => Some(Self::PendingRefresh),
			_ => None,
		}
	}

	/// Reads a status leaf. Anything other than a known status string yields `None`.
	pub fn from_node(node: &Node) -> Option<Self> {
		node.as_leaf().and_then(Value::as_str).and_then(Self::parse)
	}

	/// True once the service has settled, successfully or not.
	pub const fn is_settled(self) -> bool {
		matches!(self, Self::Done | Self::Error)
	}
}

impl std::fmt::Display for Status {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl From<Status> for Node {
	fn from(status: Status) -> Self {
		Node::leaf(Value::String(status.as_str().to_owned()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tree_encoding_matches_serde() {
		for status in [Status::Loading, Status::Done, Status::Error, Status::PendingRefresh] {
			let node = Node::from(status);
			assert_eq!(node.as_leaf(), Some(&serde_json::to_value(status).unwrap()));
			assert_eq!(Status::from_node(&node), Some(status));
		}
	}

	#[test]
	fn unknown_leaf_is_not_a_status() {
		assert_eq!(Status::from_node(&Node::leaf(Value::from("done"))), None);
		assert_eq!(Status::from_node(&Node::empty()), None);
	}
}
