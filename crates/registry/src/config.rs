//! Nested declaration tree.
//!
//! Applications group queries under named branches; flattening turns the tree into a
//! [`Registry`] where each query's path is the chain of branch keys followed by its name.

use indexmap::IndexMap;

use crate::{ConfigError, MutationDef, QueryDef, Registry};

/// One level of the declaration tree.
#[derive(Debug, Clone)]
pub enum ConfigNode {
	/// Named sub-trees, visited in insertion order.
	Branch(IndexMap<String, ConfigNode>),
	/// Requests declared at this level.
	Leaf {
		queries: Vec<QueryDef>,
		mutations: Vec<MutationDef>,
	},
}

impl ConfigNode {
	pub fn branch<I, K>(children: I) -> Self
	where
		I: IntoIterator<Item = (K, ConfigNode)>,
		K: Into<String>,
	{
		ConfigNode::Branch(children.into_iter().map(|(key, node)| (key.into(), node)).collect())
	}

	pub fn leaf(queries: Vec<QueryDef>, mutations: Vec<MutationDef>) -> Self {
		ConfigNode::Leaf { queries, mutations }
	}

	/// Flattens the tree into a validated registry.
	pub fn flatten(self) -> Result<Registry, ConfigError> {
		let mut queries = Vec::new();
		let mut mutations = Vec::new();
		self.collect(&mut Vec::new(), &mut queries, &mut mutations);
		Registry::new(queries, mutations)
	}

	fn collect(self, prefix: &mut Vec<String>, queries: &mut Vec<QueryDef>, mutations: &mut Vec<MutationDef>) {
		match self {
			ConfigNode::Leaf { queries: declared, mutations: declared_mutations } => {
				queries.extend(declared.into_iter().map(|def| {
					let path: Vec<String> = prefix.iter().cloned().chain([def.name.to_string()]).collect();
					def.path(path)
				}));
				mutations.extend(declared_mutations);
			}
			ConfigNode::Branch(children) => {
				for (key, child) in children {
					prefix.push(key);
					child.collect(prefix, queries, mutations);
					prefix.pop();
				}
			}
		}
	}
}
