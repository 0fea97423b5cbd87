/// Registry construction errors. Fatal to engine construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
	/// A query or mutation was declared with an empty name.
	#[error("request declared with an empty name (under {path:?})")]
	EmptyName { path: Vec<String> },

	/// Two requests share a name. Names are unique across queries and mutations.
	#[error("duplicate request name: {name}")]
	DuplicateName { name: String },

	/// A query resolved to an empty address.
	#[error("query {name} has an empty path")]
	EmptyPath { name: String },

	/// Two queries resolved to the same address.
	#[error("queries {existing} and {new} share the path {path:?}")]
	DuplicatePath { path: Vec<String>, existing: String, new: String },

	/// One query's path lies inside another's subtree.
	#[error("query {new} at {new_path:?} nests with query {existing} at {existing_path:?}")]
	NestedPath {
		existing_path: Vec<String>,
		existing: String,
		new_path: Vec<String>,
		new: String,
	},
}
