use pretty_assertions::assert_eq;
use serde_json::json;

use super::Node;

fn sample() -> Node {
	Node::empty()
		.set_in(&["users", "[1]", "data"], Node::leaf(json!({ "id": 1 })))
		.set_in(&["users", "[1]", "status", "users_1"], Node::leaf(json!("DONE")))
		.set_in(&["posts", "[]", "data"], Node::leaf(json!([])))
}

#[test]
fn set_in_creates_missing_intermediates() {
	let tree = Node::empty().set_in(&["a", "b", "c"], Node::leaf(json!(3)));
	assert_eq!(tree.to_value(), json!({ "a": { "b": { "c": 3 } } }));
}

#[test]
fn set_in_replaces_leaf_intermediate() {
	let tree = Node::empty()
		.set_in(&["a"], Node::leaf(json!(1)))
		.set_in(&["a", "b"], Node::leaf(json!(2)));
	assert_eq!(tree.to_value(), json!({ "a": { "b": 2 } }));
}

#[test]
fn set_in_with_empty_path_is_identity() {
	let tree = sample();
	let same = tree.clone().set_in::<&str>(&[], Node::leaf(json!("ignored")));
	assert!(same.ptr_eq(&tree));
}

#[test]
fn set_in_leaves_previous_root_untouched() {
	let before = sample();
	let after = before.clone().set_in(&["users", "[1]", "data"], Node::leaf(json!({ "id": 2 })));

	assert_eq!(before.get_value(&["users", "[1]", "data"]), Some(json!({ "id": 1 })));
	assert_eq!(after.get_value(&["users", "[1]", "data"]), Some(json!({ "id": 2 })));
}

#[test]
fn set_in_shares_untouched_siblings() {
	let before = sample();
	let after = before.clone().set_in(&["users", "[1]", "data"], Node::leaf(json!(null)));

	let old_posts = before.get(&["posts"]).unwrap();
	let new_posts = after.get(&["posts"]).unwrap();
	assert!(old_posts.ptr_eq(new_posts));

	let old_status = before.get(&["users", "[1]", "status"]).unwrap();
	let new_status = after.get(&["users", "[1]", "status"]).unwrap();
	assert!(old_status.ptr_eq(new_status));
}

#[test]
fn remove_in_drops_only_the_target() {
	let tree = sample()
		.set_in(&["users", "[1]", "status", "users_2"], Node::leaf(json!("LOADING")))
		.remove_in(&["users", "[1]", "status", "users_1"]);

	assert_eq!(
		tree.get_value(&["users", "[1]"]),
		Some(json!({ "data": { "id": 1 }, "status": { "users_2": "LOADING" } }))
	);
}

#[test]
fn remove_in_missing_path_returns_same_root() {
	let tree = sample();
	let same = tree.clone().remove_in(&["users", "[9]", "status", "users_1"]);
	assert!(same.ptr_eq(&tree));
}

#[test]
fn get_does_not_descend_into_leaves() {
	let tree = sample();
	assert!(tree.get(&["users", "[1]", "data", "id"]).is_none());
}

#[test]
fn shallow_eq_compares_leaf_children_by_value() {
	let a = Node::empty().set_in(&["x"], Node::leaf(json!(1)));
	let b = Node::empty().set_in(&["x"], Node::leaf(json!(1)));
	assert!(a.shallow_eq(&b));
	assert!(!a.ptr_eq(&b));
}

#[test]
fn shallow_eq_does_not_descend_into_branches() {
	let a = Node::empty().set_in(&["x", "y"], Node::leaf(json!(1)));
	let b = Node::empty().set_in(&["x", "y"], Node::leaf(json!(1)));
	assert!(!a.shallow_eq(&b));
	assert_eq!(a, b);
}
