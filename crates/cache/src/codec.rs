//! Cache key codec.
//!
//! A cache key is the compact JSON text of the parameter list with object keys written in
//! sorted order, so structurally equal lists encode identically regardless of how their
//! objects were built. [`decode`] only accepts text that [`encode`] could have produced.

use std::fmt::Write;

use quarry_primitives::CacheKey;
use serde_json::Value;

/// Errors from [`decode`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
	#[error("malformed cache key {key:?}: {reason}")]
	MalformedKey { key: String, reason: &'static str },
}

/// Encodes an ordered parameter list.
pub fn encode(params: &[Value]) -> CacheKey {
	let mut out = String::with_capacity(2 + params.len() * 8);
	write_array(&mut out, params);
	CacheKey::from_encoded(out)
}

/// Decodes a key produced by [`encode`].
pub fn decode(key: &str) -> Result<Vec<Value>, CodecError> {
	let malformed = |reason| CodecError::MalformedKey { key: key.to_owned(), reason };
	let Value::Array(params) = serde_json::from_str::<Value>(key).map_err(|_| malformed("not JSON"))? else {
		return Err(malformed("not a parameter list"));
	};
	if encode(&params).as_str() != key {
		return Err(malformed("not in canonical form"));
	}
	Ok(params)
}

fn write_array(out: &mut String, items: &[Value]) {
	out.push('[');
	for (idx, item) in items.iter().enumerate() {
		if idx > 0 {
			out.push(',');
		}
		write_value(out, item);
	}
	out.push(']');
}

fn write_value(out: &mut String, value: &Value) {
	match value {
		Value::Array(items) => write_array(out, items),
		Value::Object(map) => {
			let mut entries: Vec<_> = map.iter().collect();
			entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
			out.push('{');
			for (idx, (key, item)) in entries.into_iter().enumerate() {
				if idx > 0 {
					out.push(',');
				}
				// Value's Display writes compact JSON, including string escapes.
				let _ = write!(out, "{}", Value::from(key.as_str()));
				out.push(':');
				write_value(out, item);
			}
			out.push('}');
		}
		// -0.0 equals 0.0 as a value, so both share one key.
		Value::Number(n) if n.is_f64() && n.as_f64() == Some(0.0) => out.push_str("0.0"),
		scalar => {
			let _ = write!(out, "{scalar}");
		}
	}
}

#[cfg(test)]
mod tests {
	use proptest::prelude::*;
	use serde_json::json;

	use super::*;

	fn arb_value() -> impl Strategy<Value = Value> {
		let leaf = prop_oneof![
			Just(Value::Null),
			any::<bool>().prop_map(Value::from),
			any::<i64>().prop_map(Value::from),
			(-1_000_000i64..1_000_000).prop_map(|n| Value::from(n as f64 / 8.0)),
			Just(Value::from(-0.0_f64)),
			".{0,12}".prop_map(Value::from),
		];
		leaf.prop_recursive(3, 24, 4, |inner| {
			prop_oneof![
				prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
				prop::collection::btree_map("[a-z]{0,4}", inner, 0..4)
					.prop_map(|map| Value::Object(map.into_iter().collect())),
			]
		})
	}

	fn arb_params() -> impl Strategy<Value = Vec<Value>> {
		prop::collection::vec(arb_value(), 0..4)
	}

	#[test]
	fn encodes_like_compact_json() {
		assert_eq!(encode(&[json!(1)]).as_str(), "[1]");
		assert_eq!(encode(&[]).as_str(), "[]");
		assert_eq!(encode(&[json!("a\"b"), json!(true), json!(null)]).as_str(), r#"["a\"b",true,null]"#);
		assert_eq!(encode(&[json!({ "b": 1, "a": [2.5] })]).as_str(), r#"[{"a":[2.5],"b":1}]"#);
	}

	#[test]
	fn object_key_order_does_not_matter() {
		let mut first = serde_json::Map::new();
		first.insert("x".into(), json!(1));
		first.insert("y".into(), json!(2));
		let mut second = serde_json::Map::new();
		second.insert("y".into(), json!(2));
		second.insert("x".into(), json!(1));

		assert_eq!(encode(&[Value::Object(first)]), encode(&[Value::Object(second)]));
	}

	#[test]
	fn rejects_foreign_text() {
		for key in ["", "1", "{\"a\":1}", "[1, 2]", "[1,2", "[{\"b\":1,\"a\":2}]"] {
			assert!(matches!(decode(key), Err(CodecError::MalformedKey { .. })), "accepted {key:?}");
		}
	}

	#[test]
	fn negative_zero_shares_the_zero_key() {
		assert_eq!(json!(0.0), json!(-0.0));
		assert_eq!(encode(&[json!(-0.0)]), encode(&[json!(0.0)]));
		assert_eq!(encode(&[json!({ "at": [-0.0] })]).as_str(), r#"[{"at":[0.0]}]"#);
		assert!(decode("[-0.0]").is_err());
		assert_eq!(decode("[0.0]").unwrap(), [json!(-0.0)]);
	}

	#[test]
	fn integer_and_float_keys_differ() {
		assert_ne!(encode(&[json!(1)]), encode(&[json!(1.0)]));
	}

	proptest! {
		#[test]
		fn prop_decode_inverts_encode(params in arb_params()) {
			let key = encode(&params);
			prop_assert_eq!(decode(key.as_str()).unwrap(), params);
		}

		#[test]
		fn prop_keys_equal_iff_params_equal(a in arb_params(), b in arb_params()) {
			prop_assert_eq!(encode(&a) == encode(&b), a == b);
		}
	}
}
