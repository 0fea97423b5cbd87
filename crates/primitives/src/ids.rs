use std::borrow::Borrow;
use std::sync::Arc;

/// Canonical encoding of a query's parameter list.
///
/// Produced by the cache codec; this type only carries the text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Arc<str>);

impl CacheKey {
	/// Wraps already-encoded key text.
	pub fn from_encoded(text: impl Into<Arc<str>>) -> Self {
		Self(text.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

/// Identifier of one logical invocation lifetime: `<query>_<n>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(Arc<str>);

impl RequestId {
	pub fn new(query: &str, n: u64) -> Self {
		Self(format!("{query}_{n}").into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// The query name this id was allocated for.
	pub fn query_name(&self) -> &str {
		self.0.rsplit_once('_').map_or(self.as_str(), |(name, _)| name)
	}
}

macro_rules! impl_str_newtype {
	($ty:ty) => {
		impl AsRef<str> for $ty {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}

		impl Borrow<str> for $ty {
			fn borrow(&self) -> &str {
				&self.0
			}
		}

		impl std::fmt::Display for $ty {
			fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				f.write_str(&self.0)
			}
		}
	};
}

impl_str_newtype!(CacheKey);
impl_str_newtype!(RequestId);

/// Target of one query invocation: which cache entry, and which request under it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestPayload {
	pub cache_key: CacheKey,
	pub request_id: RequestId,
}

impl RequestPayload {
	pub fn new(cache_key: CacheKey, request_id: RequestId) -> Self {
		Self { cache_key, request_id }
	}
}
