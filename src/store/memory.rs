//! Thread-safe in-memory [`OptionStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	store::{OptionStore, StoreError, StoreFuture},
};

type OptionMap = Arc<RwLock<BTreeMap<String, JsonValue>>>;

/// Storage backend that keeps options in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(OptionMap);
impl MemoryStore {
	/// Returns the stored keys in lexical order.
	pub fn keys(&self) -> Vec<String> {
		self.0.read().keys().cloned().collect()
	}

	/// Returns a copy of the raw value stored under `key`.
	pub fn raw(&self, key: &str) -> Option<JsonValue> {
		self.0.read().get(key).cloned()
	}

	fn delete_prefix_now(map: OptionMap, prefix: &str) -> Result<usize, StoreError> {
		let mut guard = map.write();
		let before = guard.len();

		guard.retain(|key, _| !key.starts_with(prefix));

		Ok(before - guard.len())
	}
}
impl OptionStore for MemoryStore {
	fn fetch<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<JsonValue>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(key).cloned()) })
	}

	fn save<'a>(&'a self, key: &'a str, value: JsonValue) -> StoreFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().insert(key.to_owned(), value);

			Ok(())
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.write().remove(key).is_some()) })
	}

	fn delete_prefix<'a>(&'a self, prefix: &'a str) -> StoreFuture<'a, usize> {
		let map = self.0.clone();

		Box::pin(async move { Self::delete_prefix_now(map, prefix) })
	}
}
