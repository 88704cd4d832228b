//! Option storage contract and built-in backends for profiles, transit tokens, settings, and
//! cached reports.
//!
//! Every value lives under a string key in one flat namespace, mirroring the host's option
//! table. Keys owned by the bridge share [`OPTION_PREFIX`] so whole families can be removed
//! with a single [`OptionStore::delete_prefix`] call.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::_prelude::*;

/// Prefix shared by every option the bridge owns.
pub const OPTION_PREFIX: &str = "uipress_analytics_bridge_";

/// Boxed future returned by [`OptionStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract implemented by option stores.
pub trait OptionStore
where
	Self: Send + Sync,
{
	/// Fetches the value stored under `key`, if present.
	fn fetch<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<JsonValue>>;

	/// Persists or replaces the value stored under `key`.
	fn save<'a>(&'a self, key: &'a str, value: JsonValue) -> StoreFuture<'a, ()>;

	/// Removes `key`, returning whether it existed.
	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool>;

	/// Removes every key starting with `prefix`, returning how many were removed.
	fn delete_prefix<'a>(&'a self, prefix: &'a str) -> StoreFuture<'a, usize>;
}
impl<'s> dyn OptionStore + 's {
	/// Fetches and decodes the value stored under `key`.
	pub async fn fetch_as<T>(&self, key: &str) -> Result<Option<T>, StoreError>
	where
		T: DeserializeOwned + Send,
	{
		let Some(value) = self.fetch(key).await? else {
			return Ok(None);
		};

		serde_json::from_value(value).map(Some).map_err(|e| StoreError::Serialization {
			message: format!("Failed to decode option `{key}`: {e}"),
		})
	}

	/// Encodes `value` and stores it under `key`.
	pub async fn save_as<T>(&self, key: &str, value: &T) -> Result<(), StoreError>
	where
		T: Serialize + Sync,
	{
		let encoded = serde_json::to_value(value).map_err(|e| StoreError::Serialization {
			message: format!("Failed to encode option `{key}`: {e}"),
		})?;

		self.save(key, encoded).await
	}
}

/// Error type produced by [`OptionStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend or by typed helpers.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
