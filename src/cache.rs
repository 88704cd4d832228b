//! Content-hash keyed report cache with recency-tiered lifetimes.
//!
//! Entries live in the shared option store under [`CACHE_PREFIX`], so clearing the cache is a
//! single prefix delete. The cache is never the source of truth: read and write failures are
//! reported through [`obs::warn_degraded`] and the fetcher result is returned regardless.

pub mod ttl;

pub use ttl::recency_ttl;

// crates.io
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	obs::{self, CacheOutcome},
	settings::Settings,
	store::OptionStore,
};

/// Prefix shared by every cached report.
pub const CACHE_PREFIX: &str = "uipress_analytics_bridge_cache_";

/// Caching switches taken from the operator settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CachePolicy {
	/// Reads and writes are skipped entirely when false.
	pub enabled: bool,
	/// Degraded cache paths are logged when true.
	pub debug_mode: bool,
}
impl From<&Settings> for CachePolicy {
	fn from(settings: &Settings) -> Self {
		Self { enabled: settings.cache_enabled(), debug_mode: settings.debug_mode }
	}
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
	expires_at: i64,
	value: JsonValue,
}

/// Report cache over an [`OptionStore`].
#[derive(Clone)]
pub struct ResponseCache {
	store: Arc<dyn OptionStore>,
}
impl ResponseCache {
	/// Wraps the shared option store.
	pub fn new(store: Arc<dyn OptionStore>) -> Self {
		Self { store }
	}

	/// Storage key for `material`: [`CACHE_PREFIX`] followed by the SHA-256 of its JSON form.
	pub fn key<K>(material: &K) -> Result<String, serde_json::Error>
	where
		K: ?Sized + Serialize,
	{
		let encoded = serde_json::to_vec(material)?;

		Ok(format!("{CACHE_PREFIX}{}", hex::encode(Sha256::digest(&encoded))))
	}

	/// Returns the live entry for `material`, or runs `fetch` and caches its success.
	///
	/// The entry expires after [`recency_ttl`] of `end_date`.
	pub async fn get_or_fetch<K, T, F, Fut>(
		&self,
		policy: CachePolicy,
		material: &K,
		end_date: Date,
		fetch: F,
	) -> Result<T>
	where
		K: ?Sized + Serialize,
		T: Serialize + DeserializeOwned,
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		self.get_or_fetch_at(policy, material, end_date, OffsetDateTime::now_utc(), fetch).await
	}

	/// [`ResponseCache::get_or_fetch`] evaluated at `now`.
	pub async fn get_or_fetch_at<K, T, F, Fut>(
		&self,
		policy: CachePolicy,
		material: &K,
		end_date: Date,
		now: OffsetDateTime,
		fetch: F,
	) -> Result<T>
	where
		K: ?Sized + Serialize,
		T: Serialize + DeserializeOwned,
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		if !policy.enabled {
			obs::record_cache_outcome(CacheOutcome::Bypass);

			return fetch().await;
		}

		let key = match Self::key(material) {
			Ok(key) => key,
			Err(e) => {
				obs::warn_degraded(policy.debug_mode, "cache_key", &e);

				return fetch().await;
			},
		};

		if let Some(value) = self.read(policy, &key, now).await {
			obs::record_cache_outcome(CacheOutcome::Hit);

			return Ok(value);
		}

		obs::record_cache_outcome(CacheOutcome::Miss);

		let value = fetch().await?;
		let expires_at = now + recency_ttl(end_date, now.date());

		self.write(policy, &key, &value, expires_at).await;

		Ok(value)
	}

	/// Deletes every cached report, returning how many entries were removed.
	pub async fn invalidate_all(&self) -> Result<usize> {
		Ok(self.store.delete_prefix(CACHE_PREFIX).await?)
	}

	async fn read<T>(&self, policy: CachePolicy, key: &str, now: OffsetDateTime) -> Option<T>
	where
		T: DeserializeOwned,
	{
		let entry = match self.store.fetch_as::<CacheEntry>(key).await {
			Ok(entry) => entry?,
			Err(e) => {
				obs::warn_degraded(policy.debug_mode, "cache_read", &e);

				return None;
			},
		};

		if entry.expires_at <= now.unix_timestamp() {
			return None;
		}

		serde_json::from_value(entry.value)
			.inspect_err(|e| obs::warn_degraded(policy.debug_mode, "cache_decode", e))
			.ok()
	}

	async fn write<T>(&self, policy: CachePolicy, key: &str, value: &T, expires_at: OffsetDateTime)
	where
		T: Serialize,
	{
		let entry = match serde_json::to_value(value) {
			Ok(value) => CacheEntry { expires_at: expires_at.unix_timestamp(), value },
			Err(e) => {
				obs::warn_degraded(policy.debug_mode, "cache_encode", &e);

				return;
			},
		};

		if let Err(e) = self.store.save_as(key, &entry).await {
			obs::warn_degraded(policy.debug_mode, "cache_write", &e);
		}
	}
}
impl Debug for ResponseCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ResponseCache").field("prefix", &CACHE_PREFIX).finish()
	}
}
