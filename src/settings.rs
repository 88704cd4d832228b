//! Operator settings persisted alongside the credential profiles.

// self
use crate::{
	_prelude::*,
	auth::Secret,
	store::{OPTION_PREFIX, OptionStore},
};

/// Cache lifetime applied when the operator has not configured one.
pub const DEFAULT_CACHE_DURATION: u64 = 3600;

/// Persisted operator settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
	/// OAuth client identifier registered with Google.
	pub client_id: Option<String>,
	/// OAuth client secret registered with Google.
	pub client_secret: Option<Secret>,
	/// Emits warnings for degraded paths (cache and revocation failures).
	pub debug_mode: bool,
	/// Cache switch in seconds; `0` disables report caching entirely.
	pub cache_duration: u64,
}
impl Settings {
	/// Returns the client credential pair when both halves are configured.
	pub fn client_credentials(&self) -> Option<ClientCredentials> {
		let client_id = self.client_id.as_deref().map(str::trim).filter(|id| !id.is_empty())?;
		let client_secret = self.client_secret.as_ref().filter(|secret| !secret.is_empty())?;

		Some(ClientCredentials {
			client_id: client_id.to_owned(),
			client_secret: client_secret.clone(),
		})
	}

	/// Returns false when the operator disabled report caching.
	pub fn cache_enabled(&self) -> bool {
		self.cache_duration != 0
	}

	/// Trims identifiers and drops blank credentials before persisting.
	pub fn sanitized(self) -> Self {
		Self {
			client_id: self
				.client_id
				.map(|id| id.trim().to_owned())
				.filter(|id| !id.is_empty()),
			client_secret: self.client_secret.and_then(|secret| Secret::non_blank(secret.expose())),
			..self
		}
	}
}
impl Default for Settings {
	fn default() -> Self {
		Self {
			client_id: None,
			client_secret: None,
			debug_mode: false,
			cache_duration: DEFAULT_CACHE_DURATION,
		}
	}
}

/// Confidential OAuth client credentials.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientCredentials {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: Secret,
}

/// Loads and saves [`Settings`] through an [`OptionStore`].
#[derive(Clone)]
pub struct SettingsStore {
	store: Arc<dyn OptionStore>,
}
impl SettingsStore {
	/// Wraps the shared option store.
	pub fn new(store: Arc<dyn OptionStore>) -> Self {
		Self { store }
	}

	/// Storage key holding the settings object.
	pub fn key() -> String {
		format!("{OPTION_PREFIX}settings")
	}

	/// Loads the stored settings, falling back to defaults when none were saved.
	pub async fn load(&self) -> Result<Settings> {
		Ok(self.store.fetch_as::<Settings>(&Self::key()).await?.unwrap_or_default())
	}

	/// Sanitizes and persists `settings`, returning what was stored.
	pub async fn save(&self, settings: Settings) -> Result<Settings> {
		let settings = settings.sanitized();

		self.store.save_as(&Self::key(), &settings).await?;

		Ok(settings)
	}
}
