//! Per-scope credential persistence with a request-lived read cache.

// self
use crate::{
	_prelude::*,
	auth::{CredentialProfile, Scope},
	compat::CompatShim,
	obs,
	settings::SettingsStore,
	store::OptionStore,
};

const PROFILE_OPTION: &str = "profile";

/// Owns the persisted [`CredentialProfile`] of each scope.
///
/// Reads are served from an in-process copy until a caller forces a reload. Writes go through
/// to the option store first and mirror into the dashboard options when the profile carries a
/// measurement id. The stored profile is authoritative: a failed mirror is logged in debug mode
/// and never fails the write. Concurrent writers are not serialized: the last write wins.
#[derive(Clone)]
pub struct CredentialStore {
	store: Arc<dyn OptionStore>,
	shim: Arc<dyn CompatShim>,
	settings: SettingsStore,
	cache: Arc<RwLock<HashMap<Scope, CredentialProfile>>>,
}
impl CredentialStore {
	/// Creates a store over the shared option backend and dashboard shim.
	pub fn new(store: Arc<dyn OptionStore>, shim: Arc<dyn CompatShim>) -> Self {
		Self { settings: SettingsStore::new(store.clone()), store, shim, cache: Default::default() }
	}

	/// Storage key holding the profile of `scope`.
	pub fn key(scope: Scope) -> String {
		scope.option_key(PROFILE_OPTION)
	}

	/// Returns the profile of `scope`, or an empty profile when none is stored.
	///
	/// A cached copy is returned unless `force` is set or the cached copy is empty.
	pub async fn get(&self, scope: Scope, force: bool) -> Result<CredentialProfile> {
		if !force {
			let cached = self.cache.read().get(&scope).filter(|p| !p.is_empty()).cloned();

			if let Some(profile) = cached {
				return Ok(profile);
			}
		}

		let profile = self
			.store
			.fetch_as::<CredentialProfile>(&Self::key(scope))
			.await?
			.unwrap_or_default();

		self.cache.write().insert(scope, profile.clone());

		Ok(profile)
	}

	/// Persists `profile` for `scope`, stamping the connection time.
	///
	/// Returns the stored profile.
	pub async fn set(
		&self,
		scope: Scope,
		mut profile: CredentialProfile,
	) -> Result<CredentialProfile> {
		profile.connection_time = Some(OffsetDateTime::now_utc().unix_timestamp());

		self.store.save_as(&Self::key(scope), &profile).await?;
		self.cache.write().insert(scope, profile.clone());

		let mirrored = match profile.measurement_id {
			Some(_) => self.shim.mirror(&profile).await,
			None => Ok(()),
		};

		if let Err(e) = mirrored {
			let debug_mode = self.settings.load().await.is_ok_and(|settings| settings.debug_mode);

			obs::warn_degraded(debug_mode, "dashboard_mirror", &e);
		}

		Ok(profile)
	}

	/// Removes the profile of `scope`.
	///
	/// With `migrate` the profile is replaced by [`CredentialProfile::migrated`]; otherwise the
	/// key is deleted and the dashboard mirror is reset.
	pub async fn delete(&self, scope: Scope, migrate: bool) -> Result<()> {
		let key = Self::key(scope);

		if migrate {
			let current = self.get(scope, true).await?;
			let retained = current.migrated();

			self.store.save_as(&key, &retained).await?;
			self.cache.write().insert(scope, retained);
		} else {
			self.store.delete(&key).await?;
			self.cache.write().remove(&scope);
			self.shim.reset().await?;
		}

		Ok(())
	}

	/// Returns true when `scope` holds an access token and a selected property.
	pub async fn is_authenticated(&self, scope: Scope) -> Result<bool> {
		Ok(self.get(scope, false).await?.is_authenticated())
	}
}
impl Debug for CredentialStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let cached_scopes = self.cache.read().len();

		f.debug_struct("CredentialStore").field("cached_scopes", &cached_scopes).finish()
	}
}
