//! Explicit application context wiring the stores, lifecycle, query client, and cache.
//!
//! A [`Bridge`] is built once per process from a [`BridgeConfig`] and an [`OptionStore`]
//! and handed to whatever serves inbound requests. Every component it owns receives its
//! collaborators through the constructor; nothing is looked up globally.

// self
use crate::{
	_prelude::*,
	analytics::{AnalyticsClient, PropertySummary, ReportQuery},
	auth::{
		AccountId, CredentialProfile, MeasurementId, PropertyId, ResourceSelection, Scope, Secret,
	},
	cache::{CachePolicy, ResponseCache},
	compat::{
		AdapterFuture, CompatShim, DashboardAccount, DashboardAdapter, ReportEnvelope,
		UipressShim,
	},
	credential::CredentialStore,
	error::{ConfigError, Precondition},
	flows::TokenLifecycle,
	http::{ReqwestHttpClient, TokenHttpClient},
	oauth::{ReqwestTransportErrorMapper, TransportErrorMapper},
	obs,
	provider::{GoogleProviderStrategy, ProviderDescriptor, ProviderStrategy},
	settings::{Settings, SettingsStore},
	store::OptionStore,
	transit::TransitGuard,
};

/// Upper bound for any single Google call made by the default transport.
pub const DEFAULT_REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(15);

/// Bridge specialized for the crate's default reqwest transport stack.
pub type ReqwestBridge = Bridge<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Process-level configuration for a [`Bridge`].
#[derive(Clone)]
pub struct BridgeConfig {
	/// Callback URL registered with the OAuth client.
	pub redirect_uri: Url,
	/// Provider endpoints; Google's when unset.
	pub descriptor: Option<ProviderDescriptor>,
	/// Classification and consent tweaks; Google's when unset.
	pub strategy: Option<Arc<dyn ProviderStrategy>>,
	/// Dashboard mirror; the UIPress option names when unset.
	pub shim: Option<Arc<dyn CompatShim>>,
	/// Timeout applied by [`Bridge::new`] to the default transport.
	pub request_timeout: std::time::Duration,
}
impl BridgeConfig {
	/// Starts a configuration for the given callback URL.
	pub fn new(redirect_uri: Url) -> Self {
		Self {
			redirect_uri,
			descriptor: None,
			strategy: None,
			shim: None,
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
		}
	}

	/// Overrides the provider descriptor.
	pub fn with_descriptor(mut self, descriptor: ProviderDescriptor) -> Self {
		self.descriptor = Some(descriptor);

		self
	}

	/// Overrides the provider strategy.
	pub fn with_strategy(mut self, strategy: Arc<dyn ProviderStrategy>) -> Self {
		self.strategy = Some(strategy);

		self
	}

	/// Overrides the dashboard mirror.
	pub fn with_shim(mut self, shim: Arc<dyn CompatShim>) -> Self {
		self.shim = Some(shim);

		self
	}

	/// Overrides the request timeout of the default transport.
	pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
		self.request_timeout = timeout;

		self
	}
}
impl Debug for BridgeConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BridgeConfig")
			.field("redirect_uri", &self.redirect_uri.as_str())
			.field("descriptor", &self.descriptor.as_ref().map(|descriptor| &descriptor.id))
			.field("custom_strategy", &self.strategy.is_some())
			.field("custom_shim", &self.shim.is_some())
			.field("request_timeout", &self.request_timeout)
			.finish()
	}
}

/// Connection summary shown on the settings page.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthStatus {
	/// Access token and property are both present.
	pub authenticated: bool,
	/// Operator client credentials are configured.
	pub client_configured: bool,
	/// First unmet precondition, when not authenticated.
	pub missing: Option<Precondition>,
	/// Property queries run against; the pinned one when nothing is selected.
	pub property_id: Option<PropertyId>,
	/// Property pinned by the operator, kept across reconnects.
	pub manual_property_id: Option<PropertyId>,
	/// A Measurement Protocol secret is stored.
	pub measurement_protocol_secret_set: bool,
	/// Measurement id of the selected web stream.
	pub measurement_id: Option<MeasurementId>,
	/// Display label of the connection.
	pub view_label: Option<String>,
	/// Time of the last profile write, Unix seconds.
	pub connection_time: Option<i64>,
	/// Expiry of the access token, Unix seconds.
	pub expires_at: Option<i64>,
}

/// Property choice submitted by the operator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyChoice {
	/// Account owning the property.
	pub account_id: AccountId,
	/// Property to report on.
	pub property_id: PropertyId,
	/// Web stream measurement id; looked up through the Admin API when absent.
	pub measurement_id: Option<MeasurementId>,
	/// Optional display label.
	pub view_label: Option<String>,
}

#[derive(Serialize)]
struct ReportCacheKey<'a> {
	property: &'a PropertyId,
	query: &'a ReportQuery,
}

/// Application context owning every bridge component.
pub struct Bridge<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	lifecycle: TokenLifecycle<C, M>,
	analytics: AnalyticsClient<C, M>,
	cache: ResponseCache,
	settings: SettingsStore,
}
impl<C, M> Bridge<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Wires a bridge over a caller-provided transport and error mapper.
	pub fn with_http_client(
		config: BridgeConfig,
		store: Arc<dyn OptionStore>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let descriptor = match config.descriptor {
			Some(descriptor) => descriptor,
			None => ProviderDescriptor::google().map_err(ConfigError::from)?,
		};
		let strategy = config.strategy.unwrap_or_else(|| Arc::new(GoogleProviderStrategy));
		let shim = config.shim.unwrap_or_else(|| Arc::new(UipressShim::new(store.clone())));
		let http_client = http_client.into();
		let mapper = mapper.into();
		let settings = SettingsStore::new(store.clone());
		let lifecycle = TokenLifecycle::new(
			http_client.clone(),
			mapper.clone(),
			descriptor.clone(),
			strategy,
			config.redirect_uri,
			CredentialStore::new(store.clone(), shim),
			TransitGuard::new(store.clone()),
			settings.clone(),
		);

		Ok(Self {
			lifecycle,
			analytics: AnalyticsClient::new(http_client, mapper, descriptor),
			cache: ResponseCache::new(store),
			settings,
		})
	}

	/// Token lifecycle shared by every operation.
	pub fn lifecycle(&self) -> &TokenLifecycle<C, M> {
		&self.lifecycle
	}

	/// GA4 client used for reports and listings.
	pub fn analytics(&self) -> &AnalyticsClient<C, M> {
		&self.analytics
	}

	/// Report cache.
	pub fn cache(&self) -> &ResponseCache {
		&self.cache
	}

	/// Per-scope credential profiles.
	pub fn credentials(&self) -> &CredentialStore {
		&self.lifecycle.credentials
	}

	/// Builds the consent URL, or `None` when client credentials are missing.
	pub async fn authorization_url(&self, scope: Scope) -> Result<Option<Url>> {
		self.lifecycle.build_authorization_url(scope).await
	}

	/// Completes the OAuth callback and returns the stored profile.
	pub async fn handle_callback(
		&self,
		scope: Scope,
		code: Option<&str>,
		state: Option<&str>,
	) -> Result<CredentialProfile> {
		self.lifecycle.exchange_code(scope, code, state).await
	}

	/// Runs `query` for `scope` through the cache, refreshing the token first when due.
	pub async fn run_report(&self, scope: Scope, query: &ReportQuery) -> Result<ReportEnvelope> {
		let settings = self.settings.load().await?;
		let profile = self.lifecycle.ensure_fresh(scope).await?;
		let (property, token) = connection(&profile)?;
		let key = ReportCacheKey { property, query };
		let report = self
			.cache
			.get_or_fetch(CachePolicy::from(&settings), &key, query.end_date, || {
				self.analytics.run_report(property, token, query)
			})
			.await?;

		Ok(ReportEnvelope::connected(report, &profile))
	}

	/// Deletes every cached report.
	pub async fn clear_cache(&self) -> Result<usize> {
		self.cache.invalidate_all().await
	}

	/// Disconnects `scope`: revokes at Google when possible, then wipes the profile.
	///
	/// Revocation and cache cleanup are best effort.
	pub async fn deauthorize(&self, scope: Scope) -> Result<()> {
		let settings = self.settings.load().await?;
		let profile = self.lifecycle.credentials.get(scope, true).await?;

		if let Err(e) = self.lifecycle.revoke(&profile).await {
			obs::warn_degraded(settings.debug_mode, "revoke", &e);
		}

		self.lifecycle.credentials.delete(scope, false).await?;

		if let Err(e) = self.cache.invalidate_all().await {
			obs::warn_degraded(settings.debug_mode, "cache_clear", &e);
		}

		Ok(())
	}

	/// Binds `scope` to the chosen property.
	///
	/// A missing measurement id is looked up from the property's web data stream.
	pub async fn select_resource(
		&self,
		scope: Scope,
		choice: PropertyChoice,
	) -> Result<CredentialProfile> {
		let profile = self.tokened_profile(scope).await?;
		let measurement_id = match choice.measurement_id {
			Some(measurement_id) => measurement_id,
			None => self
				.analytics
				.web_measurement_id(access_token(&profile)?, &choice.property_id)
				.await?
				.ok_or_else(|| Error::Api {
					status: None,
					message: format!("Property {} has no web data stream.", choice.property_id),
				})?,
		};
		let mut updated = profile;

		updated.apply_selection(ResourceSelection {
			account_id: choice.account_id,
			property_id: choice.property_id,
			measurement_id,
			view_label: choice.view_label,
		});

		self.lifecycle.credentials.set(scope, updated).await
	}

	/// Lists the properties the connected account can report on.
	pub async fn list_properties(&self, scope: Scope) -> Result<Vec<PropertySummary>> {
		let profile = self.tokened_profile(scope).await?;

		self.analytics.list_properties(access_token(&profile)?).await
	}

	/// Checks with Google that the stored access token is still accepted.
	pub async fn verify_connection(&self, scope: Scope) -> Result<bool> {
		let profile = self.lifecycle.ensure_fresh(scope).await?;

		Ok(self.lifecycle.verify(&profile).await)
	}

	/// Summarizes the connection of `scope`.
	pub async fn auth_status(&self, scope: Scope) -> Result<AuthStatus> {
		let profile = self.lifecycle.credentials.get(scope, false).await?;
		let client_configured = self.lifecycle.client_credentials(&profile).await?.is_some();
		let missing = profile.missing_precondition();

		Ok(AuthStatus {
			authenticated: missing.is_none(),
			client_configured,
			missing,
			expires_at: profile.expires_at(),
			property_id: profile.reporting_property().cloned(),
			measurement_protocol_secret_set: profile
				.measurement_protocol_secret
				.as_ref()
				.is_some_and(|secret| !secret.is_empty()),
			manual_property_id: profile.manual_property_id,
			measurement_id: profile.measurement_id,
			view_label: profile.view_label,
			connection_time: profile.connection_time,
		})
	}

	/// Pins `property_id` on `scope`; it survives reconnects and stands in for a missing
	/// selection.
	pub async fn set_manual_property(
		&self,
		scope: Scope,
		property_id: PropertyId,
	) -> Result<CredentialProfile> {
		let mut profile = self.lifecycle.credentials.get(scope, true).await?;

		profile.manual_property_id = Some(property_id);

		self.lifecycle.credentials.set(scope, profile).await
	}

	/// Stores the Measurement Protocol API secret of `scope`; `None` or a blank secret
	/// clears it.
	pub async fn set_measurement_protocol_secret(
		&self,
		scope: Scope,
		secret: Option<Secret>,
	) -> Result<CredentialProfile> {
		let mut profile = self.lifecycle.credentials.get(scope, true).await?;

		profile.measurement_protocol_secret = secret.filter(|secret| !secret.is_empty());

		self.lifecycle.credentials.set(scope, profile).await
	}

	/// Persists operator settings; disabling the cache also empties it.
	pub async fn save_settings(&self, settings: Settings) -> Result<Settings> {
		let saved = self.settings.save(settings).await?;

		if !saved.cache_enabled() {
			self.cache.invalidate_all().await?;
		}

		Ok(saved)
	}

	/// Loads the operator settings.
	pub async fn load_settings(&self) -> Result<Settings> {
		self.settings.load().await
	}

	async fn tokened_profile(&self, scope: Scope) -> Result<CredentialProfile> {
		let profile = self.lifecycle.credentials.get(scope, true).await?;

		access_token(&profile)?;

		self.lifecycle.refresh_if_needed(scope, profile).await
	}
}
impl ReqwestBridge {
	/// Builds a bridge with its own reqwest transport bounded by the configured timeout.
	pub fn new(config: BridgeConfig, store: Arc<dyn OptionStore>) -> Result<Self> {
		let http_client = ReqwestHttpClient::with_timeout(config.request_timeout)?;

		Self::with_http_client(config, store, http_client, ReqwestTransportErrorMapper)
	}
}
impl<C, M> Clone for Bridge<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			lifecycle: self.lifecycle.clone(),
			analytics: self.analytics.clone(),
			cache: self.cache.clone(),
			settings: self.settings.clone(),
		}
	}
}
impl<C, M> Debug for Bridge<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Bridge")
			.field("lifecycle", &self.lifecycle)
			.field("analytics", &self.analytics)
			.finish()
	}
}
impl<C, M> DashboardAdapter for Bridge<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn provide_credential(&self, scope: Scope) -> AdapterFuture<'_, DashboardAccount> {
		Box::pin(async move {
			match self.lifecycle.credentials.get(scope, false).await {
				Ok(profile) => DashboardAccount::from_profile(&profile),
				Err(_) => DashboardAccount::default(),
			}
		})
	}

	fn provide_report_data(
		&self,
		scope: Scope,
		query: ReportQuery,
	) -> AdapterFuture<'_, ReportEnvelope> {
		Box::pin(async move {
			match self.run_report(scope, &query).await {
				Ok(envelope) => envelope,
				Err(Error::NotAuthenticated { .. }) => ReportEnvelope::no_data(),
				Err(e) => ReportEnvelope::failure(&e),
			}
		})
	}
}

fn access_token(profile: &CredentialProfile) -> Result<&Secret> {
	profile
		.access_token
		.as_ref()
		.filter(|token| !token.is_empty())
		.ok_or(Error::NotAuthenticated { missing: Precondition::AccessToken })
}

fn connection(profile: &CredentialProfile) -> Result<(&PropertyId, &Secret)> {
	let token = access_token(profile)?;
	let property = profile
		.reporting_property()
		.ok_or(Error::NotAuthenticated { missing: Precondition::Resource })?;

	Ok((property, token))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::*;

	#[test]
	fn config_defaults_to_fifteen_second_timeout() {
		let config = BridgeConfig::new(test_redirect_uri());

		assert_eq!(config.request_timeout.as_secs(), 15);
		assert!(config.descriptor.is_none());
		assert!(ReqwestBridge::new(config, Arc::new(crate::store::MemoryStore::default())).is_ok());
	}

	#[tokio::test]
	async fn unauthenticated_scope_degrades_to_no_data() {
		let (bridge, _) = build_reqwest_test_bridge(mock_descriptor("https://127.0.0.1:9")).await;
		let query = ReportQuery::new(
			time::macros::date!(2024 - 01 - 01),
			time::macros::date!(2024 - 01 - 31),
		);
		let envelope = bridge.provide_report_data(Scope::Site, query).await;

		assert_eq!(envelope, ReportEnvelope::no_data());
		assert_eq!(bridge.provide_credential(Scope::Site).await, DashboardAccount::default());

		let status = bridge.auth_status(Scope::Site).await.expect("Status should load.");

		assert!(!status.authenticated);
		assert!(status.client_configured);
		assert_eq!(status.missing, Some(Precondition::AccessToken));
	}
}
