//! OAuth token lifecycle orchestrated over the credential store and transit guard.

pub mod authorize;
pub mod refresh;
pub mod verify;

pub use refresh::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::CredentialProfile,
	credential::CredentialStore,
	http::TokenHttpClient,
	oauth::{BasicFacade, TransportErrorMapper},
	provider::{ProviderDescriptor, ProviderStrategy},
	settings::{ClientCredentials, SettingsStore},
	transit::TransitGuard,
};

/// Acquires, stores, refreshes, verifies, and revokes the Google tokens of each scope.
///
/// The lifecycle owns the HTTP client, provider descriptor, and strategy references plus the
/// persistence handles it writes through. Client credentials are resolved per call: the
/// operator settings win, otherwise the pair recorded in the profile applies.
pub struct TokenLifecycle<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound provider request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Provider descriptor that defines the OAuth endpoints and scopes.
	pub descriptor: ProviderDescriptor,
	/// Strategy responsible for consent URL parameters and error classification.
	pub strategy: Arc<dyn ProviderStrategy>,
	/// Redirect URI registered with the OAuth client.
	pub redirect_uri: Url,
	/// Per-scope credential profiles.
	pub credentials: CredentialStore,
	/// Per-scope transit tokens used as the OAuth `state`.
	pub transit: TransitGuard,
	/// Operator settings holding the fallback client credentials.
	pub settings: SettingsStore,
	/// Shared recorder for refresh outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
}
impl<C, M> TokenLifecycle<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Assembles a lifecycle over the provided transport and persistence handles.
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		http_client: Arc<C>,
		transport_mapper: Arc<M>,
		descriptor: ProviderDescriptor,
		strategy: Arc<dyn ProviderStrategy>,
		redirect_uri: Url,
		credentials: CredentialStore,
		transit: TransitGuard,
		settings: SettingsStore,
	) -> Self {
		Self {
			http_client,
			transport_mapper,
			descriptor,
			strategy,
			redirect_uri,
			credentials,
			transit,
			settings,
			refresh_metrics: Default::default(),
		}
	}

	/// Resolves the client credentials to use for `profile`.
	pub async fn client_credentials(
		&self,
		profile: &CredentialProfile,
	) -> Result<Option<ClientCredentials>> {
		if let Some(configured) = self.settings.load().await?.client_credentials() {
			return Ok(Some(configured));
		}

		let recorded = profile
			.client_id
			.as_deref()
			.filter(|id| !id.is_empty())
			.zip(profile.client_secret.as_ref().filter(|secret| !secret.is_empty()))
			.map(|(client_id, client_secret)| ClientCredentials {
				client_id: client_id.to_owned(),
				client_secret: client_secret.clone(),
			});

		Ok(recorded)
	}

	fn facade(&self, credentials: &ClientCredentials) -> Result<BasicFacade<C, M>> {
		BasicFacade::from_descriptor(
			&self.descriptor,
			credentials,
			self.http_client.clone(),
			self.transport_mapper.clone(),
		)
	}
}
impl<C, M> Clone for TokenLifecycle<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			transport_mapper: self.transport_mapper.clone(),
			descriptor: self.descriptor.clone(),
			strategy: self.strategy.clone(),
			redirect_uri: self.redirect_uri.clone(),
			credentials: self.credentials.clone(),
			transit: self.transit.clone(),
			settings: self.settings.clone(),
			refresh_metrics: self.refresh_metrics.clone(),
		}
	}
}
impl<C, M> Debug for TokenLifecycle<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenLifecycle")
			.field("descriptor", &self.descriptor.id)
			.field("redirect_uri", &self.redirect_uri.as_str())
			.finish()
	}
}
