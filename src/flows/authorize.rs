//! Consent URL construction and the authorization code exchange behind the OAuth callback.

// self
use crate::{
	_prelude::*,
	auth::{CredentialProfile, Scope},
	flows::TokenLifecycle,
	http::TokenHttpClient,
	oauth::{OAuth2Facade, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl<C, M> TokenLifecycle<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds the consent URL for `scope`, embedding the live transit token as `state`.
	///
	/// Returns `None` when no client credentials are configured.
	pub async fn build_authorization_url(&self, scope: Scope) -> Result<Option<Url>> {
		const KIND: FlowKind = FlowKind::AuthorizationUrl;

		let span = FlowSpan::new(KIND, "build_authorization_url");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result: Result<Option<Url>> = span
			.instrument(async move {
				let profile = self.credentials.get(scope, false).await?;
				let Some(credentials) = self.client_credentials(&profile).await? else {
					return Ok(None);
				};
				let state = self.transit.issue(scope).await?;
				let mut params = BTreeMap::from([
					("response_type".to_owned(), "code".to_owned()),
					("client_id".to_owned(), credentials.client_id),
					("redirect_uri".to_owned(), self.redirect_uri.to_string()),
					("scope".to_owned(), self.descriptor.scope_param()),
					("state".to_owned(), state.expose().to_owned()),
				]);

				self.strategy.augment_authorization_request(&mut params);

				let mut url = self.descriptor.endpoints.authorization.clone();

				url.query_pairs_mut().extend_pairs(params.iter());

				Ok(Some(url))
			})
			.await;

		obs::record_flow_result(KIND, &result);

		result
	}

	/// Completes the OAuth callback for `scope`.
	///
	/// The `state` is checked against the live transit token before anything else and a
	/// mismatch is never retried. On success a fresh profile replaces the stored one, keeping
	/// only the pinned property and the measurement-protocol secret, and the transit token is
	/// rotated. Failures leave the stored profile untouched.
	pub async fn exchange_code(
		&self,
		scope: Scope,
		code: Option<&str>,
		state: Option<&str>,
	) -> Result<CredentialProfile> {
		const KIND: FlowKind = FlowKind::CodeExchange;

		let span = FlowSpan::new(KIND, "exchange_code");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result: Result<CredentialProfile> = span
			.instrument(async move {
				if !self.transit.validate(scope, state.unwrap_or_default()).await {
					return Err(Error::InvalidState);
				}

				let code = code.filter(|code| !code.is_empty()).ok_or(Error::MissingCode)?;
				let current = self.credentials.get(scope, true).await?;
				let credentials =
					self.client_credentials(&current).await?.ok_or(Error::MissingCredentials)?;
				let grant = self
					.facade(&credentials)?
					.exchange_authorization_code(self.strategy.as_ref(), code, &self.redirect_uri)
					.await?;
				let mut profile = CredentialProfile {
					client_id: Some(credentials.client_id),
					client_secret: Some(credentials.client_secret),
					manual_property_id: current.manual_property_id,
					measurement_protocol_secret: current.measurement_protocol_secret,
					..Default::default()
				};

				profile.apply_grant(grant);

				let stored = self.credentials.set(scope, profile).await?;

				self.transit.rotate(scope).await?;

				Ok(stored)
			})
			.await;

		obs::record_flow_result(KIND, &result);

		result
	}
}
