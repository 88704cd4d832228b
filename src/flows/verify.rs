//! Token introspection and best-effort revocation.

// crates.io
use oauth2::http::Method;
// self
use crate::{
	_prelude::*,
	auth::CredentialProfile,
	flows::TokenLifecycle,
	http::{self, Endpoint, TokenHttpClient},
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl<C, M> TokenLifecycle<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Asks the token-info endpoint whether the profile's access token is still accepted.
	///
	/// Read-only and never fails: any transport problem or non-200 answer reads as `false`.
	pub async fn verify(&self, profile: &CredentialProfile) -> bool {
		const KIND: FlowKind = FlowKind::Verify;

		let Some(token) = profile.access_token.as_ref().filter(|token| !token.is_empty()) else {
			return false;
		};
		let span = FlowSpan::new(KIND, "verify");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result: Result<bool> = span
			.instrument(async move {
				let mut url = self.descriptor.endpoints.token_info.clone();

				url.query_pairs_mut().append_pair("access_token", token.expose());

				let request = http::json_request(Method::GET, &url, None, None)?;
				let exchange = http::dispatch(
					self.http_client.as_ref(),
					self.transport_mapper.as_ref(),
					Endpoint::TokenInfo,
					request,
				)
				.await?;

				Ok(exchange.status() == 200)
			})
			.await;

		obs::record_flow_result(KIND, &result);

		result.unwrap_or(false)
	}

	/// Revokes the profile's refresh token, or its access token when no refresh token exists.
	///
	/// Does nothing when the descriptor has no revocation endpoint or the profile holds no
	/// token.
	pub async fn revoke(&self, profile: &CredentialProfile) -> Result<()> {
		const KIND: FlowKind = FlowKind::Revoke;

		let Some(endpoint) = self.descriptor.endpoints.revocation.as_ref() else {
			return Ok(());
		};
		let Some(token) = profile
			.refresh_token
			.as_ref()
			.filter(|token| !token.is_empty())
			.or_else(|| profile.access_token.as_ref().filter(|token| !token.is_empty()))
		else {
			return Ok(());
		};
		let span = FlowSpan::new(KIND, "revoke");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let request = http::form_request(endpoint, &[("token", token.expose())])?;
				let exchange = http::dispatch(
					self.http_client.as_ref(),
					self.transport_mapper.as_ref(),
					Endpoint::Revocation,
					request,
				)
				.await?;

				if exchange.is_success() {
					Ok(())
				} else {
					Err(exchange.upstream_failure(format!(
						"Revocation returned status code: {}",
						exchange.status()
					)))
				}
			})
			.await;

		obs::record_flow_result(KIND, &result);

		result
	}
}
