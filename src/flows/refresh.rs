//! Refresh decision and `grant_type=refresh_token` rotation for stored profiles.
//!
//! Every analytics query goes through [`TokenLifecycle::ensure_fresh`], which loads the
//! scope's profile, refreshes it inline when the access token is inside the expiry margin,
//! and hands back the profile whose token must be used. There is no locking: two concurrent
//! refreshes both succeed and the last write wins.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{CredentialProfile, Scope},
	error::ConfigError,
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
	/// Returns true when `profile` must be refreshed before use right now.
	pub fn needs_refresh(&self, profile: &CredentialProfile) -> bool {
		profile.needs_refresh_at(OffsetDateTime::now_utc())
	}

	/// Exchanges the stored refresh token for a new access token and persists the result.
	///
	/// Failures are wrapped in [`Error::TokenRefresh`] whose disposition tells transient
	/// problems apart from provider rejections. The stored profile is untouched on failure.
	pub async fn refresh(
		&self,
		scope: Scope,
		profile: CredentialProfile,
	) -> Result<CredentialProfile> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.refresh_metrics.record_attempt();

		let result = span
			.instrument(async move {
				let refresh_token = profile
					.refresh_token
					.clone()
					.filter(|secret| !secret.is_empty())
					.ok_or(ConfigError::MissingRefreshToken)?;
				let credentials =
					self.client_credentials(&profile).await?.ok_or(Error::MissingCredentials)?;
				let grant = self
					.facade(&credentials)?
					.refresh_token(self.strategy.as_ref(), &refresh_token)
					.await?;
				let mut updated = profile;

				updated.apply_grant(grant);

				self.credentials.set(scope, updated).await
			})
			.await
			.map_err(Error::into_refresh_failure);

		self.refresh_metrics.record_result(&result);
		obs::record_flow_result(KIND, &result);

		result
	}

	/// Loads the profile of `scope` and refreshes it first when needed.
	///
	/// Fails with [`Error::NotAuthenticated`] when the scope has no access token or no
	/// selected property.
	pub async fn ensure_fresh(&self, scope: Scope) -> Result<CredentialProfile> {
		let profile = self.credentials.get(scope, false).await?;

		if let Some(missing) = profile.missing_precondition() {
			return Err(Error::NotAuthenticated { missing });
		}

		self.refresh_if_needed(scope, profile).await
	}

	/// Refreshes `profile` when its access token is inside the expiry margin.
	///
	/// An expiring token without a refresh token is never handed out; the attempt fails with
	/// a [`RefreshDisposition::Reauthenticate`](crate::error::RefreshDisposition) instead.
	pub async fn refresh_if_needed(
		&self,
		scope: Scope,
		profile: CredentialProfile,
	) -> Result<CredentialProfile> {
		let now = OffsetDateTime::now_utc();

		if profile.needs_refresh_at(now) || profile.is_expiring_at(now) {
			self.refresh(scope, profile).await
		} else {
			Ok(profile)
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::*,
		auth::{PropertyId, Secret},
		error::{Precondition, RefreshDisposition},
	};

	const UNREACHABLE: &str = "https://127.0.0.1:9";

	#[tokio::test]
	async fn ensure_fresh_names_the_missing_precondition() {
		let (bridge, _) = build_reqwest_test_bridge(mock_descriptor(UNREACHABLE)).await;
		let lifecycle = bridge.lifecycle();
		let err = lifecycle
			.ensure_fresh(Scope::Site)
			.await
			.expect_err("Empty profile must not be usable.");

		assert!(matches!(err, Error::NotAuthenticated { missing: Precondition::AccessToken }));

		lifecycle
			.credentials
			.set(
				Scope::Site,
				CredentialProfile {
					access_token: Some(Secret::new("ya29.live")),
					..Default::default()
				},
			)
			.await
			.expect("Seeding the profile should succeed.");

		let err = lifecycle
			.ensure_fresh(Scope::Site)
			.await
			.expect_err("Profile without a property must not be usable.");

		assert!(matches!(err, Error::NotAuthenticated { missing: Precondition::Resource }));
	}

	#[tokio::test]
	async fn fresh_tokens_skip_the_network() {
		let (bridge, _) = build_reqwest_test_bridge(mock_descriptor(UNREACHABLE)).await;
		let lifecycle = bridge.lifecycle();
		let profile = CredentialProfile {
			access_token: Some(Secret::new("ya29.live")),
			refresh_token: Some(Secret::new("1//refresh")),
			token_created: Some(OffsetDateTime::now_utc().unix_timestamp() - 100),
			expires_in: Some(3600),
			property_id: Some(PropertyId::new("998877").expect("Property id should be valid.")),
			..Default::default()
		};

		lifecycle.credentials.set(Scope::Site, profile).await.expect("Seeding should succeed.");

		let fresh = lifecycle.ensure_fresh(Scope::Site).await.expect("Fresh profile is usable.");

		assert_eq!(fresh.access_token.as_ref().map(Secret::expose), Some("ya29.live"));
		assert_eq!(lifecycle.refresh_metrics.attempts(), 0);
	}

	#[tokio::test]
	async fn refresh_without_refresh_token_requires_reconnect() {
		let (bridge, _) = build_reqwest_test_bridge(mock_descriptor(UNREACHABLE)).await;
		let lifecycle = bridge.lifecycle();
		let err = lifecycle
			.refresh(Scope::Site, CredentialProfile::default())
			.await
			.expect_err("Refresh must fail without a refresh token.");

		assert!(matches!(
			err,
			Error::TokenRefresh { disposition: RefreshDisposition::Reauthenticate, .. }
		));
		assert_eq!(lifecycle.refresh_metrics.reauthentications(), 1);
	}

	#[tokio::test]
	async fn expired_tokens_without_refresh_token_are_never_used() {
		let (bridge, _) = build_reqwest_test_bridge(mock_descriptor(UNREACHABLE)).await;
		let lifecycle = bridge.lifecycle();
		let profile = CredentialProfile {
			access_token: Some(Secret::new("ya29.expired")),
			token_created: Some(OffsetDateTime::now_utc().unix_timestamp() - 4000),
			expires_in: Some(3600),
			property_id: Some(PropertyId::new("998877").expect("Property id should be valid.")),
			..Default::default()
		};

		lifecycle.credentials.set(Scope::Site, profile).await.expect("Seeding should succeed.");

		let err = lifecycle
			.ensure_fresh(Scope::Site)
			.await
			.expect_err("An expired token must not be handed out.");

		assert!(matches!(
			err,
			Error::TokenRefresh { disposition: RefreshDisposition::Reauthenticate, .. }
		));
		assert_eq!(err.code().as_str(), "token_refresh_error");
	}
}
