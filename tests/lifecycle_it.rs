#![cfg(feature = "test")]

// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use uipress_analytics_bridge::{
	_preludet::*,
	auth::{CredentialProfile, MeasurementId, PropertyId, Scope, Secret},
	compat::DASHBOARD_STATUS_OPTION,
	error::RefreshDisposition,
};

fn token_body(access: &str, refresh: Option<&str>, expires_in: i64) -> String {
	let mut body = json!({
		"access_token": access,
		"token_type": "Bearer",
		"expires_in": expires_in,
		"scope": "https://www.googleapis.com/auth/analytics.readonly",
	});

	if let Some(refresh) = refresh {
		body["refresh_token"] = json!(refresh);
	}

	body.to_string()
}

fn connected_profile(access: &str, refresh: &str, age_secs: i64) -> CredentialProfile {
	CredentialProfile {
		access_token: Some(Secret::new(access)),
		refresh_token: Some(Secret::new(refresh)),
		token_created: Some(OffsetDateTime::now_utc().unix_timestamp() - age_secs),
		expires_in: Some(3600),
		property_id: Some(PropertyId::new("998877").expect("Property fixture should be valid.")),
		measurement_id: Some(
			MeasurementId::new("G-BRIDGE1").expect("Measurement fixture should be valid."),
		),
		..Default::default()
	}
}

#[tokio::test]
async fn authorize_then_callback_connects_the_scope() {
	let server = MockServer::start_async().await;
	let (bridge, _store) = build_reqwest_test_bridge(mock_descriptor(&server.url(""))).await;
	let url = bridge
		.authorization_url(Scope::Site)
		.await
		.expect("Consent URL should build.")
		.expect("Seeded client credentials should yield a consent URL.");
	let query = url.query_pairs().into_owned().collect::<BTreeMap<_, _>>();

	assert_eq!(url.path(), "/o/oauth2/v2/auth");
	assert_eq!(query.get("client_id").map(String::as_str), Some(TEST_CLIENT_ID));
	assert_eq!(query.get("access_type").map(String::as_str), Some("offline"));
	assert_eq!(query.get("prompt").map(String::as_str), Some("consent"));
	assert_eq!(
		query.get("redirect_uri").map(String::as_str),
		Some(test_redirect_uri().as_str())
	);

	let state = query.get("state").cloned().expect("Consent URL should carry the state.");
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.header("content-type", "application/x-www-form-urlencoded");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("ya29.fresh", Some("1//fresh"), 3599));
		})
		.await;
	let profile = bridge
		.handle_callback(Scope::Site, Some("4/0AbCd"), Some(&state))
		.await
		.expect("Callback with the issued state should succeed.");

	mock.assert_async().await;

	let now = OffsetDateTime::now_utc().unix_timestamp();

	assert_eq!(profile.access_token.as_ref().map(Secret::expose), Some("ya29.fresh"));
	assert_eq!(profile.refresh_token.as_ref().map(Secret::expose), Some("1//fresh"));
	assert_eq!(profile.expires_in, Some(3599));
	assert!(profile.token_created.is_some_and(|created| (now - created).abs() <= 1));
	assert!(!profile.is_authenticated(), "A property must still be selected.");

	let replay = bridge
		.handle_callback(Scope::Site, Some("4/0AbCd"), Some(&state))
		.await
		.expect_err("A consumed state must not be accepted twice.");

	assert!(matches!(replay, Error::InvalidState));

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn callback_failures_leave_the_profile_untouched() {
	let server = MockServer::start_async().await;
	let (bridge, _store) = build_reqwest_test_bridge(mock_descriptor(&server.url(""))).await;

	bridge
		.credentials()
		.set(Scope::Site, connected_profile("ya29.old", "1//old", 60))
		.await
		.expect("Seeding the profile should succeed.");

	let url = bridge
		.authorization_url(Scope::Site)
		.await
		.expect("Consent URL should build.")
		.expect("Seeded client credentials should yield a consent URL.");
	let state = url
		.query_pairs()
		.find(|(key, _)| key == "state")
		.map(|(_, value)| value.into_owned())
		.expect("Consent URL should carry the state.");
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\",\"error_description\":\"Bad Request\"}");
		})
		.await;
	let missing_code = bridge
		.handle_callback(Scope::Site, None, Some(&state))
		.await
		.expect_err("A callback without a code must fail.");

	assert!(matches!(missing_code, Error::MissingCode));

	let rejected = bridge
		.handle_callback(Scope::Site, Some("4/expired"), Some(&state))
		.await
		.expect_err("A rejected code must fail.");

	assert!(matches!(rejected, Error::InvalidGrant { .. }));

	mock.assert_calls_async(1).await;

	let stored =
		bridge.credentials().get(Scope::Site, true).await.expect("Profile read should succeed.");

	assert_eq!(stored.access_token.as_ref().map(Secret::expose), Some("ya29.old"));
}

#[tokio::test]
async fn expiring_tokens_refresh_and_keep_the_refresh_token() {
	let server = MockServer::start_async().await;
	let (bridge, _store) = build_reqwest_test_bridge(mock_descriptor(&server.url(""))).await;

	bridge
		.credentials()
		.set(Scope::Site, connected_profile("ya29.stale", "1//keep", 3590))
		.await
		.expect("Seeding the profile should succeed.");

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("ya29.rotated", None, 3599));
		})
		.await;
	let lifecycle = bridge.lifecycle();
	let profile = lifecycle.ensure_fresh(Scope::Site).await.expect("Refresh should succeed.");

	mock.assert_async().await;

	assert_eq!(profile.access_token.as_ref().map(Secret::expose), Some("ya29.rotated"));
	assert_eq!(profile.refresh_token.as_ref().map(Secret::expose), Some("1//keep"));
	assert!(!lifecycle.needs_refresh(&profile));
	assert_eq!(lifecycle.refresh_metrics.successes(), 1);

	let stored =
		bridge.credentials().get(Scope::Site, true).await.expect("Profile read should succeed.");

	assert_eq!(stored.access_token.as_ref().map(Secret::expose), Some("ya29.rotated"));
	assert_eq!(stored.refresh_token.as_ref().map(Secret::expose), Some("1//keep"));
}

#[tokio::test]
async fn revoked_refresh_tokens_require_reconnecting() {
	let server = MockServer::start_async().await;
	let (bridge, _store) = build_reqwest_test_bridge(mock_descriptor(&server.url(""))).await;

	bridge
		.credentials()
		.set(Scope::Network, connected_profile("ya29.stale", "1//revoked", 7200))
		.await
		.expect("Seeding the profile should succeed.");

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400).header("content-type", "application/json").body(
				"{\"error\":\"invalid_grant\",\"error_description\":\"Token has been expired or revoked.\"}",
			);
		})
		.await;

	let err = bridge
		.lifecycle()
		.ensure_fresh(Scope::Network)
		.await
		.expect_err("A revoked refresh token must fail.");

	assert!(matches!(
		err,
		Error::TokenRefresh { disposition: RefreshDisposition::Reauthenticate, .. }
	));
	assert!(!err.is_retryable());

	let stored =
		bridge.credentials().get(Scope::Network, true).await.expect("Profile read should succeed.");

	assert_eq!(stored.access_token.as_ref().map(Secret::expose), Some("ya29.stale"));
}

#[tokio::test]
async fn upstream_outages_during_refresh_are_retryable() {
	let server = MockServer::start_async().await;
	let (bridge, _store) = build_reqwest_test_bridge(mock_descriptor(&server.url(""))).await;

	bridge
		.credentials()
		.set(Scope::Site, connected_profile("ya29.stale", "1//keep", 7200))
		.await
		.expect("Seeding the profile should succeed.");

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(503)
				.header("content-type", "application/json")
				.body("{\"error\":\"temporarily_unavailable\"}");
		})
		.await;

	let err = bridge
		.lifecycle()
		.ensure_fresh(Scope::Site)
		.await
		.expect_err("An unavailable token endpoint must fail the refresh.");

	assert!(matches!(err, Error::TokenRefresh { disposition: RefreshDisposition::Retry, .. }));
	assert!(err.is_retryable());
	assert_eq!(bridge.lifecycle().refresh_metrics.retryable_failures(), 1);
}

#[tokio::test]
async fn verification_reads_the_token_info_status() {
	let server = MockServer::start_async().await;
	let (bridge, _store) = build_reqwest_test_bridge(mock_descriptor(&server.url(""))).await;
	let accepted = server
		.mock_async(|when, then| {
			when.method(GET).path("/tokeninfo").query_param("access_token", "ya29.live");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"expires_in\":\"3500\"}");
		})
		.await;
	let rejected = server
		.mock_async(|when, then| {
			when.method(GET).path("/tokeninfo").query_param("access_token", "ya29.dead");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error_description\":\"Invalid Value\"}");
		})
		.await;

	bridge
		.credentials()
		.set(Scope::Site, connected_profile("ya29.live", "1//keep", 60))
		.await
		.expect("Seeding the profile should succeed.");

	assert!(bridge.verify_connection(Scope::Site).await.expect("Verification should run."));

	accepted.assert_async().await;

	let dead = connected_profile("ya29.dead", "1//keep", 60);

	assert!(!bridge.lifecycle().verify(&dead).await);
	assert!(!bridge.lifecycle().verify(&CredentialProfile::default()).await);

	rejected.assert_async().await;
}

#[tokio::test]
async fn deauthorize_revokes_and_clears_the_dashboard_mirror() {
	let server = MockServer::start_async().await;
	let (bridge, store) = build_reqwest_test_bridge(mock_descriptor(&server.url(""))).await;
	let revoke = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/revoke")
				.header("content-type", "application/x-www-form-urlencoded");
			then.status(200);
		})
		.await;

	bridge
		.credentials()
		.set(Scope::Site, connected_profile("ya29.live", "1//keep", 60))
		.await
		.expect("Seeding the profile should succeed.");

	assert_eq!(store.raw(DASHBOARD_STATUS_OPTION), Some(json!("connected")));

	bridge.deauthorize(Scope::Site).await.expect("Deauthorization should succeed.");

	revoke.assert_async().await;

	let stored =
		bridge.credentials().get(Scope::Site, true).await.expect("Profile read should succeed.");

	assert!(stored.is_empty());
	assert_eq!(store.raw(DASHBOARD_STATUS_OPTION), Some(json!("")));
}

#[tokio::test]
async fn failed_revocation_still_disconnects() {
	let server = MockServer::start_async().await;
	let (bridge, _store) = build_reqwest_test_bridge(mock_descriptor(&server.url(""))).await;
	let revoke = server
		.mock_async(|when, then| {
			when.method(POST).path("/revoke");
			then.status(500);
		})
		.await;

	bridge
		.credentials()
		.set(Scope::Site, connected_profile("ya29.live", "1//keep", 60))
		.await
		.expect("Seeding the profile should succeed.");

	let profile =
		bridge.credentials().get(Scope::Site, true).await.expect("Profile read should succeed.");

	assert!(bridge.lifecycle().revoke(&profile).await.is_err());

	bridge.deauthorize(Scope::Site).await.expect("Deauthorization should not need Google.");

	revoke.assert_calls_async(2).await;

	assert!(
		!bridge.credentials().is_authenticated(Scope::Site).await.expect("Read should succeed.")
	);
}
