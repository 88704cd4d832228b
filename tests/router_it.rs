#![cfg(feature = "test")]

// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use uipress_analytics_bridge::{
	_preludet::*,
	auth::Scope,
	router::{Params, Router},
};

fn params(pairs: &[(&str, &str)]) -> Params {
	pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect()
}

#[tokio::test]
async fn dashboard_connects_selects_and_reports_through_the_router() {
	let server = MockServer::start_async().await;
	let (bridge, _store) = build_reqwest_test_bridge(mock_descriptor(&server.url(""))).await;
	let router = Router::new(bridge);

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"ya29.router\",\"refresh_token\":\"1//router\",\"token_type\":\"Bearer\",\"expires_in\":3599}",
			);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/admin/v1beta/properties/4242/dataStreams");
			then.status(200).header("content-type", "application/json").body(
				json!({
					"dataStreams": [{
						"type": "WEB_DATA_STREAM",
						"webStreamData": { "measurementId": "G-ROUTER" }
					}]
				})
				.to_string(),
			);
		})
		.await;

	let report = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/data/v1beta/properties/4242:runReport")
				.header("authorization", "Bearer ya29.router");
			then.status(200).header("content-type", "application/json").body(
				json!({
					"dimensionHeaders": [{ "name": "date" }],
					"metricHeaders": [
						{ "name": "activeUsers" },
						{ "name": "sessions" },
						{ "name": "screenPageViews" }
					],
					"rows": [{
						"dimensionValues": [{ "value": "20240610" }],
						"metricValues": [{ "value": "2" }, { "value": "3" }, { "value": "5" }]
					}]
				})
				.to_string(),
			);
		})
		.await;
	let reply = router.dispatch("authorization_url", &params(&[])).await;

	assert!(reply.success, "{reply:?}");

	let url = Url::parse(reply.data["url"].as_str().expect("Reply should carry the URL."))
		.expect("Consent URL should parse.");
	let state = url
		.query_pairs()
		.find(|(key, _)| key == "state")
		.map(|(_, value)| value.into_owned())
		.expect("Consent URL should carry the state.");
	let reply = router
		.dispatch("oauth_callback", &params(&[("code", "4/0Router"), ("state", &state)]))
		.await;

	assert!(reply.success, "{reply:?}");
	assert_eq!(reply.data["needs_property"], json!(true));

	let reply = router
		.dispatch(
			"select_resource",
			&params(&[("account_id", "accounts/7"), ("property_id", "properties/4242")]),
		)
		.await;

	assert!(reply.success, "{reply:?}");
	assert_eq!(reply.data["measurement_id"], json!("G-ROUTER"));

	let range = [("startDate", "2024-06-01"), ("endDate", "2024-06-10")];
	let first = router.dispatch("run_report", &params(&range)).await;
	let second = router.dispatch("run_report", &params(&range)).await;

	assert!(first.success, "{first:?}");
	assert_eq!(first.data, second.data);
	assert_eq!(first.data["totalStats"]["pageviews"], json!(5));
	assert_eq!(first.data["google_account"]["code"], json!("G-ROUTER"));
	assert_eq!(first.data["gafour"], json!(true));

	report.assert_calls_async(1).await;

	let status = router.dispatch("auth_status", &params(&[])).await;

	assert_eq!(status.data["authenticated"], json!(true));
	assert!(!status.data.to_string().contains("ya29.router"));

	let network = router.dispatch("auth_status", &params(&[("network", "network")])).await;

	assert_eq!(network.data["authenticated"], json!(false));
	assert!(router.bridge().credentials().is_authenticated(Scope::Site).await.unwrap_or(false));
}

#[tokio::test]
async fn malformed_parameters_are_rejected_at_the_boundary() {
	let (bridge, _store) = build_reqwest_test_bridge(mock_descriptor("https://127.0.0.1:9")).await;
	let router = Router::new(bridge);
	let bad_date = router.dispatch("run_report", &params(&[("endDate", "yesterday")])).await;
	let bad_property = router
		.dispatch("select_resource", &params(&[("account_id", "7"), ("property_id", "4 2")]))
		.await;
	let bad_scope = router.dispatch("auth_status", &params(&[("network", "galaxy")])).await;

	for reply in [bad_date, bad_property, bad_scope] {
		assert!(!reply.success);
		assert!(!reply.fatal);
		assert_eq!(reply.error_type(), Some("invalid_request"));
	}
}
