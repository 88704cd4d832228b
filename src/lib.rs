//! Google Analytics 4 bridge for UIPress dashboards: OAuth token lifecycle, transit-token guarded
//! callbacks, and recency-tiered report caching behind one explicit application context.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod analytics;
pub mod auth;
pub mod bridge;
pub mod cache;
pub mod compat;
pub mod credential;
pub mod error;
pub mod flows;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod provider;
pub mod router;
pub mod settings;
pub mod store;
pub mod transit;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{ProviderId, Secret},
		bridge::{BridgeConfig, ReqwestBridge},
		http::ReqwestHttpClient,
		oauth::ReqwestTransportErrorMapper,
		provider::ProviderDescriptor,
		settings::{Settings, SettingsStore},
		store::{MemoryStore, OptionStore},
	};

	/// OAuth client identifier seeded into test settings.
	pub const TEST_CLIENT_ID: &str = "bridge-client";
	/// OAuth client secret seeded into test settings.
	pub const TEST_CLIENT_SECRET: &str = "bridge-secret";

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Describes a Google-shaped provider whose endpoints all live under `base_url`.
	pub fn mock_descriptor(base_url: &str) -> ProviderDescriptor {
		let endpoint = |path: &str| {
			Url::parse(&format!("{base_url}{path}"))
				.expect("Mock endpoint URL should parse successfully.")
		};

		ProviderDescriptor::builder(
			ProviderId::new("mock-google").expect("Mock provider identifier should be valid."),
		)
		.authorization_endpoint(endpoint("/o/oauth2/v2/auth"))
		.token_endpoint(endpoint("/token"))
		.token_info_endpoint(endpoint("/tokeninfo"))
		.revocation_endpoint(endpoint("/revoke"))
		.reporting_endpoint(endpoint("/data/v1beta/"))
		.admin_endpoint(endpoint("/admin/v1beta/"))
		.scope("https://www.googleapis.com/auth/analytics.readonly")
		.build()
		.expect("Mock provider descriptor should build successfully.")
	}

	/// Redirect URI registered for the test OAuth client.
	pub fn test_redirect_uri() -> Url {
		Url::parse("https://dashboard.example.com/wp-admin/admin.php?page=uip-analytics-bridge")
			.expect("Test redirect URI should parse successfully.")
	}

	/// Persists settings carrying the test client credentials.
	pub async fn seed_client_settings(store: &Arc<MemoryStore>) {
		let store: Arc<dyn OptionStore> = store.clone();
		let settings = Settings {
			client_id: Some(TEST_CLIENT_ID.into()),
			client_secret: Some(Secret::new(TEST_CLIENT_SECRET)),
			..Default::default()
		};

		SettingsStore::new(store)
			.save(settings)
			.await
			.expect("Failed to seed client settings into the store.");
	}

	/// Constructs a [`ReqwestBridge`] backed by an in-memory store seeded with client settings
	/// and the insecure reqwest transport used across integration tests.
	pub async fn build_reqwest_test_bridge(
		descriptor: ProviderDescriptor,
	) -> (ReqwestBridge, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());

		seed_client_settings(&store_backend).await;

		let store: Arc<dyn OptionStore> = store_backend.clone();
		let config = BridgeConfig::new(test_redirect_uri()).with_descriptor(descriptor);
		let bridge = ReqwestBridge::with_http_client(
			config,
			store,
			test_reqwest_http_client(),
			ReqwestTransportErrorMapper,
		)
		.expect("Test bridge should assemble successfully.");

		(bridge, store_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use serde_json::Value as JsonValue;
	pub use thiserror::Error as ThisError;
	pub use time::{Date, Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
