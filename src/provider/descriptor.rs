//! Provider descriptor data structures shared by the token lifecycle and the query client.

/// Builder API for assembling provider descriptors.
pub mod builder;
/// Grant identifiers used in token requests and error contexts.
pub mod grant;

pub use builder::*;
pub use grant::*;

// self
use crate::{_prelude::*, auth::ProviderId};

const GOOGLE_AUTHORIZATION_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_TOKEN_INFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
const GOOGLE_REVOCATION_URL: &str = "https://oauth2.googleapis.com/revoke";
const GOOGLE_DATA_API_URL: &str = "https://analyticsdata.googleapis.com/v1beta/";
const GOOGLE_ADMIN_API_URL: &str = "https://analyticsadmin.googleapis.com/v1beta/";
/// Read-only Google Analytics scope requested during consent.
pub const ANALYTICS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/analytics.readonly";

/// Preferred client authentication modes for token endpoint calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
}

/// Endpoint set declared by a provider descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Consent screen the operator is redirected to.
	pub authorization: Url,
	/// Token endpoint used for code exchanges and refreshes.
	pub token: Url,
	/// Token introspection endpoint used by connection checks.
	pub token_info: Url,
	/// Optional revocation endpoint.
	pub revocation: Option<Url>,
	/// Base of the GA4 Data API; always ends with `/`.
	pub reporting: Url,
	/// Base of the GA4 Admin API; always ends with `/`.
	pub admin: Url,
}

/// Immutable provider descriptor consumed by flows and the analytics client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Descriptor identifier.
	pub id: ProviderId,
	/// Endpoint definitions exposed by the provider.
	pub endpoints: ProviderEndpoints,
	/// Scopes requested on the consent screen.
	pub scopes: Vec<String>,
	/// Preferred client authentication mechanism.
	pub preferred_client_auth_method: ClientAuthMethod,
}
impl ProviderDescriptor {
	/// Creates a new builder for the provided identifier.
	pub fn builder(id: ProviderId) -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::new(id)
	}

	/// Descriptor for Google's production OAuth and Analytics endpoints.
	pub fn google() -> Result<Self, ProviderDescriptorError> {
		let id = ProviderId::new("google")
			.map_err(|e| ProviderDescriptorError::InvalidIdentifier { message: e.to_string() })?;

		Self::builder(id)
			.authorization_endpoint(parse_fixed("authorization", GOOGLE_AUTHORIZATION_URL)?)
			.token_endpoint(parse_fixed("token", GOOGLE_TOKEN_URL)?)
			.token_info_endpoint(parse_fixed("token_info", GOOGLE_TOKEN_INFO_URL)?)
			.revocation_endpoint(parse_fixed("revocation", GOOGLE_REVOCATION_URL)?)
			.reporting_endpoint(parse_fixed("reporting", GOOGLE_DATA_API_URL)?)
			.admin_endpoint(parse_fixed("admin", GOOGLE_ADMIN_API_URL)?)
			.scope(ANALYTICS_READONLY_SCOPE)
			.preferred_client_auth_method(ClientAuthMethod::ClientSecretPost)
			.build()
	}

	/// Space-delimited scope string sent to the authorization endpoint.
	pub fn scope_param(&self) -> String {
		self.scopes.join(" ")
	}
}

fn parse_fixed(endpoint: &'static str, raw: &str) -> Result<Url, ProviderDescriptorError> {
	Url::parse(raw).map_err(|e| ProviderDescriptorError::InvalidEndpoint {
		endpoint,
		message: e.to_string(),
	})
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn google_descriptor_targets_production_hosts() {
		let descriptor = ProviderDescriptor::google().expect("Google descriptor should build.");

		assert_eq!(descriptor.endpoints.token.as_str(), GOOGLE_TOKEN_URL);
		assert_eq!(descriptor.endpoints.reporting.host_str(), Some("analyticsdata.googleapis.com"));
		assert_eq!(descriptor.scope_param(), ANALYTICS_READONLY_SCOPE);
		assert_eq!(descriptor.preferred_client_auth_method, ClientAuthMethod::ClientSecretPost);
	}
}
