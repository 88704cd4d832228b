// self
use crate::{
	_prelude::*,
	auth::ProviderId,
	provider::{ClientAuthMethod, ProviderDescriptor, ProviderEndpoints},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ProviderDescriptorError {
	/// A required endpoint was not configured.
	#[error("Missing {endpoint} endpoint.")]
	MissingEndpoint {
		/// Which endpoint is missing.
		endpoint: &'static str,
	},
	/// At least one scope must be requested.
	#[error("Descriptor must request at least one scope.")]
	NoScopes,
	/// Endpoints must use HTTPS.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// A built-in endpoint URL could not be parsed.
	#[error("The {endpoint} endpoint is not a valid URL: {message}.")]
	InvalidEndpoint {
		/// Which endpoint failed to parse.
		endpoint: &'static str,
		/// Parser message.
		message: String,
	},
	/// The descriptor identifier failed validation.
	#[error("Provider identifier is invalid: {message}.")]
	InvalidIdentifier {
		/// Validation message.
		message: String,
	},
}

/// Builder for [`ProviderDescriptor`] values.
#[derive(Debug)]
pub struct ProviderDescriptorBuilder {
	/// Identifier for the descriptor being constructed.
	pub id: ProviderId,
	/// Consent screen endpoint.
	pub authorization_endpoint: Option<Url>,
	/// Token endpoint used for exchanges and refreshes.
	pub token_endpoint: Option<Url>,
	/// Token introspection endpoint.
	pub token_info_endpoint: Option<Url>,
	/// Optional revocation endpoint.
	pub revocation_endpoint: Option<Url>,
	/// Data API base.
	pub reporting_endpoint: Option<Url>,
	/// Admin API base.
	pub admin_endpoint: Option<Url>,
	/// Scopes requested on the consent screen.
	pub scopes: Vec<String>,
	/// Preferred client authentication method for the token endpoint.
	pub preferred_client_auth_method: ClientAuthMethod,
}
impl ProviderDescriptorBuilder {
	/// Creates a new builder seeded with the provided identifier.
	pub fn new(id: ProviderId) -> Self {
		Self {
			id,
			authorization_endpoint: None,
			token_endpoint: None,
			token_info_endpoint: None,
			revocation_endpoint: None,
			reporting_endpoint: None,
			admin_endpoint: None,
			scopes: Vec::new(),
			preferred_client_auth_method: ClientAuthMethod::default(),
		}
	}

	/// Sets the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the token introspection endpoint.
	pub fn token_info_endpoint(mut self, url: Url) -> Self {
		self.token_info_endpoint = Some(url);

		self
	}

	/// Sets the optional revocation endpoint.
	pub fn revocation_endpoint(mut self, url: Url) -> Self {
		self.revocation_endpoint = Some(url);

		self
	}

	/// Sets the Data API base; a trailing `/` is added when missing.
	pub fn reporting_endpoint(mut self, url: Url) -> Self {
		self.reporting_endpoint = Some(with_trailing_slash(url));

		self
	}

	/// Sets the Admin API base; a trailing `/` is added when missing.
	pub fn admin_endpoint(mut self, url: Url) -> Self {
		self.admin_endpoint = Some(with_trailing_slash(url));

		self
	}

	/// Adds a scope to request; duplicates are ignored.
	pub fn scope(mut self, scope: impl Into<String>) -> Self {
		let scope = scope.into();

		if !self.scopes.contains(&scope) {
			self.scopes.push(scope);
		}

		self
	}

	/// Overrides the preferred client authentication method.
	pub fn preferred_client_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.preferred_client_auth_method = method;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ProviderDescriptor, ProviderDescriptorError> {
		let endpoints = ProviderEndpoints {
			authorization: required("authorization", self.authorization_endpoint)?,
			token: required("token", self.token_endpoint)?,
			token_info: required("token_info", self.token_info_endpoint)?,
			revocation: self.revocation_endpoint,
			reporting: required("reporting", self.reporting_endpoint)?,
			admin: required("admin", self.admin_endpoint)?,
		};
		let descriptor = ProviderDescriptor {
			id: self.id,
			endpoints,
			scopes: self.scopes,
			preferred_client_auth_method: self.preferred_client_auth_method,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl ProviderDescriptor {
	/// Validates invariants for the descriptor.
	fn validate(&self) -> Result<(), ProviderDescriptorError> {
		if self.scopes.is_empty() {
			return Err(ProviderDescriptorError::NoScopes);
		}

		let endpoints = &self.endpoints;

		validate_endpoint("authorization", &endpoints.authorization)?;
		validate_endpoint("token", &endpoints.token)?;
		validate_endpoint("token_info", &endpoints.token_info)?;
		validate_endpoint("reporting", &endpoints.reporting)?;
		validate_endpoint("admin", &endpoints.admin)?;

		if let Some(revocation) = endpoints.revocation.as_ref() {
			validate_endpoint("revocation", revocation)?;
		}

		Ok(())
	}
}

fn required(endpoint: &'static str, url: Option<Url>) -> Result<Url, ProviderDescriptorError> {
	url.ok_or(ProviderDescriptorError::MissingEndpoint { endpoint })
}

fn with_trailing_slash(mut url: Url) -> Url {
	if !url.path().ends_with('/') {
		let path = format!("{}/", url.path());

		url.set_path(&path);
	}

	url
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ProviderDescriptorError> {
	if url.scheme() != "https" {
		Err(ProviderDescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	} else {
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(raw: &str) -> Url {
		Url::parse(raw).expect("Fixture URL should parse.")
	}

	fn complete() -> ProviderDescriptorBuilder {
		let id = ProviderId::new("fixture").expect("Fixture id should be valid.");

		ProviderDescriptor::builder(id)
			.authorization_endpoint(url("https://auth.example.com/authorize"))
			.token_endpoint(url("https://auth.example.com/token"))
			.token_info_endpoint(url("https://auth.example.com/tokeninfo"))
			.reporting_endpoint(url("https://data.example.com/v1beta"))
			.admin_endpoint(url("https://admin.example.com/v1beta/"))
			.scope("analytics.readonly")
			.scope("analytics.readonly")
	}

	#[test]
	fn api_bases_gain_trailing_slash() {
		let descriptor = complete().build().expect("Complete builder should validate.");

		assert_eq!(descriptor.endpoints.reporting.as_str(), "https://data.example.com/v1beta/");
		assert_eq!(descriptor.endpoints.admin.as_str(), "https://admin.example.com/v1beta/");
		assert_eq!(descriptor.scopes, vec!["analytics.readonly".to_owned()]);
		assert!(descriptor.endpoints.revocation.is_none());
	}

	#[test]
	fn rejects_plain_http_and_missing_endpoints() {
		let err = complete()
			.token_endpoint(url("http://auth.example.com/token"))
			.build()
			.expect_err("Plain HTTP token endpoint should be rejected.");

		assert!(matches!(err, ProviderDescriptorError::InsecureEndpoint { endpoint: "token", .. }));

		let mut builder = complete();

		builder.token_info_endpoint = None;

		assert_eq!(
			builder.build().expect_err("Missing token info endpoint should be rejected."),
			ProviderDescriptorError::MissingEndpoint { endpoint: "token_info" }
		);
	}
}
