//! Provider strategy hooks that customize consent URLs and token error mapping.
//!
//! Implementations decorate the authorization request and normalize token endpoint failures
//! without tying flows to any particular HTTP client.

// self
use crate::{_prelude::*, provider::descriptor::GrantType};

/// Strategy hook that allows providers to decorate requests and classify errors.
///
/// Implementors are required to be `Send + Sync`, and the hooks only see crate-owned data so
/// downstream crates never depend on transport-specific structures.
pub trait ProviderStrategy: Send + Sync {
	/// Maps a failed token request into the bridge taxonomy.
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind;

	/// Adds provider-specific query parameters to the consent URL.
	///
	/// The default implementation adds nothing.
	fn augment_authorization_request(&self, _params: &mut BTreeMap<String, String>) {}
}

/// Canonical provider error categories used by strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
	/// Provider rejected the authorization grant (bad code, revoked refresh token).
	InvalidGrant,
	/// Client authentication failed.
	InvalidClient,
	/// Requested scopes exceed what the token covers.
	InsufficientScope,
	/// Failure is temporary and should be retried.
	Transient,
}

/// Context passed to provider strategies when classifying token errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderErrorContext {
	/// Grant type associated with the failing request.
	pub grant_type: GrantType,
	/// HTTP status code returned by the provider, when available.
	pub http_status: Option<u16>,
	/// Provider-supplied OAuth `error` field.
	pub oauth_error: Option<String>,
	/// Provider-supplied OAuth `error_description` field.
	pub error_description: Option<String>,
}
impl ProviderErrorContext {
	/// Creates a new context scoped to the provided grant type.
	pub fn new(grant_type: GrantType) -> Self {
		Self { grant_type, http_status: None, oauth_error: None, error_description: None }
	}

	/// Adds an HTTP status code (e.g., 400, 401, 500).
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the OAuth error code string returned by the provider.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Adds the OAuth `error_description` field.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}
}

/// Strategy for Google's OAuth 2.0 endpoints.
///
/// Consent URLs request offline access with a forced consent prompt so every connection yields
/// a refresh token. Token errors are classified by the OAuth `error` code first, then by the
/// description text, and finally by HTTP status.
#[derive(Debug, Default)]
pub struct GoogleProviderStrategy;
impl Display for GoogleProviderStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("google-provider-strategy")
	}
}
impl ProviderStrategy for GoogleProviderStrategy {
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
		ctx.oauth_error
			.as_deref()
			.and_then(classify_code)
			.or_else(|| ctx.error_description.as_deref().and_then(classify_description))
			.unwrap_or_else(|| classify_status(ctx.http_status))
	}

	fn augment_authorization_request(&self, params: &mut BTreeMap<String, String>) {
		params.insert("access_type".into(), "offline".into());
		params.insert("prompt".into(), "consent".into());
		params.insert("include_granted_scopes".into(), "true".into());
	}
}

fn classify_code(code: &str) -> Option<ProviderErrorKind> {
	let kind = match code.to_ascii_lowercase().as_str() {
		"invalid_grant" | "access_denied" => ProviderErrorKind::InvalidGrant,
		"invalid_client" | "unauthorized_client" | "deleted_client" | "disabled_client" =>
			ProviderErrorKind::InvalidClient,
		"invalid_scope" | "insufficient_scope" => ProviderErrorKind::InsufficientScope,
		"temporarily_unavailable" | "server_error" | "internal_failure" =>
			ProviderErrorKind::Transient,
		_ => return None,
	};

	Some(kind)
}

fn classify_description(description: &str) -> Option<ProviderErrorKind> {
	let lowered = description.to_ascii_lowercase();

	if lowered.contains("expired or revoked") || lowered.contains("bad request") {
		Some(ProviderErrorKind::InvalidGrant)
	} else if lowered.contains("client") {
		Some(ProviderErrorKind::InvalidClient)
	} else if lowered.contains("scope") {
		Some(ProviderErrorKind::InsufficientScope)
	} else {
		None
	}
}

fn classify_status(status: Option<u16>) -> ProviderErrorKind {
	match status {
		Some(400 | 404 | 410) => ProviderErrorKind::InvalidGrant,
		Some(401) => ProviderErrorKind::InvalidClient,
		Some(403) => ProviderErrorKind::InsufficientScope,
		_ => ProviderErrorKind::Transient,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn ctx() -> ProviderErrorContext {
		ProviderErrorContext::new(GrantType::RefreshToken)
	}

	#[test]
	fn oauth_codes_take_precedence() {
		let strategy = GoogleProviderStrategy;
		let rejected = ctx().with_oauth_error("invalid_grant").with_http_status(500);

		assert_eq!(strategy.classify_token_error(&rejected), ProviderErrorKind::InvalidGrant);
		assert_eq!(
			strategy.classify_token_error(&ctx().with_oauth_error("deleted_client")),
			ProviderErrorKind::InvalidClient
		);
	}

	#[test]
	fn description_and_status_fallbacks() {
		let strategy = GoogleProviderStrategy;
		let revoked = ctx()
			.with_oauth_error("custom")
			.with_error_description("Token has been expired or revoked.");

		assert_eq!(strategy.classify_token_error(&revoked), ProviderErrorKind::InvalidGrant);
		assert_eq!(
			strategy.classify_token_error(&ctx().with_http_status(503)),
			ProviderErrorKind::Transient
		);
		assert_eq!(
			strategy.classify_token_error(&ctx().with_http_status(401)),
			ProviderErrorKind::InvalidClient
		);
	}

	#[test]
	fn consent_url_requests_offline_access() {
		let mut params = BTreeMap::new();

		GoogleProviderStrategy.augment_authorization_request(&mut params);

		assert_eq!(params.get("access_type").map(String::as_str), Some("offline"));
		assert_eq!(params.get("prompt").map(String::as_str), Some("consent"));
		assert_eq!(params.get("include_granted_scopes").map(String::as_str), Some("true"));
	}
}
