//! Bridge-level error types shared across the lifecycle, query, cache, and storage layers.

// self
use crate::{_prelude::*, http::Endpoint};

/// Bridge-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical bridge error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; safe to retry later.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// The scope has no usable connection.
	#[error("Google Analytics is not connected: {missing}.")]
	NotAuthenticated {
		/// Precondition that is not satisfied.
		missing: Precondition,
	},
	/// The callback `state` is absent or does not match the live transit token.
	#[error("Authorization state is missing or does not match the issued transit token.")]
	InvalidState,
	/// The callback carried no authorization code.
	#[error("Authorization callback did not include an authorization code.")]
	MissingCode,
	/// Operator client credentials are not configured.
	#[error("OAuth client credentials are not configured.")]
	MissingCredentials,
	/// Provider rejected the grant (bad code, revoked refresh token, denied consent).
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider- or bridge-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider- or bridge-supplied reason string.
		reason: String,
	},
	/// Granted scopes do not cover the analytics read scope.
	#[error("Token lacks the required scopes: {reason}.")]
	InsufficientScope {
		/// Provider- or bridge-supplied reason string.
		reason: String,
	},
	/// Refreshing an expiring access token failed.
	#[error("Token refresh failed, {disposition}.")]
	TokenRefresh {
		/// What the caller should do next.
		disposition: RefreshDisposition,
		/// Failure reported by the refresh attempt.
		#[source]
		source: Box<Error>,
	},
	/// Analytics endpoint answered with a non-success status.
	#[error("{message}")]
	Api {
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Provider message, or a generic status summary.
		message: String,
	},
}
impl Error {
	/// Stable wire code reported to the dashboard as `error_type`.
	pub fn code(&self) -> ErrorCode {
		match self {
			Self::Storage(_) => ErrorCode::StorageError,
			Self::Config(_) => ErrorCode::ConfigError,
			Self::Transport(_) => ErrorCode::TransportError,
			Self::NotAuthenticated { .. } => ErrorCode::NoAuth,
			Self::InvalidState => ErrorCode::InvalidState,
			Self::MissingCode => ErrorCode::MissingCode,
			Self::MissingCredentials => ErrorCode::MissingCredentials,
			Self::TokenRefresh { .. } => ErrorCode::TokenRefreshError,
			Self::Transient(_)
			| Self::InvalidGrant { .. }
			| Self::InvalidClient { .. }
			| Self::InsufficientScope { .. }
			| Self::Api { .. } => ErrorCode::ApiError,
		}
	}

	/// Returns true when repeating the same call later may succeed without operator action.
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::Transient(_) | Self::Transport(_) => true,
			Self::TokenRefresh { disposition, .. } => *disposition == RefreshDisposition::Retry,
			Self::Api { status, .. } => matches!(status, Some(429 | 500..=599)),
			_ => false,
		}
	}

	/// Wraps a failed refresh attempt, deciding whether the operator must reconnect.
	pub(crate) fn into_refresh_failure(self) -> Self {
		let disposition = match &self {
			Self::Transient(_) | Self::Transport(_) | Self::Storage(_) => RefreshDisposition::Retry,
			_ => RefreshDisposition::Reauthenticate,
		};

		Self::TokenRefresh { disposition, source: Box::new(self) }
	}
}

/// Wire-level error codes understood by the dashboard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
	/// No usable credential or resource selection.
	NoAuth,
	/// Callback state failed validation.
	InvalidState,
	/// Callback lacked an authorization code.
	MissingCode,
	/// Operator client credentials are absent.
	MissingCredentials,
	/// Refresh failed; see the disposition.
	TokenRefreshError,
	/// Upstream API failed or returned an unusable response.
	ApiError,
	/// Upstream could not be reached.
	TransportError,
	/// Persistence failed.
	StorageError,
	/// Local configuration is invalid.
	ConfigError,
	/// Inbound request parameters failed validation.
	InvalidRequest,
}
impl ErrorCode {
	/// Returns the stable snake_case label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::NoAuth => "no_auth",
			Self::InvalidState => "invalid_state",
			Self::MissingCode => "missing_code",
			Self::MissingCredentials => "missing_credentials",
			Self::TokenRefreshError => "token_refresh_error",
			Self::ApiError => "api_error",
			Self::TransportError => "transport_error",
			Self::StorageError => "storage_error",
			Self::ConfigError => "config_error",
			Self::InvalidRequest => "invalid_request",
		}
	}
}
impl Display for ErrorCode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Authentication precondition named by [`Error::NotAuthenticated`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precondition {
	/// No access token is stored for the scope.
	AccessToken,
	/// No analytics property has been selected.
	Resource,
}
impl Display for Precondition {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::AccessToken => f.write_str("no access token is stored"),
			Self::Resource => f.write_str("no analytics property is selected"),
		}
	}
}

/// Follow-up expected after a failed refresh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshDisposition {
	/// Transport or upstream hiccup; the stored credentials are still usable.
	Retry,
	/// Provider rejected the refresh credential; the operator must reconnect.
	Reauthenticate,
}
impl Display for RefreshDisposition {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Retry => f.write_str("retry later"),
			Self::Reauthenticate => f.write_str("reconnect Google Analytics"),
		}
	}
}

/// Configuration and validation failures raised by the bridge.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Provider descriptor contains an invalid URL.
	#[error("Descriptor contains an invalid URL.")]
	InvalidDescriptor {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Provider descriptor failed validation.
	#[error(transparent)]
	Descriptor(#[from] crate::provider::ProviderDescriptorError),
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Report request body could not be encoded.
	#[error("Report request could not be encoded.")]
	RequestEncode {
		/// Underlying serialization failure.
		#[source]
		source: serde_json::Error,
	},

	/// Stored profile is missing a refresh token.
	#[error("Stored credential profile is missing a refresh token.")]
	MissingRefreshToken,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Provider returned an unexpected but non-fatal response.
	#[error("The {endpoint} endpoint returned an unexpected response: {message}.")]
	Upstream {
		/// Endpoint that failed.
		endpoint: Endpoint,
		/// Provider- or bridge-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Endpoint responded with JSON that could not be parsed.
	#[error("The {endpoint} endpoint returned malformed JSON.")]
	ResponseParse {
		/// Endpoint that failed.
		endpoint: Endpoint,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}
impl TransientError {
	/// Retry-After hint carried by the failure, if any.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::Upstream { retry_after, .. } => *retry_after,
			Self::ResponseParse { .. } => None,
		}
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling Google.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling Google.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn refresh_failures_split_by_disposition() {
		let transport = Error::from(TransportError::Io(std::io::Error::other("reset")))
			.into_refresh_failure();
		let rejected =
			Error::InvalidGrant { reason: "token revoked".into() }.into_refresh_failure();

		assert!(matches!(
			transport,
			Error::TokenRefresh { disposition: RefreshDisposition::Retry, .. }
		));
		assert!(transport.is_retryable());
		assert!(matches!(
			rejected,
			Error::TokenRefresh { disposition: RefreshDisposition::Reauthenticate, .. }
		));
		assert!(!rejected.is_retryable());
		assert_eq!(rejected.code().as_str(), "token_refresh_error");
	}

	#[test]
	fn codes_follow_dashboard_taxonomy() {
		assert_eq!(
			Error::NotAuthenticated { missing: Precondition::Resource }.code(),
			ErrorCode::NoAuth
		);
		assert_eq!(Error::InvalidState.code().as_str(), "invalid_state");
		assert_eq!(Error::MissingCode.code().as_str(), "missing_code");
		assert_eq!(Error::MissingCredentials.code().as_str(), "missing_credentials");
		assert_eq!(
			Error::Api { status: Some(403), message: "API returned status code: 403".into() }
				.code()
				.as_str(),
			"api_error"
		);
		assert_eq!(
			serde_json::to_string(&ErrorCode::TransportError)
				.expect("Error codes should serialize to JSON."),
			"\"transport_error\""
		);
	}

	#[test]
	fn not_authenticated_names_the_precondition() {
		let err = Error::NotAuthenticated { missing: Precondition::AccessToken };

		assert_eq!(
			err.to_string(),
			"Google Analytics is not connected: no access token is stored."
		);
	}
}
