//! Internal OAuth client facade and transport error mapping.

pub use oauth2;

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, RedirectUrl, RefreshToken, RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::{Secret, TokenGrant},
	error::{ConfigError, TransientError, TransportError},
	http::{Endpoint, ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	provider::{
		ClientAuthMethod, GrantType, ProviderDescriptor, ProviderErrorContext, ProviderErrorKind,
		ProviderStrategy,
	},
	settings::ClientCredentials,
};

/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Maps HTTP transport failures into bridge [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted while calling `endpoint` into a bridge error.
	fn map_transport_error(
		&self,
		endpoint: Endpoint,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		endpoint: Endpoint,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(endpoint, meta, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => upstream(
				endpoint,
				meta,
				format!("HTTP client error occurred while calling Google: {message}"),
			),
			_ => upstream(endpoint, meta, "HTTP client error occurred while calling Google"),
		}
	}
}

pub(crate) trait OAuth2Facade {
	fn exchange_authorization_code<'a>(
		&'a self,
		strategy: &'a dyn ProviderStrategy,
		code: &'a str,
		redirect_uri: &'a Url,
	) -> FacadeFuture<'a, TokenGrant>;

	fn refresh_token<'a>(
		&'a self,
		strategy: &'a dyn ProviderStrategy,
		refresh_token: &'a Secret,
	) -> FacadeFuture<'a, TokenGrant>;
}

pub(crate) struct BasicFacade<C = ReqwestHttpClient, M = ReqwestTransportErrorMapper>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredBasicClient,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn from_descriptor(
		descriptor: &ProviderDescriptor,
		credentials: &ClientCredentials,
		http_client: Arc<C>,
		error_mapper: Arc<M>,
	) -> Result<Self> {
		let auth_url = AuthUrl::new(descriptor.endpoints.authorization.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let token_url = TokenUrl::new(descriptor.endpoints.token.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let mut oauth_client = BasicClient::new(ClientId::new(credentials.client_id.clone()))
			.set_client_secret(ClientSecret::new(credentials.client_secret.expose().to_owned()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url);

		if matches!(descriptor.preferred_client_auth_method, ClientAuthMethod::ClientSecretPost) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		Ok(Self { oauth_client, http_client, error_mapper })
	}
}
impl<C, M> OAuth2Facade for BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn exchange_authorization_code<'a>(
		&'a self,
		strategy: &'a dyn ProviderStrategy,
		code: &'a str,
		redirect_uri: &'a Url,
	) -> FacadeFuture<'a, TokenGrant> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let redirect_url = RedirectUrl::new(redirect_uri.to_string())
				.map_err(|source| ConfigError::InvalidRedirect { source })?;
			let response = self
				.oauth_client
				.exchange_code(AuthorizationCode::new(code.to_owned()))
				.set_redirect_uri(Cow::Owned(redirect_url))
				.request_async(&instrumented)
				.await
				.map_err(|err| {
					map_request_error(
						strategy,
						GrantType::AuthorizationCode,
						meta.take(),
						err,
						self.error_mapper.as_ref(),
					)
				})?;

			map_token_response(response)
		})
	}

	fn refresh_token<'a>(
		&'a self,
		strategy: &'a dyn ProviderStrategy,
		refresh_token: &'a Secret,
	) -> FacadeFuture<'a, TokenGrant> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let refresh_secret = RefreshToken::new(refresh_token.expose().to_owned());
			let response = self
				.oauth_client
				.exchange_refresh_token(&refresh_secret)
				.request_async(&instrumented)
				.await
				.map_err(|err| {
					map_request_error(
						strategy,
						GrantType::RefreshToken,
						meta.take(),
						err,
						self.error_mapper.as_ref(),
					)
				})?;

			map_token_response(response)
		})
	}
}

fn map_token_response(response: BasicTokenResponse) -> Result<TokenGrant> {
	let expires_in = match response.expires_in() {
		Some(lifetime) =>
			i64::try_from(lifetime.as_secs()).map_err(|_| ConfigError::ExpiresInOutOfRange)?,
		None => DEFAULT_EXPIRES_IN_SECS,
	};

	if expires_in <= 0 {
		return Err(ConfigError::NonPositiveExpiresIn.into());
	}

	Ok(TokenGrant {
		access_token: Secret::new(response.access_token().secret().to_owned()),
		refresh_token: response.refresh_token().map(|t| Secret::new(t.secret().to_owned())),
		expires_in,
		issued_at: OffsetDateTime::now_utc(),
	})
}

fn map_request_error<E, M>(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(strategy, grant, response, meta_ref),
		RequestTokenError::Request(error) =>
			mapper.map_transport_error(Endpoint::Token, meta_ref, error),
		RequestTokenError::Parse(source, _body) => TransientError::ResponseParse {
			endpoint: Endpoint::Token,
			source,
			status: meta_status(meta_ref),
		}
		.into(),
		RequestTokenError::Other(message) => upstream(Endpoint::Token, meta_ref, message),
	}
}

fn map_server_response_error(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let mut ctx =
		ProviderErrorContext::new(grant).with_oauth_error(response.error().as_ref().to_string());

	if let Some(description) = response.error_description() {
		ctx = ctx.with_error_description(description.clone());
	}
	if let Some(status) = meta_status(meta) {
		ctx = ctx.with_http_status(status);
	}

	let message = match response.error_description() {
		Some(description) => format!("{} ({description})", response.error().as_ref()),
		None => response.error().as_ref().to_string(),
	};

	match strategy.classify_token_error(&ctx) {
		ProviderErrorKind::InvalidGrant => Error::InvalidGrant { reason: message },
		ProviderErrorKind::InvalidClient => Error::InvalidClient { reason: message },
		ProviderErrorKind::InsufficientScope => Error::InsufficientScope { reason: message },
		ProviderErrorKind::Transient => upstream(Endpoint::Token, meta, message),
	}
}

fn map_reqwest_error(
	endpoint: Endpoint,
	meta: Option<&ResponseMetadata>,
	err: ReqwestError,
) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::Upstream {
			endpoint,
			message: "Request timed out".into(),
			status: meta_status(meta).or_else(|| err.status().map(|code| code.as_u16())),
			retry_after: meta.and_then(|value| value.retry_after),
		}
		.into();
	}

	TransportError::from(err).into()
}

fn upstream(
	endpoint: Endpoint,
	meta: Option<&ResponseMetadata>,
	message: impl Into<String>,
) -> Error {
	TransientError::Upstream {
		endpoint,
		message: message.into(),
		status: meta_status(meta),
		retry_after: meta.and_then(|value| value.retry_after),
	}
	.into()
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::provider::GoogleProviderStrategy;

	fn credentials() -> ClientCredentials {
		ClientCredentials { client_id: "client-id".into(), client_secret: Secret::new("secret") }
	}

	#[test]
	fn builds_from_google_descriptor() {
		let descriptor = ProviderDescriptor::google().expect("Google descriptor should build.");
		let result = <BasicFacade<ReqwestHttpClient, ReqwestTransportErrorMapper>>::from_descriptor(
			&descriptor,
			&credentials(),
			Arc::new(ReqwestHttpClient::with_client(ReqwestClient::new())),
			Arc::new(ReqwestTransportErrorMapper),
		);

		assert!(result.is_ok());
	}

	#[test]
	fn missing_lifetime_defaults_to_an_hour() {
		let response: BasicTokenResponse = serde_json::from_value(serde_json::json!({
			"access_token": "ya29.a",
			"token_type": "Bearer"
		}))
		.expect("Token response fixture should deserialize.");
		let grant = map_token_response(response).expect("Grant should map.");

		assert_eq!(grant.expires_in, DEFAULT_EXPIRES_IN_SECS);
		assert!(grant.refresh_token.is_none());
		assert_eq!(grant.access_token.expose(), "ya29.a");
	}

	#[test]
	fn server_errors_follow_strategy_classification() {
		let response: BasicErrorResponse = serde_json::from_value(serde_json::json!({
			"error": "invalid_grant",
			"error_description": "Bad Request"
		}))
		.expect("Error response fixture should deserialize.");
		let meta = ResponseMetadata { status: Some(400), retry_after: None };
		let err = map_server_response_error(
			&GoogleProviderStrategy,
			GrantType::RefreshToken,
			response,
			Some(&meta),
		);

		assert!(
			matches!(err, Error::InvalidGrant { ref reason } if reason.contains("Bad Request"))
		);
	}
}
