//! Transport primitives shared by the token lifecycle and the analytics client.
//!
//! The module exposes [`TokenHttpClient`] alongside [`ResponseMetadata`] and
//! [`ResponseMetadataSlot`] so downstream crates can integrate custom HTTP clients without
//! losing the bridge's instrumentation hooks. Implementations call
//! [`ResponseMetadataSlot::take`] before dispatching a request and
//! [`ResponseMetadataSlot::store`] once an HTTP status or retry hint is known, enabling the
//! error mappers to classify failures with consistent metadata.

// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
	http::{
		Method, Request,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
	},
};
use reqwest::{
	header::{HeaderMap, RETRY_AFTER},
	redirect::Policy,
};
use time::format_description::well_known::Rfc2822;
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	auth::Secret,
	error::{ConfigError, TransientError},
	oauth::TransportErrorMapper,
};

const JSON_CONTENT_TYPE: &str = "application/json";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Outbound Google endpoints the bridge talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
	/// OAuth token endpoint (code exchange and refresh).
	Token,
	/// OAuth token introspection endpoint.
	TokenInfo,
	/// OAuth revocation endpoint.
	Revocation,
	/// GA4 Data API `runReport`.
	Reporting,
	/// GA4 Admin API listings.
	Admin,
}
impl Endpoint {
	/// Returns a stable label suitable for messages and span fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Token => "token",
			Self::TokenInfo => "token info",
			Self::Revocation => "revocation",
			Self::Reporting => "reporting",
			Self::Admin => "admin",
		}
	}
}
impl Display for Endpoint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Abstraction over HTTP transports capable of executing Google calls while publishing
/// response metadata to the bridge's instrumentation pipeline.
///
/// The trait is the bridge's only dependency on an HTTP stack. Callers provide an
/// implementation and the bridge requests short-lived [`AsyncHttpClient`] handles that each
/// carry a clone of a [`ResponseMetadataSlot`]. The handles must own whatever state they need
/// so their request futures remain `Send` for the lifetime of the in-flight operation.
pub trait TokenHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle tied to a [`ResponseMetadataSlot`].
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds an [`AsyncHttpClient`] handle that records outcomes in `slot`.
	///
	/// # Metadata Contract
	///
	/// - Call [`ResponseMetadataSlot::take`] before submitting the HTTP request so stale
	///   information never leaks across calls.
	/// - Once an HTTP response provides status headers, save them with
	///   [`ResponseMetadataSlot::store`].
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// Captures metadata from the most recent HTTP response for downstream error mapping.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the endpoint, if available.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Google endpoints answer directly, so redirects are never followed. Configure any custom
/// [`ReqwestClient`] the same way before handing it to [`ReqwestHttpClient::with_client`].
#[derive(Clone)]
pub struct ReqwestHttpClient(pub ReqwestClient);
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client that gives up on any request after `timeout`.
	pub fn with_timeout(timeout: std::time::Duration) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().timeout(timeout).redirect(Policy::none()).build()?;

		Ok(Self(client))
	}

	fn instrumented(&self, slot: ResponseMetadataSlot) -> InstrumentedHandle {
		InstrumentedHandle::new(self.0.clone(), slot)
	}
}
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl TokenHttpClient for ReqwestHttpClient {
	type Handle = InstrumentedHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		self.instrumented(slot)
	}
}

struct InstrumentedHttpClient {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}

/// Handle returned by [`ReqwestHttpClient`] that satisfies [`TokenHttpClient`].
#[derive(Clone)]
pub struct InstrumentedHandle(Arc<InstrumentedHttpClient>);
impl InstrumentedHandle {
	fn new(client: ReqwestClient, slot: ResponseMetadataSlot) -> Self {
		Self(Arc::new(InstrumentedHttpClient { client, slot }))
	}
}
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = Arc::clone(&self.0);

		Box::pin(async move {
			client.slot.take();

			let response = client
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let retry_after = parse_retry_after(&headers);

			client.slot.store(ResponseMetadata { status: Some(status.as_u16()), retry_after });

			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

/// Completed HTTP exchange together with the metadata captured by the transport.
#[derive(Debug)]
pub(crate) struct Exchange {
	pub(crate) endpoint: Endpoint,
	pub(crate) response: HttpResponse,
	pub(crate) metadata: Option<ResponseMetadata>,
}
impl Exchange {
	pub(crate) fn status(&self) -> u16 {
		self.response.status().as_u16()
	}

	pub(crate) fn is_success(&self) -> bool {
		self.response.status().is_success()
	}

	/// Decodes the body as JSON, reporting the failing path on mismatch.
	pub(crate) fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(self.response.body());

		serde_path_to_error::deserialize(&mut deserializer).map_err(|source| {
			TransientError::ResponseParse {
				endpoint: self.endpoint,
				source,
				status: Some(self.status()),
			}
			.into()
		})
	}

	/// Turns a non-success exchange into an upstream failure carrying the response hints.
	pub(crate) fn upstream_failure(&self, message: impl Into<String>) -> Error {
		TransientError::Upstream {
			endpoint: self.endpoint,
			message: message.into(),
			status: Some(self.status()),
			retry_after: self.metadata.as_ref().and_then(|meta| meta.retry_after),
		}
		.into()
	}
}

/// Sends `request` through a fresh instrumented handle and maps transport failures.
pub(crate) async fn dispatch<C, M>(
	client: &C,
	mapper: &M,
	endpoint: Endpoint,
	request: HttpRequest,
) -> Result<Exchange>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let slot = ResponseMetadataSlot::default();
	let handle = client.with_metadata(slot.clone());

	match handle.call(request).await {
		Ok(response) => Ok(Exchange { endpoint, response, metadata: slot.take() }),
		Err(e) => Err(mapper.map_transport_error(endpoint, slot.take().as_ref(), e)),
	}
}

/// Builds a JSON request, optionally authorized with a bearer token.
pub(crate) fn json_request(
	method: Method,
	url: &Url,
	bearer: Option<&Secret>,
	body: Option<&JsonValue>,
) -> Result<HttpRequest> {
	let mut builder =
		Request::builder().method(method).uri(url.as_str()).header(ACCEPT, JSON_CONTENT_TYPE);

	if let Some(token) = bearer {
		builder = builder.header(AUTHORIZATION, format!("Bearer {}", token.expose()));
	}

	let payload = match body {
		Some(value) => {
			builder = builder.header(CONTENT_TYPE, JSON_CONTENT_TYPE);

			serde_json::to_vec(value).map_err(|source| ConfigError::RequestEncode { source })?
		},
		None => Vec::new(),
	};

	Ok(builder.body(payload).map_err(ConfigError::from)?)
}

/// Builds a form-encoded POST request.
pub(crate) fn form_request(url: &Url, form: &[(&str, &str)]) -> Result<HttpRequest> {
	let body = form_urlencoded::Serializer::new(String::new()).extend_pairs(form).finish();

	Ok(Request::builder()
		.method(Method::POST)
		.uri(url.as_str())
		.header(CONTENT_TYPE, FORM_CONTENT_TYPE)
		.header(ACCEPT, JSON_CONTENT_TYPE)
		.body(body.into_bytes())
		.map_err(ConfigError::from)?)
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(secs as i64));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

#[cfg(test)]
mod tests {
	// crates.io
	use reqwest::header::HeaderValue;
	// self
	use super::*;

	#[test]
	fn retry_after_accepts_delta_seconds() {
		let mut headers = HeaderMap::new();

		headers.insert(RETRY_AFTER, HeaderValue::from_static("120"));

		assert_eq!(parse_retry_after(&headers), Some(Duration::seconds(120)));
		assert_eq!(parse_retry_after(&HeaderMap::new()), None);
	}

	#[test]
	fn json_request_carries_bearer_and_body() {
		let url = Url::parse("https://analyticsdata.googleapis.com/v1beta/properties/1:runReport")
			.expect("Fixture URL should parse.");
		let body = serde_json::json!({ "limit": 10 });
		let request = json_request(Method::POST, &url, Some(&Secret::new("ya29.t")), Some(&body))
			.expect("Request should build.");

		assert_eq!(request.method(), Method::POST);
		assert_eq!(
			request.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok()),
			Some("Bearer ya29.t")
		);
		assert_eq!(request.body().as_slice(), br#"{"limit":10}"#);
	}

	#[test]
	fn form_request_encodes_pairs() {
		let url = Url::parse("https://oauth2.googleapis.com/revoke").expect("URL should parse.");
		let request = form_request(&url, &[("token", "a b&c")]).expect("Request should build.");

		assert_eq!(request.body().as_slice(), b"token=a+b%26c");
		assert_eq!(
			request.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
			Some(FORM_CONTENT_TYPE)
		);
	}
}
