//! Action routing from host requests to [`Bridge`] operations.
//!
//! The host hands over an action name plus raw string parameters. [`Request::parse`] validates
//! them once at the boundary, and the [`Router`] looks the action up in its handler table. Every
//! outcome becomes a [`Reply`] in the `{ success, data }` shape the dashboard already consumes.

pub mod request;

pub use request::*;

// crates.io
use serde_json::json;
// self
use crate::{
	_prelude::*,
	bridge::Bridge,
	error::ErrorCode,
	http::{ReqwestHttpClient, TokenHttpClient},
	oauth::{ReqwestTransportErrorMapper, TransportErrorMapper},
	settings::Settings,
};

/// Boxed future returned by route handlers.
pub type HandlerFuture<'a> =
	Pin<Box<dyn Future<Output = Result<JsonValue, Rejection>> + 'a + Send>>;

/// Router over the default reqwest transport stack.
pub type ReqwestRouter = Router<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Route handler bound to one [`Action`].
pub type Handler<C, M> = for<'a> fn(&'a Bridge<C, M>, Request) -> HandlerFuture<'a>;

/// Reason a handler refused or failed a request.
#[derive(Debug, ThisError)]
pub enum Rejection {
	/// The request did not fit the handler.
	#[error(transparent)]
	Request(#[from] RequestError),
	/// The bridge operation failed.
	#[error(transparent)]
	Bridge(#[from] Error),
}
impl Rejection {
	/// Wire code reported as `error_type`.
	pub fn code(&self) -> ErrorCode {
		match self {
			Self::Request(_) => ErrorCode::InvalidRequest,
			Self::Bridge(e) => e.code(),
		}
	}
}

/// Response handed back to the host.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Reply {
	/// Whether the action succeeded.
	pub success: bool,
	/// Action payload, or `{ message, error_type }` on failure.
	pub data: JsonValue,
	/// The host must stop and show `data.message` instead of returning to the page.
	#[serde(skip)]
	pub fatal: bool,
}
impl Reply {
	/// Successful reply carrying `data`.
	pub fn success(data: JsonValue) -> Self {
		Self { success: true, data, fatal: false }
	}

	/// Failed reply with a classified message.
	pub fn failure(code: ErrorCode, message: impl Into<String>) -> Self {
		Self {
			success: false,
			data: json!({ "message": message.into(), "error_type": code }),
			fatal: false,
		}
	}

	/// Failure message, if any.
	pub fn message(&self) -> Option<&str> {
		self.data.get("message").and_then(JsonValue::as_str)
	}

	/// Failure class, if any.
	pub fn error_type(&self) -> Option<&str> {
		self.data.get("error_type").and_then(JsonValue::as_str)
	}
}

/// Handler table over a shared [`Bridge`].
pub struct Router<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	bridge: Bridge<C, M>,
	handlers: BTreeMap<Action, Handler<C, M>>,
}
impl<C, M> Router<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Registers the handler of every [`Action`].
	pub fn new(bridge: Bridge<C, M>) -> Self {
		let table: [(Action, Handler<C, M>); 12] = [
			(Action::AuthorizationUrl, authorization_url::<C, M>),
			(Action::Callback, callback::<C, M>),
			(Action::RunReport, run_report::<C, M>),
			(Action::ClearCache, clear_cache::<C, M>),
			(Action::Deauthorize, deauthorize::<C, M>),
			(Action::SelectResource, select_resource::<C, M>),
			(Action::ListProperties, list_properties::<C, M>),
			(Action::VerifyConnection, verify_connection::<C, M>),
			(Action::AuthStatus, auth_status::<C, M>),
			(Action::SaveSettings, save_settings::<C, M>),
			(Action::SetManualProperty, set_manual_property::<C, M>),
			(Action::SetMeasurementProtocolSecret, set_measurement_protocol_secret::<C, M>),
		];

		Self { bridge, handlers: BTreeMap::from(table) }
	}

	/// Shared application context.
	pub fn bridge(&self) -> &Bridge<C, M> {
		&self.bridge
	}

	/// Actions with a registered handler.
	pub fn actions(&self) -> impl Iterator<Item = Action> + '_ {
		self.handlers.keys().copied()
	}

	/// Parses `action` and `params`, then runs the matching handler.
	///
	/// A callback whose parameters fail validation is as fatal as one that fails later.
	pub async fn dispatch(&self, action: &str, params: &Params) -> Reply {
		let action = match action.parse::<Action>() {
			Ok(action) => action,
			Err(e) => return Reply::failure(ErrorCode::InvalidRequest, e.to_string()),
		};

		match Request::parse(action, params) {
			Ok(request) => self.handle(request).await,
			Err(e) => {
				let mut reply = Reply::failure(ErrorCode::InvalidRequest, e.to_string());

				reply.fatal = action == Action::Callback;

				reply
			},
		}
	}

	/// Runs the handler registered for an already validated request.
	///
	/// A failed OAuth callback yields a fatal reply; every other failure is recoverable.
	pub async fn handle(&self, request: Request) -> Reply {
		let action = request.action();
		let Some(handler) = self.handlers.get(&action) else {
			let e = RequestError::UnknownAction { action: action.as_str().into() };

			return Reply::failure(ErrorCode::InvalidRequest, e.to_string());
		};

		match handler(&self.bridge, request).await {
			Ok(data) => Reply::success(data),
			Err(rejection) => {
				let mut reply = Reply::failure(rejection.code(), rejection.to_string());

				reply.fatal = action == Action::Callback;

				reply
			},
		}
	}
}
impl<C, M> Debug for Router<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Router")
			.field("bridge", &self.bridge)
			.field("actions", &self.handlers.keys().collect::<Vec<_>>())
			.finish()
	}
}

fn misrouted(expected: Action, received: Action) -> Rejection {
	Rejection::Request(RequestError::InvalidParameter {
		name: "action",
		message: format!("`{received}` was routed to `{expected}`"),
	})
}

fn settings_view(settings: &Settings) -> JsonValue {
	json!({
		"client_id": settings.client_id,
		"client_secret_set": settings.client_secret.as_ref().is_some_and(|s| !s.is_empty()),
		"debug_mode": settings.debug_mode,
		"cache_duration": settings.cache_duration,
	})
}

fn authorization_url<C, M>(bridge: &Bridge<C, M>, request: Request) -> HandlerFuture<'_>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	Box::pin(async move {
		let received = request.action();
		let Request::AuthorizationUrl { scope } = request else {
			return Err(misrouted(Action::AuthorizationUrl, received));
		};
		let url = bridge.authorization_url(scope).await?.ok_or(Error::MissingCredentials)?;

		Ok(json!({ "url": url.as_str() }))
	})
}

fn callback<C, M>(bridge: &Bridge<C, M>, request: Request) -> HandlerFuture<'_>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	Box::pin(async move {
		let received = request.action();
		let Request::Callback { scope, code, state, measurement_protocol_secret } = request else {
			return Err(misrouted(Action::Callback, received));
		};
		let mut profile =
			bridge.handle_callback(scope, code.as_deref(), state.as_deref()).await?;

		if measurement_protocol_secret.is_some() {
			profile =
				bridge.set_measurement_protocol_secret(scope, measurement_protocol_secret).await?;
		}

		Ok(json!({
			"message": "Google Analytics connected.",
			"scope": scope,
			"needs_property": profile.property_id.is_none(),
		}))
	})
}

fn run_report<C, M>(bridge: &Bridge<C, M>, request: Request) -> HandlerFuture<'_>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	Box::pin(async move {
		let received = request.action();
		let Request::RunReport { scope, query } = request else {
			return Err(misrouted(Action::RunReport, received));
		};
		let envelope = bridge.run_report(scope, &query).await?;

		Ok(json!(envelope))
	})
}

fn clear_cache<C, M>(bridge: &Bridge<C, M>, request: Request) -> HandlerFuture<'_>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	Box::pin(async move {
		let received = request.action();
		let Request::ClearCache = request else {
			return Err(misrouted(Action::ClearCache, received));
		};
		let removed = bridge.clear_cache().await?;

		Ok(json!({ "message": "Cache cleared.", "removed": removed }))
	})
}

fn deauthorize<C, M>(bridge: &Bridge<C, M>, request: Request) -> HandlerFuture<'_>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	Box::pin(async move {
		let received = request.action();
		let Request::Deauthorize { scope } = request else {
			return Err(misrouted(Action::Deauthorize, received));
		};

		bridge.deauthorize(scope).await?;

		Ok(json!({ "message": "Google Analytics disconnected." }))
	})
}

fn select_resource<C, M>(bridge: &Bridge<C, M>, request: Request) -> HandlerFuture<'_>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	Box::pin(async move {
		let received = request.action();
		let Request::SelectResource { scope, choice } = request else {
			return Err(misrouted(Action::SelectResource, received));
		};
		let profile = bridge.select_resource(scope, choice).await?;

		Ok(json!({
			"message": "Property selected.",
			"property_id": profile.property_id,
			"measurement_id": profile.measurement_id,
		}))
	})
}

fn list_properties<C, M>(bridge: &Bridge<C, M>, request: Request) -> HandlerFuture<'_>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	Box::pin(async move {
		let received = request.action();
		let Request::ListProperties { scope } = request else {
			return Err(misrouted(Action::ListProperties, received));
		};
		let properties = bridge.list_properties(scope).await?;

		Ok(json!({ "properties": properties }))
	})
}

fn verify_connection<C, M>(bridge: &Bridge<C, M>, request: Request) -> HandlerFuture<'_>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	Box::pin(async move {
		let received = request.action();
		let Request::VerifyConnection { scope } = request else {
			return Err(misrouted(Action::VerifyConnection, received));
		};
		let valid = bridge.verify_connection(scope).await?;

		Ok(json!({ "valid": valid }))
	})
}

fn auth_status<C, M>(bridge: &Bridge<C, M>, request: Request) -> HandlerFuture<'_>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	Box::pin(async move {
		let received = request.action();
		let Request::AuthStatus { scope } = request else {
			return Err(misrouted(Action::AuthStatus, received));
		};
		let status = bridge.auth_status(scope).await?;

		Ok(json!(status))
	})
}

fn save_settings<C, M>(bridge: &Bridge<C, M>, request: Request) -> HandlerFuture<'_>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	Box::pin(async move {
		let received = request.action();
		let Request::SaveSettings { update } = request else {
			return Err(misrouted(Action::SaveSettings, received));
		};
		let current = bridge.load_settings().await?;
		let saved = bridge.save_settings(update.apply(current)).await?;

		Ok(json!({ "message": "Settings saved.", "settings": settings_view(&saved) }))
	})
}

fn set_manual_property<C, M>(bridge: &Bridge<C, M>, request: Request) -> HandlerFuture<'_>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	Box::pin(async move {
		let received = request.action();
		let Request::SetManualProperty { scope, property_id } = request else {
			return Err(misrouted(Action::SetManualProperty, received));
		};
		let profile = bridge.set_manual_property(scope, property_id).await?;

		Ok(json!({
			"message": "Manual property saved.",
			"manual_property_id": profile.manual_property_id,
		}))
	})
}

fn set_measurement_protocol_secret<C, M>(
	bridge: &Bridge<C, M>,
	request: Request,
) -> HandlerFuture<'_>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	Box::pin(async move {
		let received = request.action();
		let Request::SetMeasurementProtocolSecret { scope, secret } = request else {
			return Err(misrouted(Action::SetMeasurementProtocolSecret, received));
		};
		let profile = bridge.set_measurement_protocol_secret(scope, secret).await?;

		Ok(json!({
			"message": "Measurement Protocol secret saved.",
			"measurement_protocol_secret_set": profile.measurement_protocol_secret.is_some(),
		}))
	})
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::*;

	async fn router() -> ReqwestRouter {
		let (bridge, _) = build_reqwest_test_bridge(mock_descriptor("https://127.0.0.1:9")).await;

		Router::new(bridge)
	}

	fn params(pairs: &[(&str, &str)]) -> Params {
		pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect()
	}

	#[tokio::test]
	async fn every_action_has_a_handler() {
		let router = router().await;

		assert_eq!(router.actions().collect::<Vec<_>>().len(), Action::ALL.len());
	}

	#[tokio::test]
	async fn unknown_actions_are_invalid_requests() {
		let reply = router().await.dispatch("uip_save_google_analytics", &params(&[])).await;

		assert!(!reply.success);
		assert!(!reply.fatal);
		assert_eq!(reply.error_type(), Some("invalid_request"));
	}

	#[tokio::test]
	async fn failed_callbacks_are_fatal() {
		let reply = router()
			.await
			.dispatch("oauth_callback", &params(&[("code", "4/abc"), ("state", "forged")]))
			.await;

		assert!(!reply.success);
		assert!(reply.fatal);
		assert_eq!(reply.error_type(), Some("invalid_state"));
	}

	#[tokio::test]
	async fn malformed_callbacks_are_fatal() {
		let reply = router()
			.await
			.dispatch("oauth_callback", &params(&[("code", "4/abc"), ("network", "bogus")]))
			.await;

		assert!(!reply.success);
		assert!(reply.fatal);
		assert_eq!(reply.error_type(), Some("invalid_request"));
	}

	#[tokio::test]
	async fn pinned_property_and_secret_show_up_in_the_status() {
		let router = router().await;
		let pinned = router
			.dispatch("set_manual_property", &params(&[("property_id", "properties/4321")]))
			.await;

		assert!(pinned.success, "{pinned:?}");
		assert_eq!(pinned.data["manual_property_id"], json!("4321"));

		let secret = router
			.dispatch("set_measurement_protocol_secret", &params(&[("secret", "mp-secret")]))
			.await;

		assert!(secret.success, "{secret:?}");
		assert!(!secret.data.to_string().contains("mp-secret"));

		let status = router.dispatch("auth_status", &params(&[])).await;

		assert_eq!(status.data["authenticated"], json!(false));
		assert_eq!(status.data["property_id"], json!("4321"));
		assert_eq!(status.data["manual_property_id"], json!("4321"));
		assert_eq!(status.data["measurement_protocol_secret_set"], json!(true));

		let cleared = router.dispatch("set_measurement_protocol_secret", &params(&[])).await;

		assert_eq!(cleared.data["measurement_protocol_secret_set"], json!(false));
	}

	#[tokio::test]
	async fn unauthenticated_reports_fail_with_no_auth() {
		let reply = router().await.dispatch("run_report", &params(&[])).await;

		assert!(!reply.success);
		assert!(!reply.fatal);
		assert_eq!(reply.error_type(), Some("no_auth"));
	}

	#[tokio::test]
	async fn settings_replies_never_echo_the_secret() {
		let reply = router()
			.await
			.dispatch("save_settings", &params(&[("cache_duration", "0")]))
			.await;

		assert!(reply.success);
		assert_eq!(reply.data["settings"]["client_id"], json!(TEST_CLIENT_ID));
		assert_eq!(reply.data["settings"]["client_secret_set"], json!(true));
		assert_eq!(reply.data["settings"]["cache_duration"], json!(0));
		assert!(!reply.data.to_string().contains(TEST_CLIENT_SECRET));
	}
}
