//! Compatibility surface toward the UIPress dashboard.
//!
//! [`CompatShim`] mirrors credential state into the option names the dashboard reads on its own,
//! while [`DashboardAdapter`] is the pull interface the dashboard calls instead of its built-in
//! Google Analytics integration. [`ReportEnvelope`] is the dashboard's fixed JSON shape.

// self
use crate::{
	_prelude::*,
	analytics::{FormattedReport, ReportQuery},
	auth::{CredentialProfile, Scope},
	error::ErrorCode,
	store::{OptionStore, StoreFuture},
};

/// Dashboard option holding the mirrored account block.
pub const DASHBOARD_ACCOUNT_OPTION: &str = "uip_google_analytics";
/// Dashboard option holding the connection status string.
pub const DASHBOARD_STATUS_OPTION: &str = "uip_google_analytics_status";

const CONNECTED_STATUS: &str = "connected";
const NO_DATA_MESSAGE: &str = "No data available";

/// Boxed future returned by [`DashboardAdapter`] methods.
pub type AdapterFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a + Send>>;

/// Mirrors credential state into host-dashboard option names.
pub trait CompatShim
where
	Self: Send + Sync,
{
	/// Publishes the connected account found in `profile`.
	fn mirror<'a>(&'a self, profile: &'a CredentialProfile) -> StoreFuture<'a, ()>;

	/// Clears the mirrored account and status.
	fn reset(&self) -> StoreFuture<'_, ()>;
}

/// Pull interface consumed by the dashboard in place of its own Google integration.
pub trait DashboardAdapter
where
	Self: Send + Sync,
{
	/// Returns the account block the dashboard displays for `scope`.
	fn provide_credential(&self, scope: Scope) -> AdapterFuture<'_, DashboardAccount>;

	/// Runs `query` for `scope` and returns the dashboard envelope, success or failure.
	fn provide_report_data(&self, scope: Scope, query: ReportQuery)
	-> AdapterFuture<'_, ReportEnvelope>;
}

/// Account block in the dashboard's expected shape.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardAccount {
	/// Display label of the connected view.
	pub view: String,
	/// Measurement id of the connected stream.
	pub code: String,
	/// Access token the dashboard uses for client-side calls.
	pub token: String,
}
impl DashboardAccount {
	/// Projects the dashboard fields out of a profile.
	pub fn from_profile(profile: &CredentialProfile) -> Self {
		Self {
			view: profile.view_label.clone().unwrap_or_default(),
			code: profile.measurement_id.as_ref().map(ToString::to_string).unwrap_or_default(),
			token: profile
				.access_token
				.as_ref()
				.map(|token| token.expose().to_owned())
				.unwrap_or_default(),
		}
	}
}
impl Debug for DashboardAccount {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DashboardAccount")
			.field("view", &self.view)
			.field("code", &self.code)
			.field("token_set", &!self.token.is_empty())
			.finish()
	}
}

/// Report payload in the exact JSON shape the dashboard renders.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportEnvelope {
	/// Whether the request succeeded.
	pub success: bool,
	/// Whether a Google account is connected.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub connected: Option<bool>,
	/// Formatted series and totals.
	#[serde(flatten)]
	pub report: Option<FormattedReport>,
	/// Connected account block.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub google_account: Option<DashboardAccount>,
	/// Always true: the data comes from GA4.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub gafour: Option<bool>,
	/// Property identifier the data belongs to.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub property: Option<String>,
	/// Measurement id of the property's web stream.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub measurement_id: Option<String>,
	/// Human-readable status or failure message.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	/// Failure class, present only on failures.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_type: Option<ErrorCode>,
}
impl ReportEnvelope {
	/// Successful envelope carrying `report` for the connected `profile`.
	pub fn connected(report: FormattedReport, profile: &CredentialProfile) -> Self {
		let property = profile.reporting_property().map(ToString::to_string);
		let measurement_id = profile.measurement_id.as_ref().map(ToString::to_string);

		Self {
			success: true,
			connected: Some(true),
			report: Some(report),
			google_account: Some(DashboardAccount::from_profile(profile)),
			gafour: Some(true),
			property: Some(property.unwrap_or_default()),
			measurement_id: Some(measurement_id.unwrap_or_default()),
			message: None,
			error_type: None,
		}
	}

	/// Placeholder shown while nothing is connected.
	pub fn no_data() -> Self {
		Self {
			success: true,
			connected: Some(false),
			report: Some(FormattedReport::default()),
			google_account: None,
			gafour: Some(true),
			property: None,
			measurement_id: None,
			message: Some(NO_DATA_MESSAGE.into()),
			error_type: None,
		}
	}

	/// Failure envelope classified by the bridge error taxonomy.
	pub fn failure(error: &Error) -> Self {
		Self::failure_with(error.code(), error.to_string())
	}

	/// Failure envelope with an explicit code and message.
	pub fn failure_with(code: ErrorCode, message: impl Into<String>) -> Self {
		Self {
			success: false,
			connected: None,
			report: None,
			google_account: None,
			gafour: None,
			property: None,
			measurement_id: None,
			message: Some(message.into()),
			error_type: Some(code),
		}
	}
}

/// Shim writing the UIPress Pro option names.
#[derive(Clone)]
pub struct UipressShim {
	store: Arc<dyn OptionStore>,
}
impl UipressShim {
	/// Wraps the shared option store.
	pub fn new(store: Arc<dyn OptionStore>) -> Self {
		Self { store }
	}
}
impl CompatShim for UipressShim {
	fn mirror<'a>(&'a self, profile: &'a CredentialProfile) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let account = DashboardAccount::from_profile(profile);

			self.store.save_as(DASHBOARD_ACCOUNT_OPTION, &account).await?;
			self.store
				.save(DASHBOARD_STATUS_OPTION, JsonValue::String(CONNECTED_STATUS.into()))
				.await
		})
	}

	fn reset(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.store.save(DASHBOARD_ACCOUNT_OPTION, JsonValue::Object(Default::default())).await?;
			self.store.save(DASHBOARD_STATUS_OPTION, JsonValue::String(String::new())).await
		})
	}
}

/// Shim for hosts without a dashboard to mirror into.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopShim;
impl CompatShim for NoopShim {
	fn mirror<'a>(&'a self, _profile: &'a CredentialProfile) -> StoreFuture<'a, ()> {
		Box::pin(async { Ok(()) })
	}

	fn reset(&self) -> StoreFuture<'_, ()> {
		Box::pin(async { Ok(()) })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		auth::{MeasurementId, PropertyId, Secret},
		store::MemoryStore,
	};

	fn profile() -> CredentialProfile {
		CredentialProfile {
			access_token: Some(Secret::new("ya29.token")),
			property_id: Some(PropertyId::new("777").expect("Property fixture should be valid.")),
			measurement_id: Some(
				MeasurementId::new("G-TEST").expect("Measurement fixture should be valid."),
			),
			view_label: Some("Main site".into()),
			..Default::default()
		}
	}

	#[tokio::test]
	async fn mirror_then_reset_updates_dashboard_options() {
		let backend = Arc::new(MemoryStore::default());
		let shim = UipressShim::new(backend.clone());

		shim.mirror(&profile()).await.expect("Mirroring should succeed.");

		assert_eq!(
			backend.raw(DASHBOARD_ACCOUNT_OPTION),
			Some(serde_json::json!({
				"view": "Main site",
				"code": "G-TEST",
				"token": "ya29.token"
			}))
		);
		assert_eq!(backend.raw(DASHBOARD_STATUS_OPTION), Some(serde_json::json!("connected")));

		shim.reset().await.expect("Reset should succeed.");

		assert_eq!(backend.raw(DASHBOARD_ACCOUNT_OPTION), Some(serde_json::json!({})));
		assert_eq!(backend.raw(DASHBOARD_STATUS_OPTION), Some(serde_json::json!("")));
	}

	#[test]
	fn connected_envelope_matches_dashboard_shape() {
		let envelope = ReportEnvelope::connected(FormattedReport::default(), &profile());
		let json = serde_json::to_value(&envelope).expect("Envelope should serialize.");

		assert_eq!(json["success"], true);
		assert_eq!(json["connected"], true);
		assert_eq!(json["gafour"], true);
		assert_eq!(json["property"], "777");
		assert_eq!(json["measurement_id"], "G-TEST");
		assert_eq!(json["google_account"]["code"], "G-TEST");
		assert_eq!(json["totalStats"]["users"], 0);
		assert!(json["data"].as_array().is_some_and(Vec::is_empty));
		assert!(json.get("error_type").is_none());
	}

	#[test]
	fn failure_envelope_carries_error_type() {
		let json = serde_json::to_value(ReportEnvelope::failure_with(
			ErrorCode::ApiError,
			"API returned status code: 403",
		))
		.expect("Envelope should serialize.");

		assert_eq!(
			json,
			serde_json::json!({
				"success": false,
				"message": "API returned status code: 403",
				"error_type": "api_error"
			})
		);
	}

	#[test]
	fn debug_hides_the_token() {
		let rendered = format!("{:?}", DashboardAccount::from_profile(&profile()));

		assert!(!rendered.contains("ya29"));
	}
}
