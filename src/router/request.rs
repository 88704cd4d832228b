//! Typed inbound requests validated from raw string parameters.

// crates.io
use time::macros::format_description;
// self
use crate::{
	_prelude::*,
	analytics::ReportQuery,
	auth::{AccountId, MeasurementId, PropertyId, Scope, Secret},
	bridge::PropertyChoice,
	settings::Settings,
};

const DEFAULT_RANGE_DAYS: i64 = 30;
const DEFAULT_METRICS: &str = "ga:users,ga:sessions,ga:pageviews";
const DEFAULT_DIMENSIONS: &str = "ga:date";

/// Raw request parameters as submitted by the host.
pub type Params = BTreeMap<String, String>;

/// Errors raised while validating inbound parameters.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RequestError {
	/// The action name is not routed.
	#[error("Unknown action `{action}`.")]
	UnknownAction {
		/// Rejected action name.
		action: String,
	},
	/// A required parameter is absent or blank.
	#[error("Missing required parameter `{name}`.")]
	MissingParameter {
		/// Parameter name.
		name: &'static str,
	},
	/// A parameter failed validation.
	#[error("Parameter `{name}` is invalid: {message}.")]
	InvalidParameter {
		/// Parameter name.
		name: &'static str,
		/// Validation message.
		message: String,
	},
}

/// Operations reachable from the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Action {
	/// Issue the consent URL.
	AuthorizationUrl,
	/// Complete the OAuth callback.
	Callback,
	/// Run a report.
	RunReport,
	/// Drop every cached report.
	ClearCache,
	/// Disconnect a scope.
	Deauthorize,
	/// Choose the property a scope reports on.
	SelectResource,
	/// List selectable properties.
	ListProperties,
	/// Check the stored token with Google.
	VerifyConnection,
	/// Summarize the connection.
	AuthStatus,
	/// Persist operator settings.
	SaveSettings,
	/// Pin the property kept across reconnects.
	SetManualProperty,
	/// Store the Measurement Protocol API secret.
	SetMeasurementProtocolSecret,
}
impl Action {
	/// Every routed action.
	pub const ALL: [Self; 12] = [
		Self::AuthorizationUrl,
		Self::Callback,
		Self::RunReport,
		Self::ClearCache,
		Self::Deauthorize,
		Self::SelectResource,
		Self::ListProperties,
		Self::VerifyConnection,
		Self::AuthStatus,
		Self::SaveSettings,
		Self::SetManualProperty,
		Self::SetMeasurementProtocolSecret,
	];

	/// Returns the wire name of the action.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::AuthorizationUrl => "authorization_url",
			Self::Callback => "oauth_callback",
			Self::RunReport => "run_report",
			Self::ClearCache => "clear_cache",
			Self::Deauthorize => "deauthorize",
			Self::SelectResource => "select_resource",
			Self::ListProperties => "list_properties",
			Self::VerifyConnection => "verify_connection",
			Self::AuthStatus => "auth_status",
			Self::SaveSettings => "save_settings",
			Self::SetManualProperty => "set_manual_property",
			Self::SetMeasurementProtocolSecret => "set_measurement_protocol_secret",
		}
	}
}
impl Display for Action {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for Action {
	type Err = RequestError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|action| action.as_str() == s)
			.ok_or_else(|| RequestError::UnknownAction { action: s.to_owned() })
	}
}

/// Partial settings submitted from the settings page; absent fields keep their stored value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SettingsUpdate {
	/// New OAuth client identifier.
	pub client_id: Option<String>,
	/// New OAuth client secret.
	pub client_secret: Option<Secret>,
	/// New debug switch.
	pub debug_mode: Option<bool>,
	/// New cache switch in seconds.
	pub cache_duration: Option<u64>,
}
impl SettingsUpdate {
	/// Overlays the submitted fields onto `current`.
	pub fn apply(self, current: Settings) -> Settings {
		Settings {
			client_id: self.client_id.or(current.client_id),
			client_secret: self.client_secret.or(current.client_secret),
			debug_mode: self.debug_mode.unwrap_or(current.debug_mode),
			cache_duration: self.cache_duration.unwrap_or(current.cache_duration),
		}
	}
}

/// Validated inbound request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
	/// Issue the consent URL for `scope`.
	AuthorizationUrl {
		/// Target scope.
		scope: Scope,
	},
	/// OAuth redirect back from Google.
	Callback {
		/// Target scope.
		scope: Scope,
		/// Authorization code; checked after the state.
		code: Option<String>,
		/// Transit token echoed back as `state`.
		state: Option<String>,
		/// Measurement Protocol secret submitted alongside the callback.
		measurement_protocol_secret: Option<Secret>,
	},
	/// Report over a date range.
	RunReport {
		/// Target scope.
		scope: Scope,
		/// Date range and names.
		query: ReportQuery,
	},
	/// Drop every cached report.
	ClearCache,
	/// Disconnect `scope`.
	Deauthorize {
		/// Target scope.
		scope: Scope,
	},
	/// Bind `scope` to a property.
	SelectResource {
		/// Target scope.
		scope: Scope,
		/// Submitted property.
		choice: PropertyChoice,
	},
	/// List selectable properties.
	ListProperties {
		/// Target scope.
		scope: Scope,
	},
	/// Check the stored token with Google.
	VerifyConnection {
		/// Target scope.
		scope: Scope,
	},
	/// Summarize the connection.
	AuthStatus {
		/// Target scope.
		scope: Scope,
	},
	/// Persist operator settings.
	SaveSettings {
		/// Submitted fields.
		update: SettingsUpdate,
	},
	/// Pin a property on `scope`.
	SetManualProperty {
		/// Target scope.
		scope: Scope,
		/// Property kept across reconnects.
		property_id: PropertyId,
	},
	/// Replace the Measurement Protocol secret of `scope`; `None` clears it.
	SetMeasurementProtocolSecret {
		/// Target scope.
		scope: Scope,
		/// New secret.
		secret: Option<Secret>,
	},
}
impl Request {
	/// Validates `params` for `action`, defaulting report ranges relative to today (UTC).
	pub fn parse(action: Action, params: &Params) -> Result<Self, RequestError> {
		Self::parse_at(action, params, OffsetDateTime::now_utc().date())
	}

	/// [`Request::parse`] with an explicit notion of today.
	pub fn parse_at(action: Action, params: &Params, today: Date) -> Result<Self, RequestError> {
		let scope = scope(params)?;
		let request = match action {
			Action::AuthorizationUrl => Self::AuthorizationUrl { scope },
			Action::Callback => Self::Callback {
				scope,
				code: optional(params, "code").map(str::to_owned),
				state: optional(params, "state").map(str::to_owned),
				measurement_protocol_secret: optional(params, "mp").map(Secret::new),
			},
			Action::RunReport => {
				let end_date = date(params, "endDate")?.unwrap_or(today);
				let start_date = match date(params, "startDate")? {
					Some(start_date) => start_date,
					None => end_date
						.checked_sub(Duration::days(DEFAULT_RANGE_DAYS))
						.ok_or_else(|| RequestError::InvalidParameter {
							name: "endDate",
							message: "the default range starts before the earliest date".into(),
						})?,
				};

				if start_date > end_date {
					return Err(RequestError::InvalidParameter {
						name: "startDate",
						message: "the range starts after it ends".into(),
					});
				}

				let mut query = ReportQuery::new(start_date, end_date);

				query.metrics = list(params, "metrics", DEFAULT_METRICS);
				query.dimensions = list(params, "dimensions", DEFAULT_DIMENSIONS);

				Self::RunReport { scope, query }
			},
			Action::ClearCache => Self::ClearCache,
			Action::Deauthorize => Self::Deauthorize { scope },
			Action::SelectResource => Self::SelectResource {
				scope,
				choice: PropertyChoice {
					account_id: required_id(params, "account_id", AccountId::from_resource_name)?,
					property_id: required_id(
						params,
						"property_id",
						PropertyId::from_resource_name,
					)?,
					measurement_id: optional(params, "measurement_id")
						.map(MeasurementId::new)
						.transpose()
						.map_err(|e| invalid("measurement_id", e))?,
					view_label: optional(params, "view_label").map(str::to_owned),
				},
			},
			Action::ListProperties => Self::ListProperties { scope },
			Action::VerifyConnection => Self::VerifyConnection { scope },
			Action::AuthStatus => Self::AuthStatus { scope },
			Action::SaveSettings => Self::SaveSettings {
				update: SettingsUpdate {
					client_id: params.get("client_id").map(|id| id.trim().to_owned()),
					client_secret: params.get("client_secret").map(Secret::new),
					debug_mode: optional(params, "debug_mode").map(flag),
					cache_duration: optional(params, "cache_duration")
						.map(str::parse::<u64>)
						.transpose()
						.map_err(|e| invalid("cache_duration", e))?,
				},
			},
			Action::SetManualProperty => Self::SetManualProperty {
				scope,
				property_id: required_id(params, "property_id", PropertyId::from_resource_name)?,
			},
			Action::SetMeasurementProtocolSecret => Self::SetMeasurementProtocolSecret {
				scope,
				secret: optional(params, "secret").map(Secret::new),
			},
		};

		Ok(request)
	}

	/// Action this request is routed to.
	pub fn action(&self) -> Action {
		match self {
			Self::AuthorizationUrl { .. } => Action::AuthorizationUrl,
			Self::Callback { .. } => Action::Callback,
			Self::RunReport { .. } => Action::RunReport,
			Self::ClearCache => Action::ClearCache,
			Self::Deauthorize { .. } => Action::Deauthorize,
			Self::SelectResource { .. } => Action::SelectResource,
			Self::ListProperties { .. } => Action::ListProperties,
			Self::VerifyConnection { .. } => Action::VerifyConnection,
			Self::AuthStatus { .. } => Action::AuthStatus,
			Self::SaveSettings { .. } => Action::SaveSettings,
			Self::SetManualProperty { .. } => Action::SetManualProperty,
			Self::SetMeasurementProtocolSecret { .. } => Action::SetMeasurementProtocolSecret,
		}
	}
}

fn optional<'a>(params: &'a Params, name: &str) -> Option<&'a str> {
	params.get(name).map(|value| value.trim()).filter(|value| !value.is_empty())
}

fn scope(params: &Params) -> Result<Scope, RequestError> {
	match optional(params, "network") {
		None => Ok(Scope::Site),
		Some(value) => value.parse().map_err(|e| invalid("network", e)),
	}
}

fn date(params: &Params, name: &'static str) -> Result<Option<Date>, RequestError> {
	optional(params, name)
		.map(|raw| Date::parse(raw, format_description!("[year]-[month]-[day]")))
		.transpose()
		.map_err(|e| invalid(name, e))
}

fn list(params: &Params, name: &str, default: &str) -> Vec<String> {
	optional(params, name)
		.unwrap_or(default)
		.split(',')
		.map(str::trim)
		.filter(|item| !item.is_empty())
		.map(str::to_owned)
		.collect()
}

fn required_id<T, E>(
	params: &Params,
	name: &'static str,
	parse: impl FnOnce(&str) -> Result<T, E>,
) -> Result<T, RequestError>
where
	E: Display,
{
	let raw = optional(params, name).ok_or(RequestError::MissingParameter { name })?;

	parse(raw).map_err(|e| invalid(name, e))
}

fn flag(raw: &str) -> bool {
	matches!(raw, "1" | "true" | "on" | "yes")
}

fn invalid(name: &'static str, error: impl Display) -> RequestError {
	RequestError::InvalidParameter { name, message: error.to_string() }
}
