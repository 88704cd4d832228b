//! Credential profile persisted once per scope, plus the token grants that update it.

// self
use crate::{
	_prelude::*,
	auth::{AccountId, MeasurementId, PropertyId, Secret},
	error::Precondition,
};

/// Seconds before expiry at which an access token is treated as due for refresh.
pub const REFRESH_MARGIN_SECS: i64 = 300;

/// Everything the bridge knows about one scope's Google connection.
///
/// Timestamps are Unix seconds. Absent fields are omitted from the stored JSON so an empty
/// profile serializes to `{}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialProfile {
	/// OAuth client identifier that minted the stored tokens.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub client_id: Option<String>,
	/// OAuth client secret paired with `client_id`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub client_secret: Option<Secret>,
	/// Bearer token sent to the Data and Admin APIs.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub access_token: Option<Secret>,
	/// Long-lived credential used to mint new access tokens.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<Secret>,
	/// Issue time of `access_token`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub token_created: Option<i64>,
	/// Lifetime of `access_token` in seconds.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub expires_in: Option<i64>,
	/// Selected GA4 property.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub property_id: Option<PropertyId>,
	/// Measurement id of the selected property's web stream.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub measurement_id: Option<MeasurementId>,
	/// Account owning the selected property.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub account_id: Option<AccountId>,
	/// Human-readable label shown by the dashboard.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub view_label: Option<String>,
	/// Time of the most recent write.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub connection_time: Option<i64>,
	/// Measurement Protocol API secret, kept across reconnects.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub measurement_protocol_secret: Option<Secret>,
	/// Operator-pinned property, kept across reconnects.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub manual_property_id: Option<PropertyId>,
}
impl CredentialProfile {
	/// Returns true when no field is set.
	pub fn is_empty(&self) -> bool {
		*self == Self::default()
	}

	/// Returns true when both an access token and a property are present.
	pub fn is_authenticated(&self) -> bool {
		self.missing_precondition().is_none()
	}

	/// Names the first unmet precondition for querying analytics data.
	pub fn missing_precondition(&self) -> Option<Precondition> {
		if !has_value(self.access_token.as_ref()) {
			return Some(Precondition::AccessToken);
		}
		if self.reporting_property().is_none() {
			return Some(Precondition::Resource);
		}

		None
	}

	/// Property queries run against: the selected one, else the pinned fallback.
	pub fn reporting_property(&self) -> Option<&PropertyId> {
		self.property_id.as_ref().or(self.manual_property_id.as_ref())
	}

	/// Unix time at which the access token expires, when both inputs are known.
	pub fn expires_at(&self) -> Option<i64> {
		Some(self.token_created?.saturating_add(self.expires_in?))
	}

	/// Decides whether the access token must be refreshed before use at `now`.
	///
	/// Requires a refresh token. A profile without a known expiry is always due.
	pub fn needs_refresh_at(&self, now: OffsetDateTime) -> bool {
		if !has_value(self.refresh_token.as_ref()) {
			return false;
		}

		self.expires_at().is_none_or(|_| self.is_expiring_at(now))
	}

	/// Returns true when the known expiry of the access token falls inside the margin at `now`.
	///
	/// Unlike [`CredentialProfile::needs_refresh_at`] this ignores the refresh token, so an
	/// expiring token that cannot be refreshed is still reported.
	pub fn is_expiring_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at()
			.is_some_and(|expires_at| now.unix_timestamp() > expires_at - REFRESH_MARGIN_SECS)
	}

	/// Overwrites token fields from a fresh grant; keeps the stored refresh token when the
	/// provider did not issue a new one.
	pub fn apply_grant(&mut self, grant: TokenGrant) {
		self.access_token = Some(grant.access_token);
		self.token_created = Some(grant.issued_at.unix_timestamp());
		self.expires_in = Some(grant.expires_in);

		if let Some(refresh) = grant.refresh_token {
			self.refresh_token = Some(refresh);
		}
	}

	/// Binds the profile to a property and its web stream.
	pub fn apply_selection(&mut self, selection: ResourceSelection) {
		self.account_id = Some(selection.account_id);
		self.property_id = Some(selection.property_id);
		self.measurement_id = Some(selection.measurement_id);

		if selection.view_label.is_some() {
			self.view_label = selection.view_label;
		}
	}

	/// Minimal profile retained after a migrating delete.
	///
	/// Keeps the measurement-protocol secret and the pinned property, promoting the live
	/// property when nothing was pinned yet.
	pub fn migrated(&self) -> Self {
		Self {
			manual_property_id: self
				.manual_property_id
				.clone()
				.or_else(|| self.property_id.clone()),
			measurement_protocol_secret: self.measurement_protocol_secret.clone(),
			..Default::default()
		}
	}
}

/// Token material returned by a successful code exchange or refresh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenGrant {
	/// Newly issued access token.
	pub access_token: Secret,
	/// Rotated refresh token, when the provider issued one.
	pub refresh_token: Option<Secret>,
	/// Lifetime of the access token in seconds.
	pub expires_in: i64,
	/// Time the grant was received.
	pub issued_at: OffsetDateTime,
}

/// Operator choice of which property a scope reports on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSelection {
	/// Account owning the property.
	pub account_id: AccountId,
	/// Property to query.
	pub property_id: PropertyId,
	/// Measurement id of the property's web stream.
	pub measurement_id: MeasurementId,
	/// Optional display label.
	pub view_label: Option<String>,
}

fn has_value(secret: Option<&Secret>) -> bool {
	secret.is_some_and(|value| !value.is_empty())
}
