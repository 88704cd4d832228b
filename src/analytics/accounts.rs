//! GA4 Admin API listings used to pick the property a scope reports on.

// self
use crate::{
	_prelude::*,
	auth::{AccountId, MeasurementId, PropertyId},
};

const WEB_STREAM_TYPE: &str = "WEB_DATA_STREAM";

/// One selectable property together with its owning account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySummary {
	/// Owning account.
	pub account_id: AccountId,
	/// Display name of the owning account.
	pub account_name: String,
	/// Selectable property.
	pub property_id: PropertyId,
	/// Display name of the property.
	pub property_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct AccountSummariesPage {
	account_summaries: Vec<AccountSummary>,
	pub(crate) next_page_token: Option<String>,
}
impl AccountSummariesPage {
	/// Flattens the page into property summaries, dropping entries with malformed names.
	pub(crate) fn into_properties(self) -> impl Iterator<Item = PropertySummary> {
		self.account_summaries.into_iter().flat_map(|account| {
			let account_id = AccountId::from_resource_name(&account.account).ok();
			let account_name = account.display_name;

			account.property_summaries.into_iter().filter_map(move |property| {
				Some(PropertySummary {
					account_id: account_id.clone()?,
					account_name: account_name.clone(),
					property_id: PropertyId::from_resource_name(&property.property).ok()?,
					property_name: property.display_name,
				})
			})
		})
	}
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AccountSummary {
	account: String,
	display_name: String,
	property_summaries: Vec<PropertyEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PropertyEntry {
	property: String,
	display_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct DataStreamsPage {
	data_streams: Vec<DataStream>,
}
impl DataStreamsPage {
	/// Measurement id of the first web stream, if any.
	pub(crate) fn web_measurement_id(&self) -> Option<MeasurementId> {
		self.data_streams
			.iter()
			.filter(|stream| stream.kind == WEB_STREAM_TYPE)
			.filter_map(|stream| stream.web_stream_data.as_ref())
			.find_map(|web| MeasurementId::new(&web.measurement_id).ok())
	}
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DataStream {
	#[serde(rename = "type")]
	kind: String,
	web_stream_data: Option<WebStreamData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WebStreamData {
	measurement_id: String,
}
