//! GA4 Data and Admin API client.
//!
//! [`AnalyticsClient`] runs reports for a property and lists the properties an access token
//! can see. It never refreshes tokens itself; callers hand it the token returned by
//! [`TokenLifecycle::ensure_fresh`](crate::flows::TokenLifecycle::ensure_fresh).

pub mod accounts;
pub mod naming;
pub mod report;

pub use accounts::PropertySummary;
pub use report::{FormattedReport, ReportQuery, SeriesPoint, StatChange, TotalStats};

// crates.io
use oauth2::http::Method;
// self
use crate::{
	_prelude::*,
	auth::{MeasurementId, PropertyId, Secret},
	error::ConfigError,
	http::{self, Endpoint, Exchange, TokenHttpClient},
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::ProviderDescriptor,
};
use accounts::{AccountSummariesPage, DataStreamsPage};
use report::RunReportResponse;

const ACCOUNT_SUMMARIES_PAGE_SIZE: &str = "200";

/// Executes GA4 reports and admin listings over a [`TokenHttpClient`].
pub struct AnalyticsClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	http_client: Arc<C>,
	transport_mapper: Arc<M>,
	descriptor: ProviderDescriptor,
}
impl<C, M> AnalyticsClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a client calling the descriptor's reporting and admin endpoints.
	pub fn new(
		http_client: Arc<C>,
		transport_mapper: Arc<M>,
		descriptor: ProviderDescriptor,
	) -> Self {
		Self { http_client, transport_mapper, descriptor }
	}

	/// Runs `query` against `property_id` and folds the rows into a [`FormattedReport`].
	///
	/// Non-success answers become [`Error::Api`] carrying Google's message when the body has
	/// one, otherwise `API returned status code: N`.
	pub async fn run_report(
		&self,
		property_id: &PropertyId,
		access_token: &Secret,
		query: &ReportQuery,
	) -> Result<FormattedReport> {
		const KIND: FlowKind = FlowKind::Report;

		let span = FlowSpan::new(KIND, "run_report");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result: Result<FormattedReport> = span
			.instrument(async move {
				let url = join(
					&self.descriptor.endpoints.reporting,
					&format!("{}:runReport", property_id.resource_name()),
				)?;
				let request = http::json_request(
					Method::POST,
					&url,
					Some(access_token),
					Some(&query.request_body()),
				)?;
				let exchange = self.send(Endpoint::Reporting, request).await?;

				Ok(exchange.json::<RunReportResponse>()?.format())
			})
			.await;

		obs::record_flow_result(KIND, &result);

		result
	}

	/// Lists every property visible to `access_token`, following pagination.
	pub async fn list_properties(&self, access_token: &Secret) -> Result<Vec<PropertySummary>> {
		const KIND: FlowKind = FlowKind::ResourceListing;

		let span = FlowSpan::new(KIND, "list_properties");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result: Result<Vec<PropertySummary>> = span
			.instrument(async move {
				let base = join(&self.descriptor.endpoints.admin, "accountSummaries")?;
				let mut properties = Vec::new();
				let mut page_token = None::<String>;

				loop {
					let mut url = base.clone();

					{
						let mut pairs = url.query_pairs_mut();

						pairs.append_pair("pageSize", ACCOUNT_SUMMARIES_PAGE_SIZE);

						if let Some(token) = page_token.as_deref() {
							pairs.append_pair("pageToken", token);
						}
					}

					let request = http::json_request(Method::GET, &url, Some(access_token), None)?;
					let mut page =
						self.send(Endpoint::Admin, request).await?.json::<AccountSummariesPage>()?;

					page_token = page.next_page_token.take().filter(|token| !token.is_empty());

					properties.extend(page.into_properties());

					if page_token.is_none() {
						break;
					}
				}

				Ok(properties)
			})
			.await;

		obs::record_flow_result(KIND, &result);

		result
	}

	/// Looks up the measurement id of the property's web data stream.
	pub async fn web_measurement_id(
		&self,
		access_token: &Secret,
		property_id: &PropertyId,
	) -> Result<Option<MeasurementId>> {
		const KIND: FlowKind = FlowKind::ResourceListing;

		let span = FlowSpan::new(KIND, "web_measurement_id");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result: Result<Option<MeasurementId>> = span
			.instrument(async move {
				let url = join(
					&self.descriptor.endpoints.admin,
					&format!("{}/dataStreams", property_id.resource_name()),
				)?;
				let request = http::json_request(Method::GET, &url, Some(access_token), None)?;
				let page = self.send(Endpoint::Admin, request).await?.json::<DataStreamsPage>()?;

				Ok(page.web_measurement_id())
			})
			.await;

		obs::record_flow_result(KIND, &result);

		result
	}

	async fn send(&self, endpoint: Endpoint, request: oauth2::HttpRequest) -> Result<Exchange> {
		let exchange = http::dispatch(
			self.http_client.as_ref(),
			self.transport_mapper.as_ref(),
			endpoint,
			request,
		)
		.await?;

		if exchange.is_success() { Ok(exchange) } else { Err(api_error(&exchange)) }
	}
}
impl<C, M> Clone for AnalyticsClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			transport_mapper: self.transport_mapper.clone(),
			descriptor: self.descriptor.clone(),
		}
	}
}
impl<C, M> Debug for AnalyticsClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AnalyticsClient")
			.field("reporting", &self.descriptor.endpoints.reporting.as_str())
			.field("admin", &self.descriptor.endpoints.admin.as_str())
			.finish()
	}
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GoogleErrorBody {
	error: Option<GoogleError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GoogleError {
	message: Option<String>,
}

fn api_error(exchange: &Exchange) -> Error {
	let status = exchange.status();
	let message = serde_json::from_slice::<GoogleErrorBody>(exchange.response.body())
		.ok()
		.and_then(|body| body.error?.message)
		.filter(|message| !message.is_empty())
		.unwrap_or_else(|| format!("API returned status code: {status}"));

	Error::Api { status: Some(status), message }
}

fn join(base: &Url, path: &str) -> Result<Url> {
	base.join(path).map_err(|source| ConfigError::InvalidDescriptor { source }.into())
}
