//! Report queries, the GA4 `runReport` wire shapes, and the dashboard-facing formatted report.

// crates.io
use time::macros::format_description;
// self
use crate::{_prelude::*, analytics::naming};

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Date range and names requested by the dashboard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportQuery {
	/// First day of the range, inclusive.
	#[serde(with = "iso_date")]
	pub start_date: Date,
	/// Last day of the range, inclusive; drives the cache lifetime.
	#[serde(with = "iso_date")]
	pub end_date: Date,
	/// Requested metrics, legacy or GA4 spelling.
	#[serde(default)]
	pub metrics: Vec<String>,
	/// Requested dimensions, legacy or GA4 spelling.
	#[serde(default)]
	pub dimensions: Vec<String>,
}
impl ReportQuery {
	/// Queries the default metrics over `start_date..=end_date`.
	pub fn new(start_date: Date, end_date: Date) -> Self {
		Self { start_date, end_date, metrics: Vec::new(), dimensions: Vec::new() }
	}

	/// Adds a requested metric.
	pub fn metric(mut self, name: impl Into<String>) -> Self {
		self.metrics.push(name.into());

		self
	}

	/// Adds a requested dimension.
	pub fn dimension(mut self, name: impl Into<String>) -> Self {
		self.dimensions.push(name.into());

		self
	}

	/// GA4 metric names to request; the default trio when none were named.
	pub fn ga4_metrics(&self) -> Vec<String> {
		let metrics = naming::translate_list(self.metrics.iter().map(String::as_str));

		if metrics.is_empty() {
			naming::DEFAULT_METRICS.iter().map(|name| (*name).to_owned()).collect()
		} else {
			metrics
		}
	}

	/// GA4 dimension names to request, always led by `date`.
	pub fn ga4_dimensions(&self) -> Vec<String> {
		naming::translate_list(
			std::iter::once(naming::DATE_DIMENSION)
				.chain(self.dimensions.iter().map(String::as_str)),
		)
	}

	/// Builds the `runReport` request body.
	pub fn request_body(&self) -> JsonValue {
		let named = |names: Vec<String>| {
			names.into_iter().map(|name| serde_json::json!({ "name": name })).collect::<Vec<_>>()
		};

		serde_json::json!({
			"dateRanges": [{
				"startDate": iso_date_string(self.start_date),
				"endDate": iso_date_string(self.end_date),
			}],
			"dimensions": named(self.ga4_dimensions()),
			"metrics": named(self.ga4_metrics()),
		})
	}
}

/// Report in the dashboard's expected shape.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedReport {
	/// One point per reported day.
	pub data: Vec<SeriesPoint>,
	/// Sums over every usable row.
	pub total_stats: TotalStats,
	/// Top pages; filled by the dashboard's own widgets.
	pub top_content: Vec<JsonValue>,
	/// Top traffic sources; filled by the dashboard's own widgets.
	pub top_sources: Vec<JsonValue>,
}

/// One day of the time series.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPoint {
	/// Day in `YYYY-MM-DD` form.
	pub name: String,
	/// Active users.
	pub value: u64,
	/// Screen page views.
	pub pageviews: u64,
	/// Sessions.
	pub sessions: u64,
}

/// Totals across the whole range.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalStats {
	/// Active users.
	pub users: u64,
	/// Screen page views.
	pub pageviews: u64,
	/// Sessions.
	pub sessions: u64,
	/// Period-over-period change; the bridge reports no comparison period.
	pub change: StatChange,
}

/// Period-over-period change percentages.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatChange {
	/// Change in active users.
	pub users: i64,
	/// Change in page views.
	pub pageviews: i64,
	/// Change in sessions.
	pub sessions: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct RunReportResponse {
	dimension_headers: Vec<Header>,
	metric_headers: Vec<Header>,
	rows: Vec<Row>,
}
impl RunReportResponse {
	/// Folds the rows into the dashboard report.
	///
	/// Columns are located by header name. Rows without a parseable `date` value are skipped.
	/// Rows split by extra dimensions are merged into one point per day, in date order.
	pub(crate) fn format(&self) -> FormattedReport {
		let date_at = position(&self.dimension_headers, naming::DATE_DIMENSION);
		let users_at = position(&self.metric_headers, naming::USERS_METRIC);
		let sessions_at = position(&self.metric_headers, naming::SESSIONS_METRIC);
		let pageviews_at = position(&self.metric_headers, naming::PAGEVIEWS_METRIC);
		let mut days = BTreeMap::<Date, SeriesPoint>::new();
		let mut report = FormattedReport::default();

		for row in &self.rows {
			let Some(day) = date_at.and_then(|at| row.dimension(at)).and_then(parse_day) else {
				continue;
			};
			let point = days.entry(day).or_insert_with(|| SeriesPoint {
				name: iso_date_string(day),
				..Default::default()
			});
			let (users, pageviews, sessions) =
				(row.metric(users_at), row.metric(pageviews_at), row.metric(sessions_at));

			point.value = point.value.saturating_add(users);
			point.pageviews = point.pageviews.saturating_add(pageviews);
			point.sessions = point.sessions.saturating_add(sessions);

			let totals = &mut report.total_stats;

			totals.users = totals.users.saturating_add(users);
			totals.pageviews = totals.pageviews.saturating_add(pageviews);
			totals.sessions = totals.sessions.saturating_add(sessions);
		}

		report.data = days.into_values().collect();

		report
	}
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Header {
	name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Row {
	dimension_values: Vec<Cell>,
	metric_values: Vec<Cell>,
}
impl Row {
	fn dimension(&self, at: usize) -> Option<&str> {
		self.dimension_values.get(at)?.value.as_deref()
	}

	fn metric(&self, at: Option<usize>) -> u64 {
		at.and_then(|at| self.metric_values.get(at))
			.and_then(|cell| cell.value.as_deref())
			.and_then(parse_count)
			.unwrap_or(0)
	}
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Cell {
	value: Option<String>,
}

fn position(headers: &[Header], name: &str) -> Option<usize> {
	headers.iter().position(|header| header.name == name)
}

fn parse_day(raw: &str) -> Option<Date> {
	Date::parse(raw, format_description!("[year][month][day]")).ok()
}

fn parse_count(raw: &str) -> Option<u64> {
	raw.parse::<u64>().ok().or_else(|| {
		raw.parse::<f64>().ok().filter(|value| value.is_finite() && *value >= 0.).map(|v| v as u64)
	})
}

fn iso_date_string(day: Date) -> String {
	format!("{:04}-{:02}-{:02}", day.year(), u8::from(day.month()), day.day())
}
