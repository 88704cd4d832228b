//! Universal Analytics (`ga:*`) to GA4 name translation.

const LEGACY_PREFIX: &str = "ga:";

/// GA4 dimension carrying the `YYYYMMDD` day of each row.
pub const DATE_DIMENSION: &str = "date";
/// GA4 metric summed into the `users` bucket.
pub const USERS_METRIC: &str = "activeUsers";
/// GA4 metric summed into the `sessions` bucket.
pub const SESSIONS_METRIC: &str = "sessions";
/// GA4 metric summed into the `pageviews` bucket.
pub const PAGEVIEWS_METRIC: &str = "screenPageViews";

/// Metrics requested when the caller names none.
pub const DEFAULT_METRICS: [&str; 3] = [USERS_METRIC, SESSIONS_METRIC, PAGEVIEWS_METRIC];

const LEGACY_NAMES: &[(&str, &str)] = &[
	("ga:users", USERS_METRIC),
	("ga:newUsers", "newUsers"),
	("ga:sessions", SESSIONS_METRIC),
	("ga:pageviews", PAGEVIEWS_METRIC),
	("ga:uniquePageviews", PAGEVIEWS_METRIC),
	("ga:pageviewsPerSession", "screenPageViewsPerSession"),
	("ga:avgSessionDuration", "averageSessionDuration"),
	("ga:avgTimeOnPage", "userEngagementDuration"),
	("ga:bounceRate", "bounceRate"),
	("ga:date", DATE_DIMENSION),
	("ga:pagePath", "pagePath"),
	("ga:pageTitle", "pageTitle"),
	("ga:source", "sessionSource"),
	("ga:medium", "sessionMedium"),
	("ga:sourceMedium", "sessionSourceMedium"),
	("ga:country", "country"),
	("ga:deviceCategory", "deviceCategory"),
	("ga:browser", "browser"),
];

/// Translates one metric or dimension name to its GA4 spelling.
///
/// Unknown legacy names lose their `ga:` prefix; GA4 names pass through.
pub fn translate(name: &str) -> &str {
	let name = name.trim();

	LEGACY_NAMES
		.iter()
		.find(|(legacy, _)| *legacy == name)
		.map(|(_, current)| *current)
		.unwrap_or_else(|| name.strip_prefix(LEGACY_PREFIX).unwrap_or(name))
}

/// Splits a comma-separated name list, translating and de-duplicating while keeping order.
pub fn translate_list<'a, I>(names: I) -> Vec<String>
where
	I: IntoIterator<Item = &'a str>,
{
	let mut translated = Vec::new();

	for name in names.into_iter().flat_map(|raw| raw.split(',')).map(translate) {
		if !name.is_empty() && !translated.iter().any(|seen: &String| seen == name) {
			translated.push(name.to_owned());
		}
	}

	translated
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn legacy_names_map_to_ga4() {
		assert_eq!(translate("ga:users"), "activeUsers");
		assert_eq!(translate("ga:pageviews"), "screenPageViews");
		assert_eq!(translate("ga:source"), "sessionSource");
		assert_eq!(translate("ga:hostname"), "hostname");
		assert_eq!(translate("sessions"), "sessions");
	}

	#[test]
	fn lists_are_split_and_deduplicated() {
		assert_eq!(
			translate_list(["ga:users,ga:sessions", " ga:pageviews ,ga:uniquePageviews", ""]),
			vec!["activeUsers", "sessions", "screenPageViews"]
		);
	}
}
