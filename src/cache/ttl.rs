//! Recency tiers deciding how long a report may be reused.

// self
use crate::_prelude::*;

/// Lifetime of reports ending today (or in the future).
pub const TODAY_TTL: Duration = Duration::minutes(30);
/// Lifetime of reports ending yesterday.
pub const YESTERDAY_TTL: Duration = Duration::hours(3);
/// Lifetime of reports ending within the past week.
pub const WEEK_TTL: Duration = Duration::hours(12);
/// Lifetime of older reports.
pub const HISTORICAL_TTL: Duration = Duration::days(1);

const WEEK_DAYS: i64 = 7;

/// Returns the cache lifetime for a report whose range ends on `end_date`, seen on `today`.
pub fn recency_ttl(end_date: Date, today: Date) -> Duration {
	match (today - end_date).whole_days() {
		..=0 => TODAY_TTL,
		1 => YESTERDAY_TTL,
		days if days < WEEK_DAYS => WEEK_TTL,
		_ => HISTORICAL_TTL,
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::date;
	// self
	use super::*;

	#[test]
	fn tiers_follow_end_date_age() {
		let today = date!(2024 - 06 - 15);

		assert_eq!(recency_ttl(today, today).whole_seconds(), 1800);
		assert_eq!(recency_ttl(date!(2024 - 06 - 20), today).whole_seconds(), 1800);
		assert_eq!(recency_ttl(date!(2024 - 06 - 14), today).whole_seconds(), 10800);
		assert_eq!(recency_ttl(date!(2024 - 06 - 10), today).whole_seconds(), 43200);
		assert_eq!(recency_ttl(date!(2024 - 06 - 09), today).whole_seconds(), 43200);
		assert_eq!(recency_ttl(date!(2024 - 06 - 08), today).whole_seconds(), 86400);
		assert_eq!(recency_ttl(date!(2023 - 01 - 01), today).whole_seconds(), 86400);
	}
}
