// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{_prelude::*, error::RefreshDisposition};

/// Refresh outcome counters shared by every clone of one lifecycle.
///
/// Failures are split by [`RefreshDisposition`] so a settings page can tell a flaky network
/// apart from a connection the operator has to redo.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	rotated: AtomicU64,
	retryable: AtomicU64,
	reauthenticate: AtomicU64,
}
impl RefreshMetrics {
	/// Refresh grants attempted.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Refreshes that stored a new access token.
	pub fn successes(&self) -> u64 {
		self.rotated.load(Ordering::Relaxed)
	}

	/// Refreshes that failed, whatever the disposition.
	pub fn failures(&self) -> u64 {
		self.retryable_failures() + self.reauthentications()
	}

	/// Failures worth retrying later.
	pub fn retryable_failures(&self) -> u64 {
		self.retryable.load(Ordering::Relaxed)
	}

	/// Failures that require reconnecting Google Analytics.
	pub fn reauthentications(&self) -> u64 {
		self.reauthenticate.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_result<T>(&self, result: &Result<T>) {
		let counter = match result {
			Ok(_) => &self.rotated,
			Err(Error::TokenRefresh { disposition: RefreshDisposition::Retry, .. }) =>
				&self.retryable,
			Err(_) => &self.reauthenticate,
		};

		counter.fetch_add(1, Ordering::Relaxed);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn failures_are_split_by_disposition() {
		let metrics = RefreshMetrics::default();
		let transient = Error::Api { status: Some(503), message: "unavailable".into() };

		metrics.record_attempt();
		metrics.record_result(&Ok::<_, Error>(()));
		metrics.record_result::<()>(&Err(Error::MissingCredentials.into_refresh_failure()));
		metrics.record_result::<()>(&Err(Error::TokenRefresh {
			disposition: RefreshDisposition::Retry,
			source: Box::new(transient),
		}));

		assert_eq!(metrics.attempts(), 1);
		assert_eq!(metrics.successes(), 1);
		assert_eq!(metrics.retryable_failures(), 1);
		assert_eq!(metrics.reauthentications(), 1);
		assert_eq!(metrics.failures(), 2);
	}
}
