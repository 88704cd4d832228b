//! Optional observability helpers for bridge flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `analytics_bridge.flow` with the `flow`
//!   (operation) and `stage` (call site) fields, plus warnings for degraded paths when the
//!   operator turned on debug mode.
//! - Enable `metrics` to increment the `analytics_bridge_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`, and the
//!   `analytics_bridge_cache_total` counter labeled by `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the bridge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Consent URL construction.
	AuthorizationUrl,
	/// Authorization code exchange completed by the callback.
	CodeExchange,
	/// Refresh token grant.
	Refresh,
	/// Token introspection.
	Verify,
	/// Token revocation.
	Revoke,
	/// GA4 report execution.
	Report,
	/// Admin API listings (account summaries, data streams).
	ResourceListing,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::AuthorizationUrl => "authorization_url",
			FlowKind::CodeExchange => "code_exchange",
			FlowKind::Refresh => "refresh",
			FlowKind::Verify => "verify",
			FlowKind::Revoke => "revoke",
			FlowKind::Report => "report",
			FlowKind::ResourceListing => "resource_listing",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a bridge operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Cache lookups recorded by the response cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheOutcome {
	/// Served from a live entry.
	Hit,
	/// No live entry; the fetcher ran.
	Miss,
	/// Caching is disabled by settings.
	Bypass,
}
impl CacheOutcome {
	/// Returns a stable label suitable for metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CacheOutcome::Hit => "hit",
			CacheOutcome::Miss => "miss",
			CacheOutcome::Bypass => "bypass",
		}
	}
}
