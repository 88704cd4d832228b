//! Tenant scopes: a single site or the whole multisite network.

// self
use crate::{_prelude::*, store::OPTION_PREFIX};

/// Tenant boundary owning exactly one credential profile and one transit token.
#[derive(
	Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
	/// The current site.
	#[default]
	Site,
	/// The multisite network.
	Network,
}
impl Scope {
	/// Returns the stable label used in requests and logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Site => "site",
			Self::Network => "network",
		}
	}

	/// Builds the storage key for a per-scope option such as `profile` or `tt`.
	pub fn option_key(self, suffix: &str) -> String {
		match self {
			Self::Site => format!("{OPTION_PREFIX}{suffix}"),
			Self::Network => format!("{OPTION_PREFIX}network_{suffix}"),
		}
	}
}
impl Display for Scope {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for Scope {
	type Err = ScopeParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"site" => Ok(Self::Site),
			"network" => Ok(Self::Network),
			other => Err(ScopeParseError { value: other.to_owned() }),
		}
	}
}

/// Error returned when a scope label is neither `site` nor `network`.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Scope `{value}` is not one of `site` or `network`.")]
pub struct ScopeParseError {
	/// Rejected input.
	pub value: String,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn option_keys_are_partitioned_per_scope() {
		assert_eq!(Scope::Site.option_key("profile"), "uipress_analytics_bridge_profile");
		assert_eq!(
			Scope::Network.option_key("profile"),
			"uipress_analytics_bridge_network_profile"
		);
		assert_eq!(Scope::Network.option_key("tt"), "uipress_analytics_bridge_network_tt");
	}

	#[test]
	fn parsing_is_strict() {
		assert_eq!("network".parse::<Scope>(), Ok(Scope::Network));
		assert_eq!("site".parse::<Scope>(), Ok(Scope::Site));
		assert!("Network".parse::<Scope>().is_err());
	}
}
