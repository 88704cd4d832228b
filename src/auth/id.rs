//! Strongly typed Google Analytics identifiers.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				validate_view($kind, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 128;
const PROPERTY_RESOURCE_PREFIX: &str = "properties/";
const ACCOUNT_RESOURCE_PREFIX: &str = "accounts/";

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (property, measurement, account, provider).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (property, measurement, account, provider).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (property, measurement, account, provider).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { PropertyId, "GA4 property identifier without the `properties/` prefix.", "Property" }
def_id! { MeasurementId, "Web data stream measurement identifier (`G-XXXXXXX`).", "Measurement" }
def_id! { AccountId, "Analytics account identifier without the `accounts/` prefix.", "Account" }
def_id! { ProviderId, "Identifier for an OAuth provider descriptor.", "Provider" }

impl PropertyId {
	/// Parses an admin API resource name such as `properties/1234`; bare ids are accepted too.
	pub fn from_resource_name(name: &str) -> Result<Self, IdentifierError> {
		Self::new(name.strip_prefix(PROPERTY_RESOURCE_PREFIX).unwrap_or(name))
	}

	/// Returns the `properties/{id}` resource name used by the Data and Admin APIs.
	pub fn resource_name(&self) -> String {
		format!("{PROPERTY_RESOURCE_PREFIX}{}", self.0)
	}
}

impl AccountId {
	/// Parses an admin API resource name such as `accounts/42`; bare ids are accepted too.
	pub fn from_resource_name(name: &str) -> Result<Self, IdentifierError> {
		Self::new(name.strip_prefix(ACCOUNT_RESOURCE_PREFIX).unwrap_or(name))
	}
}

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identifiers_reject_blank_and_padded_values() {
		assert!(PropertyId::new("").is_err());
		assert!(PropertyId::new(" 1234").is_err(), "Leading whitespace must be rejected.");
		assert!(MeasurementId::new("G-ABC DEF").is_err());
		assert!(AccountId::new(&"9".repeat(IDENTIFIER_MAX_LEN + 1)).is_err());

		let measurement =
			MeasurementId::new("G-ABC123").expect("Measurement fixture should be valid.");

		assert_eq!(measurement.as_ref(), "G-ABC123");
	}

	#[test]
	fn resource_names_strip_collection_prefix() {
		let property = PropertyId::from_resource_name("properties/314159")
			.expect("Resource name should parse into a property identifier.");

		assert_eq!(property.as_ref(), "314159");
		assert_eq!(property.resource_name(), "properties/314159");
		assert_eq!(
			PropertyId::from_resource_name("271828").expect("Bare id should parse.").as_ref(),
			"271828"
		);
		assert_eq!(
			AccountId::from_resource_name("accounts/42").expect("Account should parse.").as_ref(),
			"42"
		);
	}

	#[test]
	fn serde_enforces_validation() {
		let property: PropertyId =
			serde_json::from_str("\"123\"").expect("Property should deserialize successfully.");

		assert_eq!(&*property, "123");
		assert!(serde_json::from_str::<PropertyId>("\"\"").is_err());
		assert!(serde_json::from_str::<MeasurementId>("\"G- 1\"").is_err());
	}
}
