//! Identifier newtypes.
//!
//! Orders, users and transaction tokens are all UUIDs underneath, but they are
//! never interchangeable: a transaction token is correlated with an order id
//! only by having been issued in the same prepare call. Keeping them as
//! distinct types makes it impossible to resolve a transaction with an order id
//! or look up an order by its token.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Error returned when a string is not a well-formed identifier.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid {kind}: '{value}' is not a valid UUID")]
pub struct IdParseError {
	/// Which identifier was being parsed.
	pub kind: &'static str,
	/// The rejected input.
	pub value: String,
}

macro_rules! uuid_id {
	($(#[$meta:meta])* $name:ident, $kind:literal) => {
		$(#[$meta])*
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(Uuid);

		impl $name {
			/// Generates a fresh random (v4) identifier.
			pub fn new() -> Self {
				Self(Uuid::new_v4())
			}

			/// Parses an identifier from its textual form.
			pub fn parse(value: &str) -> Result<Self, IdParseError> {
				Uuid::parse_str(value.trim())
					.map(Self)
					.map_err(|_| IdParseError {
						kind: $kind,
						value: value.to_string(),
					})
			}

			/// Returns the underlying UUID.
			pub fn as_uuid(&self) -> &Uuid {
				&self.0
			}
		}

		impl Default for $name {
			fn default() -> Self {
				Self::new()
			}
		}

		impl From<Uuid> for $name {
			fn from(value: Uuid) -> Self {
				Self(value)
			}
		}

		impl From<$name> for Uuid {
			fn from(value: $name) -> Self {
				value.0
			}
		}

		impl FromStr for $name {
			type Err = IdParseError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::parse(s)
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				self.0.hyphenated().fmt(f)
			}
		}
	};
}

uuid_id!(
	/// Identifier of an order, generated by the submission service.
	OrderId,
	"order id"
);

uuid_id!(
	/// Identifier of the user placing an order. Opaque to this service.
	UserId,
	"user id"
);

uuid_id!(
	/// Opaque token correlating a prepare with its later commit or rollback.
	///
	/// The hyphenated form is the global transaction identifier handed to the
	/// store. Because the token can only ever hold a UUID, its textual form is
	/// restricted to hex digits and hyphens.
	TransactionId,
	"transaction id"
);

impl TransactionId {
	/// Returns the token as passed to the store's prepared-transaction registry.
	pub fn token(&self) -> String {
		self.to_string()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_fresh_ids_are_distinct() {
		let a = TransactionId::new();
		let b = TransactionId::new();
		assert_ne!(a, b);
		assert_ne!(OrderId::new().as_uuid(), OrderId::new().as_uuid());
	}

	#[test]
	fn test_parse_rejects_malformed() {
		let err = UserId::parse("not-a-uuid").unwrap_err();
		assert_eq!(err.kind, "user id");
		assert!(err.to_string().contains("not-a-uuid"));

		assert!(TransactionId::parse("").is_err());
		assert!(TransactionId::parse("'; DROP TABLE orders; --").is_err());
	}

	#[test]
	fn test_token_is_hyphenated_lowercase() {
		let tx = TransactionId::parse("6F9619FF-8B86-D011-B42D-00C04FC964FF").unwrap();
		assert_eq!(tx.token(), "6f9619ff-8b86-d011-b42d-00c04fc964ff");
		assert!(tx
			.token()
			.chars()
			.all(|c| c.is_ascii_hexdigit() || c == '-'));
	}

	#[test]
	fn test_serde_is_transparent_string() {
		let id = OrderId::parse("6f9619ff-8b86-d011-b42d-00c04fc964ff").unwrap();
		let json = serde_json::to_string(&id).unwrap();
		assert_eq!(json, "\"6f9619ff-8b86-d011-b42d-00c04fc964ff\"");
		let back: OrderId = serde_json::from_str(&json).unwrap();
		assert_eq!(back, id);
	}
}
