//! The order entity.

use crate::{OrderId, UserId};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// An order as written by the submission service and read back after commit.
///
/// `created_at` is stamped from the request, never by the store. It is kept
/// at microsecond precision so that a committed order reads back exactly as it
/// was submitted on stores that do not keep nanoseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
	/// Unique identifier, never reused.
	pub id: OrderId,
	/// The requesting user.
	pub user_id: UserId,
	/// Free-text description.
	pub label: String,
	/// Request time supplied by the caller.
	pub created_at: DateTime<Utc>,
}

impl Order {
	/// Assembles a new order, normalising `created_at` to microseconds.
	pub fn new(id: OrderId, user_id: UserId, label: impl Into<String>, created_at: DateTime<Utc>) -> Self {
		Self {
			id,
			user_id,
			label: label.into(),
			created_at: created_at.trunc_subsecs(6),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{TimeZone, Timelike};

	#[test]
	fn test_created_at_truncated_to_micros() {
		let ts = Utc
			.with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
			.unwrap()
			.with_nanosecond(123_456_789)
			.unwrap();
		let order = Order::new(OrderId::new(), UserId::new(), "widget", ts);
		assert_eq!(order.created_at.nanosecond(), 123_456_000);
		assert_eq!(order.label, "widget");
	}
}
