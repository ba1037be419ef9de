//! Secure string type for connection strings and other credentials.
//!
//! Database URLs carry passwords. `SecretString` zeroes its memory on drop
//! and never prints the raw value; for URLs it can render a form with the
//! password masked, which is what gets logged when a backend connects.

use std::fmt;
use zeroize::Zeroizing;

const REDACTED: &str = "***REDACTED***";

/// A string that is zeroed on drop and redacted in `Debug` and `Display`.
#[derive(Clone)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
	/// Creates a new SecretString from a regular string.
	pub fn new(s: String) -> Self {
		Self(Zeroizing::new(s))
	}

	/// Exposes the secret string as a string slice.
	///
	/// Only pass the result straight to the driver that needs it.
	pub fn expose_secret(&self) -> &str {
		&self.0
	}

	/// Renders a URL-shaped secret with any password replaced.
	///
	/// `postgres://app:hunter2@db:5432/orders` becomes
	/// `postgres://app:***@db:5432/orders`. Values that do not look like a URL
	/// with credentials are fully redacted.
	pub fn redacted_url(&self) -> String {
		let raw = self.0.as_str();
		let Some((scheme, rest)) = raw.split_once("://") else {
			return REDACTED.to_string();
		};
		match rest.rsplit_once('@') {
			Some((userinfo, host)) => {
				let user = userinfo.split(':').next().unwrap_or_default();
				format!("{}://{}:***@{}", scheme, user, host)
			},
			None => format!("{}://{}", scheme, rest),
		}
	}
}

impl fmt::Debug for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "SecretString({})", REDACTED)
	}
}

impl fmt::Display for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl From<&str> for SecretString {
	fn from(s: &str) -> Self {
		Self::new(s.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_debug_and_display_redact() {
		let secret = SecretString::from("postgres://app:hunter2@db/orders");
		assert!(!format!("{:?}", secret).contains("hunter2"));
		assert!(!format!("{}", secret).contains("hunter2"));
		assert_eq!(secret.expose_secret(), "postgres://app:hunter2@db/orders");
	}

	#[test]
	fn test_redacted_url_masks_password() {
		let secret = SecretString::from("postgres://app:hunter2@db:5432/orders");
		assert_eq!(secret.redacted_url(), "postgres://app:***@db:5432/orders");
	}

	#[test]
	fn test_redacted_url_without_credentials() {
		let secret = SecretString::from("postgres://db:5432/orders");
		assert_eq!(secret.redacted_url(), "postgres://db:5432/orders");

		let opaque = SecretString::from("hunter2");
		assert_eq!(opaque.redacted_url(), REDACTED);
	}
}
