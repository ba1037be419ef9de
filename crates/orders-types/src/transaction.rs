//! Transaction token lifecycle types.
//!
//! A token moves `absent -> prepared -> {committed | aborted}`. The store is
//! the only holder of this state; these types exist so the boundary layer can
//! talk about it without inferring it from store error text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Observable state of a transaction token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
	/// The store holds the staged write, pending resolution.
	Prepared,
	/// The staged write was made permanent and visible.
	Committed,
	/// The staged write was discarded.
	Aborted,
	/// The store does not know the token: never prepared, or already resolved.
	Unknown,
}

impl TransactionState {
	/// Returns the lowercase wire name.
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Prepared => "prepared",
			Self::Committed => "committed",
			Self::Aborted => "aborted",
			Self::Unknown => "unknown",
		}
	}
}

impl fmt::Display for TransactionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// How a confirmation resolves a prepared transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
	Commit,
	Abort,
}

impl Resolution {
	/// Maps the confirmation flag carried by the API.
	pub fn from_commit_flag(commit: bool) -> Self {
		if commit {
			Self::Commit
		} else {
			Self::Abort
		}
	}

	/// The state a successful resolution lands in.
	pub fn target_state(&self) -> TransactionState {
		match self {
			Self::Commit => TransactionState::Committed,
			Self::Abort => TransactionState::Aborted,
		}
	}
}
