//! Storage-related types for the order store.

/// Collections kept by directory-based store backends.
///
/// This enum replaces string literals for the on-disk layout so that every
/// component agrees on where committed rows and staged scopes live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
	/// Committed, readable orders keyed by order id
	Orders,
	/// Staged scopes keyed by transaction token
	Prepared,
	/// Staged scopes claimed by an in-flight commit or rollback
	Resolving,
}

impl StoreKey {
	/// Returns the string representation of the store key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StoreKey::Orders => "orders",
			StoreKey::Prepared => "prepared",
			StoreKey::Resolving => "resolving",
		}
	}

	/// Returns an iterator over all StoreKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[Self::Orders, Self::Prepared, Self::Resolving].into_iter()
	}
}
