//! Order store boundary for the two-phase order service.
//!
//! The store owns durability and isolation. It exposes a transactional scope
//! that can be written to and then *prepared* under a caller-supplied token;
//! the prepared scope outlives the handle that created it and is later
//! committed or rolled back by token alone, possibly from another process.
//! This crate defines that boundary and its backend implementations.

use async_trait::async_trait;
use orders_types::{ConfigSchema, ImplementationRegistry, Order, OrderId, TransactionId};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
	pub mod postgres;
}

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
	/// No committed order with the requested id exists.
	#[error("Not found")]
	NotFound,
	/// The token is not currently prepared: never staged, or already resolved.
	#[error("Unknown transaction: {0}")]
	UnknownTransaction(String),
	/// Another prepared scope already holds the token.
	#[error("Transaction identifier already in use: {0}")]
	TransactionInUse(String),
	/// The store could not be reached or refused a connection.
	#[error("Store unavailable: {0}")]
	Unavailable(String),
	/// The store rejected a write (constraint violation, malformed row).
	#[error("Write rejected: {0}")]
	Rejected(String),
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Any other failure reported by the backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// A local transactional scope on the store.
///
/// Consuming methods take `Box<Self>`: once a scope is prepared or released
/// the handle is gone, and nothing in this process can touch the staged write
/// except through [`StoreInterface::commit_prepared`] or
/// [`StoreInterface::rollback_prepared`].
#[async_trait]
pub trait StoreTransaction: Send {
	/// Writes an order inside the scope. Not visible to readers.
	async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError>;

	/// Durably stages the scope under `tx_id` and releases the handle without
	/// resolving it. On failure nothing remains staged by this call.
	///
	/// Fails with `TransactionInUse` if another scope is staged under `tx_id`;
	/// that scope is left untouched.
	async fn prepare(self: Box<Self>, tx_id: &TransactionId) -> Result<(), StoreError>;

	/// Discards a scope that was never prepared.
	async fn release(self: Box<Self>) -> Result<(), StoreError>;
}

/// Trait defining the interface every order store backend implements.
#[async_trait]
pub trait StoreInterface: Send + Sync {
	/// Opens a new transactional scope.
	async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;

	/// Makes a prepared scope permanent and visible. Applies at most once;
	/// an unknown or already-resolved token yields `UnknownTransaction`.
	async fn commit_prepared(&self, tx_id: &TransactionId) -> Result<(), StoreError>;

	/// Discards a prepared scope. Same exactly-once semantics as commit.
	async fn rollback_prepared(&self, tx_id: &TransactionId) -> Result<(), StoreError>;

	/// Returns true while `tx_id` is staged and unresolved.
	async fn is_prepared(&self, tx_id: &TransactionId) -> Result<bool, StoreError>;

	/// Reads a committed order.
	async fn get_order(&self, id: &OrderId) -> Result<Order, StoreError>;

	/// Verifies the backend can run two-phase writes and creates its layout
	/// if absent. Called once at startup.
	async fn ensure_schema(&self) -> Result<(), StoreError> {
		Ok(())
	}

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for store factory functions.
pub type StoreFactory = fn(&toml::Value) -> Result<Box<dyn StoreInterface>, StoreError>;

/// Registry trait for store implementations.
pub trait StoreRegistry: ImplementationRegistry<Factory = StoreFactory> {}

/// Get all registered store implementations.
///
/// Returns a vector of (name, factory) tuples for all available store implementations.
pub fn get_all_implementations() -> Vec<(&'static str, StoreFactory)> {
	use implementations::{file, memory, postgres};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
		(postgres::Registry::NAME, postgres::Registry::factory()),
	]
}
