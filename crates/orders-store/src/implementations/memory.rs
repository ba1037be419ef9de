//! In-memory store backend.
//!
//! Emulates a two-phase store inside the process: writes made in a scope are
//! held by the scope until prepared, prepared scopes sit in a registry keyed by
//! token, and only a commit moves them into the readable set. Nothing survives
//! a restart, so this backend is for tests and local development.

use crate::{StoreError, StoreInterface, StoreTransaction};
use async_trait::async_trait;
use orders_types::{ConfigSchema, Order, OrderId, Schema, TransactionId, ValidationError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct MemoryState {
	/// Committed, readable orders.
	orders: HashMap<OrderId, Order>,
	/// Prepared scopes awaiting resolution.
	prepared: HashMap<TransactionId, Vec<Order>>,
}

impl MemoryState {
	/// Whether an order id is already taken by a committed or staged row.
	fn holds(&self, id: &OrderId) -> bool {
		self.orders.contains_key(id)
			|| self
				.prepared
				.values()
				.any(|staged| staged.iter().any(|o| &o.id == id))
	}
}

/// In-memory store implementation.
///
/// Cloning shares the underlying state, so two handles behave like two
/// connections to the same store.
#[derive(Clone, Default)]
pub struct MemoryStore {
	state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
	/// Creates a new, empty MemoryStore.
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of scopes currently prepared and unresolved.
	pub async fn prepared_count(&self) -> usize {
		self.state.read().await.prepared.len()
	}
}

/// A scope on the in-memory store. Writes stay local until `prepare`.
pub struct MemoryTransaction {
	state: Arc<RwLock<MemoryState>>,
	pending: Vec<Order>,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
	async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
		let duplicate = self.pending.iter().any(|o| o.id == order.id)
			|| self.state.read().await.holds(&order.id);
		if duplicate {
			return Err(StoreError::Rejected(format!(
				"duplicate key value violates unique constraint: order {}",
				order.id
			)));
		}
		self.pending.push(order.clone());
		Ok(())
	}

	async fn prepare(self: Box<Self>, tx_id: &TransactionId) -> Result<(), StoreError> {
		let MemoryTransaction { state, pending } = *self;
		let mut state = state.write().await;
		if state.prepared.contains_key(tx_id) {
			return Err(StoreError::TransactionInUse(tx_id.to_string()));
		}
		// Another scope may have staged the same key since our insert.
		if let Some(taken) = pending.iter().find(|o| state.holds(&o.id)) {
			return Err(StoreError::Rejected(format!(
				"duplicate key value violates unique constraint: order {}",
				taken.id
			)));
		}
		state.prepared.insert(*tx_id, pending);
		Ok(())
	}

	async fn release(self: Box<Self>) -> Result<(), StoreError> {
		Ok(())
	}
}

#[async_trait]
impl StoreInterface for MemoryStore {
	async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
		Ok(Box::new(MemoryTransaction {
			state: Arc::clone(&self.state),
			pending: Vec::new(),
		}))
	}

	async fn commit_prepared(&self, tx_id: &TransactionId) -> Result<(), StoreError> {
		let mut state = self.state.write().await;
		let staged = state
			.prepared
			.remove(tx_id)
			.ok_or_else(|| StoreError::UnknownTransaction(tx_id.to_string()))?;
		for order in staged {
			state.orders.insert(order.id, order);
		}
		Ok(())
	}

	async fn rollback_prepared(&self, tx_id: &TransactionId) -> Result<(), StoreError> {
		let mut state = self.state.write().await;
		state
			.prepared
			.remove(tx_id)
			.map(|_| ())
			.ok_or_else(|| StoreError::UnknownTransaction(tx_id.to_string()))
	}

	async fn is_prepared(&self, tx_id: &TransactionId) -> Result<bool, StoreError> {
		Ok(self.state.read().await.prepared.contains_key(tx_id))
	}

	async fn get_order(&self, id: &OrderId) -> Result<Order, StoreError> {
		let state = self.state.read().await;
		state.orders.get(id).cloned().ok_or(StoreError::NotFound)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStoreSchema)
	}
}

/// Configuration schema for MemoryStore.
pub struct MemoryStoreSchema;

impl ConfigSchema for MemoryStoreSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// No options; an empty table
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Factory function to create a memory store from configuration.
pub fn create_store(config: &toml::Value) -> Result<Box<dyn StoreInterface>, StoreError> {
	MemoryStoreSchema
		.validate(config)
		.map_err(|e| StoreError::Configuration(format!("Invalid memory store config: {}", e)))?;
	Ok(Box::new(MemoryStore::new()))
}

/// Registry for the memory store implementation.
pub struct Registry;

impl orders_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = crate::StoreFactory;

	fn factory() -> Self::Factory {
		create_store
	}
}

impl crate::StoreRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use orders_types::UserId;

	fn order() -> Order {
		Order::new(OrderId::new(), UserId::new(), "widget", Utc::now())
	}

	async fn stage(store: &MemoryStore, order: &Order) -> TransactionId {
		let tx_id = TransactionId::new();
		let mut scope = store.begin().await.unwrap();
		scope.insert_order(order).await.unwrap();
		scope.prepare(&tx_id).await.unwrap();
		tx_id
	}

	#[tokio::test]
	async fn test_prepared_write_is_invisible_until_commit() {
		let store = MemoryStore::new();
		let order = order();
		let tx_id = stage(&store, &order).await;

		assert!(matches!(store.get_order(&order.id).await, Err(StoreError::NotFound)));
		assert!(store.is_prepared(&tx_id).await.unwrap());

		store.commit_prepared(&tx_id).await.unwrap();
		assert_eq!(store.get_order(&order.id).await.unwrap(), order);
		assert!(!store.is_prepared(&tx_id).await.unwrap());
	}

	#[tokio::test]
	async fn test_rollback_discards() {
		let store = MemoryStore::new();
		let order = order();
		let tx_id = stage(&store, &order).await;

		store.rollback_prepared(&tx_id).await.unwrap();
		assert!(matches!(store.get_order(&order.id).await, Err(StoreError::NotFound)));
		assert_eq!(store.prepared_count().await, 0);
	}

	#[tokio::test]
	async fn test_resolution_applies_once() {
		let store = MemoryStore::new();
		let tx_id = stage(&store, &order()).await;

		store.commit_prepared(&tx_id).await.unwrap();
		assert!(matches!(
			store.commit_prepared(&tx_id).await,
			Err(StoreError::UnknownTransaction(_))
		));
		assert!(matches!(
			store.rollback_prepared(&tx_id).await,
			Err(StoreError::UnknownTransaction(_))
		));
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn test_concurrent_resolvers_apply_once() {
		let store = MemoryStore::new();

		for round in 0..20 {
			let order = order();
			let tx_id = stage(&store, &order).await;

			let handles: Vec<_> = (0..8)
				.map(|i| {
					let store = store.clone();
					tokio::spawn(async move {
						if i % 2 == 0 {
							store.commit_prepared(&tx_id).await
						} else {
							store.rollback_prepared(&tx_id).await
						}
					})
				})
				.collect();

			let mut ok = 0;
			let mut unknown = 0;
			for handle in handles {
				match handle.await.unwrap() {
					Ok(()) => ok += 1,
					Err(StoreError::UnknownTransaction(_)) => unknown += 1,
					Err(e) => panic!("round {}: unexpected error {}", round, e),
				}
			}
			assert_eq!((ok, unknown), (1, 7), "round {}", round);
			assert_eq!(store.prepared_count().await, 0);
		}
	}

	#[tokio::test]
	async fn test_released_scope_leaves_nothing() {
		let store = MemoryStore::new();
		let order = order();
		let mut scope = store.begin().await.unwrap();
		scope.insert_order(&order).await.unwrap();
		scope.release().await.unwrap();

		assert_eq!(store.prepared_count().await, 0);
		assert!(store.get_order(&order.id).await.is_err());
	}

	#[tokio::test]
	async fn test_duplicate_order_id_rejected() {
		let store = MemoryStore::new();
		let order = order();
		stage(&store, &order).await;

		let mut scope = store.begin().await.unwrap();
		assert!(matches!(
			scope.insert_order(&order).await,
			Err(StoreError::Rejected(_))
		));
	}

	#[tokio::test]
	async fn test_token_reuse_rejected() {
		let store = MemoryStore::new();
		let tx_id = stage(&store, &order()).await;

		let mut scope = store.begin().await.unwrap();
		scope.insert_order(&order()).await.unwrap();
		assert!(matches!(
			scope.prepare(&tx_id).await,
			Err(StoreError::TransactionInUse(_))
		));
		assert_eq!(store.prepared_count().await, 1);
	}

	#[tokio::test]
	async fn test_clones_share_state() {
		let store = MemoryStore::new();
		let other = store.clone();
		let order = order();
		let tx_id = stage(&store, &order).await;

		other.commit_prepared(&tx_id).await.unwrap();
		assert!(store.get_order(&order.id).await.is_ok());
	}

	#[test]
	fn test_factory_rejects_options() {
		let config: toml::Value = toml::from_str("path = \"x\"").unwrap();
		assert!(matches!(create_store(&config), Err(StoreError::Configuration(_))));
	}
}
