//! Fault-injecting store wrapper for tests.
//!
//! Available to other crates' tests through the `testing` feature.

use async_trait::async_trait;
use orders_store::implementations::memory::MemoryStore;
use orders_store::{StoreError, StoreInterface, StoreTransaction};
use orders_types::{ConfigSchema, Order, OrderId, TransactionId};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How the staging step misbehaves.
#[derive(Debug, Clone, Copy)]
pub enum PrepareFault {
	/// Staging fails; nothing lands.
	Fail,
	/// Staging lands in the store but the caller sees an error.
	ReplyLost,
	/// Staging hangs for the given time before landing.
	Stall(Duration),
	/// Staging lands, then the reply hangs for the given time.
	ReplyStall(Duration),
}

#[derive(Debug, Clone, Default)]
pub struct Faults {
	pub begin: bool,
	pub insert: bool,
	pub prepare: Option<PrepareFault>,
	pub rollback: bool,
	pub resolve_stall: Option<Duration>,
}

/// Wraps a [`MemoryStore`], failing the operations selected by [`Faults`].
///
/// Clones share the memory state and the rollback log.
#[derive(Clone)]
pub struct FaultyStore {
	inner: MemoryStore,
	faults: Faults,
	rollbacks: Arc<Mutex<Vec<TransactionId>>>,
}

impl FaultyStore {
	pub fn new(faults: Faults) -> Self {
		Self {
			inner: MemoryStore::new(),
			faults,
			rollbacks: Arc::new(Mutex::new(Vec::new())),
		}
	}

	pub fn memory(&self) -> &MemoryStore {
		&self.inner
	}

	/// Tokens passed to `rollback_prepared`, in call order.
	pub fn rollback_calls(&self) -> Vec<TransactionId> {
		self.rollbacks.lock().unwrap().clone()
	}
}

struct FaultyTransaction {
	inner: Box<dyn StoreTransaction>,
	faults: Faults,
}

#[async_trait]
impl StoreTransaction for FaultyTransaction {
	async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
		if self.faults.insert {
			return Err(StoreError::Rejected("injected insert failure".into()));
		}
		self.inner.insert_order(order).await
	}

	async fn prepare(self: Box<Self>, tx_id: &TransactionId) -> Result<(), StoreError> {
		let fault = self.faults.prepare;
		match fault {
			None => self.inner.prepare(tx_id).await,
			Some(PrepareFault::Fail) => {
				self.inner.release().await?;
				Err(StoreError::Backend("injected prepare failure".into()))
			},
			Some(PrepareFault::ReplyLost) => {
				self.inner.prepare(tx_id).await?;
				Err(StoreError::Unavailable("connection reset".into()))
			},
			Some(PrepareFault::Stall(delay)) => {
				tokio::time::sleep(delay).await;
				self.inner.prepare(tx_id).await
			},
			Some(PrepareFault::ReplyStall(delay)) => {
				self.inner.prepare(tx_id).await?;
				tokio::time::sleep(delay).await;
				Ok(())
			},
		}
	}

	async fn release(self: Box<Self>) -> Result<(), StoreError> {
		self.inner.release().await
	}
}

#[async_trait]
impl StoreInterface for FaultyStore {
	async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
		if self.faults.begin {
			return Err(StoreError::Unavailable("injected connection refused".into()));
		}
		Ok(Box::new(FaultyTransaction {
			inner: self.inner.begin().await?,
			faults: self.faults.clone(),
		}))
	}

	async fn commit_prepared(&self, tx_id: &TransactionId) -> Result<(), StoreError> {
		if let Some(delay) = self.faults.resolve_stall {
			tokio::time::sleep(delay).await;
		}
		self.inner.commit_prepared(tx_id).await
	}

	async fn rollback_prepared(&self, tx_id: &TransactionId) -> Result<(), StoreError> {
		self.rollbacks.lock().unwrap().push(*tx_id);
		if self.faults.rollback {
			return Err(StoreError::Unavailable("injected rollback failure".into()));
		}
		if let Some(delay) = self.faults.resolve_stall {
			tokio::time::sleep(delay).await;
		}
		self.inner.rollback_prepared(tx_id).await
	}

	async fn is_prepared(&self, tx_id: &TransactionId) -> Result<bool, StoreError> {
		self.inner.is_prepared(tx_id).await
	}

	async fn get_order(&self, id: &OrderId) -> Result<Order, StoreError> {
		self.inner.get_order(id).await
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		self.inner.config_schema()
	}
}
