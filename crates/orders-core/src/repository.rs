//! Order repository: the only component that talks to the order store.
//!
//! Prepare and resolve are separate calls on separate store handles. The
//! repository never holds a prepared scope in memory; after
//! [`OrderRepository::prepare_insert`] returns, the token is the only link to
//! the staged write.

use orders_store::{StoreError, StoreInterface};
use orders_types::{Order, OrderId, TransactionId};
use thiserror::Error;
use tracing::instrument;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
	/// The store could not be reached.
	#[error("Store unavailable: {0}")]
	StoreUnavailable(String),
	/// The store rejected the insert; nothing was staged.
	#[error("Write conflict: {0}")]
	WriteConflict(String),
	/// Staging failed after a successful insert.
	#[error("Prepare failed: {0}")]
	PrepareFailed(String),
	/// The token is not prepared: never staged, or already resolved.
	#[error("Unknown transaction: {0}")]
	UnknownTransaction(TransactionId),
	/// No committed order carries this id.
	#[error("Order not found: {0}")]
	NotFound(OrderId),
	/// Any other store failure.
	#[error("Store error: {0}")]
	Store(String),
}

impl RepositoryError {
	fn from_store(e: StoreError) -> Self {
		match e {
			StoreError::Unavailable(msg) => Self::StoreUnavailable(msg),
			other => Self::Store(other.to_string()),
		}
	}

	fn from_resolve(e: StoreError, tx_id: &TransactionId) -> Self {
		match e {
			StoreError::UnknownTransaction(_) => Self::UnknownTransaction(*tx_id),
			other => Self::from_store(other),
		}
	}
}

/// Sequences two-phase calls against a single store backend.
pub struct OrderRepository {
	store: Box<dyn StoreInterface>,
}

impl OrderRepository {
	pub fn new(store: Box<dyn StoreInterface>) -> Self {
		Self { store }
	}

	/// Writes `order` inside a new scope and stages it under `tx_id`.
	///
	/// On success the write is durable but invisible until [`commit`] names
	/// the same token. If staging fails, the token is rolled back once before
	/// returning; a failed cleanup is logged and the staging error is still
	/// the one returned. A token already held by another staged scope is
	/// refused without cleanup.
	///
	/// [`commit`]: OrderRepository::commit
	#[instrument(skip_all, fields(order_id = %order.id, tx_id = %tx_id))]
	pub async fn prepare_insert(
		&self,
		order: &Order,
		tx_id: &TransactionId,
	) -> Result<(), RepositoryError> {
		let mut scope = self.store.begin().await.map_err(|e| {
			tracing::warn!(error = %e, "Failed to open store scope");
			RepositoryError::StoreUnavailable(e.to_string())
		})?;

		if let Err(e) = scope.insert_order(order).await {
			tracing::warn!(error = %e, "Order insert rejected");
			if let Err(release_err) = scope.release().await {
				tracing::warn!(error = %release_err, "Failed to release store scope");
			}
			return Err(match e {
				StoreError::Unavailable(msg) => RepositoryError::StoreUnavailable(msg),
				other => RepositoryError::WriteConflict(other.to_string()),
			});
		}

		if let Err(e) = scope.prepare(tx_id).await {
			if matches!(e, StoreError::TransactionInUse(_)) {
				// The staged scope under this token belongs to someone else
				tracing::warn!(error = %e, "Prepare refused, token already in use");
				return Err(RepositoryError::PrepareFailed(e.to_string()));
			}
			tracing::warn!(error = %e, "Prepare failed, rolling back");
			match self.store.rollback_prepared(tx_id).await {
				Ok(()) => tracing::info!("Rolled back partially prepared transaction"),
				// Nothing was staged
				Err(StoreError::UnknownTransaction(_)) => {},
				Err(cleanup_err) => tracing::error!(
					error = %e,
					cleanup_error = %cleanup_err,
					"Cleanup rollback failed; transaction may remain prepared"
				),
			}
			return Err(RepositoryError::PrepareFailed(e.to_string()));
		}

		tracing::debug!("Order insert prepared");
		Ok(())
	}

	/// Makes a prepared transaction's effects permanent and visible.
	#[instrument(skip_all, fields(tx_id = %tx_id))]
	pub async fn commit(&self, tx_id: &TransactionId) -> Result<(), RepositoryError> {
		self.store
			.commit_prepared(tx_id)
			.await
			.map_err(|e| RepositoryError::from_resolve(e, tx_id))
	}

	/// Discards a prepared transaction's effects.
	#[instrument(skip_all, fields(tx_id = %tx_id))]
	pub async fn rollback(&self, tx_id: &TransactionId) -> Result<(), RepositoryError> {
		self.store
			.rollback_prepared(tx_id)
			.await
			.map_err(|e| RepositoryError::from_resolve(e, tx_id))
	}

	/// Whether `tx_id` is currently staged and unresolved.
	pub async fn is_prepared(&self, tx_id: &TransactionId) -> Result<bool, RepositoryError> {
		self.store
			.is_prepared(tx_id)
			.await
			.map_err(RepositoryError::from_store)
	}

	/// Reads a committed order.
	#[instrument(skip_all, fields(order_id = %id))]
	pub async fn get_order(&self, id: &OrderId) -> Result<Order, RepositoryError> {
		self.store.get_order(id).await.map_err(|e| match e {
			StoreError::NotFound => RepositoryError::NotFound(*id),
			other => RepositoryError::from_store(other),
		})
	}

	/// Prepares the backing store for use. Called once at startup.
	pub async fn ensure_schema(&self) -> Result<(), RepositoryError> {
		self.store
			.ensure_schema()
			.await
			.map_err(RepositoryError::from_store)
	}
}
