//! Transaction confirmation: resolves a prepared token exactly once.

use crate::repository::{OrderRepository, RepositoryError};
use orders_types::{Resolution, TransactionId, TransactionState};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

/// Errors that can occur while confirming a transaction.
#[derive(Debug, Error)]
pub enum ConfirmationError {
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	/// Never prepared, already resolved, or reclaimed by the store.
	#[error("Unknown transaction: {0}")]
	UnknownTransaction(TransactionId),
	/// The resolve call did not finish within the deadline. A retry settles
	/// it: success, or `UnknownTransaction` if the first call applied.
	#[error("Resolution outcome unknown after {0:?}")]
	ResolutionOutcomeUnknown(Duration),
	/// A read-only lookup did not finish within the deadline.
	#[error("Store timed out after {0:?}")]
	StoreTimeout(Duration),
	#[error(transparent)]
	Repository(RepositoryError),
}

impl From<RepositoryError> for ConfirmationError {
	fn from(e: RepositoryError) -> Self {
		match e {
			RepositoryError::UnknownTransaction(tx_id) => Self::UnknownTransaction(tx_id),
			other => Self::Repository(other),
		}
	}
}

fn parse_tx_id(tx_id: &str) -> Result<TransactionId, ConfirmationError> {
	TransactionId::parse(tx_id).map_err(|e| ConfirmationError::InvalidArgument(e.to_string()))
}

/// Resolves prepared transactions on behalf of a later, unrelated caller.
pub struct ConfirmationService {
	repository: Arc<OrderRepository>,
	store_timeout: Duration,
}

impl ConfirmationService {
	pub fn new(repository: Arc<OrderRepository>, store_timeout: Duration) -> Self {
		Self {
			repository,
			store_timeout,
		}
	}

	/// Commits (`commit = true`) or rolls back a prepared transaction and
	/// returns the state it landed in.
	#[instrument(skip(self))]
	pub async fn confirm(
		&self,
		tx_id: &str,
		commit: bool,
	) -> Result<TransactionState, ConfirmationError> {
		let tx_id = parse_tx_id(tx_id)?;
		let resolution = Resolution::from_commit_flag(commit);

		let resolve = async {
			match resolution {
				Resolution::Commit => self.repository.commit(&tx_id).await,
				Resolution::Abort => self.repository.rollback(&tx_id).await,
			}
		};

		match tokio::time::timeout(self.store_timeout, resolve).await {
			Ok(Ok(())) => {
				let state = resolution.target_state();
				tracing::info!(%state, "Transaction resolved");
				Ok(state)
			},
			Ok(Err(e)) => {
				match &e {
					RepositoryError::UnknownTransaction(_) => {
						tracing::info!("Confirmation for unknown transaction")
					},
					other => tracing::warn!(error = %other, "Confirmation failed"),
				}
				Err(e.into())
			},
			Err(_) => {
				tracing::warn!(timeout = ?self.store_timeout, "Resolution timed out; outcome unknown");
				Err(ConfirmationError::ResolutionOutcomeUnknown(self.store_timeout))
			},
		}
	}

	/// Reports `Prepared` while the store stages the token, else `Unknown`.
	///
	/// Resolved tokens are not remembered, so they also read as `Unknown`.
	#[instrument(skip(self))]
	pub async fn transaction_status(
		&self,
		tx_id: &str,
	) -> Result<TransactionState, ConfirmationError> {
		let tx_id = parse_tx_id(tx_id)?;
		let prepared = tokio::time::timeout(self.store_timeout, self.repository.is_prepared(&tx_id))
			.await
			.map_err(|_| ConfirmationError::StoreTimeout(self.store_timeout))??;

		Ok(if prepared {
			TransactionState::Prepared
		} else {
			TransactionState::Unknown
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{FaultyStore, Faults};
	use chrono::Utc;
	use orders_types::{Order, OrderId, UserId};

	struct Fixture {
		repository: Arc<OrderRepository>,
		service: ConfirmationService,
	}

	fn fixture(faults: Faults) -> Fixture {
		let store = FaultyStore::new(faults);
		let repository = Arc::new(OrderRepository::new(Box::new(store)));
		let service = ConfirmationService::new(repository.clone(), Duration::from_secs(2));
		Fixture {
			repository,
			service,
		}
	}

	async fn prepared(fx: &Fixture) -> (OrderId, TransactionId) {
		let order = Order::new(OrderId::new(), UserId::new(), "widget", Utc::now());
		let tx_id = TransactionId::new();
		fx.repository.prepare_insert(&order, &tx_id).await.unwrap();
		(order.id, tx_id)
	}

	#[tokio::test]
	async fn test_commit_makes_order_readable() {
		let fx = fixture(Faults::default());
		let (order_id, tx_id) = prepared(&fx).await;

		let state = fx.service.confirm(&tx_id.to_string(), true).await.unwrap();
		assert_eq!(state, TransactionState::Committed);
		assert!(fx.repository.get_order(&order_id).await.is_ok());
	}

	#[tokio::test]
	async fn test_abort_makes_order_permanently_absent() {
		let fx = fixture(Faults::default());
		let (order_id, tx_id) = prepared(&fx).await;

		let state = fx.service.confirm(&tx_id.to_string(), false).await.unwrap();
		assert_eq!(state, TransactionState::Aborted);
		assert!(matches!(
			fx.repository.get_order(&order_id).await,
			Err(RepositoryError::NotFound(_))
		));

		// A late commit cannot resurrect it.
		assert!(matches!(
			fx.service.confirm(&tx_id.to_string(), true).await,
			Err(ConfirmationError::UnknownTransaction(_))
		));
		assert!(fx.repository.get_order(&order_id).await.is_err());
	}

	#[tokio::test]
	async fn test_second_confirm_is_unknown() {
		let fx = fixture(Faults::default());
		let (_, tx_id) = prepared(&fx).await;
		let token = tx_id.to_string();

		fx.service.confirm(&token, true).await.unwrap();
		assert!(matches!(
			fx.service.confirm(&token, true).await,
			Err(ConfirmationError::UnknownTransaction(t)) if t == tx_id
		));
	}

	#[tokio::test]
	async fn test_never_issued_token_is_unknown() {
		let fx = fixture(Faults::default());
		let token = TransactionId::new().to_string();
		assert!(matches!(
			fx.service.confirm(&token, false).await,
			Err(ConfirmationError::UnknownTransaction(_))
		));
	}

	#[tokio::test]
	async fn test_malformed_token_is_invalid_argument() {
		let fx = fixture(Faults::default());
		assert!(matches!(
			fx.service.confirm("t1'; DROP TABLE orders; --", true).await,
			Err(ConfirmationError::InvalidArgument(_))
		));
	}

	#[tokio::test]
	async fn test_status_tracks_lifecycle() {
		let fx = fixture(Faults::default());
		let (_, tx_id) = prepared(&fx).await;
		let token = tx_id.to_string();

		assert_eq!(
			fx.service.transaction_status(&token).await.unwrap(),
			TransactionState::Prepared
		);
		fx.service.confirm(&token, true).await.unwrap();
		assert_eq!(
			fx.service.transaction_status(&token).await.unwrap(),
			TransactionState::Unknown
		);
	}

	#[tokio::test]
	async fn test_store_failure_is_not_unknown_transaction() {
		let fx = fixture(Faults {
			rollback: true,
			..Default::default()
		});
		let (_, tx_id) = prepared(&fx).await;

		assert!(matches!(
			fx.service.confirm(&tx_id.to_string(), false).await,
			Err(ConfirmationError::Repository(RepositoryError::StoreUnavailable(_)))
		));
	}

	#[tokio::test(start_paused = true)]
	async fn test_resolution_timeout_is_ambiguous() {
		let fx = fixture(Faults {
			resolve_stall: Some(Duration::from_secs(30)),
			..Default::default()
		});
		let (_, tx_id) = prepared(&fx).await;

		assert!(matches!(
			fx.service.confirm(&tx_id.to_string(), true).await,
			Err(ConfirmationError::ResolutionOutcomeUnknown(_))
		));
		// The stalled commit was dropped with the timed-out future.
		assert_eq!(
			fx.service.transaction_status(&tx_id.to_string()).await.unwrap(),
			TransactionState::Prepared
		);
	}
}
