//! Order submission: assigns identifiers and drives the prepare half.

use crate::repository::{OrderRepository, RepositoryError};
use chrono::{DateTime, Utc};
use orders_types::{Order, OrderId, TransactionId, UserId};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{instrument, Instrument};

/// Errors that can occur while submitting an order.
///
/// None of these carry identifiers: a failed submission discloses no token.
#[derive(Debug, Error)]
pub enum SubmissionError {
	/// The request was malformed. The store was not contacted.
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	/// The prepare call did not finish within the deadline. It may still have
	/// landed; one rollback was attempted.
	#[error("Prepare outcome unknown after {0:?}")]
	PrepareOutcomeUnknown(Duration),
	/// The repository reported a failure.
	#[error(transparent)]
	Repository(#[from] RepositoryError),
}

/// Accepts new orders and stages them for a later confirmation.
pub struct SubmissionService {
	repository: Arc<OrderRepository>,
	store_timeout: Duration,
}

impl SubmissionService {
	pub fn new(repository: Arc<OrderRepository>, store_timeout: Duration) -> Self {
		Self {
			repository,
			store_timeout,
		}
	}

	/// Validates the request, assigns fresh ids, and prepares the insert.
	///
	/// Returns `(order_id, tx_id)` only when the store confirmed the prepare.
	/// The caller then owns resolving `tx_id`. There is no retry here; a
	/// retry must come from the caller and will get a new token.
	#[instrument(skip_all, fields(order_id, tx_id))]
	pub async fn submit_order(
		&self,
		user_id: &str,
		label: &str,
		created_at: DateTime<Utc>,
	) -> Result<(OrderId, TransactionId), SubmissionError> {
		let user_id =
			UserId::parse(user_id).map_err(|e| SubmissionError::InvalidArgument(e.to_string()))?;

		let order = Order::new(OrderId::new(), user_id, label, created_at);
		let tx_id = TransactionId::new();

		let span = tracing::Span::current();
		span.record("order_id", tracing::field::display(order.id));
		span.record("tx_id", tracing::field::display(tx_id));

		let prepared =
			tokio::time::timeout(self.store_timeout, self.repository.prepare_insert(&order, &tx_id))
				.await;

		match prepared {
			Ok(Ok(())) => {
				tracing::info!("Order prepared");
				Ok((order.id, tx_id))
			},
			Ok(Err(e)) => {
				tracing::warn!(error = %e, "Order submission failed");
				Err(e.into())
			},
			Err(_) => {
				tracing::warn!(
					timeout = ?self.store_timeout,
					"Prepare timed out; outcome unknown"
				);
				// Detached so a dropped request cannot cut the rollback short
				let abandon = tokio::spawn(
					abandon(self.repository.clone(), tx_id, self.store_timeout)
						.instrument(tracing::Span::current()),
				);
				if let Err(e) = abandon.await {
					tracing::error!(error = %e, "Rollback task after prepare timeout failed");
				}
				Err(SubmissionError::PrepareOutcomeUnknown(self.store_timeout))
			},
		}
	}
}

/// One best-effort rollback of a token whose prepare outcome is unknown.
///
/// If the prepare lands after this runs, the token stays prepared with no
/// holder; nothing here can observe that.
async fn abandon(repository: Arc<OrderRepository>, tx_id: TransactionId, store_timeout: Duration) {
	match tokio::time::timeout(store_timeout, repository.rollback(&tx_id)).await {
		Ok(Ok(())) => tracing::info!("Rolled back prepare with unknown outcome"),
		Ok(Err(RepositoryError::UnknownTransaction(_))) => {
			tracing::info!("Prepare with unknown outcome had not landed")
		},
		Ok(Err(e)) => tracing::error!(
			error = %e,
			"Rollback after prepare timeout failed; transaction may remain prepared"
		),
		Err(_) => tracing::error!(
			"Rollback after prepare timeout also timed out; transaction may remain prepared"
		),
	}
}
