//! Order endpoints: submission and lookup.
//!
//! Submission stages the order and hands back the transaction token that a
//! later confirmation must name. Lookup only ever sees committed orders.

use orders_core::{OrdersEngine, RepositoryError, SubmissionError};
use orders_types::{APIError, GetOrderResponse, OrderId, SubmitOrderRequest, SubmitOrderResponse};
use serde_json::json;
use tracing::warn;

/// Maps repository failures to a caller-facing error without leaking store text.
pub(crate) fn repository_error(e: &RepositoryError) -> APIError {
	match e {
		RepositoryError::StoreUnavailable(_) => APIError::ServiceUnavailable {
			error_type: "STORE_UNAVAILABLE".to_string(),
			message: "The order store is unavailable".to_string(),
			retry_after: Some(1),
		},
		RepositoryError::NotFound(id) => APIError::NotFound {
			error_type: "ORDER_NOT_FOUND".to_string(),
			message: format!("Order {} not found", id),
		},
		RepositoryError::UnknownTransaction(tx_id) => APIError::NotFound {
			error_type: "UNKNOWN_TRANSACTION".to_string(),
			message: format!("Transaction {} is not prepared", tx_id),
		},
		RepositoryError::WriteConflict(_)
		| RepositoryError::PrepareFailed(_)
		| RepositoryError::Store(_) => APIError::InternalServerError {
			error_type: "INTERNAL_ERROR".to_string(),
			message: "The order could not be processed".to_string(),
		},
	}
}

fn submission_error(e: SubmissionError) -> APIError {
	match e {
		SubmissionError::InvalidArgument(message) => APIError::BadRequest {
			error_type: "INVALID_ARGUMENT".to_string(),
			message,
		},
		SubmissionError::PrepareOutcomeUnknown(timeout) => APIError::GatewayTimeout {
			error_type: "PREPARE_OUTCOME_UNKNOWN".to_string(),
			message: "The order may or may not have been staged; a rollback was attempted. \
			          Submit again to get a new transaction."
				.to_string(),
			details: Some(json!({ "timeoutSeconds": timeout.as_secs() })),
		},
		SubmissionError::Repository(e) => repository_error(&e),
	}
}

/// Handles POST /api/orders.
pub async fn submit_order(
	request: SubmitOrderRequest,
	engine: &OrdersEngine,
) -> Result<SubmitOrderResponse, APIError> {
	let (order_id, tx_id) = engine
		.submission()
		.submit_order(&request.user_id, &request.label, request.created_at)
		.await
		.map_err(|e| {
			warn!(error = %e, "Order submission failed");
			submission_error(e)
		})?;

	Ok(SubmitOrderResponse { order_id, tx_id })
}

/// Handles GET /api/orders/{id}.
pub async fn get_order_by_id(id: &str, engine: &OrdersEngine) -> Result<GetOrderResponse, APIError> {
	let order_id = OrderId::parse(id).map_err(|e| APIError::BadRequest {
		error_type: "INVALID_ARGUMENT".to_string(),
		message: e.to_string(),
	})?;

	let timeout = engine.config().service.store_timeout();
	let order = tokio::time::timeout(timeout, engine.repository().get_order(&order_id))
		.await
		.map_err(|_| {
			warn!(order_id = %order_id, "Order lookup timed out");
			APIError::GatewayTimeout {
				error_type: "STORE_TIMEOUT".to_string(),
				message: "The order store did not answer in time".to_string(),
				details: None,
			}
		})?
		.map_err(|e| {
			if !matches!(e, RepositoryError::NotFound(_)) {
				warn!(order_id = %order_id, error = %e, "Order lookup failed");
			}
			repository_error(&e)
		})?;

	Ok(order.into())
}
