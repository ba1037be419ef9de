//! Transaction endpoints: confirmation and status lookup.

use crate::apis::order::repository_error;
use orders_core::{ConfirmationError, OrdersEngine};
use orders_types::{APIError, ConfirmRequest, TransactionId, TransactionStateResponse};
use serde_json::json;
use tracing::warn;

fn confirmation_error(e: ConfirmationError) -> APIError {
	match e {
		ConfirmationError::InvalidArgument(message) => APIError::BadRequest {
			error_type: "INVALID_ARGUMENT".to_string(),
			message,
		},
		ConfirmationError::UnknownTransaction(tx_id) => APIError::NotFound {
			error_type: "UNKNOWN_TRANSACTION".to_string(),
			message: format!(
				"Transaction {} is not prepared: it was never issued or is already resolved",
				tx_id
			),
		},
		ConfirmationError::ResolutionOutcomeUnknown(timeout) => APIError::GatewayTimeout {
			error_type: "RESOLUTION_OUTCOME_UNKNOWN".to_string(),
			message: "The resolution may or may not have been applied. \
			          Retry the same confirmation to find out."
				.to_string(),
			details: Some(json!({ "timeoutSeconds": timeout.as_secs() })),
		},
		ConfirmationError::StoreTimeout(_) => APIError::GatewayTimeout {
			error_type: "STORE_TIMEOUT".to_string(),
			message: "The order store did not answer in time".to_string(),
			details: None,
		},
		ConfirmationError::Repository(e) => repository_error(&e),
	}
}

/// Parses the path token up front so the response can echo it typed.
fn parse_tx_id(tx_id: &str) -> Result<TransactionId, APIError> {
	TransactionId::parse(tx_id).map_err(|e| APIError::BadRequest {
		error_type: "INVALID_ARGUMENT".to_string(),
		message: e.to_string(),
	})
}

/// Handles POST /api/transactions/{txId}/confirm.
pub async fn confirm_transaction(
	tx_id: &str,
	request: ConfirmRequest,
	engine: &OrdersEngine,
) -> Result<TransactionStateResponse, APIError> {
	let parsed = parse_tx_id(tx_id)?;
	let state = engine
		.confirmation()
		.confirm(tx_id, request.commit)
		.await
		.map_err(|e| {
			if !matches!(e, ConfirmationError::UnknownTransaction(_)) {
				warn!(tx_id = %parsed, error = %e, "Confirmation failed");
			}
			confirmation_error(e)
		})?;

	Ok(TransactionStateResponse {
		tx_id: parsed,
		state,
	})
}

/// Handles GET /api/transactions/{txId}.
pub async fn get_transaction_status(
	tx_id: &str,
	engine: &OrdersEngine,
) -> Result<TransactionStateResponse, APIError> {
	let parsed = parse_tx_id(tx_id)?;
	let state = engine
		.confirmation()
		.transaction_status(tx_id)
		.await
		.map_err(|e| {
			warn!(tx_id = %parsed, error = %e, "Status lookup failed");
			confirmation_error(e)
		})?;

	Ok(TransactionStateResponse {
		tx_id: parsed,
		state,
	})
}
