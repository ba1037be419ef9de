//! API types for the order service HTTP API.
//!
//! This module defines the request and response bodies for submitting orders,
//! reading them back and resolving their transactions, plus the structured
//! error type every endpoint returns.

use crate::{Order, OrderId, TransactionId, TransactionState, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Request to submit a new order.
///
/// `userId` is carried as a string so that a malformed value reaches the
/// submission service and is reported as an invalid argument rather than a
/// body deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOrderRequest {
	pub user_id: String,
	pub label: String,
	pub created_at: DateTime<Utc>,
}

/// Identifiers issued by a successful prepare.
///
/// The `txId` is disclosed only here; the caller is responsible for
/// eventually confirming or cancelling it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOrderResponse {
	pub order_id: OrderId,
	pub tx_id: TransactionId,
}

/// A committed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetOrderResponse {
	pub order_id: OrderId,
	pub user_id: UserId,
	pub label: String,
	pub created_at: DateTime<Utc>,
}

impl From<Order> for GetOrderResponse {
	fn from(order: Order) -> Self {
		Self {
			order_id: order.id,
			user_id: order.user_id,
			label: order.label,
			created_at: order.created_at,
		}
	}
}

/// Request to resolve a prepared transaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConfirmRequest {
	/// `true` commits, `false` rolls back.
	pub commit: bool,
}

/// State of a transaction token after a confirmation or status lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStateResponse {
	pub tx_id: TransactionId,
	pub state: TransactionState,
}

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
	/// Additional error context
	pub details: Option<serde_json::Value>,
	/// Suggested retry delay in seconds
	#[serde(rename = "retryAfter")]
	pub retry_after: Option<u64>,
}

/// Structured API error type with appropriate HTTP status mapping.
///
/// Messages placed here are written for callers; raw store errors are logged
/// where they occur and never copied into an `APIError`.
#[derive(Debug)]
pub enum APIError {
	/// Malformed input (400)
	BadRequest { error_type: String, message: String },
	/// Unknown order or transaction (404)
	NotFound { error_type: String, message: String },
	/// Store unreachable; the caller may retry (503)
	ServiceUnavailable {
		error_type: String,
		message: String,
		retry_after: Option<u64>,
	},
	/// Deadline hit with an ambiguous outcome (504)
	GatewayTimeout {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Internal server error (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::NotFound { .. } => 404,
			APIError::ServiceUnavailable { .. } => 503,
			APIError::GatewayTimeout { .. } => 504,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		match self {
			APIError::BadRequest { error_type, message }
			| APIError::NotFound { error_type, message }
			| APIError::InternalServerError { error_type, message } => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: None,
				retry_after: None,
			},
			APIError::ServiceUnavailable {
				error_type,
				message,
				retry_after,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: None,
				retry_after: *retry_after,
			},
			APIError::GatewayTimeout {
				error_type,
				message,
				details,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: details.clone(),
				retry_after: None,
			},
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::NotFound { message, .. } => write!(f, "Not Found: {}", message),
			APIError::ServiceUnavailable { message, .. } => {
				write!(f, "Service Unavailable: {}", message)
			},
			APIError::GatewayTimeout { message, .. } => write!(f, "Gateway Timeout: {}", message),
			APIError::InternalServerError { message, .. } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		let mut response = (status, Json(self.to_error_response())).into_response();
		if let APIError::ServiceUnavailable {
			retry_after: Some(seconds),
			..
		} = self
		{
			if let Ok(value) = axum::http::HeaderValue::from_str(&seconds.to_string()) {
				response
					.headers_mut()
					.insert(axum::http::header::RETRY_AFTER, value);
			}
		}
		response
	}
}
