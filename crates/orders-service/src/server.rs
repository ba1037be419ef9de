//! HTTP server for the order service API.
//!
//! Every handler is a thin adapter: it decodes the request, calls one
//! service operation, and turns the outcome into JSON or an [`APIError`].

use axum::{
	extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
	http::{header, HeaderValue, Method, StatusCode},
	response::{IntoResponse, Json},
	routing::{get, post},
	Router,
};
use orders_config::{ApiConfig, CorsConfig};
use orders_core::OrdersEngine;
use orders_types::{
	APIError, ConfirmRequest, GetOrderResponse, SubmitOrderRequest, TransactionStateResponse,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub engine: Arc<OrdersEngine>,
}

fn invalid_body(rejection: JsonRejection) -> APIError {
	APIError::BadRequest {
		error_type: "INVALID_ARGUMENT".to_string(),
		message: rejection.body_text(),
	}
}

fn cors_layer(cors: Option<&CorsConfig>) -> CorsLayer {
	let Some(cors) = cors else {
		return CorsLayer::permissive();
	};
	let origins: Vec<HeaderValue> = cors
		.allowed_origins
		.iter()
		.filter_map(|origin| match HeaderValue::from_str(origin) {
			Ok(value) => Some(value),
			Err(_) => {
				tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
				None
			},
		})
		.collect();
	CorsLayer::new()
		.allow_origin(origins)
		.allow_methods([Method::GET, Method::POST])
		.allow_headers([header::CONTENT_TYPE])
}

/// Builds the router with the `/api` routes, health check and middleware.
pub fn build_router(api_config: &ApiConfig, engine: Arc<OrdersEngine>) -> Router {
	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/orders", post(handle_submit_order))
				.route("/orders/{id}", get(handle_get_order_by_id))
				.route("/transactions/{tx_id}", get(handle_transaction_status))
				.route("/transactions/{tx_id}/confirm", post(handle_confirm)),
		)
		.route("/health", get(handle_health))
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(TimeoutLayer::with_status_code(
					StatusCode::GATEWAY_TIMEOUT,
					Duration::from_secs(api_config.timeout_seconds),
				))
				.layer(cors_layer(api_config.cors.as_ref()))
				.layer(DefaultBodyLimit::max(api_config.max_request_size)),
		)
		.with_state(AppState { engine })
}

/// Starts the HTTP server and runs until `shutdown` completes.
pub async fn start_server<F>(
	api_config: ApiConfig,
	engine: Arc<OrdersEngine>,
	shutdown: F,
) -> Result<(), Box<dyn std::error::Error>>
where
	F: Future<Output = ()> + Send + 'static,
{
	let app = build_router(&api_config, engine);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Order API server starting on {}", bind_address);

	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown)
		.await?;

	Ok(())
}

/// Handles POST /api/orders requests.
///
/// Responds 201 with the order id and the transaction token to confirm.
async fn handle_submit_order(
	State(state): State<AppState>,
	body: Result<Json<SubmitOrderRequest>, JsonRejection>,
) -> Result<impl IntoResponse, APIError> {
	let Json(request) = body.map_err(invalid_body)?;
	let response = crate::apis::order::submit_order(request, &state.engine).await?;
	Ok((StatusCode::CREATED, Json(response)))
}

/// Handles GET /api/orders/{id} requests.
async fn handle_get_order_by_id(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<GetOrderResponse>, APIError> {
	crate::apis::order::get_order_by_id(&id, &state.engine)
		.await
		.map(Json)
}

/// Handles POST /api/transactions/{tx_id}/confirm requests.
async fn handle_confirm(
	Path(tx_id): Path<String>,
	State(state): State<AppState>,
	body: Result<Json<ConfirmRequest>, JsonRejection>,
) -> Result<Json<TransactionStateResponse>, APIError> {
	let Json(request) = body.map_err(invalid_body)?;
	crate::apis::transaction::confirm_transaction(&tx_id, request, &state.engine)
		.await
		.map(Json)
}

/// Handles GET /api/transactions/{tx_id} requests.
async fn handle_transaction_status(
	Path(tx_id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<TransactionStateResponse>, APIError> {
	crate::apis::transaction::get_transaction_status(&tx_id, &state.engine)
		.await
		.map(Json)
}

async fn handle_health() -> Json<serde_json::Value> {
	Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::factory_registry::build_engine_from_config;
	use axum::body::{to_bytes, Body};
	use axum::http::Request;
	use orders_config::ConfigBuilder;
	use orders_core::testing::{FaultyStore, Faults, PrepareFault};
	use orders_core::{ConfirmationService, OrderRepository, SubmissionService};
	use orders_types::{SubmitOrderResponse, TransactionState};
	use serde_json::{json, Value};
	use tower::ServiceExt;

	const USER: &str = "0b7c2f3e-8d6a-4e55-9c1d-3a2b4c5d6e7f";

	async fn app() -> Router {
		let config = ConfigBuilder::new().api(ApiConfig::default()).build();
		let engine = build_engine_from_config(config).await.unwrap();
		build_router(&ApiConfig::default(), Arc::new(engine))
	}

	/// Router over a fault-injecting store; `api_timeout` is not validated.
	fn faulty_app(store: FaultyStore, store_timeout_seconds: u64, api_timeout: u64) -> Router {
		let api = ApiConfig {
			timeout_seconds: api_timeout,
			..ApiConfig::default()
		};
		let config = ConfigBuilder::new()
			.store_timeout_seconds(store_timeout_seconds)
			.api(api.clone())
			.build();
		let timeout = config.service.store_timeout();
		let repository = Arc::new(OrderRepository::new(Box::new(store)));
		let engine = OrdersEngine::new(
			config,
			repository.clone(),
			SubmissionService::new(repository.clone(), timeout),
			ConfirmationService::new(repository, timeout),
		);
		build_router(&api, Arc::new(engine))
	}

	async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
		let builder = Request::builder().method(method).uri(uri);
		let request = match body {
			Some(body) => builder
				.header(header::CONTENT_TYPE, "application/json")
				.body(Body::from(body.to_string()))
				.unwrap(),
			None => builder.body(Body::empty()).unwrap(),
		};
		let response = app.clone().oneshot(request).await.unwrap();
		let status = response.status();
		let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
		(status, value)
	}

	async fn submit(app: &Router, created_at: &str) -> SubmitOrderResponse {
		let (status, body) = send(
			app,
			"POST",
			"/api/orders",
			Some(json!({ "userId": USER, "label": "widget", "createdAt": created_at })),
		)
		.await;
		assert_eq!(status, StatusCode::CREATED);
		serde_json::from_value(body).unwrap()
	}

	#[tokio::test]
	async fn test_submit_confirm_get() {
		let app = app().await;
		let created_at = "2024-03-01T09:30:00Z";
		let ids = submit(&app, created_at).await;

		let order_uri = format!("/api/orders/{}", ids.order_id);
		let (status, body) = send(&app, "GET", &order_uri, None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(body["error"], "ORDER_NOT_FOUND");

		let confirm_uri = format!("/api/transactions/{}/confirm", ids.tx_id);
		let (status, body) = send(&app, "POST", &confirm_uri, Some(json!({ "commit": true }))).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["state"], "committed");

		let (status, body) = send(&app, "GET", &order_uri, None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["orderId"], ids.order_id.to_string());
		assert_eq!(body["userId"], USER);
		assert_eq!(body["label"], "widget");
		let read_back: chrono::DateTime<chrono::Utc> =
			serde_json::from_value(body["createdAt"].clone()).unwrap();
		assert_eq!(read_back.to_rfc3339(), "2024-03-01T09:30:00+00:00");
	}

	#[tokio::test]
	async fn test_abort_then_repeat_confirm() {
		let app = app().await;
		let ids = submit(&app, "2024-03-01T09:30:00Z").await;
		let confirm_uri = format!("/api/transactions/{}/confirm", ids.tx_id);

		let (status, body) = send(&app, "POST", &confirm_uri, Some(json!({ "commit": false }))).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["state"], "aborted");

		let (status, body) = send(&app, "POST", &confirm_uri, Some(json!({ "commit": true }))).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(body["error"], "UNKNOWN_TRANSACTION");

		let (status, _) = send(&app, "GET", &format!("/api/orders/{}", ids.order_id), None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
	}

	#[tokio::test]
	async fn test_transaction_status() {
		let app = app().await;
		let ids = submit(&app, "2024-03-01T09:30:00Z").await;
		let status_uri = format!("/api/transactions/{}", ids.tx_id);

		let (status, body) = send(&app, "GET", &status_uri, None).await;
		assert_eq!(status, StatusCode::OK);
		let parsed: TransactionStateResponse = serde_json::from_value(body).unwrap();
		assert_eq!(parsed.state, TransactionState::Prepared);
		assert_eq!(parsed.tx_id, ids.tx_id);
	}

	#[tokio::test]
	async fn test_invalid_inputs_are_bad_requests() {
		let app = app().await;

		let (status, body) = send(
			&app,
			"POST",
			"/api/orders",
			Some(json!({ "userId": "u1", "label": "widget", "createdAt": "2024-03-01T09:30:00Z" })),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "INVALID_ARGUMENT");

		let (status, body) = send(&app, "POST", "/api/orders", Some(json!({ "label": "x" }))).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "INVALID_ARGUMENT");

		let (status, _) = send(
			&app,
			"POST",
			"/api/transactions/not-a-token/confirm",
			Some(json!({ "commit": true })),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);

		let (status, _) = send(&app, "GET", "/api/orders/not-an-id", None).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
	}

	#[tokio::test]
	async fn test_unissued_token_is_unknown() {
		let app = app().await;
		let uri = format!(
			"/api/transactions/{}/confirm",
			orders_types::TransactionId::new()
		);
		let (status, body) = send(&app, "POST", &uri, Some(json!({ "commit": false }))).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(body["error"], "UNKNOWN_TRANSACTION");
	}

	#[tokio::test(start_paused = true)]
	async fn test_prepare_timeout_reports_outcome_unknown() {
		let store = FaultyStore::new(Faults {
			prepare: Some(PrepareFault::ReplyStall(Duration::from_secs(60))),
			resolve_stall: Some(Duration::from_millis(1900)),
			..Default::default()
		});
		let app = faulty_app(store.clone(), 2, 5);

		let (status, body) = send(
			&app,
			"POST",
			"/api/orders",
			Some(json!({ "userId": USER, "label": "widget", "createdAt": "2024-03-01T09:30:00Z" })),
		)
		.await;
		assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
		assert_eq!(body["error"], "PREPARE_OUTCOME_UNKNOWN");
		assert!(body.get("txId").is_none());
		assert_eq!(store.rollback_calls().len(), 1);
		assert_eq!(store.memory().prepared_count().await, 0);
	}

	#[tokio::test(start_paused = true)]
	async fn test_request_deadline_is_gateway_timeout() {
		let store = FaultyStore::new(Faults {
			resolve_stall: Some(Duration::from_secs(5)),
			..Default::default()
		});
		let app = faulty_app(store, 10, 1);
		let ids = submit(&app, "2024-03-01T09:30:00Z").await;

		let uri = format!("/api/transactions/{}/confirm", ids.tx_id);
		let (status, _) = send(&app, "POST", &uri, Some(json!({ "commit": true }))).await;
		assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
	}

	#[tokio::test]
	async fn test_health() {
		let app = app().await;
		let (status, body) = send(&app, "GET", "/health", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["status"], "ok");
	}
}
