//! Common types for the two-phase order service.
//!
//! This crate defines the entity, identifier and contract types shared by the
//! store, core and service crates, so that every layer agrees on how an order
//! and its transaction token look on the wire and at rest.

/// HTTP API request, response and error types.
pub mod api;
/// Strongly typed identifiers for orders, users and transaction tokens.
pub mod ids;
/// The order entity.
pub mod order;
/// Registry trait for self-registering store implementations.
pub mod registry;
/// Redacting wrapper for connection strings and other credentials.
pub mod secret_string;
/// Keys naming the collections a store keeps.
pub mod storage;
/// Transaction token lifecycle types.
pub mod transaction;
/// Configuration validation types for backend-specific config tables.
pub mod validation;

pub use api::*;
pub use ids::{IdParseError, OrderId, TransactionId, UserId};
pub use order::Order;
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use storage::StoreKey;
pub use transaction::{Resolution, TransactionState};
pub use validation::*;
