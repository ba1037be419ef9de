//! HTTP handlers for the order service API.

pub mod order;
pub mod transaction;
