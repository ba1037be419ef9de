//! Configuration builder for creating test and development configurations.

use crate::{ApiConfig, Config, ServiceConfig, StoreConfig};
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
///
/// Defaults to the in-memory store and no API server.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	service_id: String,
	store_timeout_seconds: u64,
	store_primary: String,
	store_config: toml::Value,
	api: Option<ApiConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// Creates a new `ConfigBuilder` with default values suitable for testing.
	pub fn new() -> Self {
		Self {
			service_id: "orders-test".to_string(),
			store_timeout_seconds: 5,
			store_primary: "memory".to_string(),
			store_config: toml::Value::Table(toml::map::Map::new()),
			api: None,
		}
	}

	pub fn service_id(mut self, id: impl Into<String>) -> Self {
		self.service_id = id.into();
		self
	}

	pub fn store_timeout_seconds(mut self, seconds: u64) -> Self {
		self.store_timeout_seconds = seconds;
		self
	}

	/// Selects the primary store and its backend table.
	pub fn store(mut self, primary: impl Into<String>, config: toml::Value) -> Self {
		self.store_primary = primary.into();
		self.store_config = config;
		self
	}

	pub fn api(mut self, api: ApiConfig) -> Self {
		self.api = Some(api);
		self
	}

	/// Builds the `Config`. Validation is left to `Config::from_str`.
	pub fn build(self) -> Config {
		let mut implementations = HashMap::new();
		implementations.insert(self.store_primary.clone(), self.store_config);

		Config {
			service: ServiceConfig {
				id: self.service_id,
				store_timeout_seconds: self.store_timeout_seconds,
			},
			store: StoreConfig {
				primary: self.store_primary,
				implementations,
			},
			api: self.api,
		}
	}
}
