//! Factory registry for store implementations.
//!
//! Collects every store backend once at startup so that configuration can
//! name a backend without this binary hard-coding which ones exist.

use orders_config::Config;
use orders_core::{OrdersBuilder, OrdersEngine, OrdersFactories};
use orders_store::StoreFactory;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Registry of all known implementation factories.
pub struct FactoryRegistry {
	pub store: HashMap<String, StoreFactory>,
}

impl FactoryRegistry {
	/// Create a new empty registry
	pub fn new() -> Self {
		Self {
			store: HashMap::new(),
		}
	}

	/// Register a store implementation
	pub fn register_store(&mut self, name: impl Into<String>, factory: StoreFactory) {
		self.store.insert(name.into(), factory);
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Initialize the global registry with all available implementations
pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();
		for (name, factory) in orders_store::get_all_implementations() {
			tracing::debug!("Registering store implementation: {}", name);
			registry.register_store(name, factory);
		}
		registry
	})
}

/// Builds the engine for `config`, drawing store factories from the registry.
pub async fn build_engine_from_config(
	config: Config,
) -> Result<OrdersEngine, Box<dyn std::error::Error>> {
	let registry = get_registry();

	let mut store_factories = HashMap::new();
	for name in config.store.implementations.keys() {
		let Some(factory) = registry.store.get(name) else {
			let mut available: Vec<_> = registry.store.keys().cloned().collect();
			available.sort();
			return Err(format!(
				"Unknown store implementation '{}'. Available: [{}]",
				name,
				available.join(", ")
			)
			.into());
		};
		store_factories.insert(name.clone(), *factory);
	}

	let engine = OrdersBuilder::new(config)
		.build(OrdersFactories { store_factories })
		.await?;
	Ok(engine)
}

#[cfg(test)]
mod tests {
	use super::*;
	use orders_config::ConfigBuilder;

	#[test]
	fn test_registry_has_all_backends() {
		let registry = get_registry();
		for name in ["file", "memory", "postgres"] {
			assert!(registry.store.contains_key(name), "missing {}", name);
		}
	}

	#[tokio::test]
	async fn test_unknown_backend_lists_available() {
		let config = ConfigBuilder::new()
			.store("cassandra", toml::Value::Table(toml::map::Map::new()))
			.build();
		let err = build_engine_from_config(config).await.err().unwrap();
		let message = err.to_string();
		assert!(message.contains("cassandra"));
		assert!(message.contains("file, memory, postgres"));
	}
}
