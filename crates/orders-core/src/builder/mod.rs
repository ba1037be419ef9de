//! Builder for assembling the order services from configuration.
//!
//! The store backend is pluggable: the caller hands in a map of factory
//! functions keyed by implementation name, and the builder instantiates the
//! ones named under `[store.implementations]`, then keeps the primary.

use crate::{ConfirmationService, OrderRepository, OrdersEngine, SubmissionService};
use orders_config::Config;
use orders_store::{StoreError, StoreInterface};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while building the services.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
	/// The primary store failed its startup checks.
	#[error("Store setup failed: {0}")]
	Store(String),
}

/// Factory functions the builder can draw from.
pub struct OrdersFactories<SF> {
	pub store_factories: HashMap<String, SF>,
}

/// Builder for constructing an [`OrdersEngine`] with a pluggable store.
pub struct OrdersBuilder {
	config: Config,
}

impl OrdersBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Creates the configured stores, prepares the primary one, and wires the
	/// repository and both services around it.
	pub async fn build<SF>(self, factories: OrdersFactories<SF>) -> Result<OrdersEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StoreInterface>, StoreError>,
	{
		let mut store_impls = HashMap::new();
		for (name, config) in &self.config.store.implementations {
			let Some(factory) = factories.store_factories.get(name) else {
				return Err(BuilderError::MissingComponent(format!(
					"No store implementation named '{}'",
					name
				)));
			};
			match factory(config) {
				Ok(implementation) => {
					let is_primary = &self.config.store.primary == name;
					tracing::info!(component = "store", implementation = %name, enabled = %is_primary, "Loaded");
					store_impls.insert(name.clone(), implementation);
				},
				Err(e) => {
					tracing::error!(
						component = "store",
						implementation = %name,
						error = %e,
						"Failed to create store implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create store implementation '{}': {}",
						name, e
					)));
				},
			}
		}

		let primary = &self.config.store.primary;
		let store = store_impls.remove(primary).ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary store '{}' failed to load or has invalid configuration",
				primary
			))
		})?;

		let repository = Arc::new(OrderRepository::new(store));
		repository.ensure_schema().await.map_err(|e| {
			tracing::error!(component = "store", implementation = %primary, error = %e, "Store setup failed");
			BuilderError::Store(e.to_string())
		})?;

		let store_timeout = self.config.service.store_timeout();
		let submission = SubmissionService::new(repository.clone(), store_timeout);
		let confirmation = ConfirmationService::new(repository.clone(), store_timeout);

		Ok(OrdersEngine::new(
			self.config,
			repository,
			submission,
			confirmation,
		))
	}
}
