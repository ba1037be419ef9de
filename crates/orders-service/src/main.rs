//! Main entry point for the order service.
//!
//! Loads configuration, prepares the configured order store, and serves the
//! HTTP API for submitting orders and confirming their transactions.

use clap::Parser;
use orders_config::Config;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod factory_registry;
mod server;

/// Command-line arguments for the order service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml", env = "ORDERS_CONFIG")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Main entry point for the order service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the services, running store startup checks
/// 5. Serves the API until interrupted
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started order service");

	let config_path = args
		.config
		.to_str()
		.ok_or("Configuration path is not valid UTF-8")?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let engine = Arc::new(factory_registry::build_engine_from_config(config.clone()).await?);

	match config.api.filter(|api| api.enabled) {
		Some(api_config) => {
			server::start_server(api_config, engine, shutdown_signal()).await?;
		},
		None => {
			tracing::info!("API disabled; store checks complete");
		},
	}

	tracing::info!("Stopped order service");
	Ok(())
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %e, "Failed to listen for shutdown signal");
	}
	tracing::info!("Shutdown requested");
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_args_default_values() {
		let args = Args::try_parse_from(["orders"]).unwrap();
		assert_eq!(args.log_level, "info");
	}

	#[test]
	fn test_args_custom_values() {
		let args =
			Args::try_parse_from(["orders", "--config", "custom.toml", "-l", "debug"]).unwrap();
		assert_eq!(args.config, PathBuf::from("custom.toml"));
		assert_eq!(args.log_level, "debug");
	}

	#[tokio::test]
	async fn test_engine_from_config_file() {
		let dir = tempfile::tempdir().unwrap();
		let config_path = dir.path().join("config.toml");
		let storage = dir.path().join("data");
		std::fs::write(
			&config_path,
			format!(
				r#"
[service]
id = "orders-test"

[store]
primary = "file"
[store.implementations.file]
storage_path = "{}"
"#,
				storage.display()
			),
		)
		.unwrap();

		let config = Config::from_file(config_path.to_str().unwrap()).await.unwrap();
		let engine = factory_registry::build_engine_from_config(config).await.unwrap();
		assert_eq!(engine.config().service.id, "orders-test");
		assert!(storage.join("orders").is_dir());
	}
}
