//! Configuration module for the order service.
//!
//! This module provides the configuration structures for the service identity,
//! the order store and the HTTP API. Configuration is loaded from TOML files,
//! with `${VAR}` and `${VAR:-default}` placeholders resolved from the
//! environment before parsing.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["store.toml", "api.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

mod loader;

/// Builders for test and development configurations.
pub mod builders {
	pub mod config;
}

pub use builders::config::ConfigBuilder;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message, drop the echoed input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the order service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity and per-operation deadlines.
	pub service: ServiceConfig,
	/// Which order store backend to use and how to reach it.
	pub store: StoreConfig,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Configuration specific to this service instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Identifier for this instance, attached to log output.
	pub id: String,
	/// Deadline for each individual store round trip issued by a service.
	#[serde(default = "default_store_timeout_seconds")]
	pub store_timeout_seconds: u64,
}

impl ServiceConfig {
	/// Returns the store deadline as a `Duration`.
	pub fn store_timeout(&self) -> Duration {
		Duration::from_secs(self.store_timeout_seconds)
	}
}

fn default_store_timeout_seconds() -> u64 {
	10
}

/// Configuration for the order store.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
	/// Which implementation to use.
	pub primary: String,
	/// Map of store implementation names to their raw configuration tables.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Request timeout in seconds.
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	/// Maximum request size in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
	/// CORS configuration.
	pub cors: Option<CorsConfig>,
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			host: default_api_host(),
			port: default_api_port(),
			timeout_seconds: default_api_timeout(),
			max_request_size: default_max_request_size(),
			cors: None,
		}
	}
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
	/// Allowed origins for CORS.
	pub allowed_origins: Vec<String>,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

fn default_api_timeout() -> u64 {
	30
}

fn default_max_request_size() -> usize {
	64 * 1024 // orders are small
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let var_name = var_name.as_str();
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name
					)))
				},
			},
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Apply replacements in reverse order to maintain positions
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Returns the raw configuration table of the primary store.
	pub fn primary_store_config(&self) -> Option<&toml::Value> {
		self.store.implementations.get(&self.store.primary)
	}

	/// Validates cross-field constraints serde cannot express.
	///
	/// Backend tables are checked by each backend's own schema when the store
	/// is created; this only checks that the selection is coherent.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.trim().is_empty() {
			return Err(ConfigError::Validation("Service ID cannot be empty".into()));
		}

		if self.service.store_timeout_seconds == 0 {
			return Err(ConfigError::Validation(
				"store_timeout_seconds must be greater than 0".into(),
			));
		}
		if self.service.store_timeout_seconds > 300 {
			return Err(ConfigError::Validation(
				"store_timeout_seconds cannot exceed 300".into(),
			));
		}

		if self.store.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one store implementation must be configured".into(),
			));
		}
		if self.store.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Store primary implementation cannot be empty".into(),
			));
		}
		if !self.store.implementations.contains_key(&self.store.primary) {
			return Err(ConfigError::Validation(format!(
				"Primary store '{}' not found in implementations",
				self.store.primary
			)));
		}

		if let Some(ref api) = self.api {
			if api.enabled {
				if api.timeout_seconds == 0 {
					return Err(ConfigError::Validation(
						"API timeout_seconds must be greater than 0".into(),
					));
				}
				// A timed-out prepare is followed by a rollback with its own deadline
				let worst_case = self.service.store_timeout_seconds.saturating_mul(2);
				if api.timeout_seconds <= worst_case {
					return Err(ConfigError::Validation(format!(
						"API timeout_seconds ({}) must exceed twice store_timeout_seconds ({})",
						api.timeout_seconds, self.service.store_timeout_seconds
					)));
				}
			}
		}

		Ok(())
	}
}

/// Parses a TOML string, resolving environment variables and validating.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
