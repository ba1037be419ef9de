//! File-backed store with durable prepared scopes.
//!
//! Layout under `storage_path`:
//!
//! - `orders/<order-id>.bin`: committed orders
//! - `prepared/<tx-id>.bin`: staged scopes awaiting resolution
//! - `resolving/<tx-id>.<commit|abort>.bin`: scopes claimed by a resolver
//!
//! A scope is claimed by renaming it out of `prepared/`, so only one
//! resolver ever wins a token. A claim left behind by a crash is finished by
//! [`FileStore::ensure_schema`] on the next start.

use crate::{StoreError, StoreInterface, StoreTransaction};
use async_trait::async_trait;
use orders_types::{
	ConfigSchema, Field, FieldType, Order, OrderId, Resolution, Schema, StoreKey, TransactionId,
	ValidationError,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[allow(clippy::doc_nested_refdefs)]
/// Fixed-size file header.
///
/// Binary layout (64 bytes total):
/// - [0-3]: Magic bytes "ORDS"
/// - [4-5]: Version (u16, little-endian)
/// - [6-13]: Write timestamp (u64, little-endian, Unix seconds)
/// - [14-63]: Reserved/padding for future use
#[derive(Debug, Clone)]
struct FileHeader {
	magic: [u8; 4],
	version: u16,
	written_at: u64,
	padding: [u8; 50],
}

impl FileHeader {
	const MAGIC: &'static [u8; 4] = b"ORDS";
	const VERSION: u16 = 1;
	const SIZE: usize = 64;

	fn new() -> Self {
		let written_at = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map(|d| d.as_secs())
			.unwrap_or(0);

		Self {
			magic: *Self::MAGIC,
			version: Self::VERSION,
			written_at,
			padding: [0; 50],
		}
	}

	fn serialize(&self) -> [u8; Self::SIZE] {
		let mut bytes = [0u8; Self::SIZE];
		bytes[0..4].copy_from_slice(&self.magic);
		bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
		bytes[6..14].copy_from_slice(&self.written_at.to_le_bytes());
		bytes[14..64].copy_from_slice(&self.padding);
		bytes
	}

	fn deserialize(bytes: &[u8]) -> Result<Self, StoreError> {
		if bytes.len() < Self::SIZE {
			return Err(StoreError::Serialization("File too small for header".into()));
		}

		let mut magic = [0u8; 4];
		magic.copy_from_slice(&bytes[0..4]);
		if magic != *Self::MAGIC {
			return Err(StoreError::Serialization("Bad magic bytes".into()));
		}

		let version = u16::from_le_bytes([bytes[4], bytes[5]]);
		if version > Self::VERSION {
			return Err(StoreError::Serialization(format!(
				"Unsupported file version: {}",
				version
			)));
		}

		let mut written_bytes = [0u8; 8];
		written_bytes.copy_from_slice(&bytes[6..14]);

		let mut padding = [0u8; 50];
		padding.copy_from_slice(&bytes[14..64]);

		Ok(Self {
			magic,
			version,
			written_at: u64::from_le_bytes(written_bytes),
			padding,
		})
	}
}

/// A prepared scope as written to `prepared/`.
#[derive(Debug, Serialize, Deserialize)]
struct StagedScope {
	tx_id: TransactionId,
	orders: Vec<Order>,
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
	let body = serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
	let mut data = Vec::with_capacity(FileHeader::SIZE + body.len());
	data.extend_from_slice(&FileHeader::new().serialize());
	data.extend_from_slice(&body);
	Ok(data)
}

fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, StoreError> {
	FileHeader::deserialize(data)?;
	serde_json::from_slice(&data[FileHeader::SIZE..])
		.map_err(|e| StoreError::Serialization(e.to_string()))
}

fn io_error(e: std::io::Error) -> StoreError {
	StoreError::Backend(e.to_string())
}

fn resolution_suffix(resolution: Resolution) -> &'static str {
	match resolution {
		Resolution::Commit => "commit",
		Resolution::Abort => "abort",
	}
}

/// Writes `data` to a fresh sibling temp file and syncs it to disk.
async fn write_temp(path: &Path, data: &[u8]) -> Result<PathBuf, StoreError> {
	let file_name = path
		.file_name()
		.and_then(|n| n.to_str())
		.ok_or_else(|| StoreError::Backend(format!("Invalid path {:?}", path)))?;
	let temp_path = path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

	let mut file = fs::File::create(&temp_path).await.map_err(io_error)?;
	file.write_all(data).await.map_err(io_error)?;
	file.sync_all().await.map_err(io_error)?;
	Ok(temp_path)
}

/// File-based store implementation.
///
/// Each committed order and each staged scope is one file, so a restart only
/// needs the directory tree to recover every prepared token.
#[derive(Debug, Clone)]
pub struct FileStore {
	base_path: PathBuf,
}

impl FileStore {
	/// Creates a new FileStore rooted at `base_path`.
	pub fn new(base_path: PathBuf) -> Self {
		Self { base_path }
	}

	fn dir(&self, key: StoreKey) -> PathBuf {
		self.base_path.join(key.as_str())
	}

	fn order_path(&self, id: &OrderId) -> PathBuf {
		self.dir(StoreKey::Orders).join(format!("{}.bin", id))
	}

	fn prepared_path(&self, tx_id: &TransactionId) -> PathBuf {
		self.dir(StoreKey::Prepared).join(format!("{}.bin", tx_id))
	}

	fn claim_path(&self, tx_id: &TransactionId, resolution: Resolution) -> PathBuf {
		self.dir(StoreKey::Resolving)
			.join(format!("{}.{}.bin", tx_id, resolution_suffix(resolution)))
	}

	/// Replaces `path` atomically: temp file, fsync, rename.
	async fn write_replace(&self, path: &Path, data: &[u8]) -> Result<(), StoreError> {
		let temp_path = write_temp(path, data).await?;
		if let Err(e) = fs::rename(&temp_path, path).await {
			let _ = fs::remove_file(&temp_path).await;
			return Err(io_error(e));
		}
		Ok(())
	}

	/// Creates `path` with `data`, failing if it already exists.
	///
	/// The content is complete on disk before the name appears, so a reader
	/// never sees a half-written scope.
	async fn write_new(&self, path: &Path, data: &[u8]) -> Result<(), StoreError> {
		let temp_path = write_temp(path, data).await?;
		let linked = fs::hard_link(&temp_path, path).await;
		let _ = fs::remove_file(&temp_path).await;
		linked.map_err(|e| match e.kind() {
			ErrorKind::AlreadyExists => StoreError::TransactionInUse(
				path.file_stem()
					.and_then(|s| s.to_str())
					.unwrap_or_default()
					.to_string(),
			),
			_ => io_error(e),
		})
	}

	async fn order_exists(&self, id: &OrderId) -> Result<bool, StoreError> {
		fs::try_exists(self.order_path(id)).await.map_err(io_error)
	}

	/// Claims a prepared scope for `resolution` and applies it.
	async fn resolve(
		&self,
		tx_id: &TransactionId,
		resolution: Resolution,
	) -> Result<(), StoreError> {
		let claim = self.claim_path(tx_id, resolution);
		match fs::rename(self.prepared_path(tx_id), &claim).await {
			Ok(()) => {},
			Err(e) if e.kind() == ErrorKind::NotFound => {
				// An earlier resolver may have claimed it and stopped short
				self.finish_claims(tx_id).await?;
				return Err(StoreError::UnknownTransaction(tx_id.to_string()));
			},
			Err(e) => return Err(io_error(e)),
		}
		self.apply_claim(&claim, resolution).await
	}

	/// Finishes any claim on `tx_id` left behind by an interrupted resolver.
	async fn finish_claims(&self, tx_id: &TransactionId) -> Result<(), StoreError> {
		for resolution in [Resolution::Commit, Resolution::Abort] {
			let claim = self.claim_path(tx_id, resolution);
			if fs::try_exists(&claim).await.map_err(io_error)? {
				tracing::warn!(tx_id = %tx_id, "Finishing interrupted resolution");
				self.apply_claim(&claim, resolution).await?;
			}
		}
		Ok(())
	}

	/// Finishes a claimed scope. Safe to repeat, and to run concurrently.
	async fn apply_claim(&self, claim: &Path, resolution: Resolution) -> Result<(), StoreError> {
		if resolution == Resolution::Commit {
			let data = match fs::read(claim).await {
				Ok(data) => data,
				// Removed only once its orders are written
				Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
				Err(e) => return Err(io_error(e)),
			};
			let scope: StagedScope = decode(&data)?;
			for order in &scope.orders {
				self.write_replace(&self.order_path(&order.id), &encode(order)?)
					.await?;
			}
		}
		match fs::remove_file(claim).await {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
			Err(e) => Err(io_error(e)),
		}
	}

	/// Completes every claim left in `resolving/`. Returns how many were found.
	async fn recover_claims(&self) -> Result<usize, StoreError> {
		let mut recovered = 0;
		let mut entries = fs::read_dir(self.dir(StoreKey::Resolving))
			.await
			.map_err(io_error)?;

		while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
			let path = entry.path();
			let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
				continue;
			};
			let resolution = if name.ends_with(".commit.bin") {
				Resolution::Commit
			} else if name.ends_with(".abort.bin") {
				Resolution::Abort
			} else {
				tracing::debug!("Skipping unexpected file {:?}", path);
				continue;
			};

			self.apply_claim(&path, resolution).await?;
			tracing::info!(claim = %name, "Finished interrupted resolution");
			recovered += 1;
		}
		Ok(recovered)
	}
}

/// A scope on the file store. Orders are buffered until `prepare`.
pub struct FileTransaction {
	store: FileStore,
	pending: Vec<Order>,
}

#[async_trait]
impl StoreTransaction for FileTransaction {
	async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
		if self.pending.iter().any(|o| o.id == order.id) || self.store.order_exists(&order.id).await?
		{
			return Err(StoreError::Rejected(format!(
				"duplicate key value violates unique constraint: order {}",
				order.id
			)));
		}
		self.pending.push(order.clone());
		Ok(())
	}

	async fn prepare(self: Box<Self>, tx_id: &TransactionId) -> Result<(), StoreError> {
		let FileTransaction { store, pending } = *self;
		for order in &pending {
			if store.order_exists(&order.id).await? {
				return Err(StoreError::Rejected(format!(
					"duplicate key value violates unique constraint: order {}",
					order.id
				)));
			}
		}

		let scope = StagedScope {
			tx_id: *tx_id,
			orders: pending,
		};
		let data = encode(&scope)?;
		store.write_new(&store.prepared_path(tx_id), &data).await
	}

	async fn release(self: Box<Self>) -> Result<(), StoreError> {
		Ok(())
	}
}

#[async_trait]
impl StoreInterface for FileStore {
	async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
		Ok(Box::new(FileTransaction {
			store: self.clone(),
			pending: Vec::new(),
		}))
	}

	async fn commit_prepared(&self, tx_id: &TransactionId) -> Result<(), StoreError> {
		self.resolve(tx_id, Resolution::Commit).await
	}

	async fn rollback_prepared(&self, tx_id: &TransactionId) -> Result<(), StoreError> {
		self.resolve(tx_id, Resolution::Abort).await
	}

	async fn is_prepared(&self, tx_id: &TransactionId) -> Result<bool, StoreError> {
		fs::try_exists(self.prepared_path(tx_id))
			.await
			.map_err(io_error)
	}

	async fn get_order(&self, id: &OrderId) -> Result<Order, StoreError> {
		let data = match fs::read(self.order_path(id)).await {
			Ok(data) => data,
			Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound),
			Err(e) => return Err(io_error(e)),
		};
		decode(&data)
	}

	async fn ensure_schema(&self) -> Result<(), StoreError> {
		for key in StoreKey::all() {
			fs::create_dir_all(self.dir(key)).await.map_err(io_error)?;
		}
		let recovered = self.recover_claims().await?;
		if recovered > 0 {
			tracing::warn!(recovered, "Recovered interrupted resolutions");
		}
		Ok(())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStoreSchema)
	}
}

/// Configuration schema for FileStore.
pub struct FileStoreSchema;

impl ConfigSchema for FileStoreSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new("storage_path", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some("") => Err("storage_path cannot be empty".to_string()),
					_ => Ok(()),
				}
			})],
		);
		schema.validate(config)
	}
}

/// Factory function to create a file store from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory (default: "./data/orders")
pub fn create_store(config: &toml::Value) -> Result<Box<dyn StoreInterface>, StoreError> {
	FileStoreSchema
		.validate(config)
		.map_err(|e| StoreError::Configuration(format!("Invalid file store config: {}", e)))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/orders");

	Ok(Box::new(FileStore::new(PathBuf::from(storage_path))))
}

/// Registry for the file store implementation.
pub struct Registry;

impl orders_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = crate::StoreFactory;

	fn factory() -> Self::Factory {
		create_store
	}
}

impl crate::StoreRegistry for Registry {}
