//! Storage contract and built-in backends for the token bundle and device identifier.
//!
//! Stores are synchronous: they are called from the session's token-update hook, which runs
//! inline with the flow that produced the bundle.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{DeviceId, TokenBundle},
};

/// Key-value persistence for one account's token bundle and the installation's device id.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Loads the persisted bundle, if any.
	fn load_tokens(&self) -> Result<Option<TokenBundle>, StoreError>;

	/// Persists or replaces the bundle.
	fn save_tokens(&self, bundle: &TokenBundle) -> Result<(), StoreError>;

	/// Loads the persisted device identifier, if any.
	fn load_device_id(&self) -> Result<Option<DeviceId>, StoreError>;

	/// Persists or replaces the device identifier.
	fn save_device_id(&self, device_id: &DeviceId) -> Result<(), StoreError>;
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Stored content could not be encoded or decoded.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
