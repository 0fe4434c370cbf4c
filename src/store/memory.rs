//! Thread-safe in-memory [`TokenStore`] for tests and short-lived processes.

// self
use crate::{
	_prelude::*,
	auth::{DeviceId, TokenBundle},
	store::{StoreError, TokenStore},
};

#[derive(Debug, Default)]
struct Slots {
	tokens: Option<TokenBundle>,
	device_id: Option<DeviceId>,
}

/// In-process store; clones share the same slots.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<Slots>>);
impl TokenStore for MemoryStore {
	fn load_tokens(&self) -> Result<Option<TokenBundle>, StoreError> {
		Ok(self.0.read().tokens.clone())
	}

	fn save_tokens(&self, bundle: &TokenBundle) -> Result<(), StoreError> {
		self.0.write().tokens = Some(bundle.clone());

		Ok(())
	}

	fn load_device_id(&self) -> Result<Option<DeviceId>, StoreError> {
		Ok(self.0.read().device_id.clone())
	}

	fn save_device_id(&self, device_id: &DeviceId) -> Result<(), StoreError> {
		self.0.write().device_id = Some(device_id.clone());

		Ok(())
	}
}
