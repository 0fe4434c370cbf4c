//! Session lifecycle: login, token exchange, refresh, and freshness checks.

pub mod common;
pub mod login;
pub mod refresh;

pub use common::*;
pub use refresh::*;

// self
use crate::{
	_prelude::*,
	auth::{DeviceId, TokenBundle, UnixTime},
	http::VendorHttpClient,
	oauth::TokenEndpoint,
	store::TokenStore,
	vendor::VendorDescriptor,
};

/// OAuth session against a single vendor descriptor.
///
/// The session owns the current [`TokenBundle`] (or none, when logged out), the device
/// identifier, and the HTTP client every login, refresh, and API call goes through. Clones
/// share state.
///
/// Refreshes are not serialized: two callers that run the freshness check concurrently may
/// both refresh, and whichever finishes last wins both in memory and in the persisted blob.
#[derive(Clone)]
pub struct AuthSession {
	/// Vendor endpoints and client registration.
	pub descriptor: VendorDescriptor,
	/// Shared HTTP client (redirects disabled).
	pub http_client: VendorHttpClient,
	/// Session tunables.
	pub config: SessionConfig,
	/// Refresh outcome counters.
	pub refresh_metrics: Arc<RefreshMetrics>,
	token_endpoint: TokenEndpoint,
	tokens: Arc<RwLock<Option<TokenBundle>>>,
	device_id: Arc<Mutex<Option<DeviceId>>>,
	callback: Option<TokenCallback>,
}
impl AuthSession {
	/// Creates a logged-out session with its own HTTP client.
	pub fn new(descriptor: VendorDescriptor, config: SessionConfig) -> Result<Self> {
		let http_client = VendorHttpClient::new(config.request_timeout)?;

		Self::with_http_client(descriptor, config, http_client)
	}

	/// Creates a logged-out session that reuses the caller-provided HTTP client.
	pub fn with_http_client(
		descriptor: VendorDescriptor,
		config: SessionConfig,
		http_client: VendorHttpClient,
	) -> Result<Self> {
		let token_endpoint = TokenEndpoint::from_descriptor(&descriptor, http_client.clone())?;

		Ok(Self {
			descriptor,
			http_client,
			config,
			refresh_metrics: Default::default(),
			token_endpoint,
			tokens: Default::default(),
			device_id: Default::default(),
			callback: None,
		})
	}

	/// Registers the token-update hook, replacing any previous one.
	pub fn with_callback<F>(mut self, callback: F) -> Self
	where
		F: 'static + Fn(&TokenBundle) -> Result<(), crate::error::BoxError> + Send + Sync,
	{
		self.callback = Some(Arc::new(callback));

		self
	}

	/// Registers a token-update hook that saves every new bundle into `store`.
	pub fn with_store(self, store: Arc<dyn TokenStore>) -> Self {
		self.with_callback(move |bundle| store.save_tokens(bundle).map_err(Into::into))
	}

	/// Loads the persisted bundle and device identifier from `store`.
	///
	/// An unreadable bundle leaves the session logged out. When no device identifier is
	/// stored, a new one is generated and saved; save failures are logged only.
	pub fn restore(&self, store: &dyn TokenStore) {
		match store.load_tokens() {
			Ok(Some(bundle)) => self.set_tokens(bundle),
			Ok(None) => {},
			Err(e) => tracing::warn!(error = %e, "Stored tokens could not be loaded."),
		}

		let stored = store.load_device_id().unwrap_or_else(|e| {
			tracing::warn!(error = %e, "Stored device id could not be loaded.");

			None
		});

		match stored {
			Some(device_id) => self.set_device_id(device_id),
			None => {
				let device_id = self.get_device_id();

				tracing::warn!(device_id = %device_id, "No device id loaded; generated a new one.");

				if let Err(e) = store.save_device_id(&device_id) {
					tracing::warn!(error = %e, "Generated device id could not be saved.");
				}
			},
		}
	}

	/// Returns `true` when a bundle is held and its access token has not expired.
	pub fn logged_in(&self) -> bool {
		self.tokens.read().as_ref().is_some_and(|bundle| !bundle.is_expired_at(UnixTime::now()))
	}

	/// Returns a snapshot of the current bundle.
	pub fn get_tokens(&self) -> Option<TokenBundle> {
		self.tokens.read().clone()
	}

	/// Replaces the current bundle without invoking the update hook.
	pub fn set_tokens(&self, bundle: TokenBundle) {
		*self.tokens.write() = Some(bundle);
	}

	/// Drops the current bundle, returning the session to the logged-out state.
	pub fn clear_tokens(&self) {
		self.tokens.write().take();
	}

	/// Returns the device identifier, generating one on first use.
	pub fn get_device_id(&self) -> DeviceId {
		self.device_id.lock().get_or_insert_with(DeviceId::generate).clone()
	}

	/// Overrides the device identifier.
	pub fn set_device_id(&self, device_id: DeviceId) {
		*self.device_id.lock() = Some(device_id);
	}

	/// Stores a freshly issued bundle and notifies the update hook.
	pub(crate) fn install_tokens(&self, bundle: TokenBundle) -> TokenBundle {
		self.set_tokens(bundle.clone());

		if let Some(callback) = &self.callback {
			if let Err(e) = callback(&bundle) {
				tracing::error!(error = %e, "Token update callback failed.");
			}
		}

		bundle
	}
}
impl Debug for AuthSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthSession")
			.field("descriptor", &self.descriptor)
			.field("config", &self.config)
			.field("logged_in", &self.logged_in())
			.field("callback_set", &self.callback.is_some())
			.finish()
	}
}
