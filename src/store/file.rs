//! File-backed [`TokenStore`]: a JSON token file plus a plain-text device-id file.

// std
use std::{
	fs::{self, File},
	io::{ErrorKind, Write},
};
// crates.io
use tempfile::NamedTempFile;
// self
use crate::{
	_prelude::*,
	auth::{DeviceId, TokenBundle},
	store::{StoreError, TokenStore},
};

/// Persists the bundle and device id to two files, replacing each atomically on save.
#[derive(Clone, Debug)]
pub struct FileStore {
	tokens_path: PathBuf,
	device_id_path: PathBuf,
}
impl FileStore {
	/// Creates a store over the given token and device-id paths; files are created on save.
	pub fn new(tokens_path: impl Into<PathBuf>, device_id_path: impl Into<PathBuf>) -> Self {
		Self { tokens_path: tokens_path.into(), device_id_path: device_id_path.into() }
	}

	/// Path of the JSON token file.
	pub fn tokens_path(&self) -> &Path {
		&self.tokens_path
	}

	/// Path of the device-id file.
	pub fn device_id_path(&self) -> &Path {
		&self.device_id_path
	}

	fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
		match fs::read(path) {
			Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(None),
			Ok(bytes) => Ok(Some(bytes)),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
			Err(e) => Err(StoreError::Backend {
				message: format!("Failed to read {}: {e}", path.display()),
			}),
		}
	}
}
impl TokenStore for FileStore {
	fn load_tokens(&self) -> Result<Option<TokenBundle>, StoreError> {
		let Some(bytes) = Self::read_optional(&self.tokens_path)? else {
			return Ok(None);
		};

		serde_json::from_slice(&bytes).map(Some).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", self.tokens_path.display()),
		})
	}

	fn save_tokens(&self, bundle: &TokenBundle) -> Result<(), StoreError> {
		let serialized = serde_json::to_vec(bundle).map_err(|e| StoreError::Serialization {
			message: format!("Failed to serialize token bundle: {e}"),
		})?;

		write_atomically(&self.tokens_path, &serialized)
	}

	fn load_device_id(&self) -> Result<Option<DeviceId>, StoreError> {
		let Some(bytes) = Self::read_optional(&self.device_id_path)? else {
			return Ok(None);
		};
		let text = String::from_utf8(bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to decode {}: {e}", self.device_id_path.display()),
		})?;

		DeviceId::new(text).map(Some).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", self.device_id_path.display()),
		})
	}

	fn save_device_id(&self, device_id: &DeviceId) -> Result<(), StoreError> {
		write_atomically(&self.device_id_path, device_id.as_str().as_bytes())
	}
}

/// Writes `contents` to a uniquely named sibling temp file, syncs it, and renames it over
/// `path`.
pub(crate) fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
	let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
		Some(parent) => {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create directory {}: {e}", parent.display()),
			})?;

			parent
		},
		None => Path::new("."),
	};
	let mut tmp = NamedTempFile::new_in(parent).map_err(|e| StoreError::Backend {
		message: format!("Failed to create a temp file in {}: {e}", parent.display()),
	})?;

	restrict_to_owner(tmp.as_file()).map_err(|e| StoreError::Backend {
		message: format!("Failed to restrict {}: {e}", tmp.path().display()),
	})?;
	tmp.write_all(contents).map_err(|e| StoreError::Backend {
		message: format!("Failed to write {}: {e}", tmp.path().display()),
	})?;
	tmp.as_file().sync_all().map_err(|e| StoreError::Backend {
		message: format!("Failed to sync {}: {e}", tmp.path().display()),
	})?;
	tmp.persist(path).map_err(|e| StoreError::Backend {
		message: format!("Failed to replace {}: {}", path.display(), e.error),
	})?;

	Ok(())
}

#[cfg(unix)]
fn restrict_to_owner(file: &File) -> std::io::Result<()> {
	// std
	use std::os::unix::fs::PermissionsExt;

	file.set_permissions(fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_to_owner(_: &File) -> std::io::Result<()> {
	Ok(())
}
