//! Stable per-installation device identifier required by some remote-command payloads.

// self
use crate::_prelude::*;

const DEVICE_ID_BYTES: usize = 16;

/// Error returned when a stored device id cannot be used.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum DeviceIdError {
	/// The stored value was empty or whitespace.
	#[error("Device id cannot be empty.")]
	Empty,
	/// The stored value contains embedded whitespace.
	#[error("Device id contains whitespace.")]
	ContainsWhitespace,
}

/// Random 128-bit identifier, hex-encoded, generated once per installation.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);
impl DeviceId {
	/// Generates a fresh random identifier.
	pub fn generate() -> Self {
		let bytes: [u8; DEVICE_ID_BYTES] = rand::random();

		Self(hex::encode(bytes))
	}

	/// Wraps a stored identifier, trimming surrounding whitespace.
	pub fn new(value: impl AsRef<str>) -> Result<Self, DeviceIdError> {
		let view = value.as_ref().trim();

		if view.is_empty() {
			return Err(DeviceIdError::Empty);
		}
		if view.chars().any(char::is_whitespace) {
			return Err(DeviceIdError::ContainsWhitespace);
		}

		Ok(Self(view.to_owned()))
	}

	/// Returns the identifier as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for DeviceId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl From<DeviceId> for String {
	fn from(value: DeviceId) -> Self {
		value.0
	}
}
impl TryFrom<String> for DeviceId {
	type Error = DeviceIdError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl FromStr for DeviceId {
	type Err = DeviceIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
impl Debug for DeviceId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "DeviceId({})", self.0)
	}
}
impl Display for DeviceId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn generated_ids_are_128_bit_hex() {
		let id = DeviceId::generate();

		assert_eq!(id.as_str().len(), DEVICE_ID_BYTES * 2);
		assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
		assert_ne!(id, DeviceId::generate());
	}

	#[test]
	fn stored_values_are_trimmed_and_validated() {
		let id = DeviceId::new("abc123\n").expect("Trailing newline should be trimmed.");

		assert_eq!(id.as_str(), "abc123");
		assert_eq!(DeviceId::new("  "), Err(DeviceIdError::Empty));
		assert_eq!(DeviceId::new("ab cd"), Err(DeviceIdError::ContainsWhitespace));
	}
}
