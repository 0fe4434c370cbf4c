//! On-disk fill level format.
//!
//! The level is printed as a decimal float the way Python's `repr` prints it (integral values
//! keep a trailing `.0`), and the UTF-8 bytes of that text are hex-encoded. Readers tolerate
//! surrounding whitespace and stray single quotes.

// std
use std::fs;
// self
use crate::{_prelude::*, store::file::write_atomically};

/// Why a persisted level could not be used.
#[derive(Debug, ThisError)]
pub enum PersistError {
	/// The file could not be read or written.
	#[error("Limiter file {path} is not accessible: {message}.")]
	Io {
		/// File involved.
		path: PathBuf,
		/// Underlying failure.
		message: String,
	},
	/// The file content is not a hex-encoded float.
	#[error("Limiter file {path} is corrupt.")]
	Corrupt {
		/// File involved.
		path: PathBuf,
	},
}

/// Formats a level as the decimal text stored on disk.
pub fn format_level(level: f64) -> String {
	let text = level.to_string();

	if text.contains(['.', 'e', 'E']) || !level.is_finite() { text } else { format!("{text}.0") }
}

/// Encodes a level into the persisted representation.
pub fn encode_level(level: f64) -> String {
	hex::encode(format_level(level))
}

/// Decodes the persisted representation into a level.
pub fn decode_level(raw: &str) -> Option<f64> {
	let cleaned: String = raw.trim().chars().filter(|c| *c != '\'').collect();
	let bytes = hex::decode(cleaned).ok()?;
	let text = String::from_utf8(bytes).ok()?;

	text.trim().parse::<f64>().ok().filter(|level| level.is_finite())
}

/// Reads the level stored at `path`.
pub fn read_level(path: &Path) -> Result<f64, PersistError> {
	let raw = fs::read_to_string(path)
		.map_err(|e| PersistError::Io { path: path.to_owned(), message: e.to_string() })?;

	decode_level(&raw).ok_or_else(|| PersistError::Corrupt { path: path.to_owned() })
}

/// Atomically replaces the level stored at `path` (owner read/write only on unix).
pub fn write_level(path: &Path, level: f64) -> Result<(), PersistError> {
	write_atomically(path, encode_level(level).as_bytes())
		.map_err(|e| PersistError::Io { path: path.to_owned(), message: e.to_string() })
}
