//! Session marker and storage snapshot types.
//!
//! The snapshot format is owned by the browser-automation layer; the
//! orchestrator treats it as a black box aside from probing for a
//! decodable session marker.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Well-known client-side storage key the application writes its
/// session marker under after a successful login.
pub const SESSION_STORAGE_KEY: &str = "app.session";

/// Errors from snapshot persistence and decoding.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
	#[error("snapshot io failure: {0}")]
	Io(#[from] std::io::Error),
	#[error("snapshot decode failure: {0}")]
	Decode(#[from] serde_json::Error),
}

/// Client-side evidence of an authenticated session.
///
/// Extra fields in the stored record are tolerated; a non-empty token
/// is the sole validity criterion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionMarker {
	pub token: String,
}

impl SessionMarker {
	pub fn new(token: impl Into<String>) -> Self {
		Self { token: token.into() }
	}

	pub fn is_valid(&self) -> bool {
		!self.token.is_empty()
	}

	/// Decodes a raw storage value, returning `None` for anything that
	/// is not a marker with a non-empty token.
	pub fn decode(raw: &str) -> Option<Self> {
		serde_json::from_str::<Self>(raw).ok().filter(Self::is_valid)
	}

	pub fn encode(&self) -> String {
		serde_json::to_string(self).expect("marker is always serializable")
	}
}

/// One key/value pair of client-side storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StorageEntry {
	pub name: String,
	pub value: String,
}

/// Opaque serialized storage blob captured from a surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StorageSnapshot {
	#[serde(default)]
	pub entries: Vec<StorageEntry>,
}

impl StorageSnapshot {
	/// Loads a snapshot from a JSON file.
	pub fn from_file(path: &Path) -> Result<Self, StorageError> {
		let raw = std::fs::read_to_string(path)?;
		Ok(serde_json::from_str(&raw)?)
	}

	/// Writes the snapshot as pretty JSON.
	pub fn to_file(&self, path: &Path) -> Result<(), StorageError> {
		let raw = serde_json::to_string_pretty(self)?;
		std::fs::write(path, raw)?;
		Ok(())
	}

	/// Sets `name` to `value`, replacing an existing entry.
	pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
		let name = name.into();
		let value = value.into();
		match self.entries.iter_mut().find(|entry| entry.name == name) {
			Some(entry) => entry.value = value,
			None => self.entries.push(StorageEntry { name, value }),
		}
	}

	pub fn get(&self, name: &str) -> Option<&str> {
		self.entries
			.iter()
			.find(|entry| entry.name == name)
			.map(|entry| entry.value.as_str())
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Decodes the session marker entry, if present and valid.
	pub fn session_marker(&self) -> Option<SessionMarker> {
		self.get(SESSION_STORAGE_KEY).and_then(SessionMarker::decode)
	}
}
