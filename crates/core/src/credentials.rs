//! Login credentials.

use std::fmt;

/// Identity/secret pair supplied by the caller.
///
/// Immutable once constructed; the secret never appears in `Debug`
/// output so it cannot leak into logs verbatim.
#[derive(Clone)]
pub struct Credentials {
	identity: String,
	secret: String,
}

impl Credentials {
	pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
		Self {
			identity: identity.into(),
			secret: secret.into(),
		}
	}

	pub fn identity(&self) -> &str {
		&self.identity
	}

	pub fn secret(&self) -> &str {
		&self.secret
	}

	/// Truncated identity for log lines; never the full value.
	pub fn identity_hint(&self) -> String {
		const VISIBLE: usize = 3;
		let prefix: String = self.identity.chars().take(VISIBLE).collect();
		if self.identity.chars().count() > VISIBLE {
			format!("{prefix}...")
		} else {
			prefix
		}
	}
}

impl fmt::Debug for Credentials {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Credentials")
			.field("identity", &self.identity_hint())
			.field("secret", &"<redacted>")
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn debug_output_never_carries_credentials_verbatim() {
		let credentials = Credentials::new("admin@example.com", "hunter2");
		let rendered = format!("{credentials:?}");
		assert!(rendered.contains("adm..."));
		assert!(!rendered.contains("admin@example.com"));
		assert!(!rendered.contains("hunter2"));
	}

	#[test]
	fn identity_hint_truncates_long_identities() {
		assert_eq!(Credentials::new("admin@example.com", "x").identity_hint(), "adm...");
		assert_eq!(Credentials::new("ab", "x").identity_hint(), "ab");
	}
}
