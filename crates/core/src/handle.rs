//! Live authenticated-session handle types.

use std::fmt;
use std::sync::Arc;

use authboot_surface::ControlSurface;

use crate::error::Result;

/// How a session handle was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSource {
	/// A full login run against the login surface.
	FreshLogin,
	/// A cached snapshot that passed its validity re-check.
	WarmReuse,
}

/// A browser surface known to hold a valid session marker.
///
/// The handle owns the surface for the remainder of the test that
/// required authentication; [`close`](Self::close) clears the
/// client-side session state when the caller is done.
#[derive(Clone)]
pub struct SessionHandle {
	surface: Arc<dyn ControlSurface>,
	role: String,
	source: SessionSource,
}

impl SessionHandle {
	pub(crate) fn new(surface: Arc<dyn ControlSurface>, role: &str, source: SessionSource) -> Self {
		Self {
			surface,
			role: role.to_string(),
			source,
		}
	}

	pub fn surface(&self) -> &Arc<dyn ControlSurface> {
		&self.surface
	}

	pub fn role(&self) -> &str {
		&self.role
	}

	pub fn source(&self) -> SessionSource {
		self.source
	}

	/// Ends this session's use of the surface by clearing its
	/// client-side session state.
	pub async fn close(self) -> Result<()> {
		self.surface.clear_session_storage().await?;
		Ok(())
	}
}

impl fmt::Debug for SessionHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SessionHandle")
			.field("role", &self.role)
			.field("source", &self.source)
			.finish_non_exhaustive()
	}
}
