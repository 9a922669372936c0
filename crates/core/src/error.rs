//! Error type for login orchestration.

use authboot_surface::{StorageError, SurfaceError};

pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors surfaced by orchestration, caching, and readiness checks.
///
/// Failure messages carry enough context (status, outcome kind,
/// attempt count, navigation target) to tell "credentials wrong" from
/// "service unavailable" from "rate limited" without re-running with
/// extra instrumentation.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
	/// The browser surface disappeared mid-run.
	#[error("browser surface closed during {phase}")]
	SessionClosed { phase: &'static str },

	/// The server rejected the login with a non-retryable status.
	#[error("login rejected with status {status} after {attempts} attempt(s): {message}")]
	LoginRejected { status: u16, message: String, attempts: u32 },

	/// Retryable failures persisted through the attempt ceiling.
	#[error("login attempts exhausted after {attempts} attempt(s); last outcome: {last_outcome}; current page: {current_url}")]
	AttemptsExhausted {
		attempts: u32,
		last_outcome: String,
		current_url: String,
	},

	/// The server accepted the login but the session marker never
	/// became observable.
	#[error("session not confirmed within {deadline_ms}ms: {detail}")]
	ReadinessTimeout { deadline_ms: u64, detail: String },

	#[error(transparent)]
	Surface(#[from] SurfaceError),

	#[error(transparent)]
	Storage(#[from] StorageError),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

impl AuthError {
	/// Whether the failure means the surface itself is gone.
	pub fn is_session_closed(&self) -> bool {
		matches!(self, Self::SessionClosed { .. }) || matches!(self, Self::Surface(SurfaceError::Closed))
	}
}
