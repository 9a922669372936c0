//! Post-login confirmation that the session marker materialized.
//!
//! A 200 from the login endpoint and the client-side marker are
//! eventually consistent; the poller bridges that gap and keeps the
//! orchestrator from reporting a success the application would not
//! recognize.

use std::time::Duration;

use authboot_surface::{ControlSurface, SESSION_STORAGE_KEY, SessionMarker};
use tracing::{debug, warn};

use crate::error::{AuthError, Result};
use crate::poll::poll_until;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

enum Signal {
	Confirmed,
	Closed,
}

/// Confirms that an accepted login actually produced a client-side
/// session marker before the run may report success.
#[derive(Debug, Clone, Copy)]
pub struct SessionReadinessPoller {
	interval: Duration,
}

impl Default for SessionReadinessPoller {
	fn default() -> Self {
		Self {
			interval: DEFAULT_POLL_INTERVAL,
		}
	}
}

impl SessionReadinessPoller {
	pub fn new(interval: Duration) -> Self {
		Self { interval }
	}

	/// Waits until a valid marker is observable, bounded by
	/// `deadline`.
	///
	/// Navigation away from `login_url` is only a secondary signal; it
	/// never confirms success on its own because it can race the
	/// marker write. On deadline exhaustion one diagnostic pass runs
	/// (visible alert text, else the current navigation target) and
	/// its finding rides along in the failure.
	pub async fn await_session(&self, surface: &dyn ControlSurface, login_url: &str, deadline: Duration) -> Result<()> {
		let signal = poll_until(self.interval, deadline, move || self.probe(surface, login_url)).await;
		match signal {
			Some(Signal::Confirmed) => Ok(()),
			Some(Signal::Closed) => Err(AuthError::SessionClosed { phase: "readiness poll" }),
			None => Err(self.timeout_failure(surface, deadline).await),
		}
	}

	async fn probe(&self, surface: &dyn ControlSurface, login_url: &str) -> Option<Signal> {
		if surface.is_closed() {
			return Some(Signal::Closed);
		}
		let raw = match surface.read_storage(SESSION_STORAGE_KEY).await {
			Ok(raw) => raw,
			Err(err) if err.is_closed() => return Some(Signal::Closed),
			Err(err) => {
				debug!(target = "authboot.readiness", error = %err, "marker read failed; re-polling");
				None
			}
		};
		if let Some(raw) = raw {
			if SessionMarker::decode(&raw).is_some() {
				return Some(Signal::Confirmed);
			}
		}
		if let Some(url) = surface.current_url().await {
			if !url.starts_with(login_url) {
				debug!(
					target = "authboot.readiness",
					%url,
					"navigated off the login surface; marker not yet present"
				);
			}
		}
		None
	}

	async fn timeout_failure(&self, surface: &dyn ControlSurface, deadline: Duration) -> AuthError {
		let detail = match surface.visible_alert_text().await {
			Some(text) => format!("login surface shows: {text}"),
			None => {
				let url = surface.current_url().await.unwrap_or_else(|| "unknown".to_string());
				format!("no session marker observed; current page: {url}")
			}
		};
		warn!(target = "authboot.readiness", %detail, "session readiness deadline exhausted");
		AuthError::ReadinessTimeout {
			deadline_ms: deadline.as_millis() as u64,
			detail,
		}
	}
}
