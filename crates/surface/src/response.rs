//! Response observation types shared between the surface and the
//! orchestration core.

use std::time::Duration;

use serde_json::Value as JsonValue;
use tokio::sync::oneshot;

/// An HTTP-like response observed for a watched endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedResponse {
	pub status: u16,
	pub body: Option<JsonValue>,
}

/// Scoped subscription to the next response matching an endpoint
/// pattern.
///
/// The listener registered by [`ControlSurface::watch_response`] is
/// deregistered when the watch drops, on every exit path, so a stale
/// watch from one attempt can never swallow a later attempt's
/// response.
///
/// [`ControlSurface::watch_response`]: crate::surface::ControlSurface::watch_response
pub struct ResponseWatch {
	rx: oneshot::Receiver<ObservedResponse>,
	_guard: WatchGuard,
}

impl ResponseWatch {
	/// Pairs a delivery channel with a deregistration hook.
	pub fn new(rx: oneshot::Receiver<ObservedResponse>, unregister: impl FnOnce() + Send + 'static) -> Self {
		Self {
			rx,
			_guard: WatchGuard {
				unregister: Some(Box::new(unregister)),
			},
		}
	}

	/// Waits for the watched response until `window` elapses.
	///
	/// Returns `None` when the window closes first or the notifying
	/// side went away without delivering a response.
	pub async fn recv(self, window: Duration) -> Option<ObservedResponse> {
		let Self { rx, _guard } = self;
		match tokio::time::timeout(window, rx).await {
			Ok(Ok(response)) => Some(response),
			Ok(Err(_)) | Err(_) => None,
		}
	}
}

struct WatchGuard {
	unregister: Option<Box<dyn FnOnce() + Send>>,
}

impl Drop for WatchGuard {
	fn drop(&mut self) {
		if let Some(unregister) = self.unregister.take() {
			unregister();
		}
	}
}
