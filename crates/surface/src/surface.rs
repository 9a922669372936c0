//! The control-surface seam between orchestration and browser
//! automation.

use std::time::Duration;

use async_trait::async_trait;

use crate::response::ResponseWatch;
use crate::storage::StorageSnapshot;

/// Errors surfaced by control-surface primitives.
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
	/// The underlying browser surface is gone; nothing on it can
	/// succeed anymore.
	#[error("browser surface is closed")]
	Closed,
	#[error("timed out after {ms}ms waiting for {condition}")]
	Timeout { ms: u64, condition: String },
	#[error("automation failure: {0}")]
	Automation(String),
}

impl SurfaceError {
	pub fn is_closed(&self) -> bool {
		matches!(self, Self::Closed)
	}

	pub fn is_timeout(&self) -> bool {
		matches!(self, Self::Timeout { .. })
	}
}

/// Navigation, DOM, storage, and response-observation primitives
/// provided by the browser-automation layer.
///
/// One orchestration run owns a surface exclusively for its duration.
/// The trait is object safe so orchestration code can work against
/// `Arc<dyn ControlSurface>` regardless of the backing automation
/// stack.
#[async_trait]
pub trait ControlSurface: Send + Sync {
	/// Navigates to `url`.
	async fn goto(&self, url: &str) -> Result<(), SurfaceError>;

	/// Waits until `selector` is queryable, bounded by `timeout`.
	async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), SurfaceError>;

	/// Fills the element at `selector` with `value`.
	async fn fill(&self, selector: &str, value: &str) -> Result<(), SurfaceError>;

	/// Clicks the element at `selector`.
	async fn click(&self, selector: &str) -> Result<(), SurfaceError>;

	/// Removes all client-side session state.
	async fn clear_session_storage(&self) -> Result<(), SurfaceError>;

	/// Reads a raw client-side storage value.
	async fn read_storage(&self, key: &str) -> Result<Option<String>, SurfaceError>;

	/// Applies a previously captured snapshot to this surface.
	async fn apply_snapshot(&self, snapshot: &StorageSnapshot) -> Result<(), SurfaceError>;

	/// Captures the surface's client-side storage as an opaque
	/// snapshot.
	async fn capture_snapshot(&self) -> Result<StorageSnapshot, SurfaceError>;

	/// Current navigation target, when one is known.
	async fn current_url(&self) -> Option<String>;

	/// Text of a visible error toast or alert, when one is showing.
	async fn visible_alert_text(&self) -> Option<String>;

	/// Whether the surface has become unusable.
	fn is_closed(&self) -> bool;

	/// Registers a scoped listener for the next response whose URL
	/// matches `endpoint_pattern`. The listener is deregistered when
	/// the returned watch drops.
	fn watch_response(&self, endpoint_pattern: &str) -> ResponseWatch;
}
