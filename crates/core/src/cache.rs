//! Role-keyed persistence and warm reuse of session snapshots.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use authboot_surface::{ControlSurface, SESSION_STORAGE_KEY, SessionMarker, StorageSnapshot};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::handle::{SessionHandle, SessionSource};
use crate::poll::poll_until;

const REUSE_POLL_INTERVAL: Duration = Duration::from_millis(250);
const REUSE_DEADLINE: Duration = Duration::from_secs(3);

/// Stores one storage snapshot per actor role so a full login is paid
/// at most once per role per cache lifetime.
///
/// The snapshot is only written after a confirmed login and only read
/// at the start of a run, so atomic file replacement is the only
/// locking discipline needed.
#[derive(Debug, Clone)]
pub struct SessionCache {
	dir: PathBuf,
	neutral_url: String,
}

impl SessionCache {
	/// Creates a cache rooted at `dir`. Warm-reuse validity probes
	/// navigate to `neutral_url` first so login-page redirects cannot
	/// skew the check.
	pub fn new(dir: impl Into<PathBuf>, neutral_url: impl Into<String>) -> Self {
		Self {
			dir: dir.into(),
			neutral_url: neutral_url.into(),
		}
	}

	fn snapshot_path(&self, role: &str) -> PathBuf {
		self.dir.join(format!("{}.json", sanitize_role(role)))
	}

	/// Loads the persisted snapshot for `role`; absent is not an
	/// error.
	pub fn load(&self, role: &str) -> Result<Option<StorageSnapshot>> {
		let path = self.snapshot_path(role);
		if !path.exists() {
			return Ok(None);
		}
		Ok(Some(StorageSnapshot::from_file(&path)?))
	}

	/// Persists the post-login snapshot for `role`.
	///
	/// Written to a temp file and renamed into place so a reader never
	/// observes a torn snapshot.
	pub fn persist(&self, role: &str, snapshot: &StorageSnapshot) -> Result<()> {
		std::fs::create_dir_all(&self.dir)?;
		let path = self.snapshot_path(role);
		let tmp = path.with_extension("json.tmp");
		snapshot.to_file(&tmp)?;
		std::fs::rename(&tmp, &path)?;
		debug!(target = "authboot.cache", role, path = %path.display(), "session snapshot persisted");
		Ok(())
	}

	/// Removes the snapshot for `role`, reporting whether one existed.
	pub fn invalidate(&self, role: &str) -> Result<bool> {
		match std::fs::remove_file(self.snapshot_path(role)) {
			Ok(()) => Ok(true),
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
			Err(err) => Err(err.into()),
		}
	}

	/// Applies a cached snapshot to `surface` and hands back a session
	/// handle if the marker is still recognized.
	///
	/// Every failure path answers `None` (dropping stale snapshots
	/// along the way) so the caller falls back to a full login instead
	/// of propagating an error.
	pub async fn try_warm_reuse(&self, role: &str, surface: Arc<dyn ControlSurface>) -> Option<SessionHandle> {
		let snapshot = match self.load(role) {
			Ok(Some(snapshot)) => snapshot,
			Ok(None) => return None,
			Err(err) => {
				debug!(target = "authboot.cache", role, error = %err, "snapshot unreadable; ignoring");
				return None;
			}
		};

		if snapshot.session_marker().is_none() {
			warn!(target = "authboot.cache", role, "cached snapshot lacks a valid marker; dropping it");
			let _ = self.invalidate(role);
			return None;
		}

		debug!(target = "authboot.cache", role, "attempting warm reuse of cached session");
		match self.apply_and_verify(surface.as_ref(), &snapshot).await {
			Ok(()) => {
				info!(target = "authboot.cache", role, "reusing cached session");
				Some(SessionHandle::new(surface, role, SessionSource::WarmReuse))
			}
			Err(ReuseFailure::Stale(reason)) => {
				warn!(target = "authboot.cache", role, %reason, "warm reuse failed; dropping cached snapshot");
				let _ = self.invalidate(role);
				None
			}
			Err(ReuseFailure::SurfaceUnusable(reason)) => {
				// The snapshot may still be fine; only the surface died.
				debug!(target = "authboot.cache", role, %reason, "surface unusable; skipping warm reuse");
				None
			}
		}
	}

	async fn apply_and_verify(&self, surface: &dyn ControlSurface, snapshot: &StorageSnapshot) -> std::result::Result<(), ReuseFailure> {
		surface
			.apply_snapshot(snapshot)
			.await
			.map_err(|err| ReuseFailure::SurfaceUnusable(err.to_string()))?;
		surface
			.goto(&self.neutral_url)
			.await
			.map_err(|err| ReuseFailure::SurfaceUnusable(err.to_string()))?;

		let signal = poll_until(REUSE_POLL_INTERVAL, REUSE_DEADLINE, move || async move {
			if surface.is_closed() {
				return Some(VerifySignal::Closed);
			}
			match surface.read_storage(SESSION_STORAGE_KEY).await {
				Ok(Some(raw)) => SessionMarker::decode(&raw).map(|_| VerifySignal::Confirmed),
				Err(err) if err.is_closed() => Some(VerifySignal::Closed),
				_ => None,
			}
		})
		.await;

		match signal {
			Some(VerifySignal::Confirmed) => Ok(()),
			Some(VerifySignal::Closed) => Err(ReuseFailure::SurfaceUnusable(
				"surface closed during session re-check".to_string(),
			)),
			None => Err(ReuseFailure::Stale("marker no longer observable after re-check".to_string())),
		}
	}
}

enum VerifySignal {
	Confirmed,
	Closed,
}

enum ReuseFailure {
	/// Verification failed; the cached snapshot is no longer good.
	Stale(String),
	/// The surface died before verification could finish.
	SurfaceUnusable(String),
}

fn sanitize_role(role: &str) -> String {
	role.chars()
		.map(|c| {
			if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
				c
			} else {
				'_'
			}
		})
		.collect()
}
