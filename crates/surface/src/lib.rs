//! Browser control-surface contracts for the login orchestrator.
//!
//! This crate defines the seam between the orchestration core and the
//! browser-automation layer: navigation/fill/click primitives, scoped
//! response observation, and opaque storage snapshots. A scripted
//! in-memory [`fake::FakeSurface`] stands in for a real browser in
//! tests.

/// Scripted in-memory surface for tests.
pub mod fake;
/// Observed-response types and scoped response watches.
pub mod response;
/// Session marker and storage snapshot types.
pub mod storage;
/// The `ControlSurface` trait and surface error type.
pub mod surface;

pub use response::{ObservedResponse, ResponseWatch};
pub use storage::{SESSION_STORAGE_KEY, SessionMarker, StorageEntry, StorageError, StorageSnapshot};
pub use surface::{ControlSurface, SurfaceError};
