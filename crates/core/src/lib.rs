//! Login orchestration and session caching for browser-driven test
//! runs.
//!
//! Given credentials and a [`ControlSurface`], this crate reliably
//! produces a session the target application recognizes as logged in,
//! absorbing flaky networks, transient server errors, and active
//! rate-limiting so individual tests never reimplement retry logic.
//!
//! [`ControlSurface`]: authboot_surface::ControlSurface

/// Retry/backoff policies and the interruptible scheduler wait.
pub mod backoff;
/// Role-keyed persisted session snapshots and warm reuse.
pub mod cache;
/// Pure classification of login responses into outcomes.
pub mod classifier;
/// Login credentials with secret redaction.
pub mod credentials;
/// Crate error type and result alias.
pub mod error;
/// Live authenticated-session handle types.
pub mod handle;
/// State machine driving login attempts to a terminal outcome.
pub mod orchestrator;
/// Bounded polling shared by readiness checks and warm reuse.
pub mod poll;
/// Post-login session readiness confirmation.
pub mod readiness;

pub use backoff::{BackoffDecision, BackoffPolicy, BackoffScheduler};
pub use cache::SessionCache;
pub use classifier::{LoginOutcome, classify};
pub use credentials::Credentials;
pub use error::{AuthError, Result};
pub use handle::{SessionHandle, SessionSource};
pub use orchestrator::{LoginAttempt, LoginOrchestrator, OrchestratorConfig};
pub use readiness::SessionReadinessPoller;
