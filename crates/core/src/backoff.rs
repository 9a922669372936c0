//! Retry backoff policies and the interruptible scheduler wait.

use std::time::Duration;

use authboot_surface::ControlSurface;
use tracing::debug;

use crate::classifier::LoginOutcome;
use crate::error::{AuthError, Result};

/// How often an in-progress backoff delay re-checks surface liveness.
const WAIT_SLICE: Duration = Duration::from_millis(100);

/// Delay growth and retry ceiling for one class of failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
	pub base_delay: Duration,
	pub multiplier: u32,
	pub max_delay: Duration,
	pub max_attempts: u32,
}

impl BackoffPolicy {
	/// Policy for active rate-limiting: back off hard, allow more
	/// tries.
	pub const fn rate_limit() -> Self {
		Self {
			base_delay: Duration::from_secs(5),
			multiplier: 2,
			max_delay: Duration::from_secs(60),
			max_attempts: 5,
		}
	}

	/// Policy for 5xx/no-response flakiness: short delays, fewer
	/// tries.
	pub const fn transient() -> Self {
		Self {
			base_delay: Duration::from_millis(500),
			multiplier: 2,
			max_delay: Duration::from_secs(5),
			max_attempts: 4,
		}
	}

	fn delay_for(&self, attempt_index: u32) -> Duration {
		let factor = self.multiplier.checked_pow(attempt_index).unwrap_or(u32::MAX);
		self.base_delay.saturating_mul(factor).min(self.max_delay)
	}
}

/// Decision for what to do after a classified attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffDecision {
	/// Sleep this long, then retry.
	Wait(Duration),
	/// No further attempts.
	Stop,
}

/// Chooses per-outcome delays and enforces the attempt ceiling.
#[derive(Debug, Clone, Copy)]
pub struct BackoffScheduler {
	rate_limit: BackoffPolicy,
	transient: BackoffPolicy,
}

impl BackoffScheduler {
	pub fn new(rate_limit: BackoffPolicy, transient: BackoffPolicy) -> Self {
		Self { rate_limit, transient }
	}

	/// Computes the wait before attempt `attempt_index + 1`.
	///
	/// Fatal outcomes stop immediately; retryable outcomes stop once
	/// the selected policy's attempt ceiling is reached, guaranteeing
	/// termination.
	pub fn next_delay(&self, attempt_index: u32, outcome: &LoginOutcome) -> BackoffDecision {
		let policy = match outcome {
			LoginOutcome::RateLimited => &self.rate_limit,
			LoginOutcome::TransientServerError(_) | LoginOutcome::NoResponseObserved => &self.transient,
			_ => return BackoffDecision::Stop,
		};
		if attempt_index + 1 >= policy.max_attempts {
			return BackoffDecision::Stop;
		}
		BackoffDecision::Wait(policy.delay_for(attempt_index))
	}

	/// Sleeps for `delay`, re-checking surface liveness once per
	/// slice.
	///
	/// Aborts within one slice of the surface closing instead of
	/// sitting out the full delay on a dead resource.
	pub async fn wait(&self, delay: Duration, surface: &dyn ControlSurface) -> Result<()> {
		let deadline = tokio::time::Instant::now() + delay;
		loop {
			if surface.is_closed() {
				debug!(target = "authboot.backoff", "surface closed mid-backoff; aborting wait");
				return Err(AuthError::SessionClosed { phase: "backoff wait" });
			}
			let now = tokio::time::Instant::now();
			if now >= deadline {
				return Ok(());
			}
			tokio::time::sleep(WAIT_SLICE.min(deadline - now)).await;
		}
	}
}

#[cfg(test)]
mod tests {
	use authboot_surface::fake::FakeSurface;

	use super::*;

	fn scheduler() -> BackoffScheduler {
		BackoffScheduler::new(BackoffPolicy::rate_limit(), BackoffPolicy::transient())
	}

	#[test]
	fn delays_grow_exponentially_up_to_the_cap() {
		let scheduler = scheduler();
		let delays: Vec<BackoffDecision> = (0..4)
			.map(|i| scheduler.next_delay(i, &LoginOutcome::RateLimited))
			.collect();
		assert_eq!(
			delays,
			vec![
				BackoffDecision::Wait(Duration::from_secs(5)),
				BackoffDecision::Wait(Duration::from_secs(10)),
				BackoffDecision::Wait(Duration::from_secs(20)),
				BackoffDecision::Wait(Duration::from_secs(40)),
			]
		);

		let capped = BackoffPolicy {
			base_delay: Duration::from_secs(5),
			multiplier: 2,
			max_delay: Duration::from_secs(8),
			max_attempts: 10,
		};
		let scheduler = BackoffScheduler::new(capped, BackoffPolicy::transient());
		assert_eq!(
			scheduler.next_delay(3, &LoginOutcome::RateLimited),
			BackoffDecision::Wait(Duration::from_secs(8))
		);
	}

	#[test]
	fn outcome_kind_selects_the_policy() {
		let scheduler = scheduler();
		assert_eq!(
			scheduler.next_delay(0, &LoginOutcome::TransientServerError(503)),
			BackoffDecision::Wait(Duration::from_millis(500))
		);
		assert_eq!(
			scheduler.next_delay(0, &LoginOutcome::NoResponseObserved),
			BackoffDecision::Wait(Duration::from_millis(500))
		);
		assert_eq!(
			scheduler.next_delay(0, &LoginOutcome::RateLimited),
			BackoffDecision::Wait(Duration::from_secs(5))
		);
	}

	#[test]
	fn attempt_ceiling_stops_each_policy() {
		let scheduler = scheduler();
		assert_eq!(scheduler.next_delay(4, &LoginOutcome::RateLimited), BackoffDecision::Stop);
		assert_eq!(
			scheduler.next_delay(3, &LoginOutcome::TransientServerError(500)),
			BackoffDecision::Stop
		);
	}

	#[test]
	fn fatal_outcomes_stop_immediately() {
		let scheduler = scheduler();
		let fatal = LoginOutcome::FatalClientError {
			status: 401,
			message: "invalid credentials".to_string(),
		};
		assert_eq!(scheduler.next_delay(0, &fatal), BackoffDecision::Stop);
		assert_eq!(scheduler.next_delay(0, &LoginOutcome::SessionClosed), BackoffDecision::Stop);
		assert_eq!(scheduler.next_delay(0, &LoginOutcome::Success), BackoffDecision::Stop);
	}

	#[test]
	fn huge_attempt_indices_saturate_instead_of_overflowing() {
		let policy = BackoffPolicy {
			base_delay: Duration::from_secs(1),
			multiplier: 2,
			max_delay: Duration::from_secs(30),
			max_attempts: u32::MAX,
		};
		let scheduler = BackoffScheduler::new(policy, BackoffPolicy::transient());
		assert_eq!(
			scheduler.next_delay(40, &LoginOutcome::RateLimited),
			BackoffDecision::Wait(Duration::from_secs(30))
		);
	}

	#[tokio::test(start_paused = true)]
	async fn wait_completes_the_full_delay_on_a_live_surface() {
		let surface = FakeSurface::builder().build();
		let start = tokio::time::Instant::now();
		scheduler().wait(Duration::from_secs(5), &surface).await.unwrap();
		assert!(start.elapsed() >= Duration::from_secs(5));
	}

	#[tokio::test(start_paused = true)]
	async fn wait_aborts_within_one_slice_of_surface_closure() {
		let surface = FakeSurface::builder().build();
		let closer = surface.clone();
		tokio::spawn(async move {
			tokio::time::sleep(Duration::from_secs(1)).await;
			closer.close();
		});

		let start = tokio::time::Instant::now();
		let err = scheduler().wait(Duration::from_secs(60), &surface).await.unwrap_err();
		assert!(err.is_session_closed());
		assert!(start.elapsed() < Duration::from_secs(2));
	}
}
