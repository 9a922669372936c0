//! State machine driving login attempts to a terminal outcome.
//!
//! Classification and retry decisions are kept apart from submission
//! mechanics so the same retry policy governs "server never answered"
//! and "server answered 5xx/429", while 4xx application errors are
//! never retried.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use authboot_surface::{ControlSurface, SurfaceError};
use tracing::{debug, info, warn};

use crate::backoff::{BackoffDecision, BackoffPolicy, BackoffScheduler};
use crate::cache::SessionCache;
use crate::classifier::{LoginOutcome, classify};
use crate::credentials::Credentials;
use crate::error::{AuthError, Result};
use crate::handle::{SessionHandle, SessionSource};
use crate::readiness::SessionReadinessPoller;

/// Tunables for one orchestration run; constant for its lifetime.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
	/// URL of the login surface.
	pub login_url: String,
	/// Substring matched against response URLs to find the login
	/// call.
	pub endpoint_pattern: String,
	/// Selector of the identity input.
	pub identity_selector: String,
	/// Selector of the secret input.
	pub secret_selector: String,
	/// Selector of the submit control.
	pub submit_selector: String,
	/// Bound on waiting for the credential fields to become
	/// queryable.
	pub form_timeout: Duration,
	/// Bound on waiting for the login endpoint to answer.
	pub response_window: Duration,
	/// Bound on post-accept readiness confirmation.
	pub readiness_deadline: Duration,
	/// Backoff policy applied to rate-limit outcomes.
	pub rate_limit_policy: BackoffPolicy,
	/// Backoff policy applied to transient outcomes.
	pub transient_policy: BackoffPolicy,
}

impl OrchestratorConfig {
	/// Defaults for a typical admin login form.
	pub fn new(login_url: impl Into<String>, endpoint_pattern: impl Into<String>) -> Self {
		Self {
			login_url: login_url.into(),
			endpoint_pattern: endpoint_pattern.into(),
			identity_selector: "input[name=email]".to_string(),
			secret_selector: "input[name=password]".to_string(),
			submit_selector: "button[type=submit]".to_string(),
			form_timeout: Duration::from_secs(10),
			response_window: Duration::from_secs(15),
			readiness_deadline: Duration::from_secs(10),
			rate_limit_policy: BackoffPolicy::rate_limit(),
			transient_policy: BackoffPolicy::transient(),
		}
	}

	/// Sets the form field and submit selectors.
	pub fn with_selectors(mut self, identity: &str, secret: &str, submit: &str) -> Self {
		self.identity_selector = identity.to_string();
		self.secret_selector = secret.to_string();
		self.submit_selector = submit.to_string();
		self
	}

	/// Sets the form-visibility timeout.
	pub fn with_form_timeout(mut self, timeout: Duration) -> Self {
		self.form_timeout = timeout;
		self
	}

	/// Sets the response-wait window per attempt.
	pub fn with_response_window(mut self, window: Duration) -> Self {
		self.response_window = window;
		self
	}

	/// Sets the post-accept readiness deadline.
	pub fn with_readiness_deadline(mut self, deadline: Duration) -> Self {
		self.readiness_deadline = deadline;
		self
	}

	/// Sets both backoff policies.
	pub fn with_policies(mut self, rate_limit: BackoffPolicy, transient: BackoffPolicy) -> Self {
		self.rate_limit_policy = rate_limit;
		self.transient_policy = transient;
		self
	}
}

/// Record of one attempt within a run, immutable once classified.
#[derive(Debug, Clone)]
pub struct LoginAttempt {
	pub attempt_index: u32,
	pub started_at: SystemTime,
	pub outcome: LoginOutcome,
}

/// Orchestration phases, in transition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	Idle,
	Navigating,
	FormReady,
	Submitting,
	AwaitingResponse,
	Classifying,
	Retrying,
	PollingReadiness,
	Succeeded,
	Failed,
}

/// Observation that moves the state machine forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
	NavigationStarted,
	FormVisible,
	FormTimedOut,
	FormInteractionFailed,
	SubmitIssued,
	ResponseWindowOpened,
	ResponseWindowSettled,
	OutcomeRetryable,
	OutcomeFatal,
	OutcomeAccepted,
	BackoffElapsed,
	BackoffStopped,
	ReadinessConfirmed,
	ReadinessFailed,
	SurfaceLost,
}

/// Pure transition table; the driver performs the side effects.
///
/// Unexpected phase/event pairs collapse to `Failed` rather than
/// wedging the machine.
pub fn advance(phase: Phase, event: PhaseEvent) -> Phase {
	use Phase::*;
	use PhaseEvent::*;
	match (phase, event) {
		(_, SurfaceLost) => Failed,
		(Idle | Retrying, NavigationStarted) => Navigating,
		(Navigating, FormVisible) => FormReady,
		(Navigating, FormTimedOut) => Classifying,
		(FormReady, FormInteractionFailed) => Classifying,
		(FormReady, SubmitIssued) => Submitting,
		(Submitting, ResponseWindowOpened) => AwaitingResponse,
		(AwaitingResponse, ResponseWindowSettled) => Classifying,
		(Classifying, OutcomeRetryable) => Retrying,
		(Classifying, OutcomeFatal) => Failed,
		(Classifying, OutcomeAccepted) => PollingReadiness,
		(Retrying, BackoffElapsed) => Retrying,
		(Retrying, BackoffStopped) => Failed,
		(PollingReadiness, ReadinessConfirmed) => Succeeded,
		(PollingReadiness, ReadinessFailed) => Failed,
		_ => Failed,
	}
}

/// Drives one or more login attempts to a terminal outcome.
///
/// At most one run may be active per surface at a time; within a run,
/// attempts are strictly sequential and totally ordered by attempt
/// index.
pub struct LoginOrchestrator {
	config: OrchestratorConfig,
	scheduler: BackoffScheduler,
	readiness: SessionReadinessPoller,
}

impl LoginOrchestrator {
	pub fn new(config: OrchestratorConfig) -> Self {
		let scheduler = BackoffScheduler::new(config.rate_limit_policy, config.transient_policy);
		Self {
			config,
			scheduler,
			readiness: SessionReadinessPoller::default(),
		}
	}

	pub fn config(&self) -> &OrchestratorConfig {
		&self.config
	}

	/// Produces an authenticated session, preferring warm reuse and
	/// falling back to a fresh login whose snapshot is persisted for
	/// the next caller.
	pub async fn acquire(
		&self,
		surface: Arc<dyn ControlSurface>,
		credentials: &Credentials,
		role: &str,
		cache: &SessionCache,
	) -> Result<SessionHandle> {
		if let Some(handle) = cache.try_warm_reuse(role, Arc::clone(&surface)).await {
			return Ok(handle);
		}
		let handle = self.login(surface, credentials, role).await?;
		let snapshot = handle.surface().capture_snapshot().await?;
		cache.persist(role, &snapshot)?;
		Ok(handle)
	}

	/// Runs the login state machine until it either holds a confirmed
	/// session or a terminal failure.
	pub async fn login(&self, surface: Arc<dyn ControlSurface>, credentials: &Credentials, role: &str) -> Result<SessionHandle> {
		let mut phase = Phase::Idle;
		let mut attempts: Vec<LoginAttempt> = Vec::new();
		info!(
			target = "authboot.login",
			role,
			identity = %credentials.identity_hint(),
			url = %self.config.login_url,
			"starting login orchestration"
		);

		loop {
			let attempt_index = attempts.len() as u32;
			let started_at = SystemTime::now();
			let outcome = self.run_attempt(surface.as_ref(), credentials, attempt_index, &mut phase).await;
			debug!(target = "authboot.login", attempt_index, outcome = %outcome, "attempt classified");
			attempts.push(LoginAttempt {
				attempt_index,
				started_at,
				outcome: outcome.clone(),
			});

			match outcome {
				LoginOutcome::Success => {
					self.step(&mut phase, PhaseEvent::OutcomeAccepted);
					return self.confirm(surface, role, &mut phase, attempts.len()).await;
				}
				LoginOutcome::SessionClosed => {
					self.step(&mut phase, PhaseEvent::SurfaceLost);
					return Err(AuthError::SessionClosed { phase: "login attempt" });
				}
				LoginOutcome::FatalClientError { status, message } => {
					self.step(&mut phase, PhaseEvent::OutcomeFatal);
					warn!(target = "authboot.login", status, %message, "login rejected; not retrying");
					return Err(AuthError::LoginRejected {
						status,
						message,
						attempts: attempts.len() as u32,
					});
				}
				outcome @ (LoginOutcome::RateLimited
				| LoginOutcome::TransientServerError(_)
				| LoginOutcome::NoResponseObserved) => {
					self.step(&mut phase, PhaseEvent::OutcomeRetryable);
					match self.scheduler.next_delay(attempt_index, &outcome) {
						BackoffDecision::Wait(delay) => {
							debug!(
								target = "authboot.login",
								attempt_index,
								delay_ms = delay.as_millis() as u64,
								"backing off before retry"
							);
							if let Err(err) = self.scheduler.wait(delay, surface.as_ref()).await {
								self.step(&mut phase, PhaseEvent::SurfaceLost);
								return Err(err);
							}
							self.step(&mut phase, PhaseEvent::BackoffElapsed);
						}
						BackoffDecision::Stop => {
							self.step(&mut phase, PhaseEvent::BackoffStopped);
							return Err(self.exhausted(surface.as_ref(), &attempts).await);
						}
					}
				}
			}
		}
	}

	/// One navigate/fill/submit/classify cycle. Never errors; every
	/// failure folds into an outcome for the retry decision.
	async fn run_attempt(
		&self,
		surface: &dyn ControlSurface,
		credentials: &Credentials,
		attempt_index: u32,
		phase: &mut Phase,
	) -> LoginOutcome {
		self.step(phase, PhaseEvent::NavigationStarted);
		if let Err(err) = surface.goto(&self.config.login_url).await {
			debug!(target = "authboot.login", attempt_index, error = %err, "navigation to login surface failed");
			return LoginOutcome::SessionClosed;
		}

		match surface
			.wait_for_selector(&self.config.identity_selector, self.config.form_timeout)
			.await
		{
			Ok(()) => self.step(phase, PhaseEvent::FormVisible),
			Err(err) if err.is_timeout() => {
				self.step(phase, PhaseEvent::FormTimedOut);
				debug!(target = "authboot.login", attempt_index, error = %err, "login form never became queryable");
				return LoginOutcome::NoResponseObserved;
			}
			Err(_) => return LoginOutcome::SessionClosed,
		}

		// A partial prior attempt must not leak into this one.
		if let Err(err) = self.prepare_form(surface, credentials).await {
			if err.is_closed() {
				return LoginOutcome::SessionClosed;
			}
			self.step(phase, PhaseEvent::FormInteractionFailed);
			debug!(target = "authboot.login", attempt_index, error = %err, "form preparation failed");
			return LoginOutcome::NoResponseObserved;
		}
		self.step(phase, PhaseEvent::SubmitIssued);

		let watch = surface.watch_response(&self.config.endpoint_pattern);
		self.step(phase, PhaseEvent::ResponseWindowOpened);

		// A wedged click promise is bounded by the same window as the
		// response wait; an expired ack counts as a failed ack.
		let submit = tokio::time::timeout(self.config.response_window, surface.click(&self.config.submit_selector));
		let observe = watch.recv(self.config.response_window);
		let (ack, observed) = tokio::join!(submit, observe);
		let ack = ack.unwrap_or_else(|_| {
			Err(SurfaceError::Timeout {
				ms: self.config.response_window.as_millis() as u64,
				condition: "submit acknowledgement".to_string(),
			})
		});
		self.step(phase, PhaseEvent::ResponseWindowSettled);

		if let Err(err) = ack {
			if err.is_closed() && observed.is_none() {
				return LoginOutcome::SessionClosed;
			}
			// An observed response outranks a late click failure.
			debug!(target = "authboot.login", attempt_index, error = %err, "submit acknowledgement failed");
		}
		if observed.is_none() && surface.is_closed() {
			return LoginOutcome::SessionClosed;
		}

		classify(observed.as_ref())
	}

	async fn prepare_form(&self, surface: &dyn ControlSurface, credentials: &Credentials) -> std::result::Result<(), SurfaceError> {
		surface.clear_session_storage().await?;
		surface.fill(&self.config.identity_selector, credentials.identity()).await?;
		surface.fill(&self.config.secret_selector, credentials.secret()).await?;
		Ok(())
	}

	async fn confirm(&self, surface: Arc<dyn ControlSurface>, role: &str, phase: &mut Phase, attempts: usize) -> Result<SessionHandle> {
		match self
			.readiness
			.await_session(surface.as_ref(), &self.config.login_url, self.config.readiness_deadline)
			.await
		{
			Ok(()) => {
				self.step(phase, PhaseEvent::ReadinessConfirmed);
				info!(target = "authboot.login", role, attempts, "login confirmed");
				Ok(SessionHandle::new(surface, role, SessionSource::FreshLogin))
			}
			Err(err) => {
				self.step(phase, PhaseEvent::ReadinessFailed);
				Err(err)
			}
		}
	}

	async fn exhausted(&self, surface: &dyn ControlSurface, attempts: &[LoginAttempt]) -> AuthError {
		let last_outcome = attempts
			.last()
			.map(|attempt| attempt.outcome.to_string())
			.unwrap_or_else(|| "none".to_string());
		let current_url = surface.current_url().await.unwrap_or_else(|| "unknown".to_string());
		warn!(
			target = "authboot.login",
			attempts = attempts.len(),
			%last_outcome,
			%current_url,
			"login attempts exhausted"
		);
		AuthError::AttemptsExhausted {
			attempts: attempts.len() as u32,
			last_outcome,
			current_url,
		}
	}

	fn step(&self, phase: &mut Phase, event: PhaseEvent) {
		let next = advance(*phase, event);
		debug!(target = "authboot.login", from = ?*phase, event = ?event, to = ?next, "phase transition");
		*phase = next;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn happy_path_walks_the_documented_phases() {
		let mut phase = Phase::Idle;
		let path = [
			(PhaseEvent::NavigationStarted, Phase::Navigating),
			(PhaseEvent::FormVisible, Phase::FormReady),
			(PhaseEvent::SubmitIssued, Phase::Submitting),
			(PhaseEvent::ResponseWindowOpened, Phase::AwaitingResponse),
			(PhaseEvent::ResponseWindowSettled, Phase::Classifying),
			(PhaseEvent::OutcomeAccepted, Phase::PollingReadiness),
			(PhaseEvent::ReadinessConfirmed, Phase::Succeeded),
		];
		for (event, expected) in path {
			phase = advance(phase, event);
			assert_eq!(phase, expected);
		}
	}

	#[test]
	fn retry_loops_back_through_navigating() {
		let phase = advance(Phase::Classifying, PhaseEvent::OutcomeRetryable);
		assert_eq!(phase, Phase::Retrying);
		assert_eq!(advance(phase, PhaseEvent::BackoffElapsed), Phase::Retrying);
		assert_eq!(advance(phase, PhaseEvent::NavigationStarted), Phase::Navigating);
		assert_eq!(advance(phase, PhaseEvent::BackoffStopped), Phase::Failed);
	}

	#[test]
	fn form_timeout_goes_straight_to_classifying() {
		assert_eq!(advance(Phase::Navigating, PhaseEvent::FormTimedOut), Phase::Classifying);
	}

	#[test]
	fn form_interaction_failure_routes_through_classifying() {
		let phase = advance(Phase::FormReady, PhaseEvent::FormInteractionFailed);
		assert_eq!(phase, Phase::Classifying);
		assert_eq!(advance(phase, PhaseEvent::OutcomeRetryable), Phase::Retrying);
	}

	#[test]
	fn surface_loss_fails_from_any_phase() {
		for phase in [
			Phase::Idle,
			Phase::Navigating,
			Phase::FormReady,
			Phase::Submitting,
			Phase::AwaitingResponse,
			Phase::Classifying,
			Phase::Retrying,
			Phase::PollingReadiness,
		] {
			assert_eq!(advance(phase, PhaseEvent::SurfaceLost), Phase::Failed);
		}
	}

	#[test]
	fn fatal_and_readiness_failures_terminate() {
		assert_eq!(advance(Phase::Classifying, PhaseEvent::OutcomeFatal), Phase::Failed);
		assert_eq!(advance(Phase::PollingReadiness, PhaseEvent::ReadinessFailed), Phase::Failed);
	}

	#[test]
	fn unexpected_pairs_collapse_to_failed() {
		assert_eq!(advance(Phase::Idle, PhaseEvent::ReadinessConfirmed), Phase::Failed);
		assert_eq!(advance(Phase::Succeeded, PhaseEvent::NavigationStarted), Phase::Failed);
	}

	#[test]
	fn config_builders_apply() {
		let config = OrchestratorConfig::new("https://a.example.com/login", "/api/login")
			.with_selectors("#user", "#pass", "#go")
			.with_form_timeout(Duration::from_secs(3))
			.with_response_window(Duration::from_secs(4))
			.with_readiness_deadline(Duration::from_secs(5));
		assert_eq!(config.identity_selector, "#user");
		assert_eq!(config.secret_selector, "#pass");
		assert_eq!(config.submit_selector, "#go");
		assert_eq!(config.form_timeout, Duration::from_secs(3));
		assert_eq!(config.response_window, Duration::from_secs(4));
		assert_eq!(config.readiness_deadline, Duration::from_secs(5));
	}
}
