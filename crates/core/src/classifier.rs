//! Pure classification of login responses into outcomes.

use std::fmt;

use authboot_surface::ObservedResponse;
use serde_json::Value as JsonValue;

/// Verdict for one login attempt's observed response.
///
/// Derived purely from the response (or its absence); never mutated
/// after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
	/// Server accepted the login; still pending readiness
	/// confirmation.
	Success,
	/// Server is actively rate-limiting (429).
	RateLimited,
	/// Server-side failure expected to resolve on its own (5xx).
	TransientServerError(u16),
	/// Application-level rejection that retrying cannot change.
	FatalClientError { status: u16, message: String },
	/// No response matched the login endpoint within the wait window.
	NoResponseObserved,
	/// The surface became unusable before a verdict was possible.
	SessionClosed,
}

impl LoginOutcome {
	/// Whether the scheduler may retry this outcome.
	pub fn is_retryable(&self) -> bool {
		matches!(
			self,
			Self::RateLimited | Self::TransientServerError(_) | Self::NoResponseObserved
		)
	}

	/// Last observed HTTP status, when there was one.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::RateLimited => Some(429),
			Self::TransientServerError(status) => Some(*status),
			Self::FatalClientError { status, .. } => Some(*status),
			Self::Success | Self::NoResponseObserved | Self::SessionClosed => None,
		}
	}
}

impl fmt::Display for LoginOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Success => write!(f, "success"),
			Self::RateLimited => write!(f, "rate limited (status 429)"),
			Self::TransientServerError(status) => write!(f, "transient server error (status {status})"),
			Self::FatalClientError { status, message } => write!(f, "rejected (status {status}): {message}"),
			Self::NoResponseObserved => write!(f, "no response observed"),
			Self::SessionClosed => write!(f, "session closed"),
		}
	}
}

/// Maps an observed response, or its absence, to an outcome.
///
/// Pure over its inputs. `Success` here only means the server
/// accepted the request; the readiness poller decides whether the run
/// may actually report success.
pub fn classify(response: Option<&ObservedResponse>) -> LoginOutcome {
	let Some(response) = response else {
		return LoginOutcome::NoResponseObserved;
	};
	match response.status {
		200 | 201 => LoginOutcome::Success,
		429 => LoginOutcome::RateLimited,
		status @ 500..600 => LoginOutcome::TransientServerError(status),
		status => LoginOutcome::FatalClientError {
			status,
			message: error_message(status, response.body.as_ref()),
		},
	}
}

fn error_message(status: u16, body: Option<&JsonValue>) -> String {
	body.and_then(|body| body.get("error"))
		.and_then(JsonValue::as_str)
		.map(str::to_string)
		.unwrap_or_else(|| format!("login request failed with status {status}"))
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn response(status: u16, body: Option<JsonValue>) -> ObservedResponse {
		ObservedResponse { status, body }
	}

	#[test]
	fn accepted_statuses_classify_as_success() {
		assert_eq!(classify(Some(&response(200, None))), LoginOutcome::Success);
		assert_eq!(classify(Some(&response(201, None))), LoginOutcome::Success);
	}

	#[test]
	fn rate_limit_and_server_errors_are_retryable() {
		assert_eq!(classify(Some(&response(429, None))), LoginOutcome::RateLimited);
		assert_eq!(
			classify(Some(&response(500, None))),
			LoginOutcome::TransientServerError(500)
		);
		assert_eq!(
			classify(Some(&response(599, None))),
			LoginOutcome::TransientServerError(599)
		);
		assert!(classify(Some(&response(503, None))).is_retryable());
	}

	#[test]
	fn client_errors_extract_the_structured_message() {
		let outcome = classify(Some(&response(401, Some(json!({ "error": "invalid credentials" })))));
		assert_eq!(
			outcome,
			LoginOutcome::FatalClientError {
				status: 401,
				message: "invalid credentials".to_string(),
			}
		);
		assert!(!outcome.is_retryable());
	}

	#[test]
	fn client_errors_synthesize_a_message_when_the_body_is_unusable() {
		let cases = [
			classify(Some(&response(422, None))),
			classify(Some(&response(422, Some(json!({ "error": 7 }))))),
			classify(Some(&response(422, Some(json!("nope"))))),
		];
		for outcome in cases {
			assert_eq!(
				outcome,
				LoginOutcome::FatalClientError {
					status: 422,
					message: "login request failed with status 422".to_string(),
				}
			);
		}
	}

	#[test]
	fn status_600_is_not_a_server_error() {
		assert!(matches!(
			classify(Some(&response(600, None))),
			LoginOutcome::FatalClientError { status: 600, .. }
		));
	}

	#[test]
	fn absent_response_is_retryable() {
		let outcome = classify(None);
		assert_eq!(outcome, LoginOutcome::NoResponseObserved);
		assert!(outcome.is_retryable());
		assert_eq!(outcome.status(), None);
	}
}
