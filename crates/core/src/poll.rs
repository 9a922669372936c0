//! Bounded polling shared by readiness checks and warm reuse.

use std::future::Future;
use std::time::Duration;

/// Polls `probe` every `interval` until it yields a value or
/// `deadline` elapses, returning `None` on exhaustion.
///
/// The probe runs once immediately, and once more at the deadline, so
/// short deadlines still observe late state changes.
pub async fn poll_until<T, F, Fut>(interval: Duration, deadline: Duration, mut probe: F) -> Option<T>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Option<T>>,
{
	let end = tokio::time::Instant::now() + deadline;
	loop {
		if let Some(value) = probe().await {
			return Some(value);
		}
		let now = tokio::time::Instant::now();
		if now >= end {
			return None;
		}
		tokio::time::sleep(interval.min(end - now)).await;
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::sync::atomic::{AtomicU32, Ordering};

	use super::*;

	#[tokio::test]
	async fn immediate_hit_skips_sleeping() {
		let result = poll_until(Duration::from_secs(10), Duration::from_secs(10), || async { Some(7) }).await;
		assert_eq!(result, Some(7));
	}

	#[tokio::test(start_paused = true)]
	async fn probe_repeats_until_the_predicate_holds() {
		let calls = Arc::new(AtomicU32::new(0));
		let counter = Arc::clone(&calls);

		let result = poll_until(Duration::from_millis(100), Duration::from_secs(5), move || {
			let counter = Arc::clone(&counter);
			async move {
				if counter.fetch_add(1, Ordering::SeqCst) >= 3 {
					Some("ready")
				} else {
					None
				}
			}
		})
		.await;

		assert_eq!(result, Some("ready"));
		assert_eq!(calls.load(Ordering::SeqCst), 4);
	}

	#[tokio::test(start_paused = true)]
	async fn exhaustion_returns_none_after_the_deadline() {
		let start = tokio::time::Instant::now();
		let result: Option<()> = poll_until(Duration::from_millis(100), Duration::from_secs(1), || async { None }).await;
		assert_eq!(result, None);
		assert!(start.elapsed() >= Duration::from_secs(1));
	}

	#[tokio::test(start_paused = true)]
	async fn final_probe_fires_at_the_deadline() {
		let calls = Arc::new(AtomicU32::new(0));
		let counter = Arc::clone(&calls);

		// Interval longer than the deadline: one initial probe plus
		// one at the deadline.
		let result: Option<()> = poll_until(Duration::from_secs(10), Duration::from_secs(1), move || {
			counter.fetch_add(1, Ordering::SeqCst);
			async { None }
		})
		.await;

		assert_eq!(result, None);
		assert_eq!(calls.load(Ordering::SeqCst), 2);
	}
}
