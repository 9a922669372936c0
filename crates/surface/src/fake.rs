//! Scripted in-memory surface for testing orchestration logic without
//! browsers.
//!
//! Each submission consumes the next [`ScriptedAttempt`]; the fake
//! delivers the scripted response to the active watch, optionally
//! materializes a session marker after a delay, and records
//! navigations/submissions so tests can assert attempt ordering.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::oneshot;

use crate::response::{ObservedResponse, ResponseWatch};
use crate::storage::{SESSION_STORAGE_KEY, SessionMarker, StorageSnapshot};
use crate::surface::{ControlSurface, SurfaceError};

const DEFAULT_SUBMIT_SELECTOR: &str = "button[type=submit]";
const DEFAULT_ENDPOINT_URL: &str = "https://admin.example.com/api/login";
const DEFAULT_LANDING_URL: &str = "https://admin.example.com/dashboard";

/// What the fake does when a submission reaches it.
#[derive(Debug, Clone)]
pub struct ScriptedAttempt {
	/// Response delivered to the active watch; `None` simulates a
	/// request that never gets answered.
	pub reply: Option<ObservedResponse>,
	/// Session token persisted to storage after the reply.
	pub marker_token: Option<String>,
	/// Delay before the marker and landing navigation materialize.
	pub marker_delay: Duration,
	/// URL the fake "navigates" to once the attempt settles.
	pub landing_url: Option<String>,
	/// Delay before the submit click resolves.
	pub ack_stall: Duration,
}

impl ScriptedAttempt {
	/// Bare response with the given status and no body.
	pub fn responding(status: u16) -> Self {
		Self {
			reply: Some(ObservedResponse { status, body: None }),
			marker_token: None,
			marker_delay: Duration::ZERO,
			landing_url: None,
			ack_stall: Duration::ZERO,
		}
	}

	/// 200 response whose marker materializes right away.
	pub fn accepted(token: &str) -> Self {
		let mut attempt = Self::responding(200);
		attempt.marker_token = Some(token.to_string());
		attempt.landing_url = Some(DEFAULT_LANDING_URL.to_string());
		attempt
	}

	/// 429 response.
	pub fn rate_limited() -> Self {
		Self::responding(429)
	}

	/// 5xx response.
	pub fn server_error(status: u16) -> Self {
		Self::responding(status)
	}

	/// 4xx response with a structured `error` body field.
	pub fn rejected(status: u16, message: &str) -> Self {
		let mut attempt = Self::responding(status);
		attempt.reply = Some(ObservedResponse {
			status,
			body: Some(json!({ "error": message })),
		});
		attempt
	}

	/// No response within the attempt's wait window.
	pub fn silence() -> Self {
		Self {
			reply: None,
			marker_token: None,
			marker_delay: Duration::ZERO,
			landing_url: None,
			ack_stall: Duration::ZERO,
		}
	}

	/// Delays marker materialization, simulating eventual consistency
	/// between the server response and client storage.
	pub fn with_marker_delay(mut self, delay: Duration) -> Self {
		self.marker_delay = delay;
		self
	}

	/// Overrides the landing URL reached after the attempt settles.
	pub fn with_landing_url(mut self, url: &str) -> Self {
		self.landing_url = Some(url.to_string());
		self
	}

	/// Stalls the submit click, simulating an acknowledgement that
	/// never settles on its own.
	pub fn with_ack_stall(mut self, stall: Duration) -> Self {
		self.ack_stall = stall;
		self
	}
}

struct PendingWatch {
	pattern: String,
	tx: oneshot::Sender<ObservedResponse>,
}

struct FakeState {
	scripted: VecDeque<ScriptedAttempt>,
	storage: HashMap<String, String>,
	watches: HashMap<u64, PendingWatch>,
	next_watch_id: u64,
	current_url: Option<String>,
	alert_text: Option<String>,
	closed: bool,
	form_available: bool,
	reject_applied_sessions: bool,
	navigations: Vec<String>,
	submissions: u32,
	storage_clears: u32,
}

/// Builder for [`FakeSurface`] instances.
pub struct FakeSurfaceBuilder {
	submit_selector: String,
	endpoint_url: String,
	scripted: Vec<ScriptedAttempt>,
	storage: HashMap<String, String>,
	alert_text: Option<String>,
	form_available: bool,
	reject_applied_sessions: bool,
}

impl FakeSurfaceBuilder {
	pub fn new() -> Self {
		Self {
			submit_selector: DEFAULT_SUBMIT_SELECTOR.to_string(),
			endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
			scripted: Vec::new(),
			storage: HashMap::new(),
			alert_text: None,
			form_available: true,
			reject_applied_sessions: false,
		}
	}

	/// Selector whose click counts as a submission.
	pub fn submit_selector(mut self, selector: &str) -> Self {
		self.submit_selector = selector.to_string();
		self
	}

	/// URL the fake's login endpoint answers on; watches only receive
	/// replies when this URL contains their pattern.
	pub fn endpoint_url(mut self, url: &str) -> Self {
		self.endpoint_url = url.to_string();
		self
	}

	/// Appends one scripted attempt outcome.
	pub fn script(mut self, attempt: ScriptedAttempt) -> Self {
		self.scripted.push(attempt);
		self
	}

	/// Seeds a raw storage entry.
	pub fn with_storage_entry(mut self, name: &str, value: &str) -> Self {
		self.storage.insert(name.to_string(), value.to_string());
		self
	}

	/// Seeds a valid session marker, as if already logged in.
	pub fn with_session_token(mut self, token: &str) -> Self {
		self.storage
			.insert(SESSION_STORAGE_KEY.to_string(), SessionMarker::new(token).encode());
		self
	}

	/// Shows a persistent alert/toast text.
	pub fn with_alert_text(mut self, text: &str) -> Self {
		self.alert_text = Some(text.to_string());
		self
	}

	/// Makes every selector wait time out, as if the form never
	/// rendered.
	pub fn without_form(mut self) -> Self {
		self.form_available = false;
		self
	}

	/// Drops any applied session marker on the next navigation,
	/// simulating a server that no longer recognizes the session.
	pub fn rejecting_applied_sessions(mut self) -> Self {
		self.reject_applied_sessions = true;
		self
	}

	pub fn build(self) -> FakeSurface {
		FakeSurface {
			submit_selector: Arc::from(self.submit_selector),
			endpoint_url: Arc::from(self.endpoint_url),
			state: Arc::new(Mutex::new(FakeState {
				scripted: self.scripted.into(),
				storage: self.storage,
				watches: HashMap::new(),
				next_watch_id: 0,
				current_url: None,
				alert_text: self.alert_text,
				closed: false,
				form_available: self.form_available,
				reject_applied_sessions: self.reject_applied_sessions,
				navigations: Vec::new(),
				submissions: 0,
				storage_clears: 0,
			})),
		}
	}
}

impl Default for FakeSurfaceBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// In-memory [`ControlSurface`] driven by a script of attempt
/// outcomes.
#[derive(Clone)]
pub struct FakeSurface {
	submit_selector: Arc<str>,
	endpoint_url: Arc<str>,
	state: Arc<Mutex<FakeState>>,
}

impl FakeSurface {
	pub fn builder() -> FakeSurfaceBuilder {
		FakeSurfaceBuilder::new()
	}

	/// Marks the surface unusable, as if the browser died.
	pub fn close(&self) {
		self.state.lock().closed = true;
	}

	/// URLs navigated to, in order.
	pub fn navigations(&self) -> Vec<String> {
		self.state.lock().navigations.clone()
	}

	/// Number of submissions consumed so far.
	pub fn submissions(&self) -> u32 {
		self.state.lock().submissions
	}

	/// Number of session-storage clears so far.
	pub fn storage_clears(&self) -> u32 {
		self.state.lock().storage_clears
	}

	/// Response watches still registered.
	pub fn open_watches(&self) -> usize {
		self.state.lock().watches.len()
	}

	/// Scripted attempts not yet consumed.
	pub fn remaining_script(&self) -> usize {
		self.state.lock().scripted.len()
	}

	/// Currently stored session token, if a valid marker is present.
	pub fn session_token(&self) -> Option<String> {
		let state = self.state.lock();
		state
			.storage
			.get(SESSION_STORAGE_KEY)
			.and_then(|raw| SessionMarker::decode(raw))
			.map(|marker| marker.token)
	}

	fn ensure_open(&self) -> Result<(), SurfaceError> {
		if self.state.lock().closed {
			Err(SurfaceError::Closed)
		} else {
			Ok(())
		}
	}
}

#[async_trait]
impl ControlSurface for FakeSurface {
	async fn goto(&self, url: &str) -> Result<(), SurfaceError> {
		self.ensure_open()?;
		let mut state = self.state.lock();
		state.navigations.push(url.to_string());
		state.current_url = Some(url.to_string());
		if state.reject_applied_sessions {
			state.storage.remove(SESSION_STORAGE_KEY);
		}
		Ok(())
	}

	async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), SurfaceError> {
		self.ensure_open()?;
		if self.state.lock().form_available {
			Ok(())
		} else {
			Err(SurfaceError::Timeout {
				ms: timeout.as_millis() as u64,
				condition: selector.to_string(),
			})
		}
	}

	async fn fill(&self, _selector: &str, _value: &str) -> Result<(), SurfaceError> {
		self.ensure_open()
	}

	async fn click(&self, selector: &str) -> Result<(), SurfaceError> {
		self.ensure_open()?;
		if selector != self.submit_selector.as_ref() {
			return Ok(());
		}

		let (reply, watch, script) = {
			let mut state = self.state.lock();
			state.submissions += 1;
			let Some(script) = state.scripted.pop_front() else {
				return Ok(());
			};
			let watch = if script.reply.is_some() {
				let id = state
					.watches
					.iter()
					.find(|(_, watch)| self.endpoint_url.contains(watch.pattern.as_str()))
					.map(|(id, _)| *id);
				id.and_then(|id| state.watches.remove(&id))
			} else {
				None
			};
			(script.reply.clone(), watch, script)
		};

		if let (Some(reply), Some(watch)) = (reply, watch) {
			let _ = watch.tx.send(reply);
		}

		let stall = script.ack_stall;
		if script.marker_token.is_some() || script.landing_url.is_some() {
			if script.marker_delay.is_zero() {
				settle_attempt(&self.state, script);
			} else {
				let state = Arc::clone(&self.state);
				tokio::spawn(async move {
					tokio::time::sleep(script.marker_delay).await;
					settle_attempt(&state, script);
				});
			}
		}
		if !stall.is_zero() {
			tokio::time::sleep(stall).await;
		}

		Ok(())
	}

	async fn clear_session_storage(&self) -> Result<(), SurfaceError> {
		self.ensure_open()?;
		let mut state = self.state.lock();
		state.storage.clear();
		state.storage_clears += 1;
		Ok(())
	}

	async fn read_storage(&self, key: &str) -> Result<Option<String>, SurfaceError> {
		self.ensure_open()?;
		Ok(self.state.lock().storage.get(key).cloned())
	}

	async fn apply_snapshot(&self, snapshot: &StorageSnapshot) -> Result<(), SurfaceError> {
		self.ensure_open()?;
		let mut state = self.state.lock();
		for entry in &snapshot.entries {
			state.storage.insert(entry.name.clone(), entry.value.clone());
		}
		Ok(())
	}

	async fn capture_snapshot(&self) -> Result<StorageSnapshot, SurfaceError> {
		self.ensure_open()?;
		let state = self.state.lock();
		let mut snapshot = StorageSnapshot::default();
		let mut names: Vec<&String> = state.storage.keys().collect();
		names.sort();
		for name in names {
			snapshot.insert(name.clone(), state.storage[name].clone());
		}
		Ok(snapshot)
	}

	async fn current_url(&self) -> Option<String> {
		self.state.lock().current_url.clone()
	}

	async fn visible_alert_text(&self) -> Option<String> {
		self.state.lock().alert_text.clone()
	}

	fn is_closed(&self) -> bool {
		self.state.lock().closed
	}

	fn watch_response(&self, endpoint_pattern: &str) -> ResponseWatch {
		let (tx, rx) = oneshot::channel();
		let id = {
			let mut state = self.state.lock();
			let id = state.next_watch_id;
			state.next_watch_id += 1;
			state.watches.insert(
				id,
				PendingWatch {
					pattern: endpoint_pattern.to_string(),
					tx,
				},
			);
			id
		};
		let state = Arc::clone(&self.state);
		ResponseWatch::new(rx, move || {
			state.lock().watches.remove(&id);
		})
	}
}

fn settle_attempt(state: &Arc<Mutex<FakeState>>, script: ScriptedAttempt) {
	let mut state = state.lock();
	if let Some(token) = script.marker_token {
		state
			.storage
			.insert(SESSION_STORAGE_KEY.to_string(), SessionMarker::new(token).encode());
	}
	if let Some(url) = script.landing_url {
		state.current_url = Some(url);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn scripted_reply_reaches_a_matching_watch() {
		let surface = FakeSurface::builder().script(ScriptedAttempt::rate_limited()).build();

		let watch = surface.watch_response("/api/login");
		surface.click(DEFAULT_SUBMIT_SELECTOR).await.unwrap();

		let response = watch.recv(Duration::from_secs(1)).await.unwrap();
		assert_eq!(response.status, 429);
		assert_eq!(surface.submissions(), 1);
		assert_eq!(surface.open_watches(), 0);
	}

	#[tokio::test]
	async fn reply_skips_watches_with_foreign_patterns() {
		let surface = FakeSurface::builder().script(ScriptedAttempt::responding(200)).build();

		let watch = surface.watch_response("/api/unrelated");
		surface.click(DEFAULT_SUBMIT_SELECTOR).await.unwrap();

		assert!(watch.recv(Duration::from_millis(10)).await.is_none());
	}

	#[tokio::test]
	async fn dropping_a_watch_deregisters_it() {
		let surface = FakeSurface::builder().build();
		let watch = surface.watch_response("/api/login");
		assert_eq!(surface.open_watches(), 1);
		drop(watch);
		assert_eq!(surface.open_watches(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn marker_materializes_after_the_scripted_delay() {
		let surface = FakeSurface::builder()
			.script(ScriptedAttempt::accepted("tok-9").with_marker_delay(Duration::from_millis(800)))
			.build();

		surface.click(DEFAULT_SUBMIT_SELECTOR).await.unwrap();
		assert_eq!(surface.session_token(), None);

		tokio::time::sleep(Duration::from_secs(1)).await;
		assert_eq!(surface.session_token(), Some("tok-9".to_string()));
		assert_eq!(
			surface.current_url().await.as_deref(),
			Some(DEFAULT_LANDING_URL)
		);
	}

	#[tokio::test]
	async fn closed_surface_refuses_primitives() {
		let surface = FakeSurface::builder().build();
		surface.close();

		assert!(surface.goto("https://x.example.com").await.unwrap_err().is_closed());
		assert!(surface.read_storage(SESSION_STORAGE_KEY).await.unwrap_err().is_closed());
		assert!(surface.is_closed());
	}

	#[tokio::test]
	async fn snapshot_round_trip_through_the_surface() {
		let surface = FakeSurface::builder().with_session_token("tok-3").build();

		let snapshot = surface.capture_snapshot().await.unwrap();
		assert_eq!(snapshot.session_marker(), Some(SessionMarker::new("tok-3")));

		let other = FakeSurface::builder().build();
		other.apply_snapshot(&snapshot).await.unwrap();
		assert_eq!(other.session_token(), Some("tok-3".to_string()));
	}
}
