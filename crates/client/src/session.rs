//! Per-editor session: the single task that owns all suggestion state.
//!
//! Every input lands on one unbounded queue and is handled to completion
//! before the next is dequeued, so the engine state never sees concurrent
//! mutation. Timers (debounce, rate-limit expiry) and the transport
//! listener all feed the same queue.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use ghostline_engine::{
	ChangeNotification, EditClass, EditContext, Replay, ReplayContext, SuggestionState, apply_edit, apply_response,
	extract,
};

use crate::host::{HostBuffer, SuggestionSurface};
use crate::protocol::{ClientIdentity, PredictionRequest};
use crate::rate_limit::RateLimiter;
use crate::scheduler::RequestScheduler;
use crate::transport::{Transport, TransportClient};
use crate::{Error, Result};

/// Inputs to the session task.
#[derive(Debug)]
pub enum SessionEvent {
	/// The buffer changed.
	Edit(ChangeNotification),
	/// A debounce timer elapsed.
	DebounceFired {
		/// Scheduler generation at arming time.
		generation: u64,
		/// The edit class that armed the timer.
		class: EditClass,
		/// The prefix captured at arming time.
		prefix: String,
	},
	/// A raw payload arrived from the transport.
	Response(Value),
	/// The rate-limit window closed.
	RateLimitExpired,
	/// Completions were switched on or off.
	SetEnabled(bool),
	/// The transport connection was rebuilt.
	Reconnected,
	/// Stop the session task.
	Shutdown,
}

/// Cloneable handle for feeding a running [`Session`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
	events: UnboundedSender<SessionEvent>,
}

impl SessionHandle {
	/// Forwards a buffer change notification.
	pub fn notify_change(&self, notification: ChangeNotification) -> Result<()> {
		self.send(SessionEvent::Edit(notification))
	}

	/// Switches completions on or off.
	pub fn set_enabled(&self, enabled: bool) -> Result<()> {
		self.send(SessionEvent::SetEnabled(enabled))
	}

	/// Signals that the transport connection was rebuilt.
	pub fn reconnected(&self) -> Result<()> {
		self.send(SessionEvent::Reconnected)
	}

	/// Asks the session task to stop.
	pub fn shutdown(&self) {
		let _ = self.events.send(SessionEvent::Shutdown);
	}

	fn send(&self, event: SessionEvent) -> Result<()> {
		self.events.send(event).map_err(|_| Error::SessionStopped)
	}
}

/// One editor's suggestion session.
pub struct Session {
	state: SuggestionState,
	scheduler: RequestScheduler,
	rate: RateLimiter,
	transport: TransportClient,
	buffer: Arc<dyn HostBuffer>,
	surface: Arc<dyn SuggestionSurface>,
	events: UnboundedSender<SessionEvent>,
	queue: UnboundedReceiver<SessionEvent>,
	/// Buffer text as of the last handled change, so each notification
	/// can be applied against the text it was produced from.
	shadow_text: String,
	enabled: bool,
}

impl Session {
	/// Creates a session over the given transport and host, attaching the
	/// response listener. Returns the session and a handle to feed it.
	pub fn new(
		transport: Arc<dyn Transport>,
		identity: ClientIdentity,
		buffer: Arc<dyn HostBuffer>,
		surface: Arc<dyn SuggestionSurface>,
	) -> Result<(Self, SessionHandle)> {
		let (events, queue) = mpsc::unbounded_channel();
		let transport = TransportClient::new(transport, identity);
		transport.ensure_receiver(events.clone())?;
		let shadow_text = buffer.full_text();
		let handle = SessionHandle {
			events: events.clone(),
		};
		let session = Self {
			state: SuggestionState::new(),
			scheduler: RequestScheduler::new(),
			rate: RateLimiter::new(),
			transport,
			buffer,
			surface,
			events,
			queue,
			shadow_text,
			enabled: true,
		};
		Ok((session, handle))
	}

	/// Runs the event loop until shutdown or all handles drop.
	pub async fn run(mut self) {
		while let Some(event) = self.queue.recv().await {
			if !self.dispatch(event) {
				break;
			}
		}
		tracing::debug!("session.stopped");
	}

	fn dispatch(&mut self, event: SessionEvent) -> bool {
		match event {
			SessionEvent::Edit(notification) => self.on_change(notification),
			SessionEvent::DebounceFired {
				generation,
				class,
				prefix,
			} => self.on_fire(generation, class, &prefix),
			SessionEvent::Response(payload) => self.on_response(payload),
			SessionEvent::RateLimitExpired => self.on_rate_limit_expired(),
			SessionEvent::SetEnabled(enabled) => self.on_set_enabled(enabled),
			SessionEvent::Reconnected => self.on_reconnected(),
			SessionEvent::Shutdown => return false,
		}
		true
	}

	fn on_change(&mut self, notification: ChangeNotification) {
		let pre_text = std::mem::replace(&mut self.shadow_text, self.buffer.full_text());
		if !self.enabled {
			return;
		}

		let line_sep = self.buffer.line_separator();
		let record = match extract(&notification, &pre_text, &line_sep) {
			Ok(record) => record,
			Err(err) => {
				// Bulk or replacement edits: drop the suggestion rather
				// than guess what the buffer looks like now.
				tracing::debug!(error = %err, "session.unsupported_edit");
				self.state.reset();
				self.scheduler.cancel();
				self.sync_surface();
				return;
			}
		};

		let prefix = self.buffer.prefix();
		let cx = EditContext {
			prefix: &prefix,
			buffer_blank: self.shadow_text.trim().is_empty(),
			editor_active: self.buffer.editor_active(),
			undo_redo: notification.reason.is_undo_redo(),
		};
		let outcome = apply_edit(&mut self.state, &record, &cx);

		if let Some(event) = &outcome.telemetry {
			self.surface.record_acceptance(event);
		}
		if let Some(class) = outcome.schedule {
			self.schedule_request(class);
		} else if !self.state.is_active() && !self.state.is_in_flight() {
			self.scheduler.cancel();
		}
		self.sync_surface();
	}

	fn schedule_request(&mut self, class: EditClass) {
		if self.rate.is_limited() {
			// Dropped, not queued; expiry issues one request if still wanted.
			self.state.set_suggestion_required(true);
			tracing::trace!("schedule.rate_limited_drop");
			return;
		}
		let prefix = self.buffer.prefix();
		let generation = self.scheduler.schedule(class, prefix, self.events.clone());
		tracing::trace!(generation, class = class.as_str(), "schedule.debounce");
	}

	fn on_fire(&mut self, generation: u64, class: EditClass, prefix: &str) {
		if generation != self.scheduler.generation() {
			return;
		}
		if !self.enabled || self.state.is_in_flight() {
			return;
		}
		if self.rate.is_limited() {
			self.state.set_suggestion_required(true);
			return;
		}
		if self.buffer.prefix() != prefix {
			tracing::trace!("schedule.stale_prefix");
			return;
		}

		let request = PredictionRequest {
			id: Uuid::new_v4(),
			prefix: prefix.to_string(),
			suffix: self.buffer.suffix(),
			language: self.buffer.language_id(),
			action: class,
			timestamp: SystemTime::now()
				.duration_since(UNIX_EPOCH)
				.unwrap_or_default()
				.as_secs(),
		};
		self.state.begin_request(request.id, prefix.to_string());
		self.state.set_suggestion_required(false);

		match self.transport.send_request(&request) {
			Ok(()) => tracing::debug!(id = %request.id, class = class.as_str(), "session.request_sent"),
			Err(err) => {
				// Nothing is in flight after a failed send; the next
				// schedulable edit retries.
				tracing::debug!(error = %err, "session.send_failed");
				self.state.finish_request();
				self.state.set_suggestion_required(true);
			}
		}
	}

	fn on_response(&mut self, payload: Value) {
		let Some(response) = self.transport.decode(payload) else {
			return;
		};

		if let Some(seconds) = response.rate_limit {
			let window = self.rate.suspend(seconds, &self.events);
			self.scheduler.cancel();
			self.state.finish_request();
			self.state.reset();
			self.state.set_suggestion_required(true);
			self.sync_surface();
			self.surface
				.status(&format!("completions paused for {}s", window.as_secs()));
			return;
		}

		let prefix = self.buffer.prefix();
		let cx = ReplayContext {
			prefix: &prefix,
			rate_limited: self.rate.is_limited(),
		};
		match apply_response(&mut self.state, &response, &cx) {
			Replay::Adopted => tracing::debug!(chars = self.state.tail().len(), "session.suggestion_shown"),
			Replay::Discarded(reason) => tracing::trace!(reason, "session.response_discarded"),
		}
		self.sync_surface();
	}

	fn on_rate_limit_expired(&mut self) {
		if self.rate.is_limited() {
			// A newer, longer window was opened while this timer slept.
			return;
		}
		self.rate.clear();
		tracing::info!("rate_limit.expired");
		if self.enabled && self.state.suggestion_required() && !self.shadow_text.trim().is_empty() {
			self.schedule_request(EditClass::Typing);
		}
	}

	fn on_set_enabled(&mut self, enabled: bool) {
		if self.enabled == enabled {
			return;
		}
		self.enabled = enabled;
		tracing::info!(enabled, "session.enabled");
		if enabled {
			self.shadow_text = self.buffer.full_text();
		} else {
			self.scheduler.cancel();
			self.state.reset();
			self.state.set_suggestion_required(false);
			self.sync_surface();
		}
	}

	fn on_reconnected(&mut self) {
		if let Err(err) = self.transport.on_reconnect(self.events.clone()) {
			tracing::warn!(error = %err, "session.reattach_failed");
		}
		// Whatever was in flight died with the old connection.
		self.state.finish_request();
	}

	fn sync_surface(&self) {
		if self.state.is_active() {
			self.surface.show(self.state.tail());
		} else {
			self.surface.clear();
		}
	}
}
