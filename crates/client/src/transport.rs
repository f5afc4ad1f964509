//! Transport abstraction and the request/response bookkeeping around it.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use ghostline_engine::PredictionResponse;

use crate::protocol::{ClientIdentity, PredictionRequest, RECEIVE_EVENT, ReceiveMessage, SEND_EVENT};
use crate::session::SessionEvent;
use crate::{Error, Result};

/// A listener callback invoked with each raw inbound payload.
pub type Listener = Box<dyn Fn(Value) + Send + Sync>;

/// A duplex, named-event message channel to the prediction backend.
///
/// Implementations are expected to be cheap to clone behind an [`Arc`] and
/// callable from the session task. `send` fails fast when the underlying
/// connection is down; the session treats that as a skipped request, not a
/// fatal error.
pub trait Transport: Send + Sync {
	/// Emits one event with a JSON payload.
	fn send(&self, event: &str, payload: Value) -> Result<()>;

	/// Registers a callback for an inbound event name.
	///
	/// Called at most once per event name per connection; reattachment
	/// after a reconnect goes through [`TransportClient::on_reconnect`].
	fn attach_listener(&self, event: &str, listener: Listener) -> Result<()>;
}

/// Wraps a [`Transport`] with listener idempotency and staleness checks.
pub struct TransportClient {
	transport: Arc<dyn Transport>,
	identity: ClientIdentity,
	attached: Mutex<HashSet<&'static str>>,
	last_issued: Mutex<Option<Uuid>>,
}

impl TransportClient {
	/// Creates a client over the given transport.
	pub fn new(transport: Arc<dyn Transport>, identity: ClientIdentity) -> Self {
		Self {
			transport,
			identity,
			attached: Mutex::new(HashSet::new()),
			last_issued: Mutex::new(None),
		}
	}

	/// Attaches the response listener, forwarding raw payloads onto the
	/// session queue. Attaching twice on one connection is a no-op.
	pub fn ensure_receiver(&self, events: UnboundedSender<SessionEvent>) -> Result<()> {
		let mut attached = self.attached.lock();
		if attached.contains(RECEIVE_EVENT) {
			return Ok(());
		}
		self.transport.attach_listener(
			RECEIVE_EVENT,
			Box::new(move |payload| {
				let _ = events.send(SessionEvent::Response(payload));
			}),
		)?;
		attached.insert(RECEIVE_EVENT);
		Ok(())
	}

	/// Re-registers listeners after the underlying connection was rebuilt.
	pub fn on_reconnect(&self, events: UnboundedSender<SessionEvent>) -> Result<()> {
		self.attached.lock().clear();
		self.ensure_receiver(events)
	}

	/// Sends a prediction request, recording its id for staleness checks.
	pub fn send_request(&self, request: &PredictionRequest) -> Result<()> {
		*self.last_issued.lock() = Some(request.id);
		let payload = serde_json::to_value(request.to_wire(&self.identity))?;
		self.transport.send(SEND_EVENT, payload)
	}

	/// Decodes an inbound payload, dropping completions whose echoed id
	/// does not match the most recently issued request. Rate-limit signals
	/// carry no id and always pass through.
	pub fn decode(&self, payload: Value) -> Option<PredictionResponse> {
		let message: ReceiveMessage = match serde_json::from_value(payload) {
			Ok(message) => message,
			Err(err) => {
				tracing::warn!(error = %err, "transport.undecodable_payload");
				return None;
			}
		};
		let response = message.into_response();
		if response.rate_limit.is_none() {
			let last = *self.last_issued.lock();
			if response.id.is_none() || response.id != last {
				tracing::trace!(id = ?response.id, "transport.drop_stale");
				return None;
			}
		}
		Some(response)
	}

	/// The id of the most recently issued request.
	pub fn last_issued(&self) -> Option<Uuid> {
		*self.last_issued.lock()
	}
}

/// A transport that drops everything, for hosts that run without a
/// backend connection.
#[derive(Debug, Default)]
pub struct NoOpTransport;

impl Transport for NoOpTransport {
	fn send(&self, _event: &str, _payload: Value) -> Result<()> {
		Err(Error::TransportUnavailable)
	}

	fn attach_listener(&self, _event: &str, _listener: Listener) -> Result<()> {
		Ok(())
	}
}
