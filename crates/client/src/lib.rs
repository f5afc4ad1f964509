//! Async shell around the ghostline engine.
//!
//! Hosts an editor's suggestion [`Session`]: a single task owning the
//! engine state, fed by buffer changes, debounce timers, rate-limit
//! expiry, and transport responses over one queue. Hosts plug in a
//! [`Transport`] for the backend connection and [`HostBuffer`] /
//! [`SuggestionSurface`] for the editor side.

#![warn(missing_docs)]

pub mod host;
pub mod protocol;
pub mod rate_limit;
pub mod scheduler;
pub mod session;
pub mod transport;

pub use host::{HostBuffer, NoOpSurface, SuggestionSurface};
pub use protocol::{ClientIdentity, PredictionRequest, ReceiveMessage, SendMessage};
pub use rate_limit::RateLimiter;
pub use scheduler::RequestScheduler;
pub use session::{Session, SessionEvent, SessionHandle};
pub use transport::{Listener, NoOpTransport, Transport, TransportClient};

/// A convenient type alias for `Result` with `E` = [`enum@Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Client-side failures.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// The transport connection is down.
	#[error("transport unavailable")]
	TransportUnavailable,
	/// A wire payload could not be serialized.
	#[error("serialization failed: {0}")]
	Serialize(#[from] serde_json::Error),
	/// The session task has stopped.
	#[error("session stopped")]
	SessionStopped,
}
