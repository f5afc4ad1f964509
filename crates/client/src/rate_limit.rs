//! Backend rate-limit windows.
//!
//! While a window is open every would-be request is dropped, not queued;
//! the session only remembers that one is wanted. A timer task posts
//! [`SessionEvent::RateLimitExpired`] when the window closes.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;

use crate::session::SessionEvent;

/// Ceiling on a backend-supplied cooldown. Anything longer is treated as
/// a bogus value and clamped.
pub const MAX_COOLDOWN: Duration = Duration::from_secs(24 * 60 * 60);

/// Tracks the current rate-limit window, if any.
#[derive(Debug, Default)]
pub struct RateLimiter {
	until: Option<Instant>,
}

impl RateLimiter {
	/// Creates an unlimited limiter.
	pub fn new() -> Self {
		Self::default()
	}

	/// Whether a window is currently open.
	pub fn is_limited(&self) -> bool {
		self.until.is_some_and(|until| Instant::now() < until)
	}

	/// Opens a window for the given cooldown, clamped to [`MAX_COOLDOWN`],
	/// and arms a timer that posts expiry onto the session queue. Returns
	/// the clamped window.
	pub fn suspend(&mut self, seconds: u64, events: &UnboundedSender<SessionEvent>) -> Duration {
		let window = Duration::from_secs(seconds).min(MAX_COOLDOWN);
		self.until = Some(Instant::now() + window);
		tracing::info!(secs = window.as_secs(), "rate_limit.suspend");

		let events = events.clone();
		tokio::spawn(async move {
			tokio::time::sleep(window).await;
			let _ = events.send(SessionEvent::RateLimitExpired);
		});
		window
	}

	/// Closes the window.
	pub fn clear(&mut self) {
		self.until = None;
	}
}
