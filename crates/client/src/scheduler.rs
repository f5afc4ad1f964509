//! Debounced request scheduling.
//!
//! Each schedulable edit bumps a generation counter and arms a timer task;
//! arming cancels whatever was pending, so at most one timer is live and
//! only the latest generation ever fires. The session double-checks the
//! generation when the fired event is dequeued, which closes the race
//! between the timer sending and a newer edit arriving.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use ghostline_engine::EditClass;

use crate::session::SessionEvent;

const TYPING_DELAY: Duration = Duration::from_millis(150);
const NEWLINE_DELAY: Duration = Duration::from_millis(300);
const CROSS_LINE_DELAY: Duration = Duration::from_millis(400);
const DELETION_DELAY: Duration = Duration::from_millis(400);
const MULTI_LINE_DELETION_DELAY: Duration = Duration::from_millis(800);

/// Debounce window for an edit class. Heavier edits wait longer so a
/// burst of them collapses into one request.
pub fn debounce_for(class: EditClass) -> Duration {
	match class {
		EditClass::Typing => TYPING_DELAY,
		EditClass::Newline => NEWLINE_DELAY,
		EditClass::CrossLine => CROSS_LINE_DELAY,
		EditClass::Deletion => DELETION_DELAY,
		EditClass::MultiLineDeletion => MULTI_LINE_DELETION_DELAY,
	}
}

/// Cancel-and-replace debounce timer for prediction requests.
#[derive(Debug, Default)]
pub struct RequestScheduler {
	generation: u64,
	pending: Option<CancellationToken>,
}

impl RequestScheduler {
	/// Creates an idle scheduler.
	pub fn new() -> Self {
		Self::default()
	}

	/// The generation of the most recent schedule call.
	pub fn generation(&self) -> u64 {
		self.generation
	}

	/// Cancels the pending timer, if any.
	pub fn cancel(&mut self) {
		if let Some(token) = self.pending.take() {
			token.cancel();
		}
	}

	/// Arms a timer for the edit class, cancelling any pending one. The
	/// captured prefix lets the session detect buffer movement between
	/// arming and firing.
	pub fn schedule(&mut self, class: EditClass, prefix: String, events: UnboundedSender<SessionEvent>) -> u64 {
		self.cancel();
		self.generation = self.generation.wrapping_add(1);
		let generation = self.generation;

		let token = CancellationToken::new();
		self.pending = Some(token.clone());

		let delay = debounce_for(class);
		tracing::trace!(generation, class = class.as_str(), delay_ms = delay.as_millis() as u64, "schedule.arm");
		tokio::spawn(async move {
			tokio::select! {
				_ = token.cancelled() => {}
				_ = tokio::time::sleep(delay) => {
					let _ = events.send(SessionEvent::DebounceFired { generation, class, prefix });
				}
			}
		});
		generation
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use tokio::sync::mpsc;

	use super::*;

	#[tokio::test(start_paused = true)]
	async fn test_only_latest_schedule_fires() {
		let (tx, mut rx) = mpsc::unbounded_channel();
		let mut scheduler = RequestScheduler::new();

		scheduler.schedule(EditClass::Typing, "f".to_string(), tx.clone());
		scheduler.schedule(EditClass::Typing, "fn".to_string(), tx.clone());
		let last = scheduler.schedule(EditClass::Typing, "fn ".to_string(), tx);

		tokio::time::sleep(Duration::from_secs(1)).await;
		let Some(SessionEvent::DebounceFired { generation, prefix, .. }) = rx.recv().await else {
			panic!("expected a fired event");
		};
		assert_eq!(generation, last);
		assert_eq!(prefix, "fn ");
		assert!(rx.try_recv().is_err());
	}

	#[tokio::test(start_paused = true)]
	async fn test_cancel_suppresses_fire() {
		let (tx, mut rx) = mpsc::unbounded_channel();
		let mut scheduler = RequestScheduler::new();

		scheduler.schedule(EditClass::Deletion, "fn".to_string(), tx);
		scheduler.cancel();

		tokio::time::sleep(Duration::from_secs(1)).await;
		assert!(rx.try_recv().is_err());
	}

	#[tokio::test(start_paused = true)]
	async fn test_heavier_classes_wait_longer() {
		assert!(debounce_for(EditClass::Typing) < debounce_for(EditClass::Newline));
		assert!(debounce_for(EditClass::Deletion) < debounce_for(EditClass::MultiLineDeletion));

		let (tx, mut rx) = mpsc::unbounded_channel();
		let mut scheduler = RequestScheduler::new();
		scheduler.schedule(EditClass::MultiLineDeletion, String::new(), tx);

		tokio::time::sleep(Duration::from_millis(500)).await;
		assert!(rx.try_recv().is_err());
		tokio::time::sleep(Duration::from_millis(400)).await;
		assert!(rx.try_recv().is_ok());
	}
}
