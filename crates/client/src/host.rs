//! Host editor integration points.
//!
//! The session never touches an editor directly; it reads buffer context
//! through [`HostBuffer`] and pushes overlay updates through
//! [`SuggestionSurface`]. Hosts implement both against their own editor
//! API.

use ghostline_engine::{AcceptanceEvent, Position};

/// Read-only view of the focused buffer, sampled at event time.
pub trait HostBuffer: Send + Sync {
	/// Whether an editor pane currently has focus.
	fn editor_active(&self) -> bool;

	/// The full buffer text.
	fn full_text(&self) -> String;

	/// Text from the start of the buffer to the cursor.
	fn prefix(&self) -> String;

	/// Text from the cursor to the end of the buffer.
	fn suffix(&self) -> String;

	/// The cursor position.
	fn cursor(&self) -> Position;

	/// The buffer's line separator, `"\n"` or `"\r\n"`.
	fn line_separator(&self) -> String;

	/// The document language id, e.g. `"rust"`.
	fn language_id(&self) -> String;
}

/// Sink for overlay rendering and acceptance telemetry.
pub trait SuggestionSurface: Send + Sync {
	/// Renders the suggestion tail as ghost text at the cursor.
	fn show(&self, tail: &str);

	/// Removes any rendered ghost text.
	fn clear(&self);

	/// Surfaces a short status message, e.g. a rate-limit notice.
	fn status(&self, message: &str);

	/// Records that some portion of a suggestion was consumed.
	fn record_acceptance(&self, event: &AcceptanceEvent);
}

/// A surface that renders nothing, for headless hosts and tests.
#[derive(Debug, Default)]
pub struct NoOpSurface;

impl SuggestionSurface for NoOpSurface {
	fn show(&self, _tail: &str) {}

	fn clear(&self) {}

	fn status(&self, _message: &str) {}

	fn record_acceptance(&self, _event: &AcceptanceEvent) {}
}
