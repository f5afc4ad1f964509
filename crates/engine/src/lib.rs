//! Inline-suggestion reconciliation core.
//!
//! Keeps a speculative, backend-predicted completion consistent with a
//! rapidly mutating text buffer. The crate is pure and synchronous: it
//! turns host change notifications into [`EditRecord`]s, classifies them
//! against the [`SuggestionState`], and replays asynchronous responses
//! with staleness checks. Scheduling, transport, and timers live in the
//! client crate; nothing here blocks or performs I/O.
//!
//! The flow for one editor session:
//!
//! 1. [`delta::extract`] normalizes a change notification.
//! 2. [`reconcile::apply_edit`] computes the next state: consume the
//!    suggestion, fall back to a candidate, fold into the wait buffer, or
//!    invalidate and request again.
//! 3. [`response::apply_response`] validates and adopts a backend
//!    response, replaying edits that landed while it was in flight.

#![warn(missing_docs)]

pub mod brackets;
mod chars;
pub mod delta;
pub mod reconcile;
pub mod response;
pub mod state;

pub use delta::{ChangeNotification, ChangeReason, ContentChange, EditRecord, Position, extract};
pub use reconcile::{
	Acceptance, AcceptanceEvent, AcceptanceKind, EditClass, EditContext, EditOutcome, Reconciled,
	apply_edit,
};
pub use response::{PredictionResponse, Replay, ReplayContext, apply_response};
pub use state::SuggestionState;

/// A convenient type alias for `Result` with `E` = [`enum@Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Edit shapes the engine cannot reconcile.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// A notification bundled more than one discontiguous change.
	#[error("notification bundles {0} discontiguous changes")]
	MultipleChanges(usize),
	/// A single change both removed a range and inserted text.
	#[error("replacement edits cannot be reconciled")]
	Replacement,
	/// The reported range does not fit the pre-change text.
	#[error("change range exceeds the buffer at line {line}")]
	RangeOutOfBounds {
		/// The offending line number.
		line: usize,
	},
}
