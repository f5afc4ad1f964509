//! In-memory suggestion state for one editor session.
//!
//! Owned exclusively by the per-editor session controller; every relevant
//! edit or response mutates it through the methods here, which uphold the
//! core invariant: whenever `main` is non-empty, `tail` is a suffix of it,
//! and an empty `tail` clears `main`.

use uuid::Uuid;

use crate::chars::{char_len, remove_char_at, skip_chars, trim_trailing_chars};

/// The suggestion state machine's backing store.
///
/// `main` is the full suggestion adopted from the backend; `tail` the part
/// not yet consumed by typing. `wait_buffer` folds in edits that land while
/// a request is in flight. `diverged` accumulates typing that left the
/// suggestion, used for candidate fallback search.
#[derive(Debug, Clone, Default)]
pub struct SuggestionState {
	main: String,
	tail: String,
	candidates: Vec<String>,
	wait_buffer: String,
	diverged: String,
	last_known_prefix: String,
	requested_prefix: String,
	request_id: Option<Uuid>,
	in_flight: bool,
	suggestion_required: bool,
	via_search: bool,
}

impl SuggestionState {
	/// Creates an empty (Idle) state.
	pub fn new() -> Self {
		Self::default()
	}

	/// The adopted suggestion, empty when Idle.
	pub fn main(&self) -> &str {
		&self.main
	}

	/// The unconsumed remainder of the suggestion.
	pub fn tail(&self) -> &str {
		&self.tail
	}

	/// Alternative suggestions from the last response.
	pub fn candidates(&self) -> &[String] {
		&self.candidates
	}

	/// Edits folded in while a request was in flight.
	pub fn wait_buffer(&self) -> &str {
		&self.wait_buffer
	}

	/// Typing accumulated since the suggestion diverged.
	pub fn diverged(&self) -> &str {
		&self.diverged
	}

	/// The buffer prefix at the moment the suggestion was adopted.
	pub fn last_known_prefix(&self) -> &str {
		&self.last_known_prefix
	}

	/// The buffer prefix sent with the outstanding request.
	pub fn requested_prefix(&self) -> &str {
		&self.requested_prefix
	}

	/// Id of the outstanding request, if any.
	pub fn request_id(&self) -> Option<Uuid> {
		self.request_id
	}

	/// Whether a suggestion is present.
	pub fn is_active(&self) -> bool {
		!self.main.is_empty()
	}

	/// Whether a prediction request is outstanding.
	pub fn is_in_flight(&self) -> bool {
		self.in_flight
	}

	/// Whether a reset decided that a fresh request is wanted.
	pub fn suggestion_required(&self) -> bool {
		self.suggestion_required
	}

	/// Whether the current suggestion was adopted via candidate search.
	pub fn via_search(&self) -> bool {
		self.via_search
	}

	/// Characters of `main` already consumed by typing.
	pub fn accepted_chars(&self) -> usize {
		char_len(&self.main) - char_len(&self.tail)
	}

	/// Marks that the controller wants a fresh request.
	pub fn set_suggestion_required(&mut self, required: bool) {
		self.suggestion_required = required;
	}

	/// Clears everything back to Idle.
	pub fn reset(&mut self) {
		*self = Self {
			suggestion_required: self.suggestion_required,
			..Self::default()
		};
	}

	/// Records an issued request.
	pub fn begin_request(&mut self, id: Uuid, prefix: String) {
		self.request_id = Some(id);
		self.requested_prefix = prefix;
		self.in_flight = true;
		self.suggestion_required = false;
		self.wait_buffer.clear();
	}

	/// Clears the in-flight bookkeeping without touching the suggestion.
	pub fn finish_request(&mut self) {
		self.request_id = None;
		self.in_flight = false;
	}

	/// Adopts a fresh suggestion from a response.
	///
	/// `accepted` characters of `suggestion` are considered already typed
	/// (the replayed wait buffer). The prefix recorded by
	/// [`Self::begin_request`] becomes the last known prefix.
	pub fn adopt(&mut self, suggestion: String, candidates: Vec<String>, accepted: usize, via_search: bool) {
		debug_assert!(accepted < char_len(&suggestion));
		self.tail = skip_chars(&suggestion, accepted).to_string();
		self.main = suggestion;
		self.candidates = candidates;
		self.last_known_prefix = std::mem::take(&mut self.requested_prefix);
		self.diverged.clear();
		self.via_search = via_search;
		self.debug_check();
	}

	/// Swaps in a candidate found by divergence search, keeping the last
	/// known prefix and candidate list.
	pub fn adopt_candidate(&mut self, candidate: String, accepted: usize) {
		debug_assert!(accepted < char_len(&candidate));
		self.tail = skip_chars(&candidate, accepted).to_string();
		self.main = candidate;
		self.via_search = true;
		self.debug_check();
	}

	/// Re-derives `tail` from an accepted-character count.
	pub fn set_accepted(&mut self, accepted: usize) {
		debug_assert!(accepted < char_len(&self.main));
		self.tail = skip_chars(&self.main, accepted).to_string();
		self.debug_check();
	}

	/// Removes the character at `tail` char index `idx` from both `tail`
	/// and the corresponding position in `main`, preserving the suffix
	/// invariant. Used for auto-pair closer excision.
	pub fn excise_tail_char(&mut self, idx: usize) {
		let offset = self.accepted_chars();
		self.tail = remove_char_at(&self.tail, idx);
		self.main = remove_char_at(&self.main, offset + idx);
		if self.tail.is_empty() {
			self.main.clear();
		}
		self.debug_check();
	}

	/// Appends in-flight typing to the wait buffer.
	pub fn push_wait(&mut self, text: &str) {
		self.wait_buffer.push_str(text);
	}

	/// Trims `chars` characters off the wait buffer's tail (saturating).
	pub fn trim_wait(&mut self, chars: usize) {
		self.wait_buffer = trim_trailing_chars(&self.wait_buffer, chars).to_string();
	}

	/// Clears the wait buffer after replay.
	pub fn clear_wait(&mut self) {
		self.wait_buffer.clear();
	}

	/// Seeds the divergence accumulator if it is empty.
	pub fn seed_diverged(&mut self, seed: &str) {
		if self.diverged.is_empty() {
			self.diverged = seed.to_string();
		}
	}

	/// Extends the divergence accumulator with newly typed text.
	pub fn push_diverged(&mut self, text: &str) {
		self.diverged.push_str(text);
	}

	/// Clears the divergence accumulator (typing re-joined the suggestion).
	pub fn clear_diverged(&mut self) {
		self.diverged.clear();
	}

	fn debug_check(&self) {
		debug_assert!(
			self.main.ends_with(&self.tail),
			"tail must be a suffix of main"
		);
		debug_assert!(
			!self.main.is_empty() || self.tail.is_empty(),
			"empty main requires empty tail"
		);
		debug_assert!(
			self.tail.is_empty() == self.main.is_empty(),
			"empty tail requires main to be cleared"
		);
	}
}
