//! Response reconciliation: wait-buffer replay.
//!
//! A prediction response arrives asynchronously against a buffer that may
//! have moved on. It is untrusted until its id matches the outstanding
//! request and the current prefix equals the requested prefix plus the
//! wait buffer; only then is the suggestion adopted, with any in-flight
//! typing replayed against it.

use uuid::Uuid;

use crate::brackets;
use crate::chars::{char_len, remove_char_at};
use crate::state::SuggestionState;

/// A prediction response, decoded from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionResponse {
	/// Id echoed from the request, if the backend supplied one.
	pub id: Option<Uuid>,
	/// The primary suggestion text.
	pub message: String,
	/// Alternative candidate suggestions.
	pub message_list: Vec<String>,
	/// Backend cooldown in seconds when the request was rate limited.
	pub rate_limit: Option<u64>,
}

/// Buffer context at the moment the response is applied.
#[derive(Debug, Clone)]
pub struct ReplayContext<'a> {
	/// Current text before the cursor.
	pub prefix: &'a str,
	/// Whether a rate-limit window is active.
	pub rate_limited: bool,
}

/// Result of replaying a response against the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replay {
	/// A suggestion was adopted and should be surfaced.
	Adopted,
	/// The response was dropped; the reason names why.
	Discarded(&'static str),
}

/// Validates and applies a response to the suggestion state.
pub fn apply_response(state: &mut SuggestionState, resp: &PredictionResponse, cx: &ReplayContext<'_>) -> Replay {
	// A response nobody asked for must not touch the state.
	let Some(outstanding) = state.request_id() else {
		return Replay::Discarded("no_request");
	};
	if resp.id != Some(outstanding) {
		tracing::debug!(?resp.id, expected = %outstanding, "response.drop_stale");
		state.finish_request();
		state.reset();
		return Replay::Discarded("stale_id");
	}
	state.finish_request();

	if cx.rate_limited {
		state.reset();
		return Replay::Discarded("rate_limited");
	}

	let expected = format!("{}{}", state.requested_prefix(), state.wait_buffer());
	if cx.prefix != expected {
		tracing::debug!("response.drop_prefix_mismatch");
		state.reset();
		return Replay::Discarded("prefix_mismatch");
	}

	let primary = normalize_message(&resp.message);
	if primary.trim().is_empty() {
		state.reset();
		return Replay::Discarded("empty_message");
	}

	let wait = state.wait_buffer().to_string();
	state.clear_wait();

	if wait.is_empty() {
		state.adopt(primary, resp.message_list.clone(), 0, false);
		return Replay::Adopted;
	}

	let consumed = char_len(&wait);

	// The user kept typing the head of the suggestion while it was in
	// flight: slice the typed part off.
	if primary.starts_with(&wait) {
		if consumed >= char_len(&primary) {
			state.reset();
			return Replay::Discarded("already_typed");
		}
		state.adopt(primary, resp.message_list.clone(), consumed, false);
		return Replay::Adopted;
	}

	// Candidate fallback, same search as divergence handling.
	let hit = resp
		.message_list
		.iter()
		.find(|c| **c != primary && c.starts_with(&wait))
		.cloned();
	if let Some(candidate) = hit {
		if consumed >= char_len(&candidate) {
			state.reset();
			return Replay::Discarded("already_typed");
		}
		state.adopt(candidate, resp.message_list.clone(), consumed, true);
		return Replay::Adopted;
	}

	// The in-flight typing was an auto-pair: excise the suggestion's own
	// closer and count the opener as consumed.
	if brackets::is_auto_pair(&wait)
		&& let Some(opener) = wait.chars().next()
		&& primary.starts_with(opener)
		&& let Some(idx) = brackets::matching_index(&primary, 0)
	{
		let excised = remove_char_at(&primary, idx);
		if char_len(&excised) > 1 {
			state.adopt(excised, resp.message_list.clone(), 1, false);
			return Replay::Adopted;
		}
	}

	state.reset();
	Replay::Discarded("wait_mismatch")
}

/// Joins a blank first line with the second so the surfaced suggestion
/// does not lead with an empty line.
fn normalize_message(message: &str) -> String {
	match message.split_once('\n') {
		Some((first, rest)) if first.trim().is_empty() && !rest.is_empty() => {
			format!("{first}{rest}")
		}
		_ => message.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	fn response(id: Uuid, message: &str, list: &[&str]) -> PredictionResponse {
		PredictionResponse {
			id: Some(id),
			message: message.to_string(),
			message_list: list.iter().map(|c| c.to_string()).collect(),
			rate_limit: None,
		}
	}

	fn pending(prefix: &str) -> (SuggestionState, Uuid) {
		let mut state = SuggestionState::new();
		let id = Uuid::new_v4();
		state.begin_request(id, prefix.to_string());
		(state, id)
	}

	fn cx(prefix: &str) -> ReplayContext<'_> {
		ReplayContext {
			prefix,
			rate_limited: false,
		}
	}

	#[test]
	fn test_adopts_with_empty_wait_buffer() {
		let (mut state, id) = pending("fn f");
		let replay = apply_response(&mut state, &response(id, "unction()", &["ull"]), &cx("fn f"));
		assert_eq!(replay, Replay::Adopted);
		assert_eq!(state.main(), "unction()");
		assert_eq!(state.tail(), "unction()");
		assert_eq!(state.last_known_prefix(), "fn f");
		assert_eq!(state.candidates(), ["ull".to_string()]);
		assert!(!state.is_in_flight());
	}

	#[test]
	fn test_stale_id_resets_pending_state() {
		let (mut state, _id) = pending("fn f");
		let replay = apply_response(&mut state, &response(Uuid::new_v4(), "x", &[]), &cx("fn f"));
		assert_eq!(replay, Replay::Discarded("stale_id"));
		assert!(!state.is_active());
		assert!(!state.is_in_flight());
	}

	#[test]
	fn test_unrequested_response_never_mutates_state() {
		let mut state = SuggestionState::new();
		state.begin_request(Uuid::new_v4(), "fn f".to_string());
		state.finish_request();
		state.adopt("unction()".to_string(), Vec::new(), 0, false);

		let before = format!("{:?}", state);
		let replay = apply_response(&mut state, &response(Uuid::new_v4(), "x", &[]), &cx("fn f"));
		assert_eq!(replay, Replay::Discarded("no_request"));
		assert_eq!(format!("{:?}", state), before);
	}

	#[test]
	fn test_rate_limited_discards() {
		let (mut state, id) = pending("fn f");
		let context = ReplayContext {
			prefix: "fn f",
			rate_limited: true,
		};
		let replay = apply_response(&mut state, &response(id, "unction()", &[]), &context);
		assert_eq!(replay, Replay::Discarded("rate_limited"));
		assert!(!state.is_active());
	}

	#[test]
	fn test_prefix_mismatch_discards() {
		let (mut state, id) = pending("fn f");
		let replay = apply_response(&mut state, &response(id, "unction()", &[]), &cx("fn q"));
		assert_eq!(replay, Replay::Discarded("prefix_mismatch"));
		assert!(!state.is_active());
	}

	#[test]
	fn test_wait_buffer_sliced_off_suggestion() {
		let (mut state, id) = pending("fn f");
		state.push_wait("unc");
		let replay = apply_response(&mut state, &response(id, "unction()", &[]), &cx("fn func"));
		assert_eq!(replay, Replay::Adopted);
		assert_eq!(state.main(), "unction()");
		assert_eq!(state.tail(), "tion()");
		assert_eq!(state.wait_buffer(), "");
	}

	#[test]
	fn test_wait_buffer_candidate_fallback() {
		let (mut state, id) = pending("fn f");
		state.push_wait("ba");
		let replay = apply_response(&mut state, &response(id, "foo", &["foo", "bar"]), &cx("fn fba"));
		assert_eq!(replay, Replay::Adopted);
		assert_eq!(state.main(), "bar");
		assert_eq!(state.tail(), "r");
		assert!(state.via_search());
	}

	#[test]
	fn test_wait_buffer_auto_pair_excision() {
		let (mut state, id) = pending("x = ");
		state.push_wait("()");
		let replay = apply_response(&mut state, &response(id, "(a, b)", &[]), &cx("x = ()"));
		assert_eq!(replay, Replay::Adopted);
		assert_eq!(state.main(), "(a, b");
		assert_eq!(state.tail(), "a, b");
	}

	#[test]
	fn test_wait_buffer_mismatch_discards() {
		let (mut state, id) = pending("fn f");
		state.push_wait("zz");
		let replay = apply_response(&mut state, &response(id, "unction()", &[]), &cx("fn fzz"));
		assert_eq!(replay, Replay::Discarded("wait_mismatch"));
		assert!(!state.is_active());
		assert_eq!(state.wait_buffer(), "");
	}

	#[test]
	fn test_fully_typed_suggestion_discarded() {
		let (mut state, id) = pending("fn f");
		state.push_wait("oo");
		let replay = apply_response(&mut state, &response(id, "oo", &[]), &cx("fn foo"));
		assert_eq!(replay, Replay::Discarded("already_typed"));
		assert!(!state.is_active());
	}

	#[test]
	fn test_empty_message_discarded() {
		let (mut state, id) = pending("fn f");
		let replay = apply_response(&mut state, &response(id, "  \n", &[]), &cx("fn f"));
		assert_eq!(replay, Replay::Discarded("empty_message"));
	}

	#[test]
	fn test_blank_first_line_joined() {
		assert_eq!(normalize_message("\nbar"), "bar");
		assert_eq!(normalize_message("  \n\tbar\nbaz"), "  \tbar\nbaz");
		assert_eq!(normalize_message("foo\nbar"), "foo\nbar");
		assert_eq!(normalize_message("plain"), "plain");
	}
}
