//! Edit reconciliation.
//!
//! Classifies each [`EditRecord`] against the current [`SuggestionState`]
//! and computes the next state: consume the suggestion, swap to a fallback
//! candidate, fold into the wait buffer, or invalidate and ask for a fresh
//! request. The host-facing controller executes the returned
//! [`EditOutcome`]; all buffer surgery happens here.
//!
//! Acceptance is computed from prefix arithmetic rather than the inserted
//! text alone: the invariant is that the current prefix always equals
//! `last_known_prefix` plus the accepted portion of `main`. Editor
//! auto-pairing inserts a closer *after* the cursor, so the prefix is the
//! only reliable measure of what the user actually consumed.

use crate::brackets;
use crate::chars::{char_len, take_chars, trim_trailing_chars};
use crate::delta::EditRecord;
use crate::state::SuggestionState;

/// Debounce classification of an edit, used to pick the request delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditClass {
	/// Plain same-line typing.
	Typing,
	/// A newline (plus auto-indent) from pressing Enter.
	Newline,
	/// A multi-line insertion (paste).
	CrossLine,
	/// A same-line deletion.
	Deletion,
	/// A deletion spanning lines.
	MultiLineDeletion,
}

impl EditClass {
	/// Classifies an edit record.
	pub fn of(record: &EditRecord) -> Self {
		if record.is_deletion {
			if record.same_line {
				EditClass::Deletion
			} else {
				EditClass::MultiLineDeletion
			}
		} else if record.inserted.contains('\n') {
			if is_enter_insertion(&record.inserted) {
				EditClass::Newline
			} else {
				EditClass::CrossLine
			}
		} else {
			EditClass::Typing
		}
	}

	/// Wire name for the request's action classification.
	pub fn as_str(self) -> &'static str {
		match self {
			EditClass::Typing => "typing",
			EditClass::Newline => "newline",
			EditClass::CrossLine => "cross_line",
			EditClass::Deletion => "deletion",
			EditClass::MultiLineDeletion => "multiline_deletion",
		}
	}
}

/// Pressing Enter inserts exactly one newline, optionally preceded by `\r`
/// and followed by auto-indent whitespace.
fn is_enter_insertion(text: &str) -> bool {
	match text.split_once('\n') {
		Some((before, after)) => {
			(before.is_empty() || before == "\r")
				&& !after.contains('\n')
				&& after.chars().all(|c| c == ' ' || c == '\t')
		}
		None => false,
	}
}

/// How an accepted suggestion was consumed, for telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptanceKind {
	/// Part of a suggestion was consumed before it went away.
	Partial,
	/// The suggestion was typed through completely.
	Complete,
	/// A candidate adopted via fallback search was typed through.
	Search,
}

impl AcceptanceKind {
	/// Telemetry tag for this kind.
	pub fn as_str(self) -> &'static str {
		match self {
			AcceptanceKind::Partial => "partial_completion",
			AcceptanceKind::Complete => "complete_completion",
			AcceptanceKind::Search => "search_completion",
		}
	}
}

/// An acceptance-telemetry event to report to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptanceEvent {
	/// Acceptance kind tag.
	pub kind: AcceptanceKind,
	/// Sub-reason describing what triggered the event.
	pub reason: &'static str,
	/// Characters of the suggestion that were consumed.
	pub chars: usize,
}

/// Classification of an insertion against an active suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
	/// The typed text matched the suggestion head.
	Accepted(Acceptance),
	/// The typed text left the suggestion.
	Diverged,
	/// The buffer no longer matches the reconstructed context.
	Invalidated,
}

/// Whether an acceptance consumed the whole suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
	/// Some of the suggestion remains.
	Partial,
	/// The entire suggestion was consumed.
	Full,
}

/// Buffer context for one edit pass, captured after the edit applied.
#[derive(Debug, Clone)]
pub struct EditContext<'a> {
	/// Text before the cursor, post-edit.
	pub prefix: &'a str,
	/// Whether the whole buffer is empty or whitespace.
	pub buffer_blank: bool,
	/// Whether an editor is focused.
	pub editor_active: bool,
	/// Whether the change came from undo/redo.
	pub undo_redo: bool,
}

/// What the controller should do after an edit pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditOutcome {
	/// Acceptance telemetry to report, if any.
	pub telemetry: Option<AcceptanceEvent>,
	/// Debounce class to schedule a fresh request with, if any.
	pub schedule: Option<EditClass>,
}

impl EditOutcome {
	fn none() -> Self {
		Self::default()
	}

	fn schedule(class: EditClass) -> Self {
		Self {
			telemetry: None,
			schedule: Some(class),
		}
	}
}

/// Applies one edit record to the suggestion state and reports what the
/// controller should do next.
pub fn apply_edit(state: &mut SuggestionState, record: &EditRecord, cx: &EditContext<'_>) -> EditOutcome {
	// An edit with no insertion and no deletion never changes state.
	if record.is_noop() {
		return EditOutcome::none();
	}

	// While a request is outstanding, edits fold into the wait buffer
	// instead of triggering anything.
	if state.is_in_flight() {
		if record.is_deletion {
			state.trim_wait(char_len(&record.deleted));
		} else {
			state.push_wait(&record.inserted);
		}
		tracing::trace!(wait = state.wait_buffer(), "reconcile.fold_in_flight");
		return EditOutcome::none();
	}

	if !cx.editor_active || cx.buffer_blank {
		return invalidate(state, "buffer_reset", None);
	}
	if cx.undo_redo {
		return invalidate(state, "undo_redo", None);
	}

	if !state.is_active() {
		state.set_suggestion_required(true);
		return EditOutcome::schedule(EditClass::of(record));
	}

	if record.is_deletion {
		reconcile_deletion(state, record, cx)
	} else {
		reconcile_insertion(state, record, cx)
	}
}

/// Reconciles a deletion against the active suggestion.
fn reconcile_deletion(state: &mut SuggestionState, record: &EditRecord, cx: &EditContext<'_>) -> EditOutcome {
	// Multi-line deletions always invalidate, with the longest debounce.
	if !record.same_line {
		return invalidate(state, "multiline_deletion", Some(EditClass::MultiLineDeletion));
	}

	let deleted_chars = char_len(&record.deleted);

	// Backspacing over an auto-closed pair removes both characters while
	// the prefix only loses the opener (the closer sat after the cursor),
	// so the accepted length is re-derived from the prefix itself.
	if brackets::is_auto_pair(&record.deleted)
		&& let Some(accepted) = rederived_accepted(state, cx.prefix)
	{
		if accepted < char_len(state.main()) {
			state.set_accepted(accepted);
			state.clear_diverged();
			return EditOutcome::none();
		}
		return invalidate(state, "deleted", None);
	}

	// Context check: the pre-deletion prefix must have been the accepted
	// portion of the suggestion.
	let full = format!("{}{}", state.last_known_prefix(), state.main());
	let expected = trim_trailing_chars(&full, char_len(state.tail()) + deleted_chars);
	if expected != cx.prefix {
		return invalidate(state, "context_mismatch", None);
	}

	let accepted = state.accepted_chars();
	if deleted_chars <= accepted {
		// Give the deleted characters back to the tail.
		state.set_accepted(accepted - deleted_chars);
		state.clear_diverged();
		return EditOutcome::none();
	}
	// Nothing left to give back: invalidate and re-request with the
	// longer deletion debounce.
	invalidate(state, "deleted", Some(EditClass::Deletion))
}

/// Reconciles an insertion against the active suggestion.
fn reconcile_insertion(state: &mut SuggestionState, record: &EditRecord, cx: &EditContext<'_>) -> EditOutcome {
	// Auto-pair interference: the user typed the opener the suggestion
	// starts with and the editor doubled the closer. Excise the
	// suggestion's own closer (the last balanced one) so the acceptance
	// arithmetic below sees a consistent suggestion.
	if brackets::is_auto_pair(&record.inserted)
		&& let Some(opener) = record.inserted.chars().next()
		&& state.tail().starts_with(opener)
		&& let Some(idx) = brackets::matching_index(state.tail(), 0)
	{
		tracing::trace!(index = idx, "reconcile.excise_closer");
		state.excise_tail_char(idx);
		if !state.is_active() {
			return complete(state, "auto_pair");
		}
	}

	match classify_insertion(state, cx) {
		Reconciled::Accepted(Acceptance::Full) => complete(state, "typed_through"),
		Reconciled::Accepted(Acceptance::Partial) => {
			let accepted = rederived_accepted(state, cx.prefix)
				.unwrap_or_else(|| state.accepted_chars());
			state.set_accepted(accepted);
			state.clear_diverged();
			tracing::trace!(accepted, "reconcile.accept_partial");
			EditOutcome::none()
		}
		Reconciled::Diverged => diverge(state, record),
		Reconciled::Invalidated => {
			invalidate(state, "context_mismatch", Some(EditClass::of(record)))
		}
	}
}

/// Classifies an insertion. Pure: the caller applies the verdict.
fn classify_insertion(state: &SuggestionState, cx: &EditContext<'_>) -> Reconciled {
	let Some(typed) = typed_since_adoption(state, cx.prefix) else {
		return Reconciled::Invalidated;
	};
	if !state.main().starts_with(typed) {
		return Reconciled::Diverged;
	}
	if char_len(typed) >= char_len(state.main()) {
		Reconciled::Accepted(Acceptance::Full)
	} else {
		Reconciled::Accepted(Acceptance::Partial)
	}
}

/// Text typed since the suggestion was adopted, or `None` when the prefix
/// no longer extends the last known prefix.
fn typed_since_adoption<'a>(state: &SuggestionState, prefix: &'a str) -> Option<&'a str> {
	prefix.strip_prefix(state.last_known_prefix())
}

/// Accepted-character count re-derived from the prefix.
fn rederived_accepted(state: &SuggestionState, prefix: &str) -> Option<usize> {
	let typed = typed_since_adoption(state, prefix)?;
	state.main().starts_with(typed).then(|| char_len(typed))
}

/// Handles typing that left the suggestion: accumulate the rolling
/// typed-since-divergence string and search the candidate list for a
/// fallback, excluding the rejected main suggestion.
fn diverge(state: &mut SuggestionState, record: &EditRecord) -> EditOutcome {
	let seed = take_chars(state.main(), state.accepted_chars()).to_string();
	state.seed_diverged(&seed);
	state.push_diverged(&record.inserted);

	let rejected = state.main().to_string();
	let hit = state
		.candidates()
		.iter()
		.find(|c| **c != rejected && c.starts_with(state.diverged()))
		.cloned();

	match hit {
		Some(candidate) => {
			let consumed = char_len(state.diverged());
			if consumed >= char_len(&candidate) {
				// The candidate is already fully typed out.
				let event = AcceptanceEvent {
					kind: AcceptanceKind::Search,
					reason: "candidate_switch",
					chars: consumed,
				};
				state.reset();
				tracing::debug!(chars = consumed, "reconcile.search_complete");
				EditOutcome {
					telemetry: Some(event),
					schedule: None,
				}
			} else {
				tracing::debug!(consumed, "reconcile.candidate_adopted");
				state.adopt_candidate(candidate, consumed);
				EditOutcome::none()
			}
		}
		None => invalidate(state, "diverged", Some(EditClass::of(record))),
	}
}

/// Full acceptance: emit telemetry and clear to Idle.
fn complete(state: &mut SuggestionState, reason: &'static str) -> EditOutcome {
	let kind = if state.via_search() {
		AcceptanceKind::Search
	} else {
		AcceptanceKind::Complete
	};
	let event = AcceptanceEvent {
		kind,
		reason,
		chars: char_len(state.main()),
	};
	tracing::debug!(kind = kind.as_str(), chars = event.chars, "reconcile.accept_full");
	state.reset();
	EditOutcome {
		telemetry: Some(event),
		schedule: None,
	}
}

/// Invalidation: report a partial acceptance if any characters had been
/// consumed, reset, and optionally ask for a fresh request.
fn invalidate(state: &mut SuggestionState, reason: &'static str, schedule: Option<EditClass>) -> EditOutcome {
	let consumed = state.accepted_chars();
	let telemetry = (state.is_active() && consumed > 0).then(|| AcceptanceEvent {
		kind: AcceptanceKind::Partial,
		reason,
		chars: consumed,
	});
	if state.is_active() {
		tracing::debug!(reason, consumed, "reconcile.reset");
	}
	state.reset();
	if schedule.is_some() {
		state.set_suggestion_required(true);
	}
	EditOutcome {
		telemetry,
		schedule,
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use uuid::Uuid;

	use super::*;
	use crate::delta::Position;

	fn insert(text: &str) -> EditRecord {
		EditRecord {
			start: Position::new(0, 0),
			end: Position::new(0, 0),
			inserted: text.to_string(),
			deleted: String::new(),
			is_deletion: false,
			same_line: !text.contains('\n'),
		}
	}

	fn delete(text: &str, same_line: bool) -> EditRecord {
		EditRecord {
			start: Position::new(0, 0),
			end: Position::new(0, 0),
			inserted: String::new(),
			deleted: text.to_string(),
			is_deletion: true,
			same_line,
		}
	}

	fn cx(prefix: &str) -> EditContext<'_> {
		EditContext {
			prefix,
			buffer_blank: false,
			editor_active: true,
			undo_redo: false,
		}
	}

	fn active_state(prefix: &str, main: &str, candidates: &[&str]) -> SuggestionState {
		let mut state = SuggestionState::new();
		state.begin_request(Uuid::new_v4(), prefix.to_string());
		state.finish_request();
		state.adopt(
			main.to_string(),
			candidates.iter().map(|c| c.to_string()).collect(),
			0,
			false,
		);
		state
	}

	#[test]
	fn test_noop_edit_never_changes_state() {
		let mut state = active_state("fn f", "unction()", &[]);
		let before = format!("{:?}", state);
		let outcome = apply_edit(&mut state, &insert(""), &cx("fn f"));
		assert_eq!(outcome, EditOutcome::default());
		assert_eq!(format!("{:?}", state), before);
	}

	#[test]
	fn test_idle_insert_schedules_typing() {
		let mut state = SuggestionState::new();
		let outcome = apply_edit(&mut state, &insert("f"), &cx("f"));
		assert_eq!(outcome.schedule, Some(EditClass::Typing));
		assert!(state.suggestion_required());
	}

	#[test]
	fn test_idle_newline_schedules_newline() {
		let mut state = SuggestionState::new();
		let outcome = apply_edit(&mut state, &insert("\n    "), &cx("x\n    "));
		assert_eq!(outcome.schedule, Some(EditClass::Newline));
	}

	#[test]
	fn test_idle_paste_schedules_cross_line() {
		let mut state = SuggestionState::new();
		let outcome = apply_edit(&mut state, &insert("a\nb\nc"), &cx("a\nb\nc"));
		assert_eq!(outcome.schedule, Some(EditClass::CrossLine));
	}

	#[test]
	fn test_blank_buffer_resets() {
		let mut state = active_state("fn f", "unction()", &[]);
		let context = EditContext {
			buffer_blank: true,
			..cx("")
		};
		let outcome = apply_edit(&mut state, &delete("f", true), &context);
		assert!(!state.is_active());
		assert_eq!(outcome.schedule, None);
	}

	#[test]
	fn test_undo_resets() {
		let mut state = active_state("fn f", "unction()", &[]);
		let context = EditContext {
			undo_redo: true,
			..cx("fn ")
		};
		apply_edit(&mut state, &delete("f", true), &context);
		assert!(!state.is_active());
	}

	#[test]
	fn test_partial_acceptance_slices_tail() {
		let mut state = active_state("fn f", "unction()", &[]);
		let outcome = apply_edit(&mut state, &insert("unc"), &cx("fn func"));
		assert_eq!(state.tail(), "tion()");
		assert_eq!(state.main(), "unction()");
		assert_eq!(outcome.telemetry, None);
	}

	#[test]
	fn test_type_through_round_trip() {
		let main = "unction()";
		let mut state = active_state("fn f", main, &[]);
		let mut prefix = "fn f".to_string();
		let mut events = Vec::new();
		for c in main.chars() {
			prefix.push(c);
			let outcome = apply_edit(&mut state, &insert(&c.to_string()), &cx(&prefix));
			events.extend(outcome.telemetry);
		}
		assert_eq!(state.tail(), "");
		assert!(!state.is_active());
		assert_eq!(events.len(), 1);
		assert_eq!(events[0].kind, AcceptanceKind::Complete);
		assert_eq!(events[0].chars, 9);
	}

	#[test]
	fn test_auto_pair_excision_completes_suggestion() {
		// Scenario 2: accept "unction", then type "(" with an auto ")".
		let mut state = active_state("fn f", "unction()", &[]);
		apply_edit(&mut state, &insert("unction"), &cx("fn function"));
		assert_eq!(state.tail(), "()");

		let outcome = apply_edit(&mut state, &insert("()"), &cx("fn function("));
		assert!(!state.is_active());
		let event = outcome.telemetry.unwrap();
		assert_eq!(event.kind, AcceptanceKind::Complete);
	}

	#[test]
	fn test_excision_picks_last_balanced_closer() {
		let mut state = active_state("x = ", "(foo(bar))", &[]);
		apply_edit(&mut state, &insert("()"), &cx("x = ("));
		assert_eq!(state.tail(), "foo(bar)");
		assert_eq!(state.main(), "(foo(bar)");
	}

	#[test]
	fn test_divergence_adopts_candidate() {
		let mut state = active_state("fn f", "unction()", &["ull_name", "ancy"]);
		let outcome = apply_edit(&mut state, &insert("a"), &cx("fn fa"));
		assert_eq!(state.main(), "ancy");
		assert_eq!(state.tail(), "ncy");
		assert!(state.via_search());
		assert_eq!(outcome.schedule, None);
	}

	#[test]
	fn test_divergence_search_includes_accepted_portion() {
		let mut state = active_state("fn f", "unction()", &["unwrap", "union"]);
		apply_edit(&mut state, &insert("un"), &cx("fn fun"));
		// "unw" no longer matches main; diverged = accepted "un" + "w".
		apply_edit(&mut state, &insert("w"), &cx("fn funw"));
		assert_eq!(state.main(), "unwrap");
		assert_eq!(state.tail(), "rap");
	}

	#[test]
	fn test_divergence_without_match_resets_and_schedules() {
		let mut state = active_state("fn f", "unction()", &[]);
		apply_edit(&mut state, &insert("unc"), &cx("fn func"));
		let outcome = apply_edit(&mut state, &insert("x"), &cx("fn funcx"));
		assert!(!state.is_active());
		assert_eq!(outcome.schedule, Some(EditClass::Typing));
		let event = outcome.telemetry.unwrap();
		assert_eq!(event.kind, AcceptanceKind::Partial);
		assert_eq!(event.chars, 3);
	}

	#[test]
	fn test_search_adopted_candidate_completes_as_search() {
		let mut state = active_state("fn f", "unction()", &["ancy"]);
		apply_edit(&mut state, &insert("a"), &cx("fn fa"));
		let mut prefix = "fn fa".to_string();
		let mut events = Vec::new();
		for c in "ncy".chars() {
			prefix.push(c);
			let outcome = apply_edit(&mut state, &insert(&c.to_string()), &cx(&prefix));
			events.extend(outcome.telemetry);
		}
		assert_eq!(events.len(), 1);
		assert_eq!(events[0].kind, AcceptanceKind::Search);
	}

	#[test]
	fn test_deletion_gives_characters_back() {
		let mut state = active_state("fn f", "unction()", &[]);
		apply_edit(&mut state, &insert("unc"), &cx("fn func"));
		assert_eq!(state.tail(), "tion()");

		let outcome = apply_edit(&mut state, &delete("c", true), &cx("fn fun"));
		assert_eq!(state.tail(), "ction()");
		assert_eq!(outcome.schedule, None);
	}

	#[test]
	fn test_deletion_past_accepted_resets_with_longer_delay() {
		let mut state = active_state("fn f", "unction()", &[]);
		apply_edit(&mut state, &insert("u"), &cx("fn fu"));
		let outcome = apply_edit(&mut state, &delete("fu", true), &cx("fn "));
		assert!(!state.is_active());
		assert_eq!(outcome.schedule, Some(EditClass::Deletion));
	}

	#[test]
	fn test_deletion_context_mismatch_resets() {
		let mut state = active_state("fn f", "unction()", &[]);
		apply_edit(&mut state, &insert("unc"), &cx("fn func"));
		// Prefix claims something unrelated was deleted.
		let outcome = apply_edit(&mut state, &delete("q", true), &cx("zz zzzz"));
		assert!(!state.is_active());
		assert_eq!(outcome.schedule, None);
	}

	#[test]
	fn test_multi_line_deletion_always_resets() {
		// Scenario 4: a 2-character deletion spanning two lines.
		let mut state = active_state("fn f", "unction()", &[]);
		apply_edit(&mut state, &insert("unc"), &cx("fn func"));
		let outcome = apply_edit(&mut state, &delete("c\n", false), &cx("fn fun"));
		assert!(!state.is_active());
		assert_eq!(outcome.schedule, Some(EditClass::MultiLineDeletion));
	}

	#[test]
	fn test_auto_pair_deletion_rederives_acceptance() {
		// The user accepted "unction" then typed "()" themselves past the
		// suggestion's own pair; backspacing the pair re-derives the
		// accepted length from the prefix.
		let mut state = active_state("fn f", "unction()xy", &[]);
		apply_edit(&mut state, &insert("unction()"), &cx("fn function()"));
		assert_eq!(state.tail(), "xy");

		let outcome = apply_edit(&mut state, &delete("()", true), &cx("fn function"));
		assert_eq!(state.tail(), "()xy");
		assert_eq!(outcome.schedule, None);
	}

	#[test]
	fn test_in_flight_edits_fold_into_wait_buffer() {
		let mut state = SuggestionState::new();
		state.begin_request(Uuid::new_v4(), "fn ".to_string());
		apply_edit(&mut state, &insert("fo"), &cx("fn fo"));
		apply_edit(&mut state, &delete("o", true), &cx("fn f"));
		assert_eq!(state.wait_buffer(), "f");
		assert!(state.is_in_flight());
	}

	#[test]
	fn test_suffix_invariant_holds_through_edits() {
		let mut state = active_state("fn f", "unction()", &["ull"]);
		let mut prefix = "fn f".to_string();
		for c in "unct".chars() {
			prefix.push(c);
			apply_edit(&mut state, &insert(&c.to_string()), &cx(&prefix));
			if state.is_active() {
				assert!(state.main().ends_with(state.tail()));
			}
		}
	}
}
