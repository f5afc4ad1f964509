//! Edit delta extraction.
//!
//! Host editors report changes as a range plus replacement text, against a
//! buffer that has already mutated. The deleted text is not supplied, so it
//! is reconstructed here by slicing the pre-change text with the reported
//! range. The reconciliation engine only reasons about single contiguous
//! edits; anything else is surfaced as an error and resets the suggestion.

use crate::chars::{char_len, skip_chars, take_chars};
use crate::{Error, Result};

/// A character coordinate in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Position {
	/// Zero-based line.
	pub line: usize,
	/// Zero-based character column within the line.
	pub col: usize,
}

impl Position {
	/// Creates a position from line and column.
	pub fn new(line: usize, col: usize) -> Self {
		Self { line, col }
	}
}

/// Why a change notification was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeReason {
	/// A plain edit (typing, paste, deletion).
	#[default]
	Edit,
	/// An undo step.
	Undo,
	/// A redo step.
	Redo,
}

impl ChangeReason {
	/// Undo and redo cannot be reconciled incrementally.
	pub fn is_undo_redo(self) -> bool {
		matches!(self, ChangeReason::Undo | ChangeReason::Redo)
	}
}

/// One contiguous change within a notification, as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChange {
	/// Start of the replaced range (pre-change coordinates).
	pub start: Position,
	/// End of the replaced range (pre-change coordinates).
	pub end: Position,
	/// Replacement text (empty for a pure deletion).
	pub text: String,
}

/// A buffer-change notification from the host editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
	/// The changes bundled into this notification.
	pub changes: Vec<ContentChange>,
	/// Why the buffer changed.
	pub reason: ChangeReason,
}

/// A normalized, single-edit record. Ephemeral: one per notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRecord {
	/// Start of the edited range.
	pub start: Position,
	/// End of the edited range.
	pub end: Position,
	/// Text inserted at `start` (empty for deletions).
	pub inserted: String,
	/// Text removed between `start` and `end`, reconstructed from the
	/// pre-change buffer (empty for insertions).
	pub deleted: String,
	/// Whether the edit removed text.
	pub is_deletion: bool,
	/// Whether the edit is confined to a single line.
	pub same_line: bool,
}

impl EditRecord {
	/// An edit that neither inserted nor deleted anything.
	pub fn is_noop(&self) -> bool {
		self.inserted.is_empty() && self.deleted.is_empty()
	}
}

/// Normalizes a change notification into an [`EditRecord`].
///
/// `pre_text` is the full buffer content from before the change and
/// `line_sep` the buffer's line separator.
///
/// # Errors
///
/// - [`Error::MultipleChanges`] when the notification bundles more than one
///   discontiguous change.
/// - [`Error::Replacement`] when a single change both removes a range and
///   inserts text.
/// - [`Error::RangeOutOfBounds`] when the reported range does not fit the
///   pre-change text.
pub fn extract(notification: &ChangeNotification, pre_text: &str, line_sep: &str) -> Result<EditRecord> {
	if notification.changes.len() != 1 {
		return Err(Error::MultipleChanges(notification.changes.len()));
	}
	let change = &notification.changes[0];

	let spans_range = change.start != change.end;
	if spans_range && !change.text.is_empty() {
		return Err(Error::Replacement);
	}

	let deleted = if spans_range {
		slice_range(pre_text, line_sep, change.start, change.end)?
	} else {
		String::new()
	};

	let same_line = change.start.line == change.end.line && !change.text.contains('\n');

	Ok(EditRecord {
		start: change.start,
		end: change.end,
		inserted: change.text.clone(),
		is_deletion: !deleted.is_empty(),
		deleted,
		same_line,
	})
}

/// Slices `[start, end)` out of `pre_text`.
///
/// Same-line ranges slice one line; multi-line ranges concatenate the start
/// line's tail, all interior lines, and the end line's head, joined by
/// `line_sep`.
fn slice_range(pre_text: &str, line_sep: &str, start: Position, end: Position) -> Result<String> {
	let lines: Vec<&str> = pre_text.split(line_sep).collect();
	let line_at = |n: usize| -> Result<&str> {
		lines.get(n).copied().ok_or(Error::RangeOutOfBounds { line: n })
	};

	if start.line == end.line {
		let line = line_at(start.line)?;
		if end.col > char_len(line) || start.col > end.col {
			return Err(Error::RangeOutOfBounds { line: start.line });
		}
		return Ok(skip_chars(take_chars(line, end.col), start.col).to_string());
	}

	let first = line_at(start.line)?;
	let last = line_at(end.line)?;
	if start.col > char_len(first) || end.col > char_len(last) || start.line > end.line {
		return Err(Error::RangeOutOfBounds { line: end.line });
	}

	let mut parts = Vec::with_capacity(end.line - start.line + 1);
	parts.push(skip_chars(first, start.col));
	for n in start.line + 1..end.line {
		parts.push(line_at(n)?);
	}
	parts.push(take_chars(last, end.col));
	Ok(parts.join(line_sep))
}
