//! Character-indexed string helpers.
//!
//! All engine arithmetic is in characters, never bytes; host editors report
//! column positions in characters and suggestions may contain multi-byte
//! text.

/// Returns the number of characters in `s`.
pub(crate) fn char_len(s: &str) -> usize {
	s.chars().count()
}

/// Byte offset of the `n`-th character, or `s.len()` when past the end.
fn byte_at(s: &str, n: usize) -> usize {
	s.char_indices().nth(n).map_or(s.len(), |(i, _)| i)
}

/// Returns `s` without its first `n` characters.
pub(crate) fn skip_chars(s: &str, n: usize) -> &str {
	&s[byte_at(s, n)..]
}

/// Returns the first `n` characters of `s`.
pub(crate) fn take_chars(s: &str, n: usize) -> &str {
	&s[..byte_at(s, n)]
}

/// Returns `s` without its last `n` characters (saturating).
pub(crate) fn trim_trailing_chars(s: &str, n: usize) -> &str {
	take_chars(s, char_len(s).saturating_sub(n))
}

/// Removes the character at char index `idx`, returning the new string.
pub(crate) fn remove_char_at(s: &str, idx: usize) -> String {
	let start = byte_at(s, idx);
	let end = byte_at(s, idx + 1);
	let mut out = String::with_capacity(s.len());
	out.push_str(&s[..start]);
	out.push_str(&s[end..]);
	out
}
