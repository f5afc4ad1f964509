//! Bracket and quote pair matching.
//!
//! Pure scan functions used to reconcile editor auto-pairing with a pending
//! suggestion: when the user types an opener and the editor inserts the
//! closer, the suggestion's own closer has to be located and excised.
//!
//! # Matching Rules
//!
//! Brackets are matched with a depth counter: a same-type opener increments,
//! a closer decrements. The scan does not stop at the first balance point;
//! it continues to the end of the string and reports the *last* index where
//! the depth returned to zero. When the bracket type repeats
//! (`"(a)(b)"` from index 0) the reported match is the final closer.
//!
//! Quotes have no nesting. They match the next unescaped identical quote,
//! scanning forward first and falling back to a backward scan.

/// The two-character tokens editors insert as auto-pairs.
const AUTO_PAIRS: [&str; 5] = ["()", "{}", "[]", "\"\"", "''"];

/// Returns true when `s` is exactly one auto-pair token.
pub fn is_auto_pair(s: &str) -> bool {
	AUTO_PAIRS.contains(&s)
}

fn closer_of(open: char) -> Option<char> {
	match open {
		'(' => Some(')'),
		'{' => Some('}'),
		'[' => Some(']'),
		_ => None,
	}
}

fn opener_of(close: char) -> Option<char> {
	match close {
		')' => Some('('),
		'}' => Some('{'),
		']' => Some('['),
		_ => None,
	}
}

/// Finds the character index matching the bracket or quote at char index
/// `index`, or `None` when the character is not pairable or has no match.
pub fn matching_index(s: &str, index: usize) -> Option<usize> {
	let chars: Vec<char> = s.chars().collect();
	let c = *chars.get(index)?;

	if let Some(close) = closer_of(c) {
		return scan_forward(&chars, index, c, close);
	}
	if let Some(open) = opener_of(c) {
		return scan_backward(&chars, index, open, c);
	}
	if c == '"' || c == '\'' {
		return match_quote(&chars, index, c);
	}
	None
}

fn scan_forward(chars: &[char], index: usize, open: char, close: char) -> Option<usize> {
	let mut depth = 0i32;
	let mut last_balanced = None;
	for (i, &c) in chars.iter().enumerate().skip(index) {
		if c == open {
			depth += 1;
		} else if c == close {
			depth -= 1;
			if depth == 0 {
				last_balanced = Some(i);
			}
		}
	}
	last_balanced
}

fn scan_backward(chars: &[char], index: usize, open: char, close: char) -> Option<usize> {
	let mut depth = 0i32;
	let mut last_balanced = None;
	for i in (0..=index).rev() {
		let c = chars[i];
		if c == close {
			depth += 1;
		} else if c == open {
			depth -= 1;
			if depth == 0 {
				last_balanced = Some(i);
			}
		}
	}
	last_balanced
}

fn match_quote(chars: &[char], index: usize, quote: char) -> Option<usize> {
	for (i, &c) in chars.iter().enumerate().skip(index + 1) {
		if c == quote && !is_escaped(chars, i) {
			return Some(i);
		}
	}
	for i in (0..index).rev() {
		if chars[i] == quote && !is_escaped(chars, i) {
			return Some(i);
		}
	}
	None
}

/// A character is escaped when preceded by an odd run of backslashes.
fn is_escaped(chars: &[char], index: usize) -> bool {
	let mut backslashes = 0;
	for i in (0..index).rev() {
		if chars[i] == '\\' {
			backslashes += 1;
		} else {
			break;
		}
	}
	backslashes % 2 == 1
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn test_simple_pair() {
		assert_eq!(matching_index("(a)", 0), Some(2));
		assert_eq!(matching_index("(a)", 2), Some(0));
	}

	#[test]
	fn test_nested_same_type_reports_last_balance() {
		// Depth returns to zero at 2 and again at 5; the last one wins.
		assert_eq!(matching_index("(a)(b)", 0), Some(5));
	}

	#[test]
	fn test_deeply_nested() {
		let s = "(foo(bar))";
		assert_eq!(matching_index(s, 0), Some(9));
		assert_eq!(matching_index(s, 4), Some(8));
	}

	#[test]
	fn test_backward_scan() {
		let s = "{a{b}c}";
		assert_eq!(matching_index(s, 6), Some(0));
		assert_eq!(matching_index(s, 4), Some(2));
	}

	#[test]
	fn test_unmatched_returns_none() {
		assert_eq!(matching_index("(abc", 0), None);
		assert_eq!(matching_index("abc)", 3), None);
	}

	#[test]
	fn test_non_pairable_char() {
		assert_eq!(matching_index("abc", 1), None);
		assert_eq!(matching_index("abc", 10), None);
	}

	#[test]
	fn test_quote_forward() {
		assert_eq!(matching_index("\"abc\"", 0), Some(4));
		assert_eq!(matching_index("'x'", 0), Some(2));
	}

	#[test]
	fn test_quote_skips_escaped() {
		assert_eq!(matching_index(r#""a\"b""#, 0), Some(5));
		assert_eq!(matching_index(r#""a\\""#, 0), Some(4));
	}

	#[test]
	fn test_quote_backward_fallback() {
		assert_eq!(matching_index("\"abc\"", 4), Some(0));
	}

	#[test]
	fn test_quote_unmatched() {
		assert_eq!(matching_index("\"abc", 0), None);
	}

	#[test]
	fn test_auto_pair_tokens() {
		for token in ["()", "{}", "[]", "\"\"", "''"] {
			assert!(is_auto_pair(token));
		}
		assert!(!is_auto_pair("("));
		assert!(!is_auto_pair("(]"));
		assert!(!is_auto_pair("(())"));
	}

	#[test]
	fn test_mixed_brackets_ignored_in_depth() {
		// Only the same bracket type participates in the depth count.
		assert_eq!(matching_index("([)]", 0), Some(2));
	}
}
