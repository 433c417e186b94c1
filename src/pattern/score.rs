//! Specificity scoring for compiled patterns.
//!
//! Every token contributes one number to its segment's score list; a
//! compiled pattern's score is the list of per-segment lists. Comparing two
//! scores lexicographically, segment by segment and token by token, decides
//! which pattern wins when both could match the same path.

use std::cmp::Ordering;

/// Fixed score of the bare root segment.
pub(crate) const ROOT: i32 = 9000;
/// Base contribution of any token.
pub(crate) const SEGMENT: i32 = 4000;
/// Bonus for a static token.
pub(crate) const STATIC: i32 = 4000;
/// Bonus for a parameter token.
pub(crate) const DYNAMIC: i32 = 2000;
/// Bonus for a parameter with a custom regexp.
pub(crate) const BONUS_CUSTOM_REGEXP: i32 = 1000;
/// Penalty for a wildcard-like custom regexp (`.*`); also cancels the
/// custom-regexp bonus.
pub(crate) const BONUS_WILDCARD: i32 = -4000 - BONUS_CUSTOM_REGEXP;
/// Penalty for a repeatable parameter.
pub(crate) const BONUS_REPEATABLE: i32 = -2000;
/// Penalty for an optional parameter.
pub(crate) const BONUS_OPTIONAL: i32 = -800;
/// Tie-break bonus for strict matching, smaller than any structural
/// difference.
pub(crate) const BONUS_STRICT: i32 = 70;
/// Tie-break bonus for case-sensitive matching, smaller than any structural
/// difference.
pub(crate) const BONUS_CASE_SENSITIVE: i32 = 25;

/// Compares two single-segment score lists. `Less` means `a` ranks first.
fn compare_segment_scores(a: &[i32], b: &[i32]) -> Ordering {
	for (score_a, score_b) in a.iter().zip(b.iter()) {
		match score_b.cmp(score_a) {
			Ordering::Equal => continue,
			ordering => return ordering,
		}
	}
	// Shared prefix is equal. A lone bare static token ranks before a longer
	// sub-segmented list; any other shorter list ranks after.
	match a.len().cmp(&b.len()) {
		Ordering::Less => {
			if a.len() == 1 && a[0] == STATIC + SEGMENT {
				Ordering::Less
			} else {
				Ordering::Greater
			}
		}
		Ordering::Greater => {
			if b.len() == 1 && b[0] == STATIC + SEGMENT {
				Ordering::Greater
			} else {
				Ordering::Less
			}
		}
		Ordering::Equal => Ordering::Equal,
	}
}

fn last_score_is_negative(score: &[Vec<i32>]) -> bool {
	score
		.last()
		.and_then(|segment| segment.last())
		.is_some_and(|last| *last < 0)
}

/// Compares two full pattern scores. `Less` means `a` is more specific and
/// must be tried first.
pub(crate) fn compare_scores(a: &[Vec<i32>], b: &[Vec<i32>]) -> Ordering {
	for (segment_a, segment_b) in a.iter().zip(b.iter()) {
		match compare_segment_scores(segment_a, segment_b) {
			Ordering::Equal => continue,
			ordering => return ordering,
		}
	}
	// When the segment counts differ by exactly one, a trailing
	// wildcard-like segment ranks the candidate last so single catch-all
	// segments do not shadow nested static children.
	if a.len().abs_diff(b.len()) == 1 {
		if last_score_is_negative(a) {
			return Ordering::Greater;
		}
		if last_score_is_negative(b) {
			return Ordering::Less;
		}
	}
	b.len().cmp(&a.len())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::pattern::compiler::{CompiledPattern, PatternOptions};
	use crate::pattern::token::tokenize;

	fn score_of(pattern: &str) -> Vec<Vec<i32>> {
		CompiledPattern::compile(tokenize(pattern).unwrap(), &PatternOptions::default())
			.unwrap()
			.score
	}

	fn ranks_first(a: &str, b: &str) {
		let score_a = score_of(a);
		let score_b = score_of(b);
		assert_eq!(
			compare_scores(&score_a, &score_b),
			Ordering::Less,
			"expected {a} to rank before {b}"
		);
		assert_eq!(
			compare_scores(&score_b, &score_a),
			Ordering::Greater,
			"expected {b} to rank after {a}"
		);
	}

	#[test]
	fn test_static_beats_param() {
		ranks_first("/users/new", "/users/:id");
	}

	#[test]
	fn test_sub_segment_beats_bare_param() {
		ranks_first("/:a-:b", "/:a");
	}

	#[test]
	fn test_custom_regexp_beats_default_param() {
		ranks_first("/:id(\\d+)", "/:id");
	}

	#[test]
	fn test_wildcard_ranks_below_default_param() {
		ranks_first("/:id", "/:path(.*)");
	}

	#[test]
	fn test_root_beats_catch_all() {
		ranks_first("/", "/:catchAll(.*)*");
	}

	#[test]
	fn test_nested_static_beats_trailing_catch_all() {
		ranks_first("/users/new", "/users/:rest(.*)*");
	}

	#[test]
	fn test_trailing_catch_all_ranks_below_shorter_parent() {
		// One-segment length difference with a trailing negative score:
		// the wildcard candidate ranks last even though it is longer.
		ranks_first("/users", "/users/:rest(.*)*");
	}

	#[test]
	fn test_longer_chain_wins_without_wildcard() {
		ranks_first("/users/list/all", "/users/list");
	}

	#[test]
	fn test_optional_ranks_below_required() {
		ranks_first("/users/:id", "/users/:id?");
	}

	#[test]
	fn test_repeatable_ranks_below_required() {
		ranks_first("/users/:id", "/users/:ids+");
	}

	#[test]
	fn test_equal_patterns_compare_equal() {
		let score = score_of("/users/:id");
		assert_eq!(compare_scores(&score, &score), Ordering::Equal);
	}
}
