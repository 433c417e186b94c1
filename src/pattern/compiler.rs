//! Pattern compiler.
//!
//! Turns a tokenized pattern into a [`CompiledPattern`]: an anchored regex,
//! the ordered parameter descriptors aligned to its capture groups, the
//! multi-dimensional specificity score, and the `parse`/`stringify` pair.
//!
//! Invariant: `stringify(parse(p)) == p` for any path `p` the pattern
//! matches, except paths that omit optional parameters, which normalize to
//! the canonical form with those parameters empty.

use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};

use crate::error::PatternError;
use crate::location::{ParamValue, Params};
use crate::pattern::score;
use crate::pattern::token::{Segment, Token};

/// Default parameter pattern: one or more non-slash characters.
const BASE_PARAM_PATTERN: &str = "[^/]+";

/// Maximum allowed size for a compiled pattern regex, in bytes.
const MAX_REGEX_SIZE: usize = 1 << 20; // 1 MiB

/// Compilation options for a path pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternOptions {
	/// Match case-sensitively.
	pub sensitive: bool,
	/// Disallow a trailing slash the pattern does not declare.
	pub strict: bool,
	/// Anchor the pattern at the end of the path.
	pub end: bool,
}

impl Default for PatternOptions {
	fn default() -> Self {
		Self {
			sensitive: false,
			strict: false,
			end: true,
		}
	}
}

impl PatternOptions {
	/// Sets case-sensitive matching.
	pub fn with_sensitive(mut self, sensitive: bool) -> Self {
		self.sensitive = sensitive;
		self
	}

	/// Sets strict trailing-slash matching.
	pub fn with_strict(mut self, strict: bool) -> Self {
		self.strict = strict;
		self
	}

	/// Sets whether the pattern is anchored at the end of the path.
	pub fn with_end(mut self, end: bool) -> Self {
		self.end = end;
		self
	}
}

/// One parameter descriptor, aligned to the regex capture group of the same
/// index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamKey {
	/// Parameter name.
	pub name: String,
	/// Whether the parameter captures several `/`-joined values.
	pub repeatable: bool,
	/// Whether the parameter may be absent.
	pub optional: bool,
}

/// A compiled path pattern. Immutable once built.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
	re: Regex,
	/// Ordered parameter descriptors.
	pub keys: Vec<ParamKey>,
	/// Per-segment score lists, compared lexicographically for ranking.
	pub score: Vec<Vec<i32>>,
	segments: Vec<Segment>,
}

impl CompiledPattern {
	/// Compiles a tokenized pattern.
	///
	/// # Errors
	///
	/// Returns [`PatternError::InvalidRegExp`] when a custom parameter
	/// regexp does not compile, or [`PatternError::RegexBuild`] when the
	/// assembled pattern exceeds the size limit.
	pub fn compile(
		segments: Vec<Segment>,
		options: &PatternOptions,
	) -> Result<Self, PatternError> {
		let mut pattern = String::from("^");
		let mut keys = Vec::new();
		let mut score: Vec<Vec<i32>> = Vec::new();

		for segment in &segments {
			let mut segment_scores: Vec<i32> = if segment.is_empty() {
				vec![score::ROOT]
			} else {
				Vec::new()
			};
			if options.strict && segment.is_empty() {
				pattern.push('/');
			}
			for (token_index, token) in segment.iter().enumerate() {
				let mut sub_score = score::SEGMENT
					+ if options.sensitive {
						score::BONUS_CASE_SENSITIVE
					} else {
						0
					};
				match token {
					Token::Static { value } => {
						if token_index == 0 {
							pattern.push('/');
						}
						pattern.push_str(&regex::escape(value));
						sub_score += score::STATIC;
					}
					Token::Param {
						name,
						regexp,
						repeatable,
						optional,
					} => {
						keys.push(ParamKey {
							name: name.clone(),
							repeatable: *repeatable,
							optional: *optional,
						});
						let re = regexp.as_deref().unwrap_or(BASE_PARAM_PATTERN);
						if re != BASE_PARAM_PATTERN {
							sub_score += score::BONUS_CUSTOM_REGEXP;
							Regex::new(&format!("({re})")).map_err(|err| {
								PatternError::InvalidRegExp {
									name: name.clone(),
									message: err.to_string(),
								}
							})?;
						}
						let mut sub_pattern = if *repeatable {
							format!("((?:{re})(?:/(?:{re}))*)")
						} else {
							format!("({re})")
						};
						if token_index == 0 {
							// fold the separator into the group of a lone
							// optional param so the whole segment may vanish
							sub_pattern = if *optional && segment.len() < 2 {
								format!("(?:/{sub_pattern})")
							} else {
								format!("/{sub_pattern}")
							};
						}
						if *optional {
							sub_pattern.push('?');
						}
						pattern.push_str(&sub_pattern);
						sub_score += score::DYNAMIC;
						if *optional {
							sub_score += score::BONUS_OPTIONAL;
						}
						if *repeatable {
							sub_score += score::BONUS_REPEATABLE;
						}
						if re == ".*" {
							sub_score += score::BONUS_WILDCARD;
						}
					}
				}
				segment_scores.push(sub_score);
			}
			score.push(segment_scores);
		}

		if options.strict && options.end
			&& let Some(last) = score.last_mut().and_then(|scores| scores.last_mut())
		{
			*last += score::BONUS_STRICT;
		}
		if !options.strict {
			pattern.push_str("/?");
		}
		if options.end {
			pattern.push('$');
		} else if options.strict && !pattern.ends_with('/') {
			pattern.push_str("(?:/|$)");
		}

		let re = RegexBuilder::new(&pattern)
			.case_insensitive(!options.sensitive)
			.size_limit(MAX_REGEX_SIZE)
			.build()
			.map_err(|err| PatternError::RegexBuild(err.to_string()))?;

		Ok(Self {
			re,
			keys,
			score,
			segments,
		})
	}

	/// Whether the pattern matches `path`.
	pub fn is_match(&self, path: &str) -> bool {
		self.re.is_match(path)
	}

	/// Extracts parameters from a matching path, or `None` when the path
	/// does not match.
	pub fn parse(&self, path: &str) -> Option<Params> {
		let captures = self.re.captures(path)?;
		let mut params = Params::new();
		for (index, key) in self.keys.iter().enumerate() {
			let value = captures
				.get(index + 1)
				.map(|capture| capture.as_str())
				.unwrap_or("");
			let value = if key.repeatable && !value.is_empty() {
				ParamValue::List(value.split('/').map(str::to_string).collect())
			} else {
				ParamValue::Single(value.to_string())
			};
			params.insert(key.name.clone(), value);
		}
		Some(params)
	}

	/// Builds the canonical path for the given parameters.
	///
	/// # Errors
	///
	/// Returns [`PatternError::MissingParam`] when a required parameter is
	/// absent and [`PatternError::NonRepeatableArray`] when a list value is
	/// supplied for a non-repeatable parameter.
	pub fn stringify(&self, params: &Params) -> Result<String, PatternError> {
		let mut path = String::new();
		// set when a lone empty optional param swallowed its separator
		let mut avoid_duplicated_slash = false;
		for segment in &self.segments {
			if !avoid_duplicated_slash || !path.ends_with('/') {
				path.push('/');
			}
			avoid_duplicated_slash = false;
			for token in segment {
				match token {
					Token::Static { value } => path.push_str(value),
					Token::Param {
						name,
						repeatable,
						optional,
						..
					} => {
						let text = match params.get(name) {
							Some(ParamValue::List(values)) => {
								if !repeatable {
									return Err(PatternError::NonRepeatableArray(name.clone()));
								}
								values.join("/")
							}
							Some(ParamValue::Single(value)) => value.clone(),
							None => String::new(),
						};
						if text.is_empty() {
							if !optional {
								return Err(PatternError::MissingParam(name.clone()));
							}
							if segment.len() < 2 {
								if path.ends_with('/') {
									path.pop();
								} else {
									avoid_duplicated_slash = true;
								}
							}
						}
						path.push_str(&text);
					}
				}
			}
		}
		if path.is_empty() {
			Ok("/".to_string())
		} else {
			Ok(path)
		}
	}

	/// Ranks this pattern against another; `Less` means `self` must be
	/// tried first.
	pub fn compare(&self, other: &Self) -> Ordering {
		score::compare_scores(&self.score, &other.score)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::pattern::token::tokenize;
	use rstest::rstest;

	fn compile(pattern: &str) -> CompiledPattern {
		CompiledPattern::compile(tokenize(pattern).unwrap(), &PatternOptions::default()).unwrap()
	}

	fn compile_with(pattern: &str, options: PatternOptions) -> CompiledPattern {
		CompiledPattern::compile(tokenize(pattern).unwrap(), &options).unwrap()
	}

	fn single(value: &str) -> ParamValue {
		ParamValue::Single(value.to_string())
	}

	#[test]
	fn test_compile_static() {
		let pattern = compile("/users/list");
		assert!(pattern.is_match("/users/list"));
		assert!(pattern.is_match("/users/list/"));
		assert!(!pattern.is_match("/users/list/all"));
		assert!(pattern.keys.is_empty());
	}

	#[test]
	fn test_compile_param_extraction() {
		let pattern = compile("/users/:id");
		let params = pattern.parse("/users/42").unwrap();
		assert_eq!(params.get("id"), Some(&single("42")));
		assert!(pattern.parse("/users").is_none());
	}

	#[test]
	fn test_compile_sub_segment_params() {
		let pattern = compile("/:a-:b");
		let params = pattern.parse("/x-y").unwrap();
		assert_eq!(params.get("a"), Some(&single("x")));
		assert_eq!(params.get("b"), Some(&single("y")));
	}

	#[test]
	fn test_compile_custom_regexp() {
		let pattern = compile("/users/:id(\\d+)");
		assert!(pattern.is_match("/users/42"));
		assert!(!pattern.is_match("/users/posts"));
	}

	#[test]
	fn test_compile_invalid_custom_regexp() {
		let result = CompiledPattern::compile(
			tokenize("/users/:id([)").unwrap(),
			&PatternOptions::default(),
		);
		assert!(matches!(result, Err(PatternError::InvalidRegExp { .. })));
	}

	#[test]
	fn test_compile_repeatable() {
		let pattern = compile("/files/:chapters+");
		let params = pattern.parse("/files/a/b/c").unwrap();
		assert_eq!(
			params.get("chapters"),
			Some(&ParamValue::List(vec![
				"a".to_string(),
				"b".to_string(),
				"c".to_string()
			]))
		);
		assert!(!pattern.is_match("/files"));
	}

	#[test]
	fn test_compile_optional() {
		let pattern = compile("/users/:id?");
		assert!(pattern.is_match("/users"));
		assert!(pattern.is_match("/users/42"));
		let params = pattern.parse("/users").unwrap();
		assert_eq!(params.get("id"), Some(&single("")));
	}

	#[test]
	fn test_compile_catch_all() {
		let pattern = compile("/:pathMatch(.*)*");
		assert!(pattern.is_match("/"));
		assert!(pattern.is_match("/a/b/c"));
		let params = pattern.parse("/a/b/c").unwrap();
		assert_eq!(
			params.get("pathMatch"),
			Some(&ParamValue::List(vec![
				"a".to_string(),
				"b".to_string(),
				"c".to_string()
			]))
		);
	}

	#[test]
	fn test_case_sensitivity() {
		let insensitive = compile("/Users");
		assert!(insensitive.is_match("/users"));

		let sensitive = compile_with("/Users", PatternOptions::default().with_sensitive(true));
		assert!(!sensitive.is_match("/users"));
		assert!(sensitive.is_match("/Users"));
	}

	#[test]
	fn test_strict_trailing_slash() {
		let strict = compile_with("/users", PatternOptions::default().with_strict(true));
		assert!(strict.is_match("/users"));
		assert!(!strict.is_match("/users/"));
	}

	#[test]
	fn test_non_anchored_end() {
		let prefix = compile_with("/users", PatternOptions::default().with_end(false));
		assert!(prefix.is_match("/users/42/posts"));
	}

	#[test]
	fn test_stringify_simple() {
		let pattern = compile("/users/:id");
		let mut params = Params::new();
		params.insert("id".to_string(), single("42"));
		assert_eq!(pattern.stringify(&params).unwrap(), "/users/42");
	}

	#[test]
	fn test_stringify_missing_param() {
		let pattern = compile("/users/:id");
		assert!(matches!(
			pattern.stringify(&Params::new()),
			Err(PatternError::MissingParam(_))
		));
	}

	#[test]
	fn test_stringify_non_repeatable_array() {
		let pattern = compile("/users/:id");
		let mut params = Params::new();
		params.insert(
			"id".to_string(),
			ParamValue::List(vec!["1".to_string(), "2".to_string()]),
		);
		assert!(matches!(
			pattern.stringify(&params),
			Err(PatternError::NonRepeatableArray(_))
		));
	}

	#[test]
	fn test_stringify_omitted_optional() {
		let pattern = compile("/users/:id?");
		assert_eq!(pattern.stringify(&Params::new()).unwrap(), "/users");
	}

	#[test]
	fn test_stringify_root() {
		let pattern = compile("/");
		assert_eq!(pattern.stringify(&Params::new()).unwrap(), "/");
	}

	#[rstest]
	#[case("/users/:id", "/users/42")]
	#[case("/:a-:b", "/x-y")]
	#[case("/files/:chapters+", "/files/a/b/c")]
	#[case("/users/:id(\\d+)/posts/:slug", "/users/7/posts/intro")]
	fn test_round_trip(#[case] pattern: &str, #[case] path: &str) {
		let compiled = compile(pattern);
		let params = compiled.parse(path).unwrap();
		assert_eq!(compiled.stringify(&params).unwrap(), path);
	}
}
