//! Path pattern tokenizer.
//!
//! Turns a pattern string such as `/users/:id(\\d+)/posts/:rest*` into a
//! list of segments (split on `/`) of typed tokens. A single left-to-right
//! scan with an explicit state machine; no backtracking.

use crate::error::PatternError;

/// One token of a path pattern segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
	/// Literal text, matched verbatim.
	Static {
		/// The literal text.
		value: String,
	},
	/// A named parameter.
	Param {
		/// Parameter name, `[A-Za-z0-9_]+`.
		name: String,
		/// Custom regexp body from `(...)`, if given.
		regexp: Option<String>,
		/// `+` or `*`: the parameter may capture several `/`-joined values.
		repeatable: bool,
		/// `?` or `*`: the parameter may be absent.
		optional: bool,
	},
}

/// An ordered list of tokens between two `/` separators.
pub type Segment = Vec<Token>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
	Static,
	Param,
	ParamRegExp,
	ParamRegExpEnd,
	EscapeNext,
}

fn is_param_char(c: char) -> bool {
	c.is_ascii_alphanumeric() || c == '_'
}

struct Tokenizer<'p> {
	pattern: &'p str,
	state: State,
	previous_state: State,
	buffer: String,
	custom_re: String,
	segment: Option<Segment>,
	segments: Vec<Segment>,
	// last consumed character, examined for trailing modifiers
	char: char,
}

impl<'p> Tokenizer<'p> {
	fn new(pattern: &'p str) -> Self {
		Self {
			pattern,
			state: State::Static,
			previous_state: State::Static,
			buffer: String::new(),
			custom_re: String::new(),
			segment: None,
			segments: Vec::new(),
			char: '\0',
		}
	}

	fn finalize_segment(&mut self) {
		if let Some(segment) = self.segment.take() {
			self.segments.push(segment);
		}
		self.segment = Some(Vec::new());
	}

	fn push_token(&mut self, token: Token) -> Result<(), PatternError> {
		let segment = self.segment.get_or_insert_with(Vec::new);
		// A repeatable or optional param owns its whole segment, on either
		// side: nothing before it, nothing after it.
		if let Some(Token::Param {
			name,
			repeatable,
			optional,
			..
		}) = segment.last()
			&& (*repeatable || *optional)
		{
			return Err(PatternError::ParamNotAlone(name.clone()));
		}
		if let Token::Param {
			name,
			repeatable,
			optional,
			..
		} = &token
			&& (*repeatable || *optional)
			&& !segment.is_empty()
		{
			return Err(PatternError::ParamNotAlone(name.clone()));
		}
		segment.push(token);
		Ok(())
	}

	fn consume_buffer(&mut self) -> Result<(), PatternError> {
		match self.state {
			State::Static => {
				if !self.buffer.is_empty() {
					let value = std::mem::take(&mut self.buffer);
					self.push_token(Token::Static { value })?;
				}
			}
			State::Param | State::ParamRegExp | State::ParamRegExpEnd => {
				if self.buffer.is_empty() {
					return Err(PatternError::EmptyParamName(self.pattern.to_string()));
				}
				let name = std::mem::take(&mut self.buffer);
				let regexp = if self.custom_re.is_empty() {
					None
				} else {
					Some(self.custom_re.clone())
				};
				let repeatable = self.char == '*' || self.char == '+';
				let optional = self.char == '*' || self.char == '?';
				self.push_token(Token::Param {
					name,
					regexp,
					repeatable,
					optional,
				})?;
			}
			State::EscapeNext => {
				return Err(PatternError::TrailingEscape(self.pattern.to_string()));
			}
		}
		Ok(())
	}

	fn run(mut self) -> Result<Vec<Segment>, PatternError> {
		let chars: Vec<char> = self.pattern.chars().collect();
		let mut i = 0;
		while i < chars.len() {
			self.char = chars[i];
			i += 1;
			if self.char == '\\' && self.state != State::ParamRegExp {
				self.previous_state = self.state;
				self.state = State::EscapeNext;
				continue;
			}
			match self.state {
				State::Static => {
					if self.char == '/' {
						self.consume_buffer()?;
						self.finalize_segment();
					} else if self.char == ':' {
						self.consume_buffer()?;
						self.state = State::Param;
					} else {
						self.buffer.push(self.char);
					}
				}
				State::EscapeNext => {
					self.buffer.push(self.char);
					self.state = self.previous_state;
				}
				State::Param => {
					if self.char == '(' {
						self.state = State::ParamRegExp;
					} else if is_param_char(self.char) {
						self.buffer.push(self.char);
					} else {
						// The name ended; a trailing modifier is absorbed,
						// any other character is re-examined as static text.
						self.consume_buffer()?;
						self.state = State::Static;
						if self.char != '*' && self.char != '?' && self.char != '+' {
							i -= 1;
						}
					}
				}
				State::ParamRegExp => {
					if self.char == ')' {
						// `\)` stays part of the regexp body
						if self.custom_re.ends_with('\\') {
							self.custom_re.pop();
							self.custom_re.push(')');
						} else {
							self.state = State::ParamRegExpEnd;
						}
					} else {
						self.custom_re.push(self.char);
					}
				}
				State::ParamRegExpEnd => {
					self.consume_buffer()?;
					self.custom_re.clear();
					self.state = State::Static;
					if self.char != '*' && self.char != '?' && self.char != '+' {
						i -= 1;
					}
				}
			}
		}
		if self.state == State::ParamRegExp {
			return Err(PatternError::UnfinishedCustomRegExp(self.buffer.clone()));
		}
		self.consume_buffer()?;
		self.finalize_segment();
		Ok(self.segments)
	}
}

/// Tokenizes a path pattern into segments.
///
/// An empty pattern and `/` both yield one empty root segment.
///
/// # Errors
///
/// Returns [`PatternError`] when the pattern does not start with `/`, a
/// parameter has an empty name, a custom regexp is unterminated, or a
/// repeatable/optional parameter shares a segment with another token.
pub fn tokenize(pattern: &str) -> Result<Vec<Segment>, PatternError> {
	if pattern.is_empty() {
		return Ok(vec![Vec::new()]);
	}
	if !pattern.starts_with('/') {
		return Err(PatternError::MissingLeadingSlash(pattern.to_string()));
	}
	Tokenizer::new(pattern).run()
}
