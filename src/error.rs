//! Error types for pattern compilation, route registration, and navigation.
//!
//! Structural errors (`PatternError`, `MatcherError`) are synchronous
//! failures at the call that caused them. Recoverable navigation outcomes
//! (`NavigationFailure`) are typed values returned from `push`/`replace`,
//! not errors; only terminal conditions (`NavigationError`) reject a
//! navigation and reach the registered error handlers.

use std::sync::Arc;

use thiserror::Error;

/// Opaque error raised by user guard code.
pub type GuardError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while tokenizing, compiling, or stringifying a path pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
	/// The pattern does not start with `/`.
	#[error("pattern \"{0}\" must start with '/'")]
	MissingLeadingSlash(String),
	/// A `:` introduced a parameter with no usable name.
	#[error("empty parameter name in pattern \"{0}\"")]
	EmptyParamName(String),
	/// A `(` custom regexp was never closed.
	#[error("unfinished custom regexp for parameter \"{0}\"")]
	UnfinishedCustomRegExp(String),
	/// The pattern ends in a dangling `\` escape.
	#[error("trailing escape at the end of pattern \"{0}\"")]
	TrailingEscape(String),
	/// A repeatable or optional parameter shares its segment with another token.
	#[error("repeatable or optional parameter \"{0}\" must be alone in its segment")]
	ParamNotAlone(String),
	/// The custom regexp of a parameter does not compile.
	#[error("invalid custom regexp for parameter \"{name}\": {message}")]
	InvalidRegExp {
		/// The parameter carrying the regexp.
		name: String,
		/// Compilation error reported by the regex engine.
		message: String,
	},
	/// The assembled pattern regex could not be built.
	#[error("failed to compile pattern regex: {0}")]
	RegexBuild(String),
	/// `stringify` was called without a value for a required parameter.
	#[error("missing required parameter \"{0}\"")]
	MissingParam(String),
	/// An array value was supplied for a non-repeatable parameter.
	#[error("parameter \"{0}\" is not repeatable and cannot take an array value")]
	NonRepeatableArray(String),
}

/// Errors raised by the matcher table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatcherError {
	/// A different record already owns this route name.
	#[error("a route named \"{0}\" is already registered")]
	DuplicateName(String),
	/// `add_route_under` referenced a name that is not registered.
	#[error("no route named \"{0}\" to nest under")]
	UnknownParent(String),
	/// A by-name resolution referenced a name that is not registered.
	#[error("no route named \"{0}\"")]
	UnknownName(String),
	/// A location with neither name nor path was resolved against a
	/// current location that has no matched record to be relative to.
	#[error("cannot resolve a relative location without a current match")]
	NoRelativeBase,
	/// Pattern compilation or stringification failed.
	#[error(transparent)]
	Pattern(#[from] PatternError),
}

/// Recoverable navigation outcomes.
///
/// These are returned as `Ok(Some(failure))` from `push`/`replace` and are
/// also handed to after-guards; they never reach the error handlers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationFailure {
	/// A guard returned [`GuardVerdict::Abort`](crate::router::GuardVerdict::Abort).
	#[error("navigation aborted from \"{from}\" to \"{to}\" via a navigation guard")]
	Aborted {
		/// Full path of the departed location.
		from: String,
		/// Full path of the rejected target.
		to: String,
	},
	/// A newer navigation superseded this one while its guards were running.
	#[error("navigation cancelled from \"{from}\" to \"{to}\" with a new navigation")]
	Cancelled {
		/// Full path of the departed location.
		from: String,
		/// Full path of the superseded target.
		to: String,
	},
	/// The target is route-equal to the current location.
	#[error("avoided redundant navigation to current location \"{to}\"")]
	Duplicated {
		/// Full path of the redundant target.
		to: String,
	},
}

impl NavigationFailure {
	/// Whether this failure is a cancellation by a superseding navigation.
	pub fn is_cancelled(&self) -> bool {
		matches!(self, Self::Cancelled { .. })
	}
}

/// Terminal navigation errors.
///
/// These reject the navigation, are dispatched to the registered error
/// handlers, and settle any pending ready-waiters.
#[derive(Debug, Clone, Error)]
pub enum NavigationError {
	/// A redirect chain exceeded the hop limit.
	#[error("infinite redirect in navigation guard from \"{from}\" to \"{to}\"")]
	InfiniteRedirect {
		/// Full path of the departed location.
		from: String,
		/// Full path of the last redirect target.
		to: String,
	},
	/// A guard returned an error.
	#[error("unexpected error during navigation: {0}")]
	Guard(Arc<dyn std::error::Error + Send + Sync>),
	/// The raw target could not be resolved.
	#[error(transparent)]
	Matcher(#[from] MatcherError),
}

impl From<GuardError> for NavigationError {
	fn from(err: GuardError) -> Self {
		Self::Guard(Arc::from(err))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_pattern_error_display() {
		assert_eq!(
			PatternError::MissingParam("id".to_string()).to_string(),
			"missing required parameter \"id\""
		);
		assert_eq!(
			PatternError::NonRepeatableArray("id".to_string()).to_string(),
			"parameter \"id\" is not repeatable and cannot take an array value"
		);
	}

	#[test]
	fn test_matcher_error_display() {
		assert_eq!(
			MatcherError::DuplicateName("home".to_string()).to_string(),
			"a route named \"home\" is already registered"
		);
	}

	#[test]
	fn test_navigation_failure_kind() {
		let failure = NavigationFailure::Cancelled {
			from: "/".to_string(),
			to: "/users".to_string(),
		};
		assert!(failure.is_cancelled());
		assert!(
			!NavigationFailure::Duplicated {
				to: "/".to_string()
			}
			.is_cancelled()
		);
	}

	#[test]
	fn test_guard_error_conversion() {
		let boxed: GuardError = "guard blew up".into();
		let err = NavigationError::from(boxed);
		assert!(err.to_string().contains("guard blew up"));
	}
}
