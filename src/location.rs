//! Location model: path parameters, query strings, raw navigation targets,
//! and fully resolved locations.
//!
//! A navigation starts from a [`RawLocation`] (a path string or a structured
//! [`LocationTarget`]) and ends in a [`ResolvedLocation`]: the normalized
//! path/query/hash triple plus the ordered chain of matched route records.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::history::EntryState;
use crate::matcher::RouteRecord;

/// A single path parameter value.
///
/// Repeatable parameters capture the ordered list of segments they consumed;
/// every other parameter captures exactly one string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
	/// One captured segment.
	Single(String),
	/// Ordered captures of a repeatable parameter.
	List(Vec<String>),
}

impl ParamValue {
	/// Returns the single captured value, if this is not a list.
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::Single(value) => Some(value),
			Self::List(_) => None,
		}
	}

	/// Joins the captures with `/`, the form they had in the path.
	pub fn join(&self) -> String {
		match self {
			Self::Single(value) => value.clone(),
			Self::List(values) => values.join("/"),
		}
	}
}

impl From<&str> for ParamValue {
	fn from(value: &str) -> Self {
		Self::Single(value.to_string())
	}
}

impl From<String> for ParamValue {
	fn from(value: String) -> Self {
		Self::Single(value)
	}
}

impl From<Vec<String>> for ParamValue {
	fn from(values: Vec<String>) -> Self {
		Self::List(values)
	}
}

/// Extracted path parameters, keyed by parameter name.
pub type Params = BTreeMap<String, ParamValue>;

/// A parsed query string.
///
/// Pairs keep their order; equality is pair-for-pair, which matches the
/// "same stringified query" rule used by the duplicate-navigation check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
	pairs: Vec<(String, String)>,
}

impl Query {
	/// Creates an empty query.
	pub fn new() -> Self {
		Self::default()
	}

	/// Parses a query string (without the leading `?`).
	///
	/// Undecodable input is tolerated: the offending string is dropped with
	/// a warning rather than failing the navigation.
	pub fn parse(search: &str) -> Self {
		if search.is_empty() {
			return Self::default();
		}
		match serde_urlencoded::from_str::<Vec<(String, String)>>(search) {
			Ok(pairs) => Self { pairs },
			Err(err) => {
				tracing::warn!(search, %err, "discarding undecodable query string");
				Self::default()
			}
		}
	}

	/// Serializes back to a query string (without the leading `?`).
	pub fn stringify(&self) -> String {
		serde_urlencoded::to_string(&self.pairs).unwrap_or_default()
	}

	/// Returns the first value for `key`.
	pub fn get(&self, key: &str) -> Option<&str> {
		self.pairs
			.iter()
			.find(|(name, _)| name == key)
			.map(|(_, value)| value.as_str())
	}

	/// Returns every value for `key`, in order.
	pub fn get_all(&self, key: &str) -> Vec<&str> {
		self.pairs
			.iter()
			.filter(|(name, _)| name == key)
			.map(|(_, value)| value.as_str())
			.collect()
	}

	/// Appends a pair.
	pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.pairs.push((key.into(), value.into()));
		self
	}

	/// Whether the query holds no pairs.
	pub fn is_empty(&self) -> bool {
		self.pairs.is_empty()
	}

	/// Iterates over the pairs in order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.pairs
			.iter()
			.map(|(name, value)| (name.as_str(), value.as_str()))
	}
}

impl FromIterator<(String, String)> for Query {
	fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
		Self {
			pairs: iter.into_iter().collect(),
		}
	}
}

/// Splits a full path into its `(path, query, hash)` components.
///
/// The hash starts at the first `#` and keeps it; the query sits between the
/// first `?` before the hash and the hash itself.
pub fn parse_full_path(full_path: &str) -> (String, Query, String) {
	let (before_hash, hash) = match full_path.find('#') {
		Some(index) => (&full_path[..index], full_path[index..].to_string()),
		None => (full_path, String::new()),
	};
	let (path, search) = match before_hash.find('?') {
		Some(index) => (&before_hash[..index], &before_hash[index + 1..]),
		None => (before_hash, ""),
	};
	(path.to_string(), Query::parse(search), hash)
}

/// Joins path, query, and hash back into a full path.
pub fn build_full_path(path: &str, query: &Query, hash: &str) -> String {
	let mut full = String::from(path);
	let search = query.stringify();
	if !search.is_empty() {
		full.push('?');
		full.push_str(&search);
	}
	full.push_str(hash);
	full
}

/// A structured navigation target.
///
/// Either `name` or `path` identifies the destination; with neither set the
/// target is relative to the current location (same record, new params).
#[derive(Debug, Clone, Default)]
pub struct LocationTarget {
	/// Name of the destination record.
	pub name: Option<String>,
	/// Absolute destination path.
	pub path: Option<String>,
	/// Path parameters for named or relative targets.
	pub params: Params,
	/// Query of the destination.
	pub query: Query,
	/// Hash of the destination, including the leading `#` when present.
	pub hash: String,
	/// Commit with `replace` instead of `push`.
	pub replace: bool,
	/// Bypass the duplicate-navigation check.
	pub force: bool,
	/// Extra state merged into the persisted history entry.
	pub state: Option<EntryState>,
}

impl LocationTarget {
	/// Creates a target addressing a named record.
	pub fn named(name: impl Into<String>) -> Self {
		Self {
			name: Some(name.into()),
			..Self::default()
		}
	}

	/// Creates a target addressing an absolute path.
	pub fn path(path: impl Into<String>) -> Self {
		Self {
			path: Some(path.into()),
			..Self::default()
		}
	}

	/// Adds a path parameter.
	pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
		self.params.insert(name.into(), value.into());
		self
	}

	/// Sets the query.
	pub fn with_query(mut self, query: Query) -> Self {
		self.query = query;
		self
	}

	/// Sets the hash (a leading `#` is added when missing).
	pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
		let hash = hash.into();
		self.hash = if hash.is_empty() || hash.starts_with('#') {
			hash
		} else {
			format!("#{hash}")
		};
		self
	}

	/// Commits with `replace` instead of `push`.
	pub fn with_replace(mut self) -> Self {
		self.replace = true;
		self
	}

	/// Bypasses the duplicate-navigation check.
	pub fn with_force(mut self) -> Self {
		self.force = true;
		self
	}

	/// Merges extra state into the persisted history entry.
	pub fn with_state(mut self, state: EntryState) -> Self {
		self.state = Some(state);
		self
	}
}

/// Any value accepted as a navigation target.
#[derive(Debug, Clone)]
pub enum RawLocation {
	/// A full path string, optionally carrying `?query` and `#hash`.
	Path(String),
	/// A structured target.
	Target(LocationTarget),
}

impl From<&str> for RawLocation {
	fn from(path: &str) -> Self {
		Self::Path(path.to_string())
	}
}

impl From<String> for RawLocation {
	fn from(path: String) -> Self {
		Self::Path(path)
	}
}

impl From<LocationTarget> for RawLocation {
	fn from(target: LocationTarget) -> Self {
		Self::Target(target)
	}
}

/// A fully resolved location.
///
/// Produced fresh on every resolution; `matched` is the ordered ancestor
/// chain of records (root-most first) whose combined patterns produced
/// `path`.
#[derive(Debug, Clone)]
pub struct ResolvedLocation {
	/// Normalized path.
	pub path: String,
	/// Path plus stringified query plus hash.
	pub full_path: String,
	/// Hash, including the leading `#` when present.
	pub hash: String,
	/// Parsed query.
	pub query: Query,
	/// Extracted path parameters.
	pub params: Params,
	/// Name of the deepest matched record.
	pub name: Option<String>,
	/// Ordered ancestor chain of matched records, root-most first.
	pub matched: Vec<Arc<RouteRecord>>,
	/// The location this navigation was redirected away from, if any.
	pub redirected_from: Option<Box<ResolvedLocation>>,
}

impl ResolvedLocation {
	/// The location every router starts at before its first navigation.
	pub fn start() -> Self {
		Self {
			path: "/".to_string(),
			full_path: "/".to_string(),
			hash: String::new(),
			query: Query::new(),
			params: Params::new(),
			name: None,
			matched: Vec::new(),
			redirected_from: None,
		}
	}

	/// Returns the matched record at the given nesting depth, if any.
	///
	/// Depth 0 is the root-most record; hosts use this to render the right
	/// handler into each nested view slot.
	pub fn record_at_depth(&self, depth: usize) -> Option<&Arc<RouteRecord>> {
		self.matched.get(depth)
	}

	/// Returns the deepest matched record, if any.
	pub fn deepest(&self) -> Option<&Arc<RouteRecord>> {
		self.matched.last()
	}

	/// Route equality: same deepest record, same params, same stringified
	/// query, same hash. This is the duplicate-navigation test.
	pub fn same_route_location(&self, other: &Self) -> bool {
		match (self.deepest(), other.deepest()) {
			(Some(a), Some(b)) => {
				RouteRecord::is_same_record(a, b)
					&& self.params == other.params
					&& self.query.stringify() == other.query.stringify()
					&& self.hash == other.hash
			}
			_ => false,
		}
	}
}

impl fmt::Display for ResolvedLocation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.full_path)
	}
}
