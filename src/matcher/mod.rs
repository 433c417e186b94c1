//! Route record tree and matcher table.
//!
//! The [`MatcherTable`] exclusively owns every compiled matcher in an
//! arena indexed by [`MatcherId`]; parent, child, and alias relations are
//! ids, never owning references, so the record forest stays cycle-free.
//! Resolution lists are kept sorted by the ranking comparator at insertion,
//! so a first-match scan always selects the most specific pattern.

pub mod record;

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::MatcherError;
use crate::location::Params;
use crate::pattern::{CompiledPattern, PatternOptions, tokenize};

pub use record::{DEFAULT_VIEW, RedirectTarget, RouteRecord, ViewHandle};

/// Stable identifier of a matcher node inside its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatcherId(usize);

/// A compiled record in the tree.
struct RecordMatcher {
	pattern: CompiledPattern,
	record: Arc<RouteRecord>,
	parent: Option<MatcherId>,
	/// Owned children, most specific first.
	children: Vec<MatcherId>,
	/// Alias matchers that must be removed together with this one.
	aliases: Vec<MatcherId>,
}

/// What a raw location resolves against the table.
#[derive(Debug, Clone)]
pub enum ResolveTarget<'a> {
	/// Match a path against the compiled patterns.
	Path(&'a str),
	/// Look a record up by name and synthesize its path.
	Named {
		/// Route name.
		name: &'a str,
		/// Params for the destination pattern.
		params: &'a Params,
	},
	/// Stay on the current record with new params.
	Relative {
		/// Params overlaid over the current ones.
		params: &'a Params,
	},
}

/// Result of a table resolution.
///
/// An empty `matched` list means nothing matched; the table treats that as
/// a non-fatal outcome and leaves it to the caller to surface.
#[derive(Debug, Clone)]
pub struct MatchedLocation {
	/// Ordered ancestor chain of matched records, root-most first.
	pub matched: Vec<Arc<RouteRecord>>,
	/// Extracted or synthesized params.
	pub params: Params,
	/// Normalized path.
	pub path: String,
	/// Name of the deepest matched record.
	pub name: Option<String>,
}

impl MatchedLocation {
	/// An unmatched location for the given path.
	pub fn unmatched(path: impl Into<String>) -> Self {
		Self {
			matched: Vec::new(),
			params: Params::new(),
			path: path.into(),
			name: None,
		}
	}
}

/// The mutable route forest plus its name index.
pub struct MatcherTable {
	arena: Vec<Option<RecordMatcher>>,
	/// Every matchable node, most specific first. Path resolution scans
	/// this list and stops at the first hit.
	matchers: Vec<MatcherId>,
	/// Top-level nodes, most specific first.
	root: Vec<MatcherId>,
	names: HashMap<String, MatcherId>,
	defaults: PatternOptions,
}

impl MatcherTable {
	/// Creates an empty table with the given pattern defaults.
	pub fn new(defaults: PatternOptions) -> Self {
		Self {
			arena: Vec::new(),
			matchers: Vec::new(),
			root: Vec::new(),
			names: HashMap::new(),
			defaults,
		}
	}

	fn node(&self, id: MatcherId) -> &RecordMatcher {
		self.arena[id.0].as_ref().expect("stale matcher id")
	}

	fn node_mut(&mut self, id: MatcherId) -> &mut RecordMatcher {
		self.arena[id.0].as_mut().expect("stale matcher id")
	}

	/// Registers a record (and, recursively, its aliases and children) at
	/// the top level.
	pub fn add_route(&mut self, record: RouteRecord) -> Result<MatcherId, MatcherError> {
		self.add_record(record, None, &[])
	}

	/// Registers a record nested under the named parent.
	pub fn add_route_under(
		&mut self,
		parent_name: &str,
		record: RouteRecord,
	) -> Result<MatcherId, MatcherError> {
		let parent = *self
			.names
			.get(parent_name)
			.ok_or_else(|| MatcherError::UnknownParent(parent_name.to_string()))?;
		self.add_record(record, Some(parent), &[])
	}

	fn add_record(
		&mut self,
		mut record: RouteRecord,
		parent: Option<MatcherId>,
		parent_aliases: &[MatcherId],
	) -> Result<MatcherId, MatcherError> {
		let children = std::mem::take(&mut record.children);
		let alias_paths = std::mem::take(&mut record.aliases);

		let canonical = self.create_node(record.clone(), parent, None)?;

		let mut alias_ids = Vec::new();
		for alias_path in alias_paths {
			let mut alias_record = record.clone();
			alias_record.path = alias_path;
			let alias_id = self.create_node(alias_record, parent, Some(canonical))?;
			self.node_mut(canonical).aliases.push(alias_id);
			alias_ids.push(alias_id);
		}
		// a record nested under an aliased parent also exists under each of
		// the parent's alias subtrees
		for &alias_parent in parent_aliases {
			let alias_id = self.create_node(record.clone(), Some(alias_parent), Some(canonical))?;
			self.node_mut(canonical).aliases.push(alias_id);
			alias_ids.push(alias_id);
		}

		for child in children {
			self.add_record(child, Some(canonical), &alias_ids)?;
		}
		Ok(canonical)
	}

	fn create_node(
		&mut self,
		mut record: RouteRecord,
		parent: Option<MatcherId>,
		alias_of: Option<MatcherId>,
	) -> Result<MatcherId, MatcherError> {
		if let Some(parent_id) = parent
			&& !record.path.starts_with('/')
		{
			let parent_path = self.node(parent_id).record.path.clone();
			record.path = if record.path.is_empty() {
				parent_path
			} else {
				let connecting = if parent_path.ends_with('/') { "" } else { "/" };
				format!("{parent_path}{connecting}{}", record.path)
			};
		}

		if alias_of.is_none()
			&& let Some(name) = record.name.clone()
			&& let Some(&existing) = self.names.get(&name)
		{
			if self.node(existing).record.path == record.path {
				tracing::debug!(%name, "re-registering route, replacing the previous record");
				self.remove_node(existing);
			} else {
				return Err(MatcherError::DuplicateName(name));
			}
		}

		let options = record.pattern_options(&self.defaults);
		let pattern = CompiledPattern::compile(tokenize(&record.path)?, &options)?;

		if alias_of.is_some() {
			// the name and alias list belong to the canonical record only
			record.name = None;
			record.aliases = Vec::new();
		}
		record.alias_of = alias_of.map(|id| self.node(id).record.clone());
		record.children = Vec::new();
		let record = Arc::new(record);

		let id = MatcherId(self.arena.len());
		tracing::debug!(path = %record.path, name = ?record.name, "adding route matcher");
		let matchable =
			record.name.is_some() || !record.views.is_empty() || record.redirect.is_some();
		self.arena.push(Some(RecordMatcher {
			pattern,
			record: record.clone(),
			parent,
			children: Vec::new(),
			aliases: Vec::new(),
		}));

		match parent {
			Some(parent_id) => {
				let position = self.ranked_position(&self.node(parent_id).children, id);
				self.node_mut(parent_id).children.insert(position, id);
			}
			None => {
				let position = self.ranked_position(&self.root, id);
				self.root.insert(position, id);
			}
		}
		if matchable {
			let position = self.ranked_position(&self.matchers, id);
			self.matchers.insert(position, id);
		}
		if let Some(name) = record.name.clone() {
			self.names.insert(name, id);
		}
		Ok(id)
	}

	/// Index at which `id` keeps `list` ordered most specific first, after
	/// any equally ranked entries already present.
	fn ranked_position(&self, list: &[MatcherId], id: MatcherId) -> usize {
		let pattern = &self.node(id).pattern;
		list.iter()
			.position(|&other| pattern.compare(&self.node(other).pattern) == Ordering::Less)
			.unwrap_or(list.len())
	}

	/// Removes the named record together with its aliases and children.
	/// Removing an absent name is a no-op.
	pub fn remove_route(&mut self, name: &str) {
		match self.names.get(name).copied() {
			Some(id) => {
				tracing::debug!(name, "removing route");
				self.remove_node(id);
			}
			None => {
				tracing::warn!(name, "ignoring removal of unknown route");
			}
		}
	}

	pub(crate) fn remove_node(&mut self, id: MatcherId) {
		let Some(node) = self.arena[id.0].take() else {
			return;
		};
		match node.parent {
			Some(parent_id) => {
				if let Some(parent) = self.arena[parent_id.0].as_mut() {
					parent.children.retain(|&child| child != id);
					parent.aliases.retain(|&alias| alias != id);
				}
			}
			None => self.root.retain(|&root_id| root_id != id),
		}
		self.matchers.retain(|&matcher_id| matcher_id != id);
		if let Some(name) = &node.record.name
			&& self.names.get(name) == Some(&id)
		{
			self.names.remove(name);
		}
		for alias in node.aliases {
			self.remove_node(alias);
		}
		for child in node.children {
			self.remove_node(child);
		}
	}

	/// Resolves a target location against the table.
	///
	/// # Errors
	///
	/// Returns [`MatcherError`] for unknown names, a relative target with no
	/// base, or a failed path synthesis. A path that matches nothing is not
	/// an error: the result carries an empty `matched` chain.
	pub fn resolve(
		&self,
		target: ResolveTarget<'_>,
		current: &MatchedLocation,
	) -> Result<MatchedLocation, MatcherError> {
		match target {
			ResolveTarget::Named { name, params } => self.resolve_named(name, params, current),
			ResolveTarget::Path(path) => Ok(self.resolve_path(path)),
			ResolveTarget::Relative { params } => self.resolve_relative(params, current),
		}
	}

	fn resolve_named(
		&self,
		name: &str,
		params: &Params,
		current: &MatchedLocation,
	) -> Result<MatchedLocation, MatcherError> {
		let id = *self
			.names
			.get(name)
			.ok_or_else(|| MatcherError::UnknownName(name.to_string()))?;
		let node = self.node(id);

		// inherit current params for the keys the pattern requires, plus the
		// parent's optional keys, then overlay the provided params limited
		// to keys the pattern actually knows
		let mut inheritable: HashSet<&str> = node
			.pattern
			.keys
			.iter()
			.filter(|key| !key.optional)
			.map(|key| key.name.as_str())
			.collect();
		if let Some(parent_id) = node.parent {
			inheritable.extend(
				self.node(parent_id)
					.pattern
					.keys
					.iter()
					.filter(|key| key.optional)
					.map(|key| key.name.as_str()),
			);
		}
		let known: HashSet<&str> = node
			.pattern
			.keys
			.iter()
			.map(|key| key.name.as_str())
			.collect();

		let mut merged = Params::new();
		for (key, value) in &current.params {
			if inheritable.contains(key.as_str()) {
				merged.insert(key.clone(), value.clone());
			}
		}
		for (key, value) in params {
			if known.contains(key.as_str()) {
				merged.insert(key.clone(), value.clone());
			}
		}

		let path = node.pattern.stringify(&merged)?;
		Ok(MatchedLocation {
			matched: self.chain(id),
			params: merged,
			path,
			name: node.record.name.clone(),
		})
	}

	fn resolve_path(&self, path: &str) -> MatchedLocation {
		for &id in &self.matchers {
			let node = self.node(id);
			if let Some(params) = node.pattern.parse(path) {
				return MatchedLocation {
					matched: self.chain(id),
					params,
					path: path.to_string(),
					name: node.record.name.clone(),
				};
			}
		}
		tracing::warn!(path, "no route record matched path");
		MatchedLocation::unmatched(path)
	}

	fn resolve_relative(
		&self,
		params: &Params,
		current: &MatchedLocation,
	) -> Result<MatchedLocation, MatcherError> {
		let id = match &current.name {
			Some(name) => *self
				.names
				.get(name)
				.ok_or_else(|| MatcherError::UnknownName(name.clone()))?,
			None => {
				let deepest = current
					.matched
					.last()
					.ok_or(MatcherError::NoRelativeBase)?;
				self.find_by_record(deepest)
					.ok_or(MatcherError::NoRelativeBase)?
			}
		};
		let node = self.node(id);
		let mut merged = current.params.clone();
		merged.extend(params.clone());
		let path = node.pattern.stringify(&merged)?;
		Ok(MatchedLocation {
			matched: self.chain(id),
			params: merged,
			path,
			name: node.record.name.clone(),
		})
	}

	fn find_by_record(&self, record: &Arc<RouteRecord>) -> Option<MatcherId> {
		self.arena.iter().enumerate().find_map(|(index, slot)| {
			slot.as_ref()
				.filter(|node| Arc::ptr_eq(&node.record, record))
				.map(|_| MatcherId(index))
		})
	}

	fn chain(&self, id: MatcherId) -> Vec<Arc<RouteRecord>> {
		let mut matched = Vec::new();
		let mut cursor = Some(id);
		while let Some(current) = cursor {
			let node = self.node(current);
			matched.push(node.record.clone());
			cursor = node.parent;
		}
		matched.reverse();
		matched
	}

	/// Every registered record, most specific first, aliases included.
	pub fn get_routes(&self) -> Vec<Arc<RouteRecord>> {
		self.matchers
			.iter()
			.map(|&id| self.node(id).record.clone())
			.collect()
	}

	/// The record registered under `name`, if any.
	pub fn record_matcher(&self, name: &str) -> Option<Arc<RouteRecord>> {
		self.names.get(name).map(|&id| self.node(id).record.clone())
	}

	/// Whether a record is registered under `name`.
	pub fn has_route(&self, name: &str) -> bool {
		self.names.contains_key(name)
	}

	/// Empties the table.
	pub fn clear_routes(&mut self) {
		self.arena.clear();
		self.matchers.clear();
		self.root.clear();
		self.names.clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::location::ParamValue;

	fn table() -> MatcherTable {
		MatcherTable::new(PatternOptions::default())
	}

	fn named(path: &str, name: &str) -> RouteRecord {
		RouteRecord::new(path)
			.with_name(name)
			.with_default_view(ViewHandle::new(name.to_string()))
	}

	fn current() -> MatchedLocation {
		MatchedLocation::unmatched("/")
	}

	fn single(value: &str) -> ParamValue {
		ParamValue::Single(value.to_string())
	}

	#[test]
	fn test_static_beats_param_on_resolve() {
		let mut table = table();
		table.add_route(named("/users/:id", "user")).unwrap();
		table.add_route(named("/users/new", "new-user")).unwrap();

		let resolved = table
			.resolve(ResolveTarget::Path("/users/new"), &current())
			.unwrap();
		assert_eq!(resolved.name.as_deref(), Some("new-user"));
	}

	#[test]
	fn test_sub_segmented_beats_bare_param() {
		let mut table = table();
		table.add_route(named("/:a", "single")).unwrap();
		table.add_route(named("/:a-:b", "pair")).unwrap();

		let resolved = table
			.resolve(ResolveTarget::Path("/x-y"), &current())
			.unwrap();
		assert_eq!(resolved.name.as_deref(), Some("pair"));
		assert_eq!(resolved.params.get("a"), Some(&single("x")));
		assert_eq!(resolved.params.get("b"), Some(&single("y")));
	}

	#[test]
	fn test_resolve_by_name_synthesizes_path() {
		let mut table = table();
		table.add_route(named("/", "home")).unwrap();
		table.add_route(named("/users/:id", "user")).unwrap();

		let mut params = Params::new();
		params.insert("id".to_string(), single("42"));
		let resolved = table
			.resolve(
				ResolveTarget::Named {
					name: "user",
					params: &params,
				},
				&current(),
			)
			.unwrap();
		assert_eq!(resolved.path, "/users/42");
		assert_eq!(resolved.params.get("id"), Some(&single("42")));
	}

	#[test]
	fn test_resolve_by_path_end_to_end() {
		let mut table = table();
		table.add_route(named("/", "home")).unwrap();
		table.add_route(named("/users/:id", "user")).unwrap();

		let resolved = table
			.resolve(ResolveTarget::Path("/users/42"), &current())
			.unwrap();
		assert_eq!(resolved.name.as_deref(), Some("user"));
		assert_eq!(resolved.params.get("id"), Some(&single("42")));
	}

	#[test]
	fn test_resolve_unknown_name() {
		let table = table();
		let params = Params::new();
		assert!(matches!(
			table.resolve(
				ResolveTarget::Named {
					name: "nope",
					params: &params
				},
				&current()
			),
			Err(MatcherError::UnknownName(_))
		));
	}

	#[test]
	fn test_resolve_no_match_is_non_fatal() {
		let table = table();
		let resolved = table
			.resolve(ResolveTarget::Path("/nowhere"), &current())
			.unwrap();
		assert!(resolved.matched.is_empty());
		assert!(resolved.name.is_none());
	}

	#[test]
	fn test_nested_children_compose_paths() {
		let mut table = table();
		table
			.add_route(
				named("/users/:id", "user")
					.with_child(named("profile", "user-profile"))
					.with_child(named("posts/:postId", "user-post")),
			)
			.unwrap();

		let resolved = table
			.resolve(ResolveTarget::Path("/users/7/posts/3"), &current())
			.unwrap();
		assert_eq!(resolved.name.as_deref(), Some("user-post"));
		assert_eq!(resolved.matched.len(), 2);
		assert_eq!(resolved.matched[0].name.as_deref(), Some("user"));
		assert_eq!(resolved.params.get("id"), Some(&single("7")));
		assert_eq!(resolved.params.get("postId"), Some(&single("3")));
	}

	#[test]
	fn test_resolve_named_inherits_required_params() {
		let mut table = table();
		table
			.add_route(named("/users/:id", "user").with_child(named("posts", "user-posts")))
			.unwrap();

		let mut params = Params::new();
		params.insert("id".to_string(), single("7"));
		let from = table
			.resolve(
				ResolveTarget::Named {
					name: "user",
					params: &params,
				},
				&current(),
			)
			.unwrap();

		// navigating to the nested name without repeating :id
		let resolved = table
			.resolve(
				ResolveTarget::Named {
					name: "user-posts",
					params: &Params::new(),
				},
				&from,
			)
			.unwrap();
		assert_eq!(resolved.path, "/users/7/posts");
	}

	#[test]
	fn test_duplicate_name_is_rejected() {
		let mut table = table();
		table.add_route(named("/users", "users")).unwrap();
		assert!(matches!(
			table.add_route(named("/people", "users")),
			Err(MatcherError::DuplicateName(_))
		));
	}

	#[test]
	fn test_re_registration_replaces_record() {
		let mut table = table();
		table.add_route(named("/users", "users")).unwrap();
		table
			.add_route(named("/users", "users").with_meta("v", serde_json::json!(2)))
			.unwrap();

		let record = table.record_matcher("users").unwrap();
		assert_eq!(record.meta.get("v"), Some(&serde_json::json!(2)));
		assert_eq!(table.get_routes().len(), 1);
	}

	#[test]
	fn test_alias_resolves_to_same_record() {
		let mut table = table();
		table
			.add_route(named("/users", "users").with_alias("/people"))
			.unwrap();

		let canonical = table
			.resolve(ResolveTarget::Path("/users"), &current())
			.unwrap();
		let aliased = table
			.resolve(ResolveTarget::Path("/people"), &current())
			.unwrap();
		assert!(RouteRecord::is_same_record(
			canonical.deepest_record(),
			aliased.deepest_record()
		));
	}

	#[test]
	fn test_remove_route_cascades_to_aliases() {
		let mut table = table();
		table
			.add_route(named("/users", "users").with_alias("/people"))
			.unwrap();

		table.remove_route("users");
		assert!(!table.has_route("users"));
		let resolved = table
			.resolve(ResolveTarget::Path("/people"), &current())
			.unwrap();
		assert!(resolved.matched.is_empty());
	}

	#[test]
	fn test_remove_route_cascades_to_children() {
		let mut table = table();
		table
			.add_route(named("/users/:id", "user").with_child(named("posts", "user-posts")))
			.unwrap();

		table.remove_route("user");
		assert!(!table.has_route("user-posts"));
		let resolved = table
			.resolve(ResolveTarget::Path("/users/7/posts"), &current())
			.unwrap();
		assert!(resolved.matched.is_empty());
	}

	#[test]
	fn test_remove_unknown_route_is_noop() {
		let mut table = table();
		table.remove_route("ghost");
		assert!(table.get_routes().is_empty());
	}

	#[test]
	fn test_alias_children_are_reachable() {
		let mut table = table();
		table
			.add_route(
				named("/users", "users")
					.with_alias("/people")
					.with_child(named(":id", "user")),
			)
			.unwrap();

		let via_alias = table
			.resolve(ResolveTarget::Path("/people/9"), &current())
			.unwrap();
		assert_eq!(via_alias.matched.len(), 2);
		assert_eq!(via_alias.params.get("id"), Some(&single("9")));
		// the alias chain still names the canonical child
		let canonical = table
			.resolve(ResolveTarget::Path("/users/9"), &current())
			.unwrap();
		assert_eq!(canonical.name.as_deref(), Some("user"));
	}

	#[test]
	fn test_per_record_sensitivity_override() {
		let mut table = table();
		table
			.add_route(named("/Users", "users").with_sensitive(true))
			.unwrap();

		let miss = table
			.resolve(ResolveTarget::Path("/users"), &current())
			.unwrap();
		assert!(miss.matched.is_empty());
		let hit = table
			.resolve(ResolveTarget::Path("/Users"), &current())
			.unwrap();
		assert_eq!(hit.name.as_deref(), Some("users"));
	}

	#[test]
	fn test_clear_routes() {
		let mut table = table();
		table.add_route(named("/users", "users")).unwrap();
		table.clear_routes();
		assert!(!table.has_route("users"));
		assert!(table.get_routes().is_empty());
	}

	impl MatchedLocation {
		fn deepest_record(&self) -> &Arc<RouteRecord> {
			self.matched.last().expect("empty matched chain")
		}
	}
}
