//! User-facing route records.
//!
//! A [`RouteRecord`] declares a path pattern together with everything the
//! host hangs off it: per-view-slot handler references (opaque to the
//! router), a metadata bag, lifecycle guards, aliases, and nested children.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::location::{Params, RawLocation, ResolvedLocation};
use crate::pattern::PatternOptions;
use crate::router::guard::NavigationGuard;

/// The default view slot name.
pub const DEFAULT_VIEW: &str = "default";

/// An opaque per-view-slot handler reference.
///
/// The router never inspects the value; the host downcasts it back when
/// rendering the slot.
#[derive(Clone)]
pub struct ViewHandle(Arc<dyn Any + Send + Sync>);

impl ViewHandle {
	/// Wraps a host handler value.
	pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
		Self(Arc::new(value))
	}

	/// Borrows the handler back as its concrete type.
	pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
		self.0.downcast_ref()
	}
}

impl fmt::Debug for ViewHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ViewHandle").finish()
	}
}

/// Where a redirecting record sends the navigation.
#[derive(Clone)]
pub enum RedirectTarget {
	/// A literal path, optionally carrying `?query` and `#hash`.
	Path(String),
	/// A named record with explicit params.
	Named {
		/// Destination record name.
		name: String,
		/// Params for the destination pattern.
		params: Params,
	},
	/// Computed from the location that matched the redirecting record.
	Computed(Arc<dyn Fn(&ResolvedLocation) -> RawLocation + Send + Sync>),
}

impl fmt::Debug for RedirectTarget {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
			Self::Named { name, .. } => f.debug_tuple("Named").field(name).finish(),
			Self::Computed(_) => f.debug_tuple("Computed").finish(),
		}
	}
}

impl From<&str> for RedirectTarget {
	fn from(path: &str) -> Self {
		Self::Path(path.to_string())
	}
}

impl From<String> for RedirectTarget {
	fn from(path: String) -> Self {
		Self::Path(path)
	}
}

/// A user-declared route record.
///
/// Built with the `with_*` chain and handed to the matcher table, which
/// compiles the pattern and registers aliases and children recursively.
pub struct RouteRecord {
	/// Path pattern. Relative (no leading `/`) when nested under a parent.
	pub path: String,
	/// Unique route name, if any.
	pub name: Option<String>,
	/// Redirect target, if this record forwards its navigations.
	pub redirect: Option<RedirectTarget>,
	/// Per-view-slot handler references.
	pub views: HashMap<String, ViewHandle>,
	/// Free-form metadata bag.
	pub meta: serde_json::Map<String, serde_json::Value>,
	/// Secondary path patterns resolving to this record.
	pub aliases: Vec<String>,
	/// Nested child records.
	pub children: Vec<RouteRecord>,
	/// Case-sensitivity override for this record's pattern.
	pub sensitive: Option<bool>,
	/// Strict trailing-slash override for this record's pattern.
	pub strict: Option<bool>,
	/// The canonical record, when this one was registered as an alias.
	pub alias_of: Option<Arc<RouteRecord>>,
	enter_guards: Vec<Arc<dyn NavigationGuard>>,
	update_guards: Vec<Arc<dyn NavigationGuard>>,
	leave_guards: Vec<Arc<dyn NavigationGuard>>,
	// ad-hoc guards attached after registration, e.g. by a mounted view
	dynamic_update_guards: RwLock<Vec<Arc<dyn NavigationGuard>>>,
	dynamic_leave_guards: RwLock<Vec<Arc<dyn NavigationGuard>>>,
}

impl RouteRecord {
	/// Creates a record for the given path pattern.
	pub fn new(path: impl Into<String>) -> Self {
		Self {
			path: path.into(),
			name: None,
			redirect: None,
			views: HashMap::new(),
			meta: serde_json::Map::new(),
			aliases: Vec::new(),
			children: Vec::new(),
			sensitive: None,
			strict: None,
			alias_of: None,
			enter_guards: Vec::new(),
			update_guards: Vec::new(),
			leave_guards: Vec::new(),
			dynamic_update_guards: RwLock::new(Vec::new()),
			dynamic_leave_guards: RwLock::new(Vec::new()),
		}
	}

	/// Sets the unique route name.
	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}

	/// Makes the record redirect instead of rendering.
	pub fn with_redirect(mut self, target: impl Into<RedirectTarget>) -> Self {
		self.redirect = Some(target.into());
		self
	}

	/// Attaches a handler reference to a named view slot.
	pub fn with_view(mut self, slot: impl Into<String>, handle: ViewHandle) -> Self {
		self.views.insert(slot.into(), handle);
		self
	}

	/// Attaches a handler reference to the default view slot.
	pub fn with_default_view(self, handle: ViewHandle) -> Self {
		self.with_view(DEFAULT_VIEW, handle)
	}

	/// Adds a metadata entry.
	pub fn with_meta(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
		self.meta.insert(key.into(), value);
		self
	}

	/// Adds a secondary path pattern resolving to this record.
	pub fn with_alias(mut self, path: impl Into<String>) -> Self {
		self.aliases.push(path.into());
		self
	}

	/// Nests a child record under this one.
	pub fn with_child(mut self, child: RouteRecord) -> Self {
		self.children.push(child);
		self
	}

	/// Overrides case sensitivity for this record's pattern.
	pub fn with_sensitive(mut self, sensitive: bool) -> Self {
		self.sensitive = Some(sensitive);
		self
	}

	/// Overrides strict trailing-slash matching for this record's pattern.
	pub fn with_strict(mut self, strict: bool) -> Self {
		self.strict = Some(strict);
		self
	}

	/// Adds a guard run when this record is newly entered.
	pub fn with_enter_guard(mut self, guard: Arc<dyn NavigationGuard>) -> Self {
		self.enter_guards.push(guard);
		self
	}

	/// Adds a guard run when this record stays matched while params change.
	pub fn with_update_guard(mut self, guard: Arc<dyn NavigationGuard>) -> Self {
		self.update_guards.push(guard);
		self
	}

	/// Adds a guard run when this record is left.
	pub fn with_leave_guard(mut self, guard: Arc<dyn NavigationGuard>) -> Self {
		self.leave_guards.push(guard);
		self
	}

	/// Attaches an ad-hoc leave guard to an already-registered record.
	pub fn add_leave_guard(&self, guard: Arc<dyn NavigationGuard>) {
		self.dynamic_leave_guards.write().push(guard);
	}

	/// Attaches an ad-hoc update guard to an already-registered record.
	pub fn add_update_guard(&self, guard: Arc<dyn NavigationGuard>) {
		self.dynamic_update_guards.write().push(guard);
	}

	/// Declared enter guards, in declaration order.
	pub(crate) fn enter_guards(&self) -> Vec<Arc<dyn NavigationGuard>> {
		self.enter_guards.clone()
	}

	/// Declared plus ad-hoc update guards, declared first.
	pub(crate) fn update_guards(&self) -> Vec<Arc<dyn NavigationGuard>> {
		let mut guards = self.update_guards.clone();
		guards.extend(self.dynamic_update_guards.read().iter().cloned());
		guards
	}

	/// Declared plus ad-hoc leave guards, declared first.
	pub(crate) fn leave_guards(&self) -> Vec<Arc<dyn NavigationGuard>> {
		let mut guards = self.leave_guards.clone();
		guards.extend(self.dynamic_leave_guards.read().iter().cloned());
		guards
	}

	/// Ad-hoc leave guards only.
	pub(crate) fn dynamic_leave_guards(&self) -> Vec<Arc<dyn NavigationGuard>> {
		self.dynamic_leave_guards.read().clone()
	}

	/// Merges the record's pattern overrides over the table defaults.
	pub(crate) fn pattern_options(&self, defaults: &PatternOptions) -> PatternOptions {
		PatternOptions {
			sensitive: self.sensitive.unwrap_or(defaults.sensitive),
			strict: self.strict.unwrap_or(defaults.strict),
			end: defaults.end,
		}
	}

	/// Two records are the same when one is the other or an alias of it.
	pub fn is_same_record(a: &Arc<RouteRecord>, b: &Arc<RouteRecord>) -> bool {
		let canonical_a = a.alias_of.as_ref().unwrap_or(a);
		let canonical_b = b.alias_of.as_ref().unwrap_or(b);
		Arc::ptr_eq(canonical_a, canonical_b)
	}
}

impl Clone for RouteRecord {
	fn clone(&self) -> Self {
		Self {
			path: self.path.clone(),
			name: self.name.clone(),
			redirect: self.redirect.clone(),
			views: self.views.clone(),
			meta: self.meta.clone(),
			aliases: self.aliases.clone(),
			children: self.children.clone(),
			sensitive: self.sensitive,
			strict: self.strict,
			alias_of: self.alias_of.clone(),
			enter_guards: self.enter_guards.clone(),
			update_guards: self.update_guards.clone(),
			leave_guards: self.leave_guards.clone(),
			dynamic_update_guards: RwLock::new(self.dynamic_update_guards.read().clone()),
			dynamic_leave_guards: RwLock::new(self.dynamic_leave_guards.read().clone()),
		}
	}
}

impl fmt::Debug for RouteRecord {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RouteRecord")
			.field("path", &self.path)
			.field("name", &self.name)
			.field("redirect", &self.redirect)
			.field("views", &self.views.keys().collect::<Vec<_>>())
			.field("aliases", &self.aliases)
			.field("children", &self.children.len())
			.field("is_alias", &self.alias_of.is_some())
			.finish()
	}
}
