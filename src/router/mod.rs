//! Navigation orchestrator.
//!
//! Drives a navigation from a raw target to a committed location: resolve,
//! chase record-declared redirects, short-circuit duplicates, run the
//! ordered guard phases, and finalize against the history backend (or
//! revert an externally driven pop when its guards reject it).
//!
//! Cancellation is arbitrated by the pending location: every resolution
//! overwrites it, and a pipeline observing a stale pending location at a
//! phase boundary terminates with a silent
//! [`NavigationFailure::Cancelled`].

pub mod guard;
mod redirect;

use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;

use crate::error::{MatcherError, NavigationError, NavigationFailure};
use crate::history::scroll::{ScrollBehavior, ScrollStore};
use crate::history::{EntryState, History, ListenerHandle, PopInfo};
use crate::location::{RawLocation, ResolvedLocation, build_full_path, parse_full_path};
use crate::matcher::{MatchedLocation, MatcherId, MatcherTable, ResolveTarget, RouteRecord};
use crate::pattern::PatternOptions;
use crate::router::guard::HookRegistry;

pub use guard::{
	EnterCallback, EnterCallbackQueue, GuardHandle, GuardVerdict, NavigationGuard,
	async_guard_fn, guard_fn,
};

/// Hook invoked after every settled navigation, failed or not.
pub type AfterHook =
	Arc<dyn Fn(&ResolvedLocation, &ResolvedLocation, Option<&NavigationFailure>) + Send + Sync>;

/// Hook invoked with terminal navigation errors.
pub type ErrorHook =
	Arc<dyn Fn(&NavigationError, &ResolvedLocation, &ResolvedLocation) + Send + Sync>;

/// Observer of the committed current location.
pub type CurrentObserver = Arc<dyn Fn(&ResolvedLocation) + Send + Sync>;

/// Redirect hops allowed in one navigation before it is declared infinite.
const MAX_REDIRECTS: u32 = 30;

/// Construction options for a [`Router`].
pub struct RouterOptions {
	history: Arc<dyn History>,
	routes: Vec<RouteRecord>,
	scroll_behavior: Option<Arc<dyn ScrollBehavior>>,
	sensitive: bool,
	strict: bool,
}

impl RouterOptions {
	/// Starts options over the given history backend.
	pub fn new(history: Arc<dyn History>) -> Self {
		Self {
			history,
			routes: Vec::new(),
			scroll_behavior: None,
			sensitive: false,
			strict: false,
		}
	}

	/// Registers an initial route record.
	pub fn with_route(mut self, record: RouteRecord) -> Self {
		self.routes.push(record);
		self
	}

	/// Registers several initial route records.
	pub fn with_routes(mut self, records: impl IntoIterator<Item = RouteRecord>) -> Self {
		self.routes.extend(records);
		self
	}

	/// Installs the host's scroll behavior.
	pub fn with_scroll_behavior(mut self, behavior: Arc<dyn ScrollBehavior>) -> Self {
		self.scroll_behavior = Some(behavior);
		self
	}

	/// Makes patterns case-sensitive by default.
	pub fn with_sensitive(mut self, sensitive: bool) -> Self {
		self.sensitive = sensitive;
		self
	}

	/// Makes patterns strict about trailing slashes by default.
	pub fn with_strict(mut self, strict: bool) -> Self {
		self.strict = strict;
		self
	}
}

/// Removal handle for a dynamically added route.
#[derive(Debug)]
pub struct RouteHandle {
	router: Weak<Router>,
	id: MatcherId,
}

impl RouteHandle {
	/// Removes the route (and its aliases and children) from the router.
	pub fn remove(&self) {
		if let Some(router) = self.router.upgrade() {
			router.matcher.write().remove_node(self.id);
		}
	}
}

enum PipelineOutcome {
	Allowed,
	Failure(NavigationFailure),
	Redirect(RawLocation),
}

struct ReadyLatch {
	ready: Mutex<bool>,
	waiters: Mutex<Vec<oneshot::Sender<Result<(), NavigationError>>>>,
}

impl ReadyLatch {
	fn new() -> Self {
		Self {
			ready: Mutex::new(false),
			waiters: Mutex::new(Vec::new()),
		}
	}

	fn is_ready(&self) -> bool {
		*self.ready.lock()
	}

	/// Resolves current waiters. A success latches permanently; a terminal
	/// error releases the current waiters but leaves the latch open for a
	/// later successful navigation.
	fn settle(&self, result: Result<(), NavigationError>) {
		let mut ready = self.ready.lock();
		if *ready {
			return;
		}
		if result.is_ok() {
			*ready = true;
		}
		let waiters = std::mem::take(&mut *self.waiters.lock());
		for waiter in waiters {
			let _ = waiter.send(result.clone());
		}
	}

	async fn wait(&self) -> Result<(), NavigationError> {
		let receiver = {
			let ready = self.ready.lock();
			if *ready {
				return Ok(());
			}
			let (sender, receiver) = oneshot::channel();
			self.waiters.lock().push(sender);
			drop(ready);
			receiver
		};
		receiver.await.unwrap_or(Ok(()))
	}
}

/// The navigation orchestrator.
///
/// One instance owns the matcher table, the guard registries, and the
/// current/pending location pair. Constructed once by the host and shared
/// by reference; no ambient global state.
pub struct Router {
	self_weak: Weak<Router>,
	history: Arc<dyn History>,
	matcher: RwLock<MatcherTable>,
	start: Arc<ResolvedLocation>,
	current: RwLock<Arc<ResolvedLocation>>,
	pending: RwLock<Option<Arc<ResolvedLocation>>>,
	before_guards: HookRegistry<Arc<dyn NavigationGuard>>,
	resolve_guards: HookRegistry<Arc<dyn NavigationGuard>>,
	after_hooks: HookRegistry<AfterHook>,
	error_hooks: HookRegistry<ErrorHook>,
	observers: HookRegistry<CurrentObserver>,
	enter_callbacks: EnterCallbackQueue,
	scroll_behavior: Option<Arc<dyn ScrollBehavior>>,
	scroll_store: ScrollStore,
	ready: ReadyLatch,
	_history_listener: Mutex<Option<ListenerHandle>>,
}

impl Router {
	/// Builds a router over the given options and starts listening for
	/// externally driven history movements.
	///
	/// # Errors
	///
	/// Returns [`MatcherError`] when an initial route fails to register.
	pub fn new(options: RouterOptions) -> Result<Arc<Self>, MatcherError> {
		let RouterOptions {
			history,
			routes,
			scroll_behavior,
			sensitive,
			strict,
		} = options;

		let defaults = PatternOptions::default()
			.with_sensitive(sensitive)
			.with_strict(strict);
		let mut table = MatcherTable::new(defaults);
		for record in routes {
			table.add_route(record)?;
		}

		let start = Arc::new(ResolvedLocation::start());
		let router = Arc::new_cyclic(|weak: &Weak<Router>| {
			let pop_weak = weak.clone();
			let listener = history.listen(Arc::new(move |to, _from, info| {
				let Some(router) = pop_weak.upgrade() else {
					return;
				};
				let to = to.to_string();
				match tokio::runtime::Handle::try_current() {
					Ok(handle) => {
						handle.spawn(async move {
							let _ = router.handle_pop(to, info).await;
						});
					}
					Err(_) => {
						tracing::error!(
							%to,
							"ignoring external history movement: no async runtime"
						);
					}
				}
			}));
			Router {
				self_weak: weak.clone(),
				history: history.clone(),
				matcher: RwLock::new(table),
				current: RwLock::new(start.clone()),
				start: start.clone(),
				pending: RwLock::new(None),
				before_guards: HookRegistry::new(),
				resolve_guards: HookRegistry::new(),
				after_hooks: HookRegistry::new(),
				error_hooks: HookRegistry::new(),
				observers: HookRegistry::new(),
				enter_callbacks: EnterCallbackQueue::new(),
				scroll_behavior,
				scroll_store: ScrollStore::new(),
				ready: ReadyLatch::new(),
				_history_listener: Mutex::new(Some(listener)),
			}
		});
		Ok(router)
	}

	/// Snapshot of the committed current location.
	pub fn current(&self) -> Arc<ResolvedLocation> {
		self.current.read().clone()
	}

	/// The history backend this router commits to.
	pub fn history(&self) -> &Arc<dyn History> {
		&self.history
	}

	/// The queue of deferred enter callbacks.
	pub fn enter_callbacks(&self) -> &EnterCallbackQueue {
		&self.enter_callbacks
	}

	/// Pure resolution of a raw target against the current location; never
	/// navigates.
	///
	/// # Errors
	///
	/// Returns [`MatcherError`] for unknown names or failed path synthesis.
	pub fn resolve(&self, to: impl Into<RawLocation>) -> Result<ResolvedLocation, MatcherError> {
		self.resolve_raw(&to.into(), &self.current())
	}

	/// The full href for a target, base prefix included.
	///
	/// # Errors
	///
	/// Returns [`MatcherError`] when the target does not resolve.
	pub fn create_href(&self, to: impl Into<RawLocation>) -> Result<String, MatcherError> {
		let resolved = self.resolve(to)?;
		Ok(self.history.create_href(&resolved.full_path))
	}

	/// Registers a guard run before every navigation.
	pub fn before_each(&self, guard: Arc<dyn NavigationGuard>) -> GuardHandle {
		self.before_guards.add(guard)
	}

	/// Registers a guard run after all other phases, right before the
	/// navigation is finalized.
	pub fn before_resolve(&self, guard: Arc<dyn NavigationGuard>) -> GuardHandle {
		self.resolve_guards.add(guard)
	}

	/// Registers a hook invoked after every settled navigation with its
	/// failure, if any.
	pub fn after_each<F>(&self, hook: F) -> GuardHandle
	where
		F: Fn(&ResolvedLocation, &ResolvedLocation, Option<&NavigationFailure>)
			+ Send
			+ Sync
			+ 'static,
	{
		self.after_hooks.add(Arc::new(hook))
	}

	/// Registers a handler for terminal navigation errors.
	pub fn on_error<F>(&self, hook: F) -> GuardHandle
	where
		F: Fn(&NavigationError, &ResolvedLocation, &ResolvedLocation) + Send + Sync + 'static,
	{
		self.error_hooks.add(Arc::new(hook))
	}

	/// Subscribes to committed current-location changes.
	pub fn observe_current<F>(&self, observer: F) -> GuardHandle
	where
		F: Fn(&ResolvedLocation) + Send + Sync + 'static,
	{
		self.observers.add(Arc::new(observer))
	}

	/// Whether a first navigation has settled successfully.
	pub fn is_ready(&self) -> bool {
		self.ready.is_ready()
	}

	/// Waits until the first navigation settles.
	///
	/// # Errors
	///
	/// Returns the terminal error that settled the first navigation, when
	/// it failed terminally.
	pub async fn wait_until_ready(&self) -> Result<(), NavigationError> {
		self.ready.wait().await
	}

	/// Registers a record at the top level.
	///
	/// # Errors
	///
	/// Returns [`MatcherError::DuplicateName`] when a different record
	/// already owns the name.
	pub fn add_route(&self, record: RouteRecord) -> Result<RouteHandle, MatcherError> {
		let id = self.matcher.write().add_route(record)?;
		Ok(RouteHandle {
			router: self.self_weak.clone(),
			id,
		})
	}

	/// Registers a record nested under the named parent.
	///
	/// # Errors
	///
	/// Returns [`MatcherError::UnknownParent`] when the parent name is not
	/// registered.
	pub fn add_route_under(
		&self,
		parent_name: &str,
		record: RouteRecord,
	) -> Result<RouteHandle, MatcherError> {
		let id = self.matcher.write().add_route_under(parent_name, record)?;
		Ok(RouteHandle {
			router: self.self_weak.clone(),
			id,
		})
	}

	/// Removes the named record, its aliases, and its children. Removing an
	/// absent name is a no-op.
	pub fn remove_route(&self, name: &str) {
		self.matcher.write().remove_route(name);
	}

	/// Whether a record is registered under `name`.
	pub fn has_route(&self, name: &str) -> bool {
		self.matcher.read().has_route(name)
	}

	/// Every registered record, most specific first.
	pub fn get_routes(&self) -> Vec<Arc<RouteRecord>> {
		self.matcher.read().get_routes()
	}

	/// Empties the route table.
	pub fn clear_routes(&self) {
		self.matcher.write().clear_routes();
	}

	/// Navigates to a target, pushing a new history entry.
	///
	/// Recoverable outcomes come back as `Ok(Some(failure))`; only terminal
	/// conditions are errors.
	///
	/// # Errors
	///
	/// Returns [`NavigationError`] for unresolvable targets, guard
	/// exceptions, and infinite redirect chains.
	pub async fn push(
		&self,
		to: impl Into<RawLocation>,
	) -> Result<Option<NavigationFailure>, NavigationError> {
		self.push_inner(to.into(), false, None, 0).await
	}

	/// Navigates to a target, replacing the current history entry.
	///
	/// # Errors
	///
	/// Same contract as [`Router::push`].
	pub async fn replace(
		&self,
		to: impl Into<RawLocation>,
	) -> Result<Option<NavigationFailure>, NavigationError> {
		self.push_inner(to.into(), true, None, 0).await
	}

	/// Moves the history stack by `delta` entries and runs the resulting
	/// navigation through the guard pipeline. On failure the stack movement
	/// is reversed with a compensating move.
	///
	/// # Errors
	///
	/// Same contract as [`Router::push`].
	pub async fn go(&self, delta: i64) -> Result<Option<NavigationFailure>, NavigationError> {
		let before = self.history.state().position().unwrap_or(0);
		self.history.go(delta, false);
		let after = self.history.state().position().unwrap_or(0);
		let to = self.history.location();
		if after == before && to == self.current().full_path {
			// the stack did not actually move
			return Ok(None);
		}
		self.handle_pop(to, PopInfo::from_delta(after - before)).await
	}

	/// Moves one entry back.
	///
	/// # Errors
	///
	/// Same contract as [`Router::push`].
	pub async fn back(&self) -> Result<Option<NavigationFailure>, NavigationError> {
		self.go(-1).await
	}

	/// Moves one entry forward.
	///
	/// # Errors
	///
	/// Same contract as [`Router::push`].
	pub async fn forward(&self) -> Result<Option<NavigationFailure>, NavigationError> {
		self.go(1).await
	}

	fn resolve_raw(
		&self,
		raw: &RawLocation,
		from: &ResolvedLocation,
	) -> Result<ResolvedLocation, MatcherError> {
		let table = self.matcher.read();
		let current = MatchedLocation {
			matched: from.matched.clone(),
			params: from.params.clone(),
			path: from.path.clone(),
			name: from.name.clone(),
		};
		let (matched, query, hash) = match raw {
			RawLocation::Path(full) => {
				let (path, query, hash) = parse_full_path(full);
				(
					table.resolve(ResolveTarget::Path(&path), &current)?,
					query,
					hash,
				)
			}
			RawLocation::Target(target) => {
				if let Some(name) = &target.name {
					(
						table.resolve(
							ResolveTarget::Named {
								name,
								params: &target.params,
							},
							&current,
						)?,
						target.query.clone(),
						target.hash.clone(),
					)
				} else if let Some(full) = &target.path {
					let (path, parsed_query, parsed_hash) = parse_full_path(full);
					let query = if target.query.is_empty() {
						parsed_query
					} else {
						target.query.clone()
					};
					let hash = if target.hash.is_empty() {
						parsed_hash
					} else {
						target.hash.clone()
					};
					(table.resolve(ResolveTarget::Path(&path), &current)?, query, hash)
				} else {
					(
						table.resolve(
							ResolveTarget::Relative {
								params: &target.params,
							},
							&current,
						)?,
						target.query.clone(),
						target.hash.clone(),
					)
				}
			}
		};
		let full_path = build_full_path(&matched.path, &query, &hash);
		Ok(ResolvedLocation {
			path: matched.path,
			full_path,
			hash,
			query,
			params: matched.params,
			name: matched.name,
			matched: matched.matched,
			redirected_from: None,
		})
	}

	fn set_pending(&self, to: &Arc<ResolvedLocation>) {
		*self.pending.write() = Some(to.clone());
	}

	fn is_pending(&self, to: &Arc<ResolvedLocation>) -> bool {
		self.pending
			.read()
			.as_ref()
			.is_some_and(|pending| Arc::ptr_eq(pending, to))
	}

	fn cancelled(
		&self,
		to: &ResolvedLocation,
		from: &ResolvedLocation,
	) -> NavigationFailure {
		NavigationFailure::Cancelled {
			from: from.full_path.clone(),
			to: to.full_path.clone(),
		}
	}

	fn push_inner<'s>(
		&'s self,
		raw: RawLocation,
		force_replace: bool,
		redirected_from: Option<ResolvedLocation>,
		redirections: u32,
	) -> BoxFuture<'s, Result<Option<NavigationFailure>, NavigationError>> {
		Box::pin(async move {
			let from = self.current();
			let (force, replace, extra_state) = match &raw {
				RawLocation::Target(target) => (
					target.force,
					target.replace || force_replace,
					target.state.clone(),
				),
				RawLocation::Path(_) => (false, force_replace, None),
			};
			let mut target = match self.resolve_raw(&raw, &from) {
				Ok(target) => target,
				Err(err) => return Err(self.fail(err.into(), &from, &from)),
			};

			if let Some(redirect_raw) = redirect::redirect_location(&target) {
				if redirections >= MAX_REDIRECTS {
					let err = NavigationError::InfiniteRedirect {
						from: from.full_path.clone(),
						to: target.full_path.clone(),
					};
					return Err(self.fail(err, &target, &from));
				}
				tracing::debug!(
					from = %target.full_path,
					"following record redirect"
				);
				let next = redirect::carry_flags(redirect_raw, force, replace, extra_state);
				return self
					.push_inner(
						next,
						replace,
						Some(redirected_from.unwrap_or(target)),
						redirections + 1,
					)
					.await;
			}

			target.redirected_from = redirected_from.map(Box::new);
			let to = Arc::new(target);
			self.set_pending(&to);

			if !force && to.same_route_location(&from) {
				let failure = NavigationFailure::Duplicated {
					to: to.full_path.clone(),
				};
				// the scroll step still runs so same-anchor scrolling works
				self.handle_scroll(&to, &from, true, false).await;
				self.trigger_after_each(&to, &from, Some(&failure));
				self.ready.settle(Ok(()));
				return Ok(Some(failure));
			}

			match self.run_guard_pipeline(&to, &from).await {
				Err(err) => Err(self.fail(err, &to, &from)),
				Ok(PipelineOutcome::Redirect(next_raw)) => {
					if redirections >= MAX_REDIRECTS {
						let err = NavigationError::InfiniteRedirect {
							from: from.full_path.clone(),
							to: to.full_path.clone(),
						};
						return Err(self.fail(err, &to, &from));
					}
					let original = to
						.redirected_from
						.as_deref()
						.cloned()
						.unwrap_or_else(|| to.as_ref().clone());
					let next = redirect::carry_flags(next_raw, force, replace, extra_state);
					self.push_inner(next, replace, Some(original), redirections + 1)
						.await
				}
				Ok(PipelineOutcome::Failure(failure)) => {
					self.trigger_after_each(&to, &from, Some(&failure));
					self.ready.settle(Ok(()));
					Ok(Some(failure))
				}
				Ok(PipelineOutcome::Allowed) => {
					let failure = self
						.finalize_navigation(&to, &from, true, replace, extra_state)
						.await;
					self.trigger_after_each(&to, &from, failure.as_ref());
					Ok(failure)
				}
			}
		})
	}

	/// Re-enters the pipeline for an externally driven stack movement.
	async fn handle_pop(
		&self,
		to_location: String,
		info: PopInfo,
	) -> Result<Option<NavigationFailure>, NavigationError> {
		let from = self.current();
		let raw = RawLocation::Path(to_location);
		let target = match self.resolve_raw(&raw, &from) {
			Ok(target) => target,
			Err(err) => return Err(self.fail(err.into(), &from, &from)),
		};

		if let Some(redirect_raw) = redirect::redirect_location(&target) {
			// chase through the push path, replacing the popped-to entry
			let next = redirect::carry_flags(redirect_raw, true, true, None);
			let result = self.push_inner(next, true, Some(target), 1).await;
			if let Ok(Some(failure)) = &result
				&& info.delta == 0
				&& !failure.is_cancelled()
			{
				self.history.go(-1, false);
			}
			return result;
		}

		let to = Arc::new(target);
		self.set_pending(&to);

		if self.scroll_behavior.is_some() {
			// memoize the offset of the entry being left, keyed by the
			// position it sat at
			let position = self.history.state().position().unwrap_or(0);
			let key = ScrollStore::key(position - info.delta, &from.full_path);
			self.scroll_store.save(key, self.history.scroll_position());
		}

		let outcome = self.run_guard_pipeline(&to, &from).await;
		let failure = match outcome {
			Err(err) => {
				if info.delta != 0 {
					self.history.go(-info.delta, false);
				}
				return Err(self.fail(err, &to, &from));
			}
			Ok(PipelineOutcome::Redirect(next_raw)) => {
				let original = to.as_ref().clone();
				let next = redirect::carry_flags(next_raw, false, true, None);
				let result = self.push_inner(next, true, Some(original), 1).await;
				if let Ok(Some(failure)) = &result
					&& info.delta == 0
					&& !failure.is_cancelled()
				{
					self.history.go(-1, false);
				}
				return result;
			}
			Ok(PipelineOutcome::Failure(failure)) => Some(failure),
			Ok(PipelineOutcome::Allowed) => {
				self.finalize_navigation(&to, &from, false, false, None).await
			}
		};

		if let Some(failure) = &failure {
			if info.delta != 0 && !failure.is_cancelled() {
				// the stack pointer already moved before the guards ran
				self.history.go(-info.delta, false);
			} else if info.delta == 0 && !failure.is_cancelled() {
				self.history.go(-1, false);
			}
		}
		self.trigger_after_each(&to, &from, failure.as_ref());
		Ok(failure)
	}

	async fn run_guard_pipeline(
		&self,
		to: &Arc<ResolvedLocation>,
		from: &Arc<ResolvedLocation>,
	) -> Result<PipelineOutcome, NavigationError> {
		let (leaving, updating, entering) = extract_changing_records(to, from);

		// Leaving: departed records deepest first, then ad-hoc leave guards
		// of records that stay matched
		let mut guards: Vec<Arc<dyn NavigationGuard>> = Vec::new();
		for record in leaving.iter().rev() {
			guards.extend(record.leave_guards());
		}
		for record in &updating {
			guards.extend(record.dynamic_leave_guards());
		}
		match self.run_phase(guards, to, from).await? {
			PipelineOutcome::Allowed => {}
			outcome => return Ok(outcome),
		}

		// Global before
		match self.run_phase(self.before_guards.snapshot(), to, from).await? {
			PipelineOutcome::Allowed => {}
			outcome => return Ok(outcome),
		}

		// Updating: records present in both chains, shallowest first
		let mut guards: Vec<Arc<dyn NavigationGuard>> = Vec::new();
		for record in &updating {
			guards.extend(record.update_guards());
		}
		match self.run_phase(guards, to, from).await? {
			PipelineOutcome::Allowed => {}
			outcome => return Ok(outcome),
		}

		// Before-enter: declared on newly entered records
		let mut guards: Vec<Arc<dyn NavigationGuard>> = Vec::new();
		for record in &entering {
			guards.extend(record.enter_guards());
		}
		match self.run_phase(guards, to, from).await? {
			PipelineOutcome::Allowed => {}
			outcome => return Ok(outcome),
		}

		// Enter callbacks queued by earlier guards
		self.enter_callbacks.flush();
		if !self.is_pending(to) {
			return Ok(PipelineOutcome::Failure(self.cancelled(to, from)));
		}

		// Global before-resolve
		match self.run_phase(self.resolve_guards.snapshot(), to, from).await? {
			PipelineOutcome::Allowed => {}
			outcome => return Ok(outcome),
		}

		Ok(PipelineOutcome::Allowed)
	}

	async fn run_phase(
		&self,
		guards: Vec<Arc<dyn NavigationGuard>>,
		to: &Arc<ResolvedLocation>,
		from: &Arc<ResolvedLocation>,
	) -> Result<PipelineOutcome, NavigationError> {
		if !self.is_pending(to) {
			return Ok(PipelineOutcome::Failure(self.cancelled(to, from)));
		}
		for guard in guards {
			match guard.check(to, from).await.map_err(NavigationError::from)? {
				GuardVerdict::Allow => {}
				GuardVerdict::Abort => {
					return Ok(PipelineOutcome::Failure(NavigationFailure::Aborted {
						from: from.full_path.clone(),
						to: to.full_path.clone(),
					}));
				}
				GuardVerdict::Redirect(raw) => {
					return Ok(PipelineOutcome::Redirect(raw));
				}
			}
		}
		// a phase completing for a superseded target fails, not commits
		if !self.is_pending(to) {
			return Ok(PipelineOutcome::Failure(self.cancelled(to, from)));
		}
		Ok(PipelineOutcome::Allowed)
	}

	async fn finalize_navigation(
		&self,
		to: &Arc<ResolvedLocation>,
		from: &Arc<ResolvedLocation>,
		is_push: bool,
		replace: bool,
		state: Option<EntryState>,
	) -> Option<NavigationFailure> {
		if !self.is_pending(to) {
			return Some(self.cancelled(to, from));
		}
		let is_first = Arc::ptr_eq(from, &self.start);
		if is_push {
			// the very first navigation normalizes the entry in place
			if replace || is_first {
				self.history.replace(&to.full_path, state);
			} else {
				self.history.push(&to.full_path, state);
			}
		}
		*self.pending.write() = None;
		*self.current.write() = to.clone();
		tracing::debug!(to = %to.full_path, "navigation committed");
		self.notify_observers(to);
		self.handle_scroll(to, from, is_push, is_first).await;
		self.ready.settle(Ok(()));
		None
	}

	async fn handle_scroll(
		&self,
		to: &ResolvedLocation,
		from: &ResolvedLocation,
		is_push: bool,
		is_first: bool,
	) {
		let Some(behavior) = self.scroll_behavior.clone() else {
			return;
		};
		let state = self.history.state();
		let saved = if !is_push {
			let position = state.position().unwrap_or(-1);
			self.scroll_store
				.consume(&ScrollStore::key(position, &to.full_path))
		} else {
			None
		};
		let saved = saved.or_else(|| {
			if is_first || !is_push {
				state.scroll()
			} else {
				None
			}
		});
		if let Some(target) = behavior.handle(to, from, saved).await {
			self.history.scroll_to(&target);
		}
	}

	fn trigger_after_each(
		&self,
		to: &ResolvedLocation,
		from: &ResolvedLocation,
		failure: Option<&NavigationFailure>,
	) {
		for hook in self.after_hooks.snapshot() {
			hook(to, from, failure);
		}
	}

	fn notify_observers(&self, location: &ResolvedLocation) {
		for observer in self.observers.snapshot() {
			observer(location);
		}
	}

	/// Dispatches a terminal error to the registered handlers (or the log
	/// when none are registered) and settles ready-waiters with it.
	fn fail(
		&self,
		err: NavigationError,
		to: &ResolvedLocation,
		from: &ResolvedLocation,
	) -> NavigationError {
		let hooks = self.error_hooks.snapshot();
		if hooks.is_empty() {
			tracing::error!(
				error = %err,
				to = %to.full_path,
				from = %from.full_path,
				"unhandled navigation error"
			);
		}
		for hook in &hooks {
			hook(&err, to, from);
		}
		self.ready.settle(Err(err.clone()));
		err
	}
}

fn extract_changing_records(
	to: &ResolvedLocation,
	from: &ResolvedLocation,
) -> (
	Vec<Arc<RouteRecord>>,
	Vec<Arc<RouteRecord>>,
	Vec<Arc<RouteRecord>>,
) {
	let mut leaving = Vec::new();
	let mut updating = Vec::new();
	let mut entering = Vec::new();
	let depth = from.matched.len().max(to.matched.len());
	for index in 0..depth {
		if let Some(record) = from.matched.get(index) {
			if to
				.matched
				.iter()
				.any(|candidate| RouteRecord::is_same_record(candidate, record))
			{
				updating.push(record.clone());
			} else {
				leaving.push(record.clone());
			}
		}
		if let Some(record) = to.matched.get(index)
			&& !from
				.matched
				.iter()
				.any(|candidate| RouteRecord::is_same_record(candidate, record))
		{
			entering.push(record.clone());
		}
	}
	(leaving, updating, entering)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::history::MemoryHistory;
	use crate::location::LocationTarget;
	use crate::matcher::ViewHandle;

	fn record(path: &str, name: &str) -> RouteRecord {
		RouteRecord::new(path)
			.with_name(name)
			.with_default_view(ViewHandle::new(name.to_string()))
	}

	fn router(routes: Vec<RouteRecord>) -> Arc<Router> {
		Router::new(RouterOptions::new(Arc::new(MemoryHistory::new())).with_routes(routes))
			.unwrap()
	}

	#[tokio::test]
	async fn test_push_commits_current_location() {
		let router = router(vec![record("/", "home"), record("/users/:id", "user")]);

		let failure = router.push("/users/42").await.unwrap();
		assert!(failure.is_none());
		let current = router.current();
		assert_eq!(current.full_path, "/users/42");
		assert_eq!(current.name.as_deref(), Some("user"));
	}

	#[tokio::test]
	async fn test_first_navigation_replaces_entry() {
		let history = Arc::new(MemoryHistory::new());
		let router = Router::new(
			RouterOptions::new(history.clone()).with_route(record("/users/:id", "user")),
		)
		.unwrap();

		router.push("/users/1").await.unwrap();
		// the initial "/" entry was normalized in place, not stacked on
		assert_eq!(history.len(), 1);
		router.push("/users/2").await.unwrap();
		assert_eq!(history.len(), 2);
	}

	#[tokio::test]
	async fn test_duplicate_navigation_short_circuits() {
		let router = router(vec![record("/users/:id", "user")]);
		router.push("/users/1").await.unwrap();

		let failure = router.push("/users/1").await.unwrap();
		assert!(matches!(failure, Some(NavigationFailure::Duplicated { .. })));
	}

	#[tokio::test]
	async fn test_force_bypasses_duplicate_check() {
		let router = router(vec![record("/users/:id", "user")]);
		router.push("/users/1").await.unwrap();

		let target = LocationTarget::path("/users/1").with_force();
		let failure = router.push(target).await.unwrap();
		assert!(failure.is_none());
	}

	#[tokio::test]
	async fn test_resolve_is_pure() {
		let router = router(vec![record("/users/:id", "user")]);

		let resolved = router
			.resolve(LocationTarget::named("user").with_param("id", "42"))
			.unwrap();
		assert_eq!(resolved.path, "/users/42");
		assert_eq!(router.current().full_path, "/");
	}

	#[tokio::test]
	async fn test_unknown_name_is_terminal() {
		let router = router(vec![]);
		let result = router.push(LocationTarget::named("ghost")).await;
		assert!(matches!(
			result,
			Err(NavigationError::Matcher(MatcherError::UnknownName(_)))
		));
	}

	#[tokio::test]
	async fn test_wait_until_ready_resolves_after_first_navigation() {
		let router = router(vec![record("/", "home")]);
		assert!(!router.is_ready());

		router.push("/").await.unwrap();
		assert!(router.is_ready());
		router.wait_until_ready().await.unwrap();
	}

	#[tokio::test]
	async fn test_observers_see_commits() {
		let router = router(vec![record("/users/:id", "user")]);
		let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

		let seen_clone = seen.clone();
		let _subscription = router.observe_current(move |location| {
			seen_clone.lock().push(location.full_path.clone());
		});

		router.push("/users/1").await.unwrap();
		router.push("/users/2").await.unwrap();
		assert_eq!(*seen.lock(), vec!["/users/1", "/users/2"]);
	}

	#[tokio::test]
	async fn test_create_href_includes_base() {
		let history = Arc::new(MemoryHistory::with_base("/app"));
		let router = Router::new(
			RouterOptions::new(history).with_route(record("/users/:id", "user")),
		)
		.unwrap();

		let href = router
			.create_href(LocationTarget::named("user").with_param("id", "3"))
			.unwrap();
		assert_eq!(href, "/app/users/3");
	}

	#[tokio::test]
	async fn test_route_handle_removal() {
		let router = router(vec![]);
		let handle = router.add_route(record("/users", "users")).unwrap();
		assert!(router.has_route("users"));

		handle.remove();
		assert!(!router.has_route("users"));
	}
}
