//! Navigation guards and guard registries.
//!
//! A guard inspects a pending navigation and either lets it advance, aborts
//! it, or redirects it. Guards run strictly sequentially within a phase; a
//! guard later in the phase never starts before an earlier one's result is
//! known.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};

use crate::error::GuardError;
use crate::location::{RawLocation, ResolvedLocation};

/// The decision a guard returns.
#[derive(Debug, Clone)]
pub enum GuardVerdict {
	/// Let the navigation advance to the next guard.
	Allow,
	/// Abort the navigation; the current location stays in place.
	Abort,
	/// Abandon this navigation and chase a new target instead.
	Redirect(RawLocation),
}

/// A navigation lifecycle guard.
#[async_trait]
pub trait NavigationGuard: Send + Sync {
	/// Inspects the pending navigation from `from` to `to`.
	///
	/// # Errors
	///
	/// A returned error aborts the pipeline without committing and is
	/// dispatched to the registered error handlers.
	async fn check(
		&self,
		to: &ResolvedLocation,
		from: &ResolvedLocation,
	) -> Result<GuardVerdict, GuardError>;
}

struct FnGuard<F>(F);

#[async_trait]
impl<F> NavigationGuard for FnGuard<F>
where
	F: Fn(&ResolvedLocation, &ResolvedLocation) -> Result<GuardVerdict, GuardError>
		+ Send
		+ Sync,
{
	async fn check(
		&self,
		to: &ResolvedLocation,
		from: &ResolvedLocation,
	) -> Result<GuardVerdict, GuardError> {
		(self.0)(to, from)
	}
}

/// Wraps a synchronous closure as a guard.
pub fn guard_fn<F>(f: F) -> Arc<dyn NavigationGuard>
where
	F: Fn(&ResolvedLocation, &ResolvedLocation) -> Result<GuardVerdict, GuardError>
		+ Send
		+ Sync
		+ 'static,
{
	Arc::new(FnGuard(f))
}

struct AsyncFnGuard<F>(F);

#[async_trait]
impl<F> NavigationGuard for AsyncFnGuard<F>
where
	F: for<'a> Fn(
			&'a ResolvedLocation,
			&'a ResolvedLocation,
		) -> BoxFuture<'a, Result<GuardVerdict, GuardError>>
		+ Send
		+ Sync,
{
	async fn check(
		&self,
		to: &ResolvedLocation,
		from: &ResolvedLocation,
	) -> Result<GuardVerdict, GuardError> {
		(self.0)(to, from).await
	}
}

/// Wraps a future-returning closure as a guard.
pub fn async_guard_fn<F>(f: F) -> Arc<dyn NavigationGuard>
where
	F: for<'a> Fn(
			&'a ResolvedLocation,
			&'a ResolvedLocation,
		) -> BoxFuture<'a, Result<GuardVerdict, GuardError>>
		+ Send
		+ Sync
		+ 'static,
{
	Arc::new(AsyncFnGuard(f))
}

/// Removal handle for a registered guard or hook.
///
/// Dropping the handle does not unregister; call [`GuardHandle::remove`].
/// Removal is stable: removing during a running phase does not perturb that
/// phase, which iterates over a snapshot.
pub struct GuardHandle {
	remove: Box<dyn Fn() + Send + Sync>,
}

impl GuardHandle {
	/// Unregisters the guard or hook. Idempotent.
	pub fn remove(&self) {
		(self.remove)();
	}
}

impl std::fmt::Debug for GuardHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("GuardHandle").finish()
	}
}

/// An ordered registry of guards or hooks with stable removal.
///
/// Iteration always happens over a snapshot, so a hook unregistering itself
/// or another mid-phase does not perturb the current pass.
pub(crate) struct HookRegistry<T: Clone> {
	entries: Arc<RwLock<Vec<(u64, T)>>>,
	next_id: AtomicU64,
}

impl<T: Clone + Send + Sync + 'static> HookRegistry<T> {
	pub(crate) fn new() -> Self {
		Self {
			entries: Arc::new(RwLock::new(Vec::new())),
			next_id: AtomicU64::new(0),
		}
	}

	pub(crate) fn add(&self, entry: T) -> GuardHandle {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		self.entries.write().push((id, entry));
		let entries = Arc::downgrade(&self.entries);
		GuardHandle {
			remove: Box::new(move || {
				if let Some(entries) = entries.upgrade() {
					entries.write().retain(|(entry_id, _)| *entry_id != id);
				}
			}),
		}
	}

	/// Snapshots the registry in registration order.
	pub(crate) fn snapshot(&self) -> Vec<T> {
		self.entries
			.read()
			.iter()
			.map(|(_, entry)| entry.clone())
			.collect()
	}
}

/// A deferred callback queued by a guard for execution after the navigation
/// is accepted (or once a host handler instance exists).
pub type EnterCallback = Box<dyn FnOnce() + Send>;

/// Queue of deferred enter callbacks.
///
/// Guards enqueue; the orchestrator flushes the queue in the enter-callback
/// phase. Hosts may also [`drain`](EnterCallbackQueue::drain) the queue to
/// flush callbacks themselves once a handler instance exists.
#[derive(Default)]
pub struct EnterCallbackQueue {
	queue: Mutex<Vec<EnterCallback>>,
}

impl EnterCallbackQueue {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	/// Queues a callback for the next enter-callback flush.
	pub fn enqueue(&self, callback: EnterCallback) {
		self.queue.lock().push(callback);
	}

	/// Removes and returns every queued callback without running it.
	pub fn drain(&self) -> Vec<EnterCallback> {
		std::mem::take(&mut *self.queue.lock())
	}

	/// Runs and clears every queued callback, in queue order.
	pub fn flush(&self) {
		for callback in self.drain() {
			callback();
		}
	}
}

impl std::fmt::Debug for EnterCallbackQueue {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EnterCallbackQueue")
			.field("queued", &self.queue.lock().len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::AtomicUsize;

	#[tokio::test]
	async fn test_guard_fn_allow() {
		let guard = guard_fn(|_, _| Ok(GuardVerdict::Allow));
		let location = ResolvedLocation::start();
		let verdict = guard.check(&location, &location).await.unwrap();
		assert!(matches!(verdict, GuardVerdict::Allow));
	}

	#[tokio::test]
	async fn test_async_guard_fn() {
		fn abort<'a>(
			_to: &'a ResolvedLocation,
			_from: &'a ResolvedLocation,
		) -> BoxFuture<'a, Result<GuardVerdict, GuardError>> {
			Box::pin(async { Ok(GuardVerdict::Abort) })
		}

		let guard = async_guard_fn(abort);
		let location = ResolvedLocation::start();
		let verdict = guard.check(&location, &location).await.unwrap();
		assert!(matches!(verdict, GuardVerdict::Abort));
	}

	#[test]
	fn test_registry_snapshot_order() {
		let registry: HookRegistry<u32> = HookRegistry::new();
		registry.add(1);
		registry.add(2);
		registry.add(3);
		assert_eq!(registry.snapshot(), vec![1, 2, 3]);
	}

	#[test]
	fn test_registry_stable_removal() {
		let registry: HookRegistry<u32> = HookRegistry::new();
		let _first = registry.add(1);
		let second = registry.add(2);
		registry.add(3);

		let snapshot = registry.snapshot();
		second.remove();
		// removal twice is a no-op
		second.remove();

		assert_eq!(snapshot, vec![1, 2, 3]);
		assert_eq!(registry.snapshot(), vec![1, 3]);
	}

	#[test]
	fn test_enter_callback_queue_flush() {
		let counter = Arc::new(AtomicUsize::new(0));
		let queue = EnterCallbackQueue::new();

		let counter_clone = counter.clone();
		queue.enqueue(Box::new(move || {
			counter_clone.fetch_add(1, Ordering::SeqCst);
		}));

		queue.flush();
		queue.flush();
		assert_eq!(counter.load(Ordering::SeqCst), 1);
	}
}
