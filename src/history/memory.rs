//! In-memory history backend.
//!
//! An explicit entry queue with a position cursor: push truncates any
//! forward branch before appending, replace swaps the current entry in
//! place, and `go` clamps the cursor into bounds and synchronously notifies
//! listeners.

use crate::history::{EntryState, History, HistoryListener, ListenerHandle, ListenerSet, PopInfo};

use parking_lot::Mutex;

struct MemoryInner {
	queue: Vec<(String, EntryState)>,
	position: usize,
}

/// History backend holding its stack entirely in memory.
///
/// The natural backend for tests and for hosts without a location bar.
pub struct MemoryHistory {
	base: String,
	inner: Mutex<MemoryInner>,
	listeners: ListenerSet,
}

impl MemoryHistory {
	/// Creates a backend with an empty base, positioned on `/`.
	pub fn new() -> Self {
		Self::with_base("")
	}

	/// Creates a backend with the given base prefix.
	pub fn with_base(base: impl Into<String>) -> Self {
		let mut initial = EntryState::new();
		initial.set_position(0);
		Self {
			base: base.into(),
			inner: Mutex::new(MemoryInner {
				queue: vec![("/".to_string(), initial)],
				position: 0,
			}),
			listeners: ListenerSet::new(),
		}
	}

	/// Number of entries currently on the stack.
	pub fn len(&self) -> usize {
		self.inner.lock().queue.len()
	}

	/// Whether the stack holds no entries.
	pub fn is_empty(&self) -> bool {
		self.inner.lock().queue.is_empty()
	}
}

impl Default for MemoryHistory {
	fn default() -> Self {
		Self::new()
	}
}

impl History for MemoryHistory {
	fn location(&self) -> String {
		let inner = self.inner.lock();
		inner.queue[inner.position].0.clone()
	}

	fn state(&self) -> EntryState {
		let inner = self.inner.lock();
		inner.queue[inner.position].1.clone()
	}

	fn base(&self) -> &str {
		&self.base
	}

	fn push(&self, to: &str, state: Option<EntryState>) {
		let mut inner = self.inner.lock();
		// branch-and-discard: everything past the cursor is gone
		let cut = inner.position + 1;
		inner.queue.truncate(cut);
		let mut entry_state = EntryState::new();
		entry_state.set_position(inner.queue.len() as i64);
		if let Some(extra) = state {
			entry_state.merge(extra);
		}
		inner.queue.push((to.to_string(), entry_state));
		inner.position = inner.queue.len() - 1;
	}

	fn replace(&self, to: &str, state: Option<EntryState>) {
		let mut inner = self.inner.lock();
		let position = inner.position;
		let mut entry_state = EntryState::new();
		entry_state.set_position(position as i64);
		if let Some(extra) = state {
			entry_state.merge(extra);
		}
		inner.queue[position] = (to.to_string(), entry_state);
	}

	fn go(&self, delta: i64, trigger_listeners: bool) {
		let (to, from) = {
			let mut inner = self.inner.lock();
			let from = inner.queue[inner.position].0.clone();
			let target = inner.position as i64 + delta;
			inner.position = target.clamp(0, inner.queue.len() as i64 - 1) as usize;
			(inner.queue[inner.position].0.clone(), from)
		};
		if trigger_listeners {
			self.listeners.notify(&to, &from, PopInfo::from_delta(delta));
		}
	}

	fn listen(&self, listener: HistoryListener) -> ListenerHandle {
		self.listeners.add(listener)
	}

	fn create_href(&self, location: &str) -> String {
		format!("{}{location}", self.base)
	}

	fn destroy(&self) {
		self.listeners.clear();
		let mut inner = self.inner.lock();
		let mut initial = EntryState::new();
		initial.set_position(0);
		inner.queue = vec![("/".to_string(), initial)];
		inner.position = 0;
	}
}
