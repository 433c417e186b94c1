//! History abstraction.
//!
//! A uniform contract over an ordered, externally driven navigation stack.
//! Three interchangeable backends implement it: the persistent location-bar
//! stack ([`WebHistory`]), the hash-fragment variant ([`HashHistory`]), and
//! an explicit in-memory stack ([`MemoryHistory`]).

pub mod hash;
pub mod memory;
pub mod scroll;
pub mod web;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::history::scroll::{ScrollPosition, ScrollTarget};

pub use hash::HashHistory;
pub use memory::MemoryHistory;
pub use web::{HostWindow, WebHistory};

/// Direction of a pop movement, inferred from the position counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationDirection {
	/// The stack moved towards older entries.
	Back,
	/// The stack moved towards newer entries.
	Forward,
	/// The backend could not tell.
	Unknown,
}

/// Details of an externally driven stack movement handed to listeners.
#[derive(Debug, Clone, Copy)]
pub struct PopInfo {
	/// Signed number of entries the stack moved by.
	pub delta: i64,
	/// Direction of the movement.
	pub direction: NavigationDirection,
}

impl PopInfo {
	/// Builds the info for a movement of `delta` entries.
	pub fn from_delta(delta: i64) -> Self {
		let direction = match delta.cmp(&0) {
			std::cmp::Ordering::Greater => NavigationDirection::Forward,
			std::cmp::Ordering::Less => NavigationDirection::Back,
			std::cmp::Ordering::Equal => NavigationDirection::Unknown,
		};
		Self { delta, direction }
	}
}

/// Callback invoked when the backend's stack moves under the router.
pub type HistoryListener = Arc<dyn Fn(&str, &str, PopInfo) + Send + Sync>;

/// The opaque state bag persisted with each history entry.
///
/// Round-trips through JSON. The `position` counter is what the backends
/// need to infer pop directions; a saved scroll offset rides along when the
/// entry was left through a push.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryState(serde_json::Map<String, serde_json::Value>);

impl EntryState {
	/// An empty bag.
	pub fn new() -> Self {
		Self::default()
	}

	/// The monotonically increasing stack position of this entry.
	pub fn position(&self) -> Option<i64> {
		self.0.get("position").and_then(serde_json::Value::as_i64)
	}

	/// Sets the stack position.
	pub fn set_position(&mut self, position: i64) {
		self.0.insert("position".to_string(), position.into());
	}

	/// The scroll offset captured when this entry was left, if any.
	pub fn scroll(&self) -> Option<ScrollPosition> {
		self.0
			.get("scroll")
			.and_then(|value| serde_json::from_value(value.clone()).ok())
	}

	/// Records the scroll offset of the entry being left.
	pub fn set_scroll(&mut self, position: ScrollPosition) {
		if let Ok(value) = serde_json::to_value(position) {
			self.0.insert("scroll".to_string(), value);
		}
	}

	/// Reads a custom entry.
	pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
		self.0.get(key)
	}

	/// Writes a custom entry.
	pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
		self.0.insert(key.into(), value);
	}

	/// Overlays `other` on top of this bag.
	pub fn merge(&mut self, other: EntryState) {
		for (key, value) in other.0 {
			self.0.insert(key, value);
		}
	}
}

/// Uniform contract over a navigation stack backend.
pub trait History: Send + Sync {
	/// The current entry, as the portion of the address after `base`.
	fn location(&self) -> String;

	/// Snapshot of the state bag associated with the current entry.
	fn state(&self) -> EntryState;

	/// Path prefix prepended to every href.
	fn base(&self) -> &str;

	/// Appends an entry, discarding any forward branch.
	fn push(&self, to: &str, state: Option<EntryState>);

	/// Replaces the current entry in place.
	fn replace(&self, to: &str, state: Option<EntryState>);

	/// Moves the stack cursor by `delta` entries. Listeners are notified
	/// unless `trigger_listeners` is false.
	fn go(&self, delta: i64, trigger_listeners: bool);

	/// Registers a listener for externally driven stack movements.
	fn listen(&self, listener: HistoryListener) -> ListenerHandle;

	/// Computes the full href for an entry.
	fn create_href(&self, location: &str) -> String;

	/// Detaches the backend from its host; listeners are dropped.
	fn destroy(&self);

	/// The host's current scroll offset, when the backend has one.
	fn scroll_position(&self) -> ScrollPosition {
		ScrollPosition::default()
	}

	/// Applies a scroll target on the host, when the backend has one.
	fn scroll_to(&self, _target: &ScrollTarget) {}
}

type ListenerEntries = Mutex<Vec<(u64, HistoryListener)>>;

/// Shared listener list used by every backend.
#[derive(Default)]
pub(crate) struct ListenerSet {
	entries: Arc<ListenerEntries>,
	next_id: AtomicU64,
}

impl ListenerSet {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	pub(crate) fn add(&self, listener: HistoryListener) -> ListenerHandle {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		self.entries.lock().push((id, listener));
		ListenerHandle {
			id,
			entries: Arc::downgrade(&self.entries),
		}
	}

	/// Notifies a snapshot of the listeners, outside the lock.
	pub(crate) fn notify(&self, to: &str, from: &str, info: PopInfo) {
		let snapshot: Vec<HistoryListener> = self
			.entries
			.lock()
			.iter()
			.map(|(_, listener)| listener.clone())
			.collect();
		for listener in snapshot {
			listener(to, from, info);
		}
	}

	pub(crate) fn clear(&self) {
		self.entries.lock().clear();
	}
}

/// Handle returned by [`History::listen`]; unsubscribes on demand.
pub struct ListenerHandle {
	id: u64,
	entries: Weak<ListenerEntries>,
}

impl ListenerHandle {
	/// Unregisters the listener. Idempotent.
	pub fn unlisten(&self) {
		if let Some(entries) = self.entries.upgrade() {
			entries.lock().retain(|(id, _)| *id != self.id);
		}
	}
}

impl std::fmt::Debug for ListenerHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ListenerHandle").field("id", &self.id).finish()
	}
}
