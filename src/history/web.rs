//! Persistent location-bar history backend.
//!
//! The backend itself is host-agnostic: everything that touches the actual
//! location bar goes through the [`HostWindow`] bridge, so the full
//! push/replace/pop machinery runs (and is tested) natively. Each entry's
//! persisted state carries a monotonically increasing `position` counter;
//! pop direction is inferred by comparing the arriving counter with the one
//! being left.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::history::scroll::{ScrollPosition, ScrollTarget};
use crate::history::{
	EntryState, History, HistoryListener, ListenerHandle, ListenerSet, PopInfo,
};

/// Callback a host invokes when its stack moves underneath the backend.
pub type PopHandler = Arc<dyn Fn(String, Option<EntryState>) + Send + Sync>;

/// Bridge to the host's location bar and scroll surface.
pub trait HostWindow: Send + Sync {
	/// The portion of the address after the origin: path, search, and hash.
	fn location(&self) -> String;

	/// The state bag persisted with the current entry, if any.
	fn history_state(&self) -> Option<EntryState>;

	/// Appends an entry to the host stack.
	fn push_state(&self, state: &EntryState, url: &str);

	/// Replaces the current host entry in place.
	fn replace_state(&self, state: &EntryState, url: &str);

	/// Moves the host stack by `delta` entries.
	///
	/// The host must report the movement through the registered pop
	/// handler before returning. A host whose native stack moves
	/// asynchronously should instead deliver those movements straight to
	/// the pop handler as they happen and make this a queued request.
	fn go(&self, delta: i64);

	/// Registers (or clears) the handler for host-originated pops.
	fn set_pop_handler(&self, handler: Option<PopHandler>);

	/// The host's current scroll offset.
	fn scroll_position(&self) -> ScrollPosition {
		ScrollPosition::default()
	}

	/// Applies a scroll target.
	fn scroll_to(&self, _target: &ScrollTarget) {}
}

struct WebInner {
	location: String,
	state: EntryState,
	// location whose departure notification a suppressed go() swallows
	pause_for: Option<String>,
}

/// History backend over the host's persistent location-bar stack.
pub struct WebHistory {
	base: String,
	window: Arc<dyn HostWindow>,
	listeners: ListenerSet,
	inner: Mutex<WebInner>,
}

fn normalize_base(base: String) -> String {
	if base.contains('#') {
		base
	} else {
		base.trim_end_matches('/').to_string()
	}
}

fn strip_base(location: &str, base: &str) -> String {
	let stripped = location.strip_prefix(base).unwrap_or(location);
	if stripped.is_empty() {
		"/".to_string()
	} else {
		stripped.to_string()
	}
}

impl WebHistory {
	/// Attaches a backend to the host window under the given base prefix.
	pub fn new(base: impl Into<String>, window: Arc<dyn HostWindow>) -> Arc<Self> {
		let base = normalize_base(base.into());
		let location = strip_base(&window.location(), &base);
		let state = match window.history_state() {
			Some(state) => state,
			None => {
				// first attachment to this entry: seed the position counter
				let mut state = EntryState::new();
				state.set_position(0);
				state.insert("current", serde_json::json!(location.clone()));
				window.replace_state(&state, &href(&base, &location));
				state
			}
		};

		let history = Arc::new(Self {
			base,
			window: window.clone(),
			listeners: ListenerSet::new(),
			inner: Mutex::new(WebInner {
				location,
				state,
				pause_for: None,
			}),
		});

		let weak: Weak<WebHistory> = Arc::downgrade(&history);
		window.set_pop_handler(Some(Arc::new(move |location, state| {
			if let Some(history) = weak.upgrade() {
				history.handle_pop(location, state);
			}
		})));
		history
	}

	fn handle_pop(&self, host_location: String, new_state: Option<EntryState>) {
		let to = strip_base(&host_location, &self.base);
		let mut adopt_state: Option<EntryState> = None;
		let notification = {
			let mut inner = self.inner.lock();
			let from = std::mem::replace(&mut inner.location, to.clone());
			let from_position = inner.state.position();
			match new_state {
				Some(state) => {
					let delta = match (state.position(), from_position) {
						(Some(new), Some(old)) => new - old,
						_ => 0,
					};
					inner.state = state;
					if inner.pause_for.as_deref() == Some(from.as_str()) {
						inner.pause_for = None;
						None
					} else {
						Some((from, delta))
					}
				}
				None => {
					// an entry we never touched: adopt it at the position
					// we were on, without notifying
					let mut state = EntryState::new();
					state.set_position(from_position.unwrap_or(0));
					state.insert("current", serde_json::json!(to.clone()));
					inner.state = state.clone();
					adopt_state = Some(state);
					None
				}
			}
		};
		if let Some(state) = adopt_state {
			self.window.replace_state(&state, &href(&self.base, &to));
		}
		if let Some((from, delta)) = notification {
			self.listeners.notify(&to, &from, PopInfo::from_delta(delta));
		}
	}
}

fn href(base: &str, location: &str) -> String {
	match base.find('#') {
		// everything before the hash belongs to the host document
		Some(index) => format!("{}{location}", &base[index..]),
		None => format!("{base}{location}"),
	}
}

impl History for WebHistory {
	fn location(&self) -> String {
		self.inner.lock().location.clone()
	}

	fn state(&self) -> EntryState {
		self.inner.lock().state.clone()
	}

	fn base(&self) -> &str {
		&self.base
	}

	fn push(&self, to: &str, state: Option<EntryState>) {
		let (departing_state, departing_url, new_state) = {
			let mut inner = self.inner.lock();
			// capture the scroll offset into the entry being left so a
			// later pop back to it can restore
			let mut departing = inner.state.clone();
			departing.set_scroll(self.window.scroll_position());
			departing.insert("forward", serde_json::json!(to));
			let departing_url = href(&self.base, &inner.location);

			let mut entry = EntryState::new();
			entry.insert("back", serde_json::json!(inner.location.clone()));
			entry.insert("current", serde_json::json!(to));
			entry.set_position(departing.position().unwrap_or(0) + 1);
			if let Some(extra) = state {
				entry.merge(extra);
			}
			inner.location = to.to_string();
			inner.state = entry.clone();
			(departing, departing_url, entry)
		};
		self.window.replace_state(&departing_state, &departing_url);
		self.window.push_state(&new_state, &href(&self.base, to));
	}

	fn replace(&self, to: &str, state: Option<EntryState>) {
		let new_state = {
			let mut inner = self.inner.lock();
			let mut entry = EntryState::new();
			entry.set_position(inner.state.position().unwrap_or(0));
			entry.insert("current", serde_json::json!(to));
			entry.insert("replaced", serde_json::json!(true));
			if let Some(extra) = state {
				entry.merge(extra);
			}
			inner.location = to.to_string();
			inner.state = entry.clone();
			entry
		};
		self.window.replace_state(&new_state, &href(&self.base, to));
	}

	fn go(&self, delta: i64, trigger_listeners: bool) {
		if !trigger_listeners {
			let mut inner = self.inner.lock();
			inner.pause_for = Some(inner.location.clone());
		}
		self.window.go(delta);
	}

	fn listen(&self, listener: HistoryListener) -> ListenerHandle {
		self.listeners.add(listener)
	}

	fn create_href(&self, location: &str) -> String {
		href(&self.base, location)
	}

	fn destroy(&self) {
		self.window.set_pop_handler(None);
		self.listeners.clear();
	}

	fn scroll_position(&self) -> ScrollPosition {
		self.window.scroll_position()
	}

	fn scroll_to(&self, target: &ScrollTarget) {
		self.window.scroll_to(target);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::history::NavigationDirection;
	use parking_lot::Mutex as PlMutex;

	/// Host stack fake: a vector of (url, state) entries with a cursor,
	/// reporting movements through the registered pop handler like a real
	/// location bar would.
	pub(crate) struct FakeWindow {
		stack: PlMutex<(Vec<(String, Option<EntryState>)>, usize)>,
		pop_handler: PlMutex<Option<PopHandler>>,
		scroll: PlMutex<ScrollPosition>,
	}

	impl FakeWindow {
		pub(crate) fn new(initial: &str) -> Arc<Self> {
			Arc::new(Self {
				stack: PlMutex::new((vec![(initial.to_string(), None)], 0)),
				pop_handler: PlMutex::new(None),
				scroll: PlMutex::new(ScrollPosition::default()),
			})
		}

		pub(crate) fn set_scroll(&self, position: ScrollPosition) {
			*self.scroll.lock() = position;
		}

		pub(crate) fn stack_len(&self) -> usize {
			self.stack.lock().0.len()
		}
	}

	impl HostWindow for FakeWindow {
		fn location(&self) -> String {
			let stack = self.stack.lock();
			stack.0[stack.1].0.clone()
		}

		fn history_state(&self) -> Option<EntryState> {
			let stack = self.stack.lock();
			stack.0[stack.1].1.clone()
		}

		fn push_state(&self, state: &EntryState, url: &str) {
			let mut stack = self.stack.lock();
			let cut = stack.1 + 1;
			stack.0.truncate(cut);
			stack.0.push((url.to_string(), Some(state.clone())));
			stack.1 = stack.0.len() - 1;
		}

		fn replace_state(&self, state: &EntryState, url: &str) {
			let mut stack = self.stack.lock();
			let index = stack.1;
			stack.0[index] = (url.to_string(), Some(state.clone()));
		}

		fn go(&self, delta: i64) {
			let (url, state) = {
				let mut stack = self.stack.lock();
				let target = (stack.1 as i64 + delta).clamp(0, stack.0.len() as i64 - 1);
				stack.1 = target as usize;
				stack.0[stack.1].clone()
			};
			let handler = self.pop_handler.lock().clone();
			if let Some(handler) = handler {
				handler(url, state);
			}
		}

		fn set_pop_handler(&self, handler: Option<PopHandler>) {
			*self.pop_handler.lock() = handler;
		}

		fn scroll_position(&self) -> ScrollPosition {
			*self.scroll.lock()
		}
	}

	#[test]
	fn test_push_tracks_position() {
		let window = FakeWindow::new("/");
		let history = WebHistory::new("", window);

		history.push("/a", None);
		history.push("/b", None);

		assert_eq!(history.location(), "/b");
		assert_eq!(history.state().position(), Some(2));
	}

	#[test]
	fn test_pop_infers_direction_from_positions() {
		let window = FakeWindow::new("/");
		let history = WebHistory::new("", window.clone());
		history.push("/a", None);
		history.push("/b", None);

		let seen = Arc::new(PlMutex::new(Vec::new()));
		let seen_clone = seen.clone();
		let _handle = history.listen(Arc::new(move |to, from, info| {
			seen_clone
				.lock()
				.push((to.to_string(), from.to_string(), info.delta, info.direction));
		}));

		window.go(-2);
		assert_eq!(
			*seen.lock(),
			vec![(
				"/".to_string(),
				"/b".to_string(),
				-2,
				NavigationDirection::Back
			)]
		);
		assert_eq!(history.location(), "/");
	}

	#[test]
	fn test_suppressed_go_swallows_one_notification() {
		let window = FakeWindow::new("/");
		let history = WebHistory::new("", window.clone());
		history.push("/a", None);

		let seen = Arc::new(PlMutex::new(0usize));
		let seen_clone = seen.clone();
		let _handle = history.listen(Arc::new(move |_, _, _| {
			*seen_clone.lock() += 1;
		}));

		history.go(-1, false);
		assert_eq!(*seen.lock(), 0);
		history.go(1, true);
		assert_eq!(*seen.lock(), 1);
	}

	#[test]
	fn test_push_captures_departing_scroll() {
		let window = FakeWindow::new("/");
		let history = WebHistory::new("", window.clone());
		window.set_scroll(ScrollPosition { left: 0.0, top: 250.0 });

		history.push("/a", None);
		// popping back reveals the scroll captured on the departed entry
		window.go(-1);
		assert_eq!(
			history.state().scroll(),
			Some(ScrollPosition { left: 0.0, top: 250.0 })
		);
	}

	#[test]
	fn test_replace_keeps_position() {
		let window = FakeWindow::new("/");
		let history = WebHistory::new("", window.clone());
		history.push("/a", None);

		history.replace("/b", None);
		assert_eq!(history.location(), "/b");
		assert_eq!(history.state().position(), Some(1));
		assert_eq!(window.stack_len(), 2);
	}

	#[test]
	fn test_base_stripping_and_href() {
		let window = FakeWindow::new("/app/users");
		let history = WebHistory::new("/app/", window);

		assert_eq!(history.base(), "/app");
		assert_eq!(history.location(), "/users");
		assert_eq!(history.create_href("/users"), "/app/users");
	}
}
