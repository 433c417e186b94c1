//! Hash-fragment history backend.
//!
//! Delegates entirely to [`WebHistory`] after normalizing the base to end
//! in `#`, so every entry lives in the fragment and the host never reloads
//! the document.

use std::sync::Arc;

use crate::history::scroll::{ScrollPosition, ScrollTarget};
use crate::history::web::{HostWindow, WebHistory};
use crate::history::{EntryState, History, HistoryListener, ListenerHandle};

/// History backend storing entries in the `#` fragment.
pub struct HashHistory {
	inner: Arc<WebHistory>,
}

impl HashHistory {
	/// Attaches a backend to the host window.
	///
	/// A `#` is appended to the base when absent. A base that contains a
	/// `#` anywhere but at the end is kept as supplied, with a warning.
	pub fn new(base: impl Into<String>, window: Arc<dyn HostWindow>) -> Arc<Self> {
		let mut base = base.into();
		if !base.contains('#') {
			base.push('#');
		} else if !base.ends_with('#') {
			tracing::warn!(%base, "hash history base should end with '#'");
		}
		Arc::new(Self {
			inner: WebHistory::new(base, window),
		})
	}
}

impl History for HashHistory {
	fn location(&self) -> String {
		self.inner.location()
	}

	fn state(&self) -> EntryState {
		self.inner.state()
	}

	fn base(&self) -> &str {
		self.inner.base()
	}

	fn push(&self, to: &str, state: Option<EntryState>) {
		self.inner.push(to, state);
	}

	fn replace(&self, to: &str, state: Option<EntryState>) {
		self.inner.replace(to, state);
	}

	fn go(&self, delta: i64, trigger_listeners: bool) {
		self.inner.go(delta, trigger_listeners);
	}

	fn listen(&self, listener: HistoryListener) -> ListenerHandle {
		self.inner.listen(listener)
	}

	fn create_href(&self, location: &str) -> String {
		self.inner.create_href(location)
	}

	fn destroy(&self) {
		self.inner.destroy();
	}

	fn scroll_position(&self) -> ScrollPosition {
		self.inner.scroll_position()
	}

	fn scroll_to(&self, target: &ScrollTarget) {
		self.inner.scroll_to(target);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::history::EntryState;
	use crate::history::web::PopHandler;
	use parking_lot::Mutex;

	struct StubWindow {
		location: Mutex<String>,
	}

	impl HostWindow for StubWindow {
		fn location(&self) -> String {
			self.location.lock().clone()
		}

		fn history_state(&self) -> Option<EntryState> {
			None
		}

		fn push_state(&self, _state: &EntryState, url: &str) {
			*self.location.lock() = url.to_string();
		}

		fn replace_state(&self, _state: &EntryState, url: &str) {
			*self.location.lock() = url.to_string();
		}

		fn go(&self, _delta: i64) {}

		fn set_pop_handler(&self, _handler: Option<PopHandler>) {}
	}

	fn stub(location: &str) -> Arc<StubWindow> {
		Arc::new(StubWindow {
			location: Mutex::new(location.to_string()),
		})
	}

	#[test]
	fn test_base_gains_trailing_hash() {
		let history = HashHistory::new("/app", stub("/app#/"));
		assert_eq!(history.base(), "/app#");
	}

	#[test]
	fn test_odd_base_is_kept() {
		let history = HashHistory::new("/app#/prefix", stub("/app#/prefix/"));
		assert_eq!(history.base(), "/app#/prefix");
	}

	#[test]
	fn test_href_lives_in_fragment() {
		let history = HashHistory::new("/app", stub("/app#/"));
		assert_eq!(history.create_href("/users"), "#/users");
	}
}
