//! Shared test doubles for the integration suites.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use segue::history::scroll::{ScrollPosition, ScrollTarget};
use segue::history::web::PopHandler;
use segue::{EntryState, HostWindow};

/// Host stack fake: a vector of (url, state) entries with a cursor that
/// reports movements through the registered pop handler, the way a real
/// location bar does.
pub struct FakeWindow {
	stack: Mutex<(Vec<(String, Option<EntryState>)>, usize)>,
	pop_handler: Mutex<Option<PopHandler>>,
	scroll: Mutex<ScrollPosition>,
	scrolled_to: Mutex<Vec<ScrollTarget>>,
}

impl FakeWindow {
	pub fn new(initial: &str) -> Arc<Self> {
		Arc::new(Self {
			stack: Mutex::new((vec![(initial.to_string(), None)], 0)),
			pop_handler: Mutex::new(None),
			scroll: Mutex::new(ScrollPosition::default()),
			scrolled_to: Mutex::new(Vec::new()),
		})
	}

	/// Simulates the user scrolling the document.
	pub fn set_scroll(&self, position: ScrollPosition) {
		*self.scroll.lock() = position;
	}

	/// Scroll targets the backend applied, in order.
	pub fn scrolled_to(&self) -> Vec<ScrollTarget> {
		self.scrolled_to.lock().clone()
	}

	pub fn stack_len(&self) -> usize {
		self.stack.lock().0.len()
	}

	/// Simulates a user-driven back/forward movement.
	pub fn user_go(&self, delta: i64) {
		self.go(delta);
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

	fn scroll_to(&self, target: &ScrollTarget) {
		self.scrolled_to.lock().push(target.clone());
	}
}
