//! Scroll position memoization.
//!
//! Offsets are captured just before a guard-checked pop navigation begins
//! and consumed, read-once, when the arriving navigation finalizes and the
//! host's scroll behavior asks for the previously saved position.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::location::ResolvedLocation;

/// A captured scroll offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollPosition {
	/// Horizontal offset in host units.
	pub left: f64,
	/// Vertical offset in host units.
	pub top: f64,
}

/// Where the host should scroll after a navigation settles.
#[derive(Debug, Clone, PartialEq)]
pub enum ScrollTarget {
	/// Absolute coordinates.
	Position(ScrollPosition),
	/// An element the host resolves, with an optional offset from it.
	Element {
		/// Host-interpreted selector, e.g. a CSS selector or fragment id.
		selector: String,
		/// Offset applied relative to the element.
		offset: Option<ScrollPosition>,
	},
}

/// Host-supplied scroll behavior.
///
/// Invoked once per successful navigation after the host's view update
/// settles; returning `None` leaves the scroll untouched.
#[async_trait]
pub trait ScrollBehavior: Send + Sync {
	/// Decides where to scroll for the navigation from `from` to `to`.
	/// `saved` carries the memoized offset when the navigation returns to
	/// an entry that was previously left.
	async fn handle(
		&self,
		to: &ResolvedLocation,
		from: &ResolvedLocation,
		saved: Option<ScrollPosition>,
	) -> Option<ScrollTarget>;
}

/// Process-wide map of memoized scroll offsets.
///
/// Keys combine the stack position of the departed entry with the departing
/// path; consuming a key removes it.
#[derive(Default)]
pub(crate) struct ScrollStore {
	positions: Mutex<HashMap<String, ScrollPosition>>,
}

impl ScrollStore {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	/// The composite key for an entry at `position` with the given path.
	pub(crate) fn key(position: i64, path: &str) -> String {
		format!("{position}{path}")
	}

	pub(crate) fn save(&self, key: String, position: ScrollPosition) {
		self.positions.lock().insert(key, position);
	}

	/// Takes the saved offset for `key`, removing it.
	pub(crate) fn consume(&self, key: &str) -> Option<ScrollPosition> {
		self.positions.lock().remove(key)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_store_consume_is_read_once() {
		let store = ScrollStore::new();
		let key = ScrollStore::key(2, "/users");
		store.save(key.clone(), ScrollPosition { left: 0.0, top: 300.0 });

		assert_eq!(
			store.consume(&key),
			Some(ScrollPosition { left: 0.0, top: 300.0 })
		);
		assert_eq!(store.consume(&key), None);
	}

	#[test]
	fn test_key_combines_position_and_path() {
		assert_eq!(ScrollStore::key(3, "/users"), "3/users");
		assert_ne!(ScrollStore::key(3, "/users"), ScrollStore::key(2, "/users"));
	}
}
