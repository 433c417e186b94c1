//! # Segue
//!
//! Client-side navigation router: nested path matching, a cancellable
//! multi-phase guard pipeline, and pluggable history backends.
//!
//! The crate is the routing core a host UI layer builds on. It resolves a
//! URL-like target to an ordered chain of registered route records, ranks
//! overlapping patterns deterministically, and runs every navigation
//! through an ordered, cancellable confirmation sequence before committing
//! it to a history backend. Rendering, dependency injection, and link
//! helpers stay on the host side; they consume [`Router::current`],
//! [`Router::resolve`], and the per-depth record lookup.
//!
//! ## Architecture
//!
//! ```text
//! RawLocation → Router::push ─ resolve ─ redirects ─ guard phases ─ finalize
//!                  │              │                                    │
//!             MatcherTable   CompiledPattern                     History backend
//!             (record tree)  (regex + rank)                  (web / hash / memory)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use segue::history::MemoryHistory;
//! use segue::matcher::RouteRecord;
//! use segue::router::{Router, RouterOptions};
//!
//! # tokio_test::block_on(async {
//! let router = Router::new(
//! 	RouterOptions::new(Arc::new(MemoryHistory::new()))
//! 		.with_route(RouteRecord::new("/").with_name("home"))
//! 		.with_route(RouteRecord::new("/users/:id").with_name("user")),
//! )
//! .unwrap();
//!
//! let failure = router.push("/users/42").await.unwrap();
//! assert!(failure.is_none());
//! assert_eq!(router.current().name.as_deref(), Some("user"));
//! # });
//! ```
//!
//! Navigation outcomes are split the way a host wants to consume them:
//! recoverable outcomes (aborted, cancelled, duplicated) come back as a
//! typed [`NavigationFailure`] value, while terminal conditions (infinite
//! redirects, guard exceptions) are [`NavigationError`]s dispatched to the
//! registered error handlers.

pub mod error;
pub mod history;
pub mod location;
pub mod matcher;
pub mod pattern;
pub mod router;

pub use error::{
	GuardError, MatcherError, NavigationError, NavigationFailure, PatternError,
};
pub use history::{
	EntryState, HashHistory, History, HostWindow, MemoryHistory, NavigationDirection, PopInfo,
	WebHistory,
};
pub use location::{
	LocationTarget, ParamValue, Params, Query, RawLocation, ResolvedLocation,
};
pub use matcher::{
	DEFAULT_VIEW, MatcherTable, RedirectTarget, RouteRecord, ViewHandle,
};
pub use pattern::{CompiledPattern, PatternOptions};
pub use router::{
	GuardVerdict, NavigationGuard, Router, RouterOptions, async_guard_fn, guard_fn,
};
