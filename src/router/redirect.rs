//! Redirect target evaluation.
//!
//! A redirecting record's target comes in three shapes: a literal path, a
//! named record with params, or a function of the location that matched.
//! The evaluator lowers all three to a [`LocationTarget`], inheriting the
//! query, hash, and (for path-less targets) params of the matched location.

use crate::location::{LocationTarget, RawLocation, ResolvedLocation, parse_full_path};
use crate::matcher::RedirectTarget;

/// The redirect declared by the deepest record of `to`, lowered to a
/// concrete target, or `None` when the record does not redirect.
pub(crate) fn redirect_location(to: &ResolvedLocation) -> Option<RawLocation> {
	let record = to.deepest()?;
	let target = record.redirect.as_ref()?;
	let raw = match target {
		RedirectTarget::Path(path) => RawLocation::Path(path.clone()),
		RedirectTarget::Named { name, params } => {
			let mut target = LocationTarget::named(name.clone());
			target.params = params.clone();
			RawLocation::Target(target)
		}
		RedirectTarget::Computed(compute) => compute(to),
	};
	Some(RawLocation::Target(augment(raw, to)))
}

/// Fills unspecified fields of a redirect target from the location that
/// matched the redirecting record.
fn augment(raw: RawLocation, to: &ResolvedLocation) -> LocationTarget {
	let mut target = match raw {
		RawLocation::Path(full) => {
			let (path, query, hash) = parse_full_path(&full);
			let mut target = LocationTarget::path(path);
			target.query = query;
			target.hash = hash;
			target
		}
		RawLocation::Target(target) => target,
	};
	if target.query.is_empty() {
		target.query = to.query.clone();
	}
	if target.hash.is_empty() {
		target.hash = to.hash.clone();
	}
	// params only make sense for named or relative targets
	if target.path.is_none() && target.params.is_empty() {
		target.params = to.params.clone();
	}
	target
}

/// Threads the original navigation's flags and extra state through a
/// redirect hop.
pub(crate) fn carry_flags(
	raw: RawLocation,
	force: bool,
	replace: bool,
	state: Option<crate::history::EntryState>,
) -> RawLocation {
	let mut target = match raw {
		RawLocation::Path(full) => LocationTarget::path(full),
		RawLocation::Target(target) => target,
	};
	target.force |= force;
	target.replace |= replace;
	if target.state.is_none() {
		target.state = state;
	}
	RawLocation::Target(target)
}
