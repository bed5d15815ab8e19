use std::sync::Arc;

use proffer_value::ValueTracker;

use crate::CxValue;
use crate::entry::{CxDefiner, CxEntry, Definition};
use crate::error::ContextError;
use crate::target::CxTarget;

use super::dynamic::{AssignFn, CxRequestMethod, DynamicDefiner};

/// Resolves to a live value following the entry's assets.
///
/// Every scope gets one [`ValueTracker`], updated synchronously whenever the
/// asset list changes. With neither assets nor default, the tracker holds
/// `V::default()`. The tracker stops updating when the scope is torn down.
///
/// A fallback given without a value is rejected, as it could never be told
/// apart from the tracker's empty state.
pub struct TrackedDefiner<V, A, S = V> {
	dynamic: DynamicDefiner<V, A, S>,
}

impl<A: CxValue> TrackedDefiner<Option<A>, A, Option<A>> {
	/// Follows the most actual asset.
	pub fn single() -> Self {
		Self::new(DynamicDefiner::<Vec<A>, A>::new().create(|assets: &[A], _: &CxTarget<A>| -> Result<Option<A>, ContextError> {
			Ok(assets.last().cloned())
		}))
	}

	/// Sets a constant default value.
	#[must_use]
	pub fn default_value(self, value: A) -> Self {
		self.by_default(move |_| Ok(Some(Some(value.clone()))))
	}
}

impl<A: CxValue> TrackedDefiner<Vec<A>, A, Vec<A>> {
	/// Follows the list of all assets.
	pub fn list() -> Self {
		Self::new(DynamicDefiner::new())
	}
}

impl<V: CxValue + Default, A: CxValue, S: CxValue> TrackedDefiner<V, A, S> {
	pub fn new(dynamic: DynamicDefiner<V, A, S>) -> Self {
		Self { dynamic }
	}

	/// Sets the default state evaluator, run at most once per scope.
	#[must_use]
	pub fn by_default(self, by_default: impl Fn(&CxTarget<A>) -> Result<Option<S>, ContextError> + Send + Sync + 'static) -> Self {
		Self {
			dynamic: self.dynamic.by_default(by_default),
		}
	}
}

impl<V: CxValue + Default, A: CxValue, S: CxValue> CxDefiner<ValueTracker<V>, A> for TrackedDefiner<V, A, S> {
	fn per_context(&self, target: &CxTarget<A>) -> Definition<ValueTracker<V>> {
		let tracker = ValueTracker::with_supply(V::default(), target.supply().derive());
		let assign: AssignFn<V> = {
			let tracker = tracker.clone();
			Arc::new(move |assigned: Option<(V, CxRequestMethod)>| {
				tracker.set(assigned.map(|(value, _)| value).unwrap_or_default());
			})
		};
		let value = self.dynamic.materialize(target, Some(assign));

		Definition::new()
			.with_value(move || {
				value.ensure_on()?;
				Ok(Some(tracker.clone()))
			})
			.rejecting_empty_fallback()
	}
}

/// Declares an entry resolving to a live view of its most actual asset.
pub fn cx_tracked<A: CxValue>(name: impl Into<Arc<str>>) -> CxEntry<ValueTracker<Option<A>>, A> {
	CxEntry::new(name, TrackedDefiner::single())
}

/// Declares an entry resolving to a live list of all its assets.
pub fn cx_tracked_list<A: CxValue>(name: impl Into<Arc<str>>) -> CxEntry<ValueTracker<Vec<A>>, A> {
	CxEntry::new(name, TrackedDefiner::list())
}
