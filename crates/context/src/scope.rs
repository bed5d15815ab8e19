//! Per-scope asset buckets and value cache.

use std::any::Any;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use proffer_supply::{OffReason, Supply};
use proffer_value::ValueTracker;
use rustc_hash::FxHashMap as HashMap;

use crate::CxValue;
use crate::asset::{AssetId, AssetPayload, AssetSource, Registered};
use crate::entry::{CxEntry, Definition, EntryId, EntryInfo};
use crate::error::ContextError;
use crate::target::CxTarget;

pub(crate) enum BucketEvent<A> {
	Added(Arc<Registered<A>>),
	Removed,
	/// A tracked asset was reassigned in place; the previous registration, if
	/// any, is cut off.
	Replaced { added: Option<Arc<Registered<A>>> },
}

pub(crate) type BucketTracker<A> = Arc<dyn Fn(&BucketEvent<A>) + Send + Sync>;

/// Registration position within a bucket.
///
/// A plain asset occupies its position for its whole lifetime. A tracked asset
/// keeps its position while its current registration is swapped on every
/// assignment, and leaves it empty while the tracker holds `None`.
struct Position<A> {
	key: AssetId,
	current: Option<Arc<Registered<A>>>,
}

struct AssetBucket<A> {
	positions: Vec<Position<A>>,
	trackers: Vec<(u64, BucketTracker<A>)>,
}

impl<A> Default for AssetBucket<A> {
	fn default() -> Self {
		Self {
			positions: Vec::new(),
			trackers: Vec::new(),
		}
	}
}

impl<A> AssetBucket<A> {
	fn trackers(&self) -> Vec<BucketTracker<A>> {
		self.trackers.iter().map(|(_, tracker)| Arc::clone(tracker)).collect()
	}

	fn take(&mut self, key: AssetId) -> Option<Position<A>> {
		let index = self.positions.iter().position(|position| position.key == key)?;
		Some(self.positions.remove(index))
	}
}

#[derive(Default)]
struct AssetTable {
	next_tracker: u64,
	buckets: HashMap<EntryId, Box<dyn Any + Send + Sync>>,
}

impl AssetTable {
	fn bucket<A: CxValue>(&self, entry: EntryId) -> Option<&AssetBucket<A>> {
		self.buckets.get(&entry)?.downcast_ref()
	}

	fn bucket_mut<A: CxValue>(&mut self, entry: EntryId) -> Option<&mut AssetBucket<A>> {
		self.buckets
			.entry(entry)
			.or_insert_with(|| Box::new(AssetBucket::<A>::default()))
			.downcast_mut()
	}
}

pub(crate) struct Slot<V> {
	pub definition: Definition<V>,
}

enum SlotState {
	Materializing,
	Ready(Arc<dyn Any + Send + Sync>),
}

#[derive(Default)]
struct ValueCache {
	closed: Option<OffReason>,
	slots: HashMap<EntryId, SlotState>,
}

/// One resolution scope: the assets registered directly in it, and the values
/// materialized for it.
///
/// Assets of ancestor scopes are visible with a rank equal to their distance.
pub(crate) struct Scope {
	parent: Option<Arc<Scope>>,
	supply: Supply,
	assets: Mutex<AssetTable>,
	values: Mutex<ValueCache>,
}

impl Scope {
	pub fn new(parent: Option<Arc<Scope>>, external: Option<&Supply>) -> Arc<Self> {
		let supply = Supply::new();
		if let Some(parent) = &parent {
			supply.needs(&parent.supply);
		}
		if let Some(external) = external {
			supply.needs(external);
		}

		let scope = Arc::new(Self {
			parent,
			supply,
			assets: Mutex::new(AssetTable::default()),
			values: Mutex::new(ValueCache::default()),
		});

		let weak = Arc::downgrade(&scope);
		scope.supply.when_off(move |reason| {
			if let Some(scope) = weak.upgrade() {
				scope.close(reason);
			}
		});
		scope
	}

	pub fn supply(&self) -> &Supply {
		&self.supply
	}

	/// This scope followed by its ancestors; the index is the rank.
	pub fn chain(self: &Arc<Self>) -> Vec<Arc<Scope>> {
		let mut chain = vec![Arc::clone(self)];
		let mut next = self.parent.clone();
		while let Some(scope) = next {
			next = scope.parent.clone();
			chain.push(scope);
		}
		chain
	}

	fn close(&self, reason: &OffReason) {
		let slots = {
			let mut values = self.values.lock();
			if values.closed.is_some() {
				return;
			}
			values.closed = Some(reason.clone());
			std::mem::take(&mut values.slots)
		};
		tracing::debug!(slots = slots.len(), failed = reason.is_failure(), "scope closed");
		drop(slots);
	}

	/// Registers an asset; the returned supply revokes it.
	///
	/// Providing to a closed scope registers nothing and returns a supply that
	/// is already off.
	pub fn provide<A: CxValue>(self: &Arc<Self>, entry: &EntryInfo, source: AssetSource<A>, external: Option<&Supply>) -> Supply {
		let supply = Supply::new();
		supply.needs(&self.supply);
		if let Some(external) = external {
			supply.needs(external);
		}
		if supply.is_off() {
			tracing::trace!(entry = %entry, "asset provided to a closed scope; ignored");
			return supply;
		}

		match source {
			AssetSource::Payload(payload) => self.register(entry, payload, supply.clone()),
			AssetSource::Tracked(tracker) => self.register_tracked(entry, tracker, supply.clone()),
		}
		supply
	}

	fn register<A: CxValue>(self: &Arc<Self>, entry: &EntryInfo, payload: AssetPayload<A>, supply: Supply) {
		let registered = Arc::new(Registered {
			id: AssetId::next(),
			payload,
			supply: supply.clone(),
		});
		let id = registered.id;

		let trackers = self.assets.lock().bucket_mut::<A>(entry.id()).map(|bucket| {
			bucket.positions.push(Position {
				key: id,
				current: Some(Arc::clone(&registered)),
			});
			bucket.trackers()
		});
		let Some(trackers) = trackers else {
			mismatched(entry, &supply);
			return;
		};
		tracing::trace!(entry = %entry, asset = ?id, trackers = trackers.len(), "asset provided");

		let event = BucketEvent::Added(registered);
		for tracker in trackers {
			tracker(&event);
		}

		let weak = Arc::downgrade(self);
		let entry = entry.clone();
		supply.when_off(move |_| {
			if let Some(scope) = weak.upgrade() {
				scope.revoke::<A>(&entry, id);
			}
		});
	}

	fn register_tracked<A: CxValue>(self: &Arc<Self>, entry: &EntryInfo, tracker: ValueTracker<Option<A>>, supply: Supply) {
		let key = AssetId::next();
		let pushed = match self.assets.lock().bucket_mut::<A>(entry.id()) {
			Some(bucket) => {
				bucket.positions.push(Position { key, current: None });
				true
			}
			None => false,
		};
		if !pushed {
			mismatched(entry, &supply);
			return;
		}

		let weak = Arc::downgrade(self);
		let assigned = entry.clone();
		let owner = supply.clone();
		let subscription = tracker.read(move |value| {
			if let Some(scope) = weak.upgrade() {
				scope.assign::<A>(&assigned, key, value.clone(), &owner);
			}
		});
		subscription.needs(&supply);

		let weak = Arc::downgrade(self);
		let entry = entry.clone();
		supply.when_off(move |_| {
			if let Some(scope) = weak.upgrade() {
				scope.revoke::<A>(&entry, key);
			}
		});
	}

	/// Swaps the current registration of the tracked asset at `key`.
	fn assign<A: CxValue>(&self, entry: &EntryInfo, key: AssetId, value: Option<A>, owner: &Supply) {
		if owner.is_off() {
			return;
		}
		let added = value.map(|value| {
			Arc::new(Registered {
				id: AssetId::next(),
				payload: AssetPayload::Value(value),
				supply: owner.derive(),
			})
		});

		let swapped = {
			let mut table = self.assets.lock();
			table
				.bucket_mut::<A>(entry.id())
				.and_then(|bucket| {
					let position = bucket.positions.iter_mut().find(|position| position.key == key)?;
					let removed = std::mem::replace(&mut position.current, added.clone());
					Some((removed, bucket.trackers()))
				})
		};
		let Some((removed, trackers)) = swapped else {
			if let Some(added) = &added {
				added.supply.off();
			}
			return;
		};
		if removed.is_none() && added.is_none() {
			return;
		}
		tracing::trace!(entry = %entry, asset = ?key, trackers = trackers.len(), "tracked asset assigned");

		if let Some(removed) = removed {
			removed.supply.off();
		}
		let event = BucketEvent::Replaced { added };
		for tracker in trackers {
			tracker(&event);
		}
	}

	fn revoke<A: CxValue>(&self, entry: &EntryInfo, key: AssetId) {
		let (position, trackers) = {
			let mut table = self.assets.lock();
			let Some(bucket) = table.bucket_mut::<A>(entry.id()) else {
				return;
			};
			let Some(position) = bucket.take(key) else {
				return;
			};
			(position, bucket.trackers())
		};
		let Some(current) = position.current else {
			return;
		};
		tracing::trace!(entry = %entry, asset = ?current.id, trackers = trackers.len(), "asset revoked");

		current.supply.off();
		let event = BucketEvent::Removed;
		for tracker in trackers {
			tracker(&event);
		}
	}

	/// Assets registered directly in this scope, in registration order.
	pub fn assets<A: CxValue>(&self, entry: EntryId) -> Vec<Arc<Registered<A>>> {
		self.assets
			.lock()
			.bucket::<A>(entry)
			.map(|bucket| {
				bucket
					.positions
					.iter()
					.filter_map(|position| position.current.clone())
					.collect()
			})
			.unwrap_or_default()
	}

	/// Notifies `tracker` of asset changes in this scope until `supply` goes off.
	pub fn track<A: CxValue>(self: &Arc<Self>, entry: EntryId, tracker: BucketTracker<A>, supply: &Supply) {
		let id = {
			let mut table = self.assets.lock();
			table.next_tracker += 1;
			let id = table.next_tracker;
			let Some(bucket) = table.bucket_mut::<A>(entry) else {
				return;
			};
			bucket.trackers.push((id, tracker));
			id
		};

		let weak: Weak<Scope> = Arc::downgrade(self);
		supply.when_off(move |_| {
			if let Some(scope) = weak.upgrade() {
				let mut table = scope.assets.lock();
				if let Some(bucket) = table.bucket_mut::<A>(entry) {
					bucket.trackers.retain(|(tracker_id, _)| *tracker_id != id);
				}
			}
		});
	}

	/// Returns the definition slot of `entry`, materializing it on first use.
	pub fn slot<V: CxValue, A: CxValue>(self: &Arc<Self>, entry: &CxEntry<V, A>) -> Result<Arc<Slot<V>>, ContextError> {
		let info = entry.info();
		{
			let mut values = self.values.lock();
			if let Some(reason) = &values.closed {
				return Err(ContextError::unavailable(info, reason.clone()));
			}
			match values.slots.get(&info.id()) {
				Some(SlotState::Ready(slot)) => {
					return Arc::clone(slot)
						.downcast::<Slot<V>>()
						.map_err(|_| ContextError::Missing { entry: info.clone() });
				}
				Some(SlotState::Materializing) => return Err(ContextError::Recursive { entry: info.clone() }),
				None => {
					values.slots.insert(info.id(), SlotState::Materializing);
				}
			}
		}

		tracing::trace!(entry = %info, "materializing entry definition");
		let target = CxTarget::new(info.clone(), Arc::downgrade(self), self.supply.derive());
		let slot = Arc::new(Slot {
			definition: entry.definer().per_context(&target),
		});

		let mut values = self.values.lock();
		if let Some(reason) = &values.closed {
			return Err(ContextError::unavailable(info, reason.clone()));
		}
		values.slots.insert(info.id(), SlotState::Ready(Arc::clone(&slot) as Arc<dyn Any + Send + Sync>));
		Ok(slot)
	}
}

/// Cuts off the registration of an asset whose type differs from its bucket.
///
/// The asset type is fixed per [`EntryId`], so typed [`CxAsset`](crate::CxAsset)s never get here.
fn mismatched(entry: &EntryInfo, supply: &Supply) {
	tracing::warn!(entry = %entry, "asset type does not match entry bucket");
	supply.off();
}

impl Drop for Scope {
	fn drop(&mut self) {
		self.supply.off();
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::cx_single;

	#[test]
	fn mismatched_asset_type_is_cut_off() {
		let entry = cx_single::<u32>("typed");
		let scope = Scope::new(None, None);
		let kept = scope.provide(entry.info(), AssetSource::Payload(AssetPayload::Value(1u32)), None);
		let mismatched = scope.provide(entry.info(), AssetSource::Payload(AssetPayload::Value("one")), None);
		let tracked = scope.provide(entry.info(), AssetSource::Tracked(ValueTracker::new(Some("two"))), None);

		assert!(!kept.is_off());
		assert!(mismatched.is_off());
		assert!(tracked.is_off());
		assert_eq!(scope.assets::<u32>(entry.id()).len(), 1);
	}
}
