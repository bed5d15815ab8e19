//! Resolution targets.
//!
//! A [`CxTarget`] is handed to the definer of an entry when the entry is first
//! requested in a scope. It exposes the assets of that entry across the scope
//! chain in three ways:
//!
//! - [`CxTarget::each_asset`] walks the current assets in registration order:
//!   the most distant ancestor scope first, down to the target's own scope,
//!   and in registration order within each scope.
//! - [`CxTarget::each_actual_asset`] walks the same assets in reverse, most
//!   actual first.
//! - [`CxTarget::track_assets`] and [`CxTarget::track_asset_list`] deliver the
//!   current assets and keep delivering changes until cut off.

use std::ops::ControlFlow;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use proffer_supply::{OffReason, Supply};
use rustc_hash::FxHashMap as HashMap;

use crate::CxValue;
use crate::asset::{AssetHandle, AssetId, CxAsset, Registered};
use crate::cx::Cx;
use crate::entry::{CxEntry, EntryInfo};
use crate::error::ContextError;
use crate::scope::{BucketEvent, Scope};

pub(crate) struct TargetInner<A> {
	entry: EntryInfo,
	scope: Weak<Scope>,
	supply: Supply,
	handles: Mutex<HashMap<AssetId, Arc<AssetHandle<A>>>>,
}

/// Entry resolution target within one scope.
pub struct CxTarget<A> {
	inner: Arc<TargetInner<A>>,
}

impl<A> Clone for CxTarget<A> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<A: CxValue> CxTarget<A> {
	pub(crate) fn new(entry: EntryInfo, scope: Weak<Scope>, supply: Supply) -> Self {
		Self {
			inner: Arc::new(TargetInner {
				entry,
				scope,
				supply,
				handles: Mutex::new(HashMap::default()),
			}),
		}
	}

	pub(crate) fn from_inner(inner: Arc<TargetInner<A>>) -> Self {
		Self { inner }
	}

	/// The entry being resolved.
	pub fn entry(&self) -> &EntryInfo {
		&self.inner.entry
	}

	/// Supply of the target; cut off together with its scope.
	pub fn supply(&self) -> &Supply {
		&self.inner.supply
	}

	fn unavailable(&self) -> ContextError {
		let reason = self.inner.supply.off_reason().unwrap_or(OffReason::Done);
		ContextError::unavailable(&self.inner.entry, reason)
	}

	fn scope(&self) -> Result<Arc<Scope>, ContextError> {
		if self.inner.supply.is_off() {
			return Err(self.unavailable());
		}
		self.inner.scope.upgrade().ok_or_else(|| self.unavailable())
	}

	/// The context of the target's scope.
	pub fn context(&self) -> Result<Cx, ContextError> {
		self.scope().map(Cx::new)
	}

	/// Resolves another entry in the target's scope.
	pub fn get<V2: CxValue, A2: CxValue>(&self, entry: &CxEntry<V2, A2>) -> Result<V2, ContextError> {
		self.context()?.get(entry)
	}

	/// Resolves another entry in the target's scope, if it has a value.
	pub fn try_get<V2: CxValue, A2: CxValue>(&self, entry: &CxEntry<V2, A2>) -> Result<Option<V2>, ContextError> {
		self.context()?.try_get(entry)
	}

	/// Provides an asset to the target's own scope.
	///
	/// The asset is revoked when the target's scope is torn down.
	pub fn provide<V2: CxValue, A2: CxValue>(&self, asset: CxAsset<V2, A2>) -> Supply {
		let supply = self.inner.supply.derive();
		if let Some(external) = &asset.supply {
			supply.needs(external);
		}
		match self.scope() {
			Ok(scope) => scope.provide(asset.entry.info(), asset.source, Some(&supply)),
			Err(_) => {
				supply.off();
				supply
			}
		}
	}

	fn handle(&self, registered: &Arc<Registered<A>>, rank: u32) -> Arc<AssetHandle<A>> {
		let id = registered.id;
		let handle = {
			let mut handles = self.inner.handles.lock();
			if let Some(handle) = handles.get(&id) {
				return Arc::clone(handle);
			}
			let handle = Arc::new(AssetHandle::new(
				Arc::clone(registered),
				rank,
				self.inner.entry.clone(),
				Arc::downgrade(&self.inner),
			));
			handles.insert(id, Arc::clone(&handle));
			handle
		};

		let weak = Arc::downgrade(&self.inner);
		registered.supply.when_off(move |_| {
			if let Some(inner) = weak.upgrade() {
				inner.handles.lock().remove(&id);
			}
		});
		handle
	}

	/// Current assets in registration order.
	pub fn asset_handles(&self) -> Result<Vec<Arc<AssetHandle<A>>>, ContextError> {
		let scope = self.scope()?;
		let entry = self.inner.entry.id();
		let mut handles = Vec::new();
		for (rank, scope) in scope.chain().iter().enumerate().rev() {
			for registered in scope.assets::<A>(entry) {
				handles.push(self.handle(&registered, rank as u32));
			}
		}
		Ok(handles)
	}

	/// Visits current asset values in registration order.
	///
	/// Assets evaluating to nothing are skipped. Stops when `visit` breaks.
	pub fn each_asset(&self, mut visit: impl FnMut(&A) -> ControlFlow<()>) -> Result<(), ContextError> {
		for handle in self.asset_handles()? {
			if let Some(value) = handle.value()?
				&& visit(&value).is_break()
			{
				break;
			}
		}
		Ok(())
	}

	/// Visits current asset values, most actual first.
	pub fn each_actual_asset(&self, mut visit: impl FnMut(&A) -> ControlFlow<()>) -> Result<(), ContextError> {
		for handle in self.asset_handles()?.iter().rev() {
			if let Some(value) = handle.value()?
				&& visit(&value).is_break()
			{
				break;
			}
		}
		Ok(())
	}

	/// Delivers every current asset, then every newly provided one.
	///
	/// Revocation is observable through [`AssetHandle::supply`]; a tracked
	/// asset is delivered again on every assignment. Delivery stops
	/// once the returned supply is cut off.
	pub fn track_assets(&self, receiver: impl Fn(&Arc<AssetHandle<A>>) + Send + Sync + 'static) -> Supply {
		let tracking = self.inner.supply.derive();
		let Ok(scope) = self.scope() else {
			tracking.off();
			return tracking;
		};
		let receiver = Arc::new(receiver);
		let entry = self.inner.entry.id();

		for (rank, scope) in scope.chain().iter().enumerate() {
			let target = self.clone();
			let receiver = Arc::clone(&receiver);
			let active = tracking.clone();
			scope.track::<A>(
				entry,
				Arc::new(move |event: &BucketEvent<A>| {
					let added = match event {
						BucketEvent::Added(registered) => Some(registered),
						BucketEvent::Replaced { added } => added.as_ref(),
						BucketEvent::Removed => None,
					};
					if let Some(registered) = added
						&& !active.is_off()
					{
						receiver(&target.handle(registered, rank as u32));
					}
				}),
				&tracking,
			);
		}

		if let Ok(handles) = self.asset_handles() {
			for handle in handles {
				if tracking.is_off() {
					break;
				}
				receiver(&handle);
			}
		}
		tracking
	}

	/// Delivers the full asset list now and again after every change.
	///
	/// Both registrations and revocations anywhere in the scope chain trigger
	/// a delivery. The list is in registration order.
	pub fn track_asset_list(&self, receiver: impl Fn(&[Arc<AssetHandle<A>>]) + Send + Sync + 'static) -> Supply {
		let tracking = self.inner.supply.derive();
		let Ok(scope) = self.scope() else {
			tracking.off();
			return tracking;
		};
		let entry = self.inner.entry.id();

		let deliver: Arc<dyn Fn() + Send + Sync> = {
			let target = self.clone();
			let active = tracking.clone();
			Arc::new(move || {
				if active.is_off() {
					return;
				}
				if let Ok(handles) = target.asset_handles() {
					receiver(&handles);
				}
			})
		};

		for scope in scope.chain() {
			let deliver = Arc::clone(&deliver);
			scope.track::<A>(entry, Arc::new(move |_: &BucketEvent<A>| deliver()), &tracking);
		}

		deliver();
		tracking
	}
}

impl<A> std::fmt::Debug for CxTarget<A> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CxTarget")
			.field("entry", &self.inner.entry)
			.field("off", &self.inner.supply.is_off())
			.finish()
	}
}
