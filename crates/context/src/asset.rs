//! Asset providers and the handles delivered to trackers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use proffer_supply::{OffReason, Supply};
use proffer_value::ValueTracker;

use crate::CxValue;
use crate::entry::{CxEntry, EntryInfo};
use crate::error::ContextError;
use crate::memo::Memo;
use crate::target::{CxTarget, TargetInner};

static NEXT_ASSET_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of one asset registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssetId(u64);

impl AssetId {
	pub(crate) fn next() -> Self {
		Self(NEXT_ASSET_ID.fetch_add(1, Ordering::Relaxed))
	}
}

pub(crate) type Evaluator<A> = Arc<dyn Fn(&CxTarget<A>) -> Result<Option<A>, ContextError> + Send + Sync>;

pub(crate) enum AssetPayload<A> {
	Value(A),
	Evaluator(Evaluator<A>),
}

pub(crate) enum AssetSource<A> {
	Payload(AssetPayload<A>),
	Tracked(ValueTracker<Option<A>>),
}

/// Contribution to the value of an entry.
///
/// Provided to a [`CxBuilder`](crate::CxBuilder), an asset stays registered
/// until the supply returned by `provide` (or the supply attached here) is cut
/// off.
pub struct CxAsset<V, A = V> {
	pub(crate) entry: CxEntry<V, A>,
	pub(crate) source: AssetSource<A>,
	pub(crate) supply: Option<Supply>,
}

impl<V: CxValue, A: CxValue> CxAsset<V, A> {
	/// An asset with a constant value.
	pub fn value(entry: &CxEntry<V, A>, value: A) -> Self {
		Self::with_source(entry, AssetSource::Payload(AssetPayload::Value(value)))
	}

	/// An asset evaluated on first use, once per scope.
	///
	/// Evaluating to `None` means the asset contributes nothing.
	pub fn evaluated(entry: &CxEntry<V, A>, evaluator: impl Fn(&CxTarget<A>) -> Result<Option<A>, ContextError> + Send + Sync + 'static) -> Self {
		Self::with_source(entry, AssetSource::Payload(AssetPayload::Evaluator(Arc::new(evaluator))))
	}

	/// An asset following a tracked value.
	///
	/// Every assignment of the tracker replaces the registered asset in place,
	/// keeping its registration position; `None` leaves the entry without this
	/// contribution.
	pub fn tracked(entry: &CxEntry<V, A>, tracker: ValueTracker<Option<A>>) -> Self {
		Self::with_source(entry, AssetSource::Tracked(tracker))
	}

	fn with_source(entry: &CxEntry<V, A>, source: AssetSource<A>) -> Self {
		Self {
			entry: entry.clone(),
			source,
			supply: None,
		}
	}

	/// Revokes the asset when `supply` goes off.
	#[must_use]
	pub fn with_supply(mut self, supply: &Supply) -> Self {
		self.supply = Some(supply.clone());
		self
	}

	pub fn entry(&self) -> &CxEntry<V, A> {
		&self.entry
	}
}

impl<V, A> fmt::Debug for CxAsset<V, A> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let kind = match &self.source {
			AssetSource::Payload(AssetPayload::Value(_)) => "value",
			AssetSource::Payload(AssetPayload::Evaluator(_)) => "evaluated",
			AssetSource::Tracked(_) => "tracked",
		};
		f.debug_struct("CxAsset").field("entry", &self.entry).field("kind", &kind).finish()
	}
}

/// One asset as stored by a scope.
pub(crate) struct Registered<A> {
	pub id: AssetId,
	pub payload: AssetPayload<A>,
	pub supply: Supply,
}

/// Asset as seen from one resolution target.
///
/// The asset is evaluated at most once per target, no matter how many times
/// the handle is delivered.
pub struct AssetHandle<A> {
	registered: Arc<Registered<A>>,
	rank: u32,
	entry: EntryInfo,
	target: Weak<TargetInner<A>>,
	value: Memo<Option<A>>,
}

impl<A: CxValue> AssetHandle<A> {
	pub(crate) fn new(registered: Arc<Registered<A>>, rank: u32, entry: EntryInfo, target: Weak<TargetInner<A>>) -> Self {
		Self {
			registered,
			rank,
			entry,
			target,
			value: Memo::new(),
		}
	}

	pub fn id(&self) -> AssetId {
		self.registered.id
	}

	/// Distance of the providing scope from the target's scope; `0` is the
	/// target's own scope.
	pub fn rank(&self) -> u32 {
		self.rank
	}

	/// The supply the asset is registered by.
	pub fn supply(&self) -> &Supply {
		&self.registered.supply
	}

	/// Returns the asset value, evaluating it on first call.
	pub fn value(&self) -> Result<Option<A>, ContextError> {
		self.value.get_or_try_init(&self.entry, || match &self.registered.payload {
			AssetPayload::Value(value) => Ok(Some(value.clone())),
			AssetPayload::Evaluator(evaluate) => {
				let target = self
					.target
					.upgrade()
					.map(CxTarget::from_inner)
					.ok_or_else(|| ContextError::unavailable(&self.entry, OffReason::Done))?;
				evaluate(&target)
			}
		})
	}
}

impl<A> fmt::Debug for AssetHandle<A> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AssetHandle")
			.field("entry", &self.entry)
			.field("id", &self.registered.id)
			.field("rank", &self.rank)
			.finish()
	}
}
