use std::sync::Arc;

use parking_lot::Mutex;
use proffer_supply::OffReason;

use crate::CxValue;
use crate::asset::AssetHandle;
use crate::entry::{CxDefiner, CxEntry, Definition};
use crate::error::ContextError;
use crate::memo::Memo;
use crate::target::CxTarget;

/// Where a value has been derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CxRequestMethod {
	/// From at least one asset.
	Assets,
	/// From the default path.
	Defaults,
}

type CreateFn<S, A> = Arc<dyn Fn(&[A], &CxTarget<A>) -> Result<S, ContextError> + Send + Sync>;
type ByDefaultFn<S, A> = Arc<dyn Fn(&CxTarget<A>) -> Result<Option<S>, ContextError> + Send + Sync>;
type AccessFn<V, S> = Arc<dyn Fn(&S, CxRequestMethod) -> V + Send + Sync>;
pub(crate) type AssignFn<V> = Arc<dyn Fn(Option<(V, CxRequestMethod)>) + Send + Sync>;

/// Builds an internal state from the full asset list.
///
/// The state is rebuilt by `create` every time the asset list changes, and
/// exposed through `access`. Without a custom `create`, the state is the list
/// of asset values itself.
pub struct DynamicDefiner<V, A, S = V> {
	create: CreateFn<S, A>,
	by_default: Option<ByDefaultFn<S, A>>,
	access: AccessFn<V, S>,
	assign: Option<AssignFn<V>>,
}

impl<V, A, S> Clone for DynamicDefiner<V, A, S> {
	fn clone(&self) -> Self {
		Self {
			create: Arc::clone(&self.create),
			by_default: self.by_default.clone(),
			access: Arc::clone(&self.access),
			assign: self.assign.clone(),
		}
	}
}

impl<A: CxValue> Default for DynamicDefiner<Vec<A>, A> {
	fn default() -> Self {
		Self::new()
	}
}

impl<A: CxValue> DynamicDefiner<Vec<A>, A> {
	/// Collects asset values in registration order.
	pub fn new() -> Self {
		Self {
			create: Arc::new(|assets: &[A], _: &CxTarget<A>| -> Result<Vec<A>, ContextError> { Ok(assets.to_vec()) }),
			by_default: None,
			access: Arc::new(|state: &Vec<A>, _: CxRequestMethod| state.clone()),
			assign: None,
		}
	}
}

impl<V: CxValue, A: CxValue, S: CxValue> DynamicDefiner<V, A, S> {
	/// Replaces the state builder.
	///
	/// The value becomes the state itself; set `access`, `by_default` and
	/// `on_assign` afterwards.
	pub fn create<S2: CxValue>(self, create: impl Fn(&[A], &CxTarget<A>) -> Result<S2, ContextError> + Send + Sync + 'static) -> DynamicDefiner<S2, A, S2> {
		DynamicDefiner {
			create: Arc::new(create),
			by_default: None,
			access: Arc::new(|state: &S2, _: CxRequestMethod| state.clone()),
			assign: None,
		}
	}

	/// Sets the default state evaluator, run at most once per scope.
	#[must_use]
	pub fn by_default(mut self, by_default: impl Fn(&CxTarget<A>) -> Result<Option<S>, ContextError> + Send + Sync + 'static) -> Self {
		self.by_default = Some(Arc::new(by_default));
		self
	}

	/// Replaces the state-to-value conversion.
	pub fn access<V2: CxValue>(self, access: impl Fn(&S, CxRequestMethod) -> V2 + Send + Sync + 'static) -> DynamicDefiner<V2, A, S> {
		DynamicDefiner {
			create: self.create,
			by_default: self.by_default,
			access: Arc::new(access),
			assign: None,
		}
	}

	/// Observes every value assignment.
	///
	/// Called with the current value right after materialization and again
	/// after every asset list change; `None` when there is no value at all.
	#[must_use]
	pub fn on_assign(mut self, assign: impl Fn(Option<(V, CxRequestMethod)>) + Send + Sync + 'static) -> Self {
		self.assign = Some(Arc::new(assign));
		self
	}

	pub(crate) fn materialize(&self, target: &CxTarget<A>, extra_assign: Option<AssignFn<V>>) -> Arc<DynamicValue<V, A, S>> {
		let value = Arc::new(DynamicValue {
			target: target.clone(),
			state: Mutex::new(DynamicState::Empty),
			default: Memo::new(),
			create: Arc::clone(&self.create),
			by_default: self.by_default.clone(),
			access: Arc::clone(&self.access),
			assign: self.assign.iter().cloned().chain(extra_assign).collect(),
		});

		let off = Arc::downgrade(&value);
		target.supply().when_off(move |reason| {
			if let Some(value) = off.upgrade() {
				value.turn_off(reason.clone());
			}
		});

		let tracked = Arc::downgrade(&value);
		target.track_asset_list(move |assets| {
			if let Some(value) = tracked.upgrade() {
				value.update(assets);
			}
		});

		value
	}
}

impl<V: CxValue, A: CxValue, S: CxValue> CxDefiner<V, A> for DynamicDefiner<V, A, S> {
	fn per_context(&self, target: &CxTarget<A>) -> Definition<V> {
		let value = self.materialize(target, None);
		let default = Arc::clone(&value);
		Definition::new()
			.with_value(move || value.get_value())
			.with_default(move || default.get_default_value())
	}
}

enum DynamicState<S> {
	Empty,
	Assets(S),
	Failed(ContextError),
	Off(OffReason),
}

/// Per-scope state of a dynamic entry.
///
/// Once the target is cut off, every accessor fails with the teardown reason.
pub(crate) struct DynamicValue<V, A, S> {
	target: CxTarget<A>,
	state: Mutex<DynamicState<S>>,
	default: Memo<Option<S>>,
	create: CreateFn<S, A>,
	by_default: Option<ByDefaultFn<S, A>>,
	access: AccessFn<V, S>,
	assign: Vec<AssignFn<V>>,
}

impl<V: CxValue, A: CxValue, S: CxValue> DynamicValue<V, A, S> {
	fn off_error(&self, reason: &OffReason) -> ContextError {
		ContextError::unavailable(self.target.entry(), reason.clone())
	}

	pub fn ensure_on(&self) -> Result<(), ContextError> {
		match &*self.state.lock() {
			DynamicState::Off(reason) => Err(self.off_error(reason)),
			_ => Ok(()),
		}
	}

	pub fn get_state(&self) -> Result<Option<S>, ContextError> {
		match &*self.state.lock() {
			DynamicState::Empty => Ok(None),
			DynamicState::Assets(state) => Ok(Some(state.clone())),
			DynamicState::Failed(error) => Err(error.clone()),
			DynamicState::Off(reason) => Err(self.off_error(reason)),
		}
	}

	pub fn get_value(&self) -> Result<Option<V>, ContextError> {
		Ok(self
			.get_state()?
			.map(|state| (self.access)(&state, CxRequestMethod::Assets)))
	}

	pub fn get_default_value(&self) -> Result<Option<V>, ContextError> {
		self.ensure_on()?;
		let state = self.default.get_or_try_init(self.target.entry(), || match &self.by_default {
			Some(by_default) => by_default(&self.target),
			None => Ok(None),
		})?;
		Ok(state.map(|state| (self.access)(&state, CxRequestMethod::Defaults)))
	}

	pub fn get_assign(&self) -> Result<Option<(V, CxRequestMethod)>, ContextError> {
		if let Some(value) = self.get_value()? {
			return Ok(Some((value, CxRequestMethod::Assets)));
		}
		Ok(self
			.get_default_value()?
			.map(|value| (value, CxRequestMethod::Defaults)))
	}

	fn update(&self, assets: &[Arc<AssetHandle<A>>]) {
		if self.ensure_on().is_err() {
			return;
		}

		let next = match collect(assets) {
			Ok(values) if values.is_empty() => DynamicState::Empty,
			Ok(values) => match (self.create)(&values, &self.target) {
				Ok(state) => DynamicState::Assets(state),
				Err(error) => DynamicState::Failed(error),
			},
			Err(error) => DynamicState::Failed(error),
		};

		{
			let mut state = self.state.lock();
			if matches!(*state, DynamicState::Off(_)) {
				return;
			}
			*state = next;
		}

		if self.assign.is_empty() {
			return;
		}
		match self.get_assign() {
			Ok(assigned) => {
				for assign in &self.assign {
					assign(assigned.clone());
				}
			}
			Err(error) => {
				tracing::debug!(entry = %self.target.entry(), %error, "dynamic entry not assigned");
			}
		}
	}

	fn turn_off(&self, reason: OffReason) {
		*self.state.lock() = DynamicState::Off(reason);
	}
}

fn collect<A: CxValue>(assets: &[Arc<AssetHandle<A>>]) -> Result<Vec<A>, ContextError> {
	let mut values = Vec::with_capacity(assets.len());
	for asset in assets {
		if let Some(value) = asset.value()? {
			values.push(value);
		}
	}
	Ok(values)
}

/// Declares an entry collecting every asset value, in registration order.
///
/// Resolves to an empty list by default.
pub fn cx_multi<A: CxValue>(name: impl Into<Arc<str>>) -> CxEntry<Vec<A>, A> {
	CxEntry::new(name, DynamicDefiner::new().by_default(|_| Ok(Some(Vec::new()))))
}

/// Declares an entry resolved by a dynamic definer.
pub fn cx_dynamic<V: CxValue, A: CxValue, S: CxValue>(name: impl Into<Arc<str>>, definer: DynamicDefiner<V, A, S>) -> CxEntry<V, A> {
	CxEntry::new(name, definer)
}
