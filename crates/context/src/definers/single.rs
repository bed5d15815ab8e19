use std::sync::Arc;

use parking_lot::Mutex;

use crate::CxValue;
use crate::asset::AssetHandle;
use crate::entry::{CxDefiner, CxEntry, Definition};
use crate::error::ContextError;
use crate::memo::Memo;
use crate::target::CxTarget;

type ByDefault<A> = Arc<dyn Fn(&CxTarget<A>) -> Result<Option<A>, ContextError> + Send + Sync>;

/// Resolves to the most actual asset that has a value.
///
/// The value is computed on first request and kept until the asset list
/// changes.
pub struct SingleDefiner<A> {
	by_default: Option<ByDefault<A>>,
}

impl<A: CxValue> Default for SingleDefiner<A> {
	fn default() -> Self {
		Self::new()
	}
}

impl<A: CxValue> SingleDefiner<A> {
	pub fn new() -> Self {
		Self { by_default: None }
	}

	/// Sets the default value evaluator, run at most once per scope.
	#[must_use]
	pub fn by_default(mut self, by_default: impl Fn(&CxTarget<A>) -> Result<Option<A>, ContextError> + Send + Sync + 'static) -> Self {
		self.by_default = Some(Arc::new(by_default));
		self
	}

	/// Sets a constant default value.
	#[must_use]
	pub fn default_value(self, value: A) -> Self {
		self.by_default(move |_| Ok(Some(value.clone())))
	}
}

struct SingleState<A> {
	assets: Mutex<Vec<Arc<AssetHandle<A>>>>,
	value: Memo<Option<A>>,
}

impl<A: CxValue> CxDefiner<A, A> for SingleDefiner<A> {
	fn per_context(&self, target: &CxTarget<A>) -> Definition<A> {
		let state = Arc::new(SingleState {
			assets: Mutex::new(Vec::new()),
			value: Memo::new(),
		});

		let tracked = Arc::downgrade(&state);
		target.track_asset_list(move |assets| {
			if let Some(state) = tracked.upgrade() {
				*state.assets.lock() = assets.to_vec();
				state.value.reset();
			}
		});

		let entry = target.entry().clone();
		let definition = Definition::new().with_value(move || {
			state.value.get_or_try_init(&entry, || {
				let assets = state.assets.lock().clone();
				for asset in assets.iter().rev() {
					if let Some(value) = asset.value()? {
						return Ok(Some(value));
					}
				}
				Ok(None)
			})
		});

		match &self.by_default {
			Some(by_default) => {
				let by_default = Arc::clone(by_default);
				let target = target.clone();
				let memo = Memo::new();
				definition.with_default(move || memo.get_or_try_init(target.entry(), || by_default(&target)))
			}
			None => definition,
		}
	}
}

/// Declares a single-valued entry without default.
pub fn cx_single<A: CxValue>(name: impl Into<Arc<str>>) -> CxEntry<A> {
	CxEntry::new(name, SingleDefiner::new())
}
