use std::sync::Arc;

use parking_lot::Mutex;
use proffer_context::{ContextError, Cx, CxAsset, CxEntry, CxTarget, CxValue, Supply};

use crate::error::BoxError;
use crate::module::CxModule;

pub(crate) type Initializer = Box<dyn FnOnce(&Cx) -> Result<(), BoxError> + Send>;

/// Handed to a module's setup function while the module loads.
///
/// Everything provided through it is revoked when the module is unloaded.
pub struct ModuleSetup<'a> {
	module: &'a CxModule,
	cx: &'a Cx,
	target: &'a CxTarget<CxModule>,
	supply: &'a Supply,
	initializers: Mutex<Vec<Initializer>>,
}

impl<'a> ModuleSetup<'a> {
	pub(crate) fn new(module: &'a CxModule, cx: &'a Cx, target: &'a CxTarget<CxModule>, supply: &'a Supply) -> Self {
		Self {
			module,
			cx,
			target,
			supply,
			initializers: Mutex::new(Vec::new()),
		}
	}

	/// The module implementation being loaded.
	pub fn module(&self) -> &CxModule {
		self.module
	}

	/// Context of the scope the module is loaded in.
	pub fn context(&self) -> &Cx {
		self.cx
	}

	/// Supply of this load; cut off on unload.
	pub fn supply(&self) -> &Supply {
		self.supply
	}

	/// Resolves an entry in the module's scope.
	pub fn get<V: CxValue, A: CxValue>(&self, entry: &CxEntry<V, A>) -> Result<V, ContextError> {
		self.cx.get(entry)
	}

	/// Provides an asset for as long as the module stays loaded.
	pub fn provide<V: CxValue, A: CxValue>(&self, asset: CxAsset<V, A>) -> Supply {
		let supply = self.target.provide(asset);
		supply.needs(self.supply);
		supply
	}

	/// Queues an initializer, run once setup returns.
	///
	/// Initializers run in queue order. The module is ready once all of them
	/// succeed.
	pub fn init_by(&self, init: impl FnOnce(&Cx) -> Result<(), BoxError> + Send + 'static) {
		self.initializers.lock().push(Box::new(init));
	}

	pub(crate) fn into_initializers(self) -> Vec<Initializer> {
		self.initializers.into_inner()
	}
}

impl std::fmt::Debug for ModuleSetup<'_> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ModuleSetup")
			.field("module", &self.module.name())
			.field("initializers", &self.initializers.lock().len())
			.finish()
	}
}

pub(crate) type SetupFn = Arc<dyn Fn(&ModuleSetup<'_>) -> Result<(), BoxError> + Send + Sync>;
