use std::sync::Arc;

use proffer_context::{CxAsset, CxBuilder, CxEntry, EntryId, Supply};

use crate::error::BoxError;
use crate::loader::ModuleDefiner;
use crate::setup::{ModuleSetup, SetupFn};
use crate::status::ModuleUse;

/// A unit of functionality loaded into a scope on demand.
///
/// Each module owns an entry resolving to its [`ModuleUse`]. The assets of
/// that entry are module implementations: a module implements its own entry
/// and the entries of every module it [`has`](CxModule::has). The most actual
/// implementation is loaded; providing another one unloads it first.
#[derive(Clone)]
pub struct CxModule {
	name: Arc<str>,
	entry: CxEntry<ModuleUse, CxModule>,
	setup: SetupFn,
	needs: Vec<CxModule>,
	has: Vec<CxModule>,
}

impl CxModule {
	/// Declares a module loaded by `setup`.
	pub fn new(name: impl Into<Arc<str>>, setup: impl Fn(&ModuleSetup<'_>) -> Result<(), BoxError> + Send + Sync + 'static) -> Self {
		let name = name.into();
		Self {
			entry: CxEntry::new(Arc::clone(&name), ModuleDefiner),
			name,
			setup: Arc::new(setup),
			needs: Vec::new(),
			has: Vec::new(),
		}
	}

	/// Loads `module` before this one, providing it when absent.
	#[must_use]
	pub fn needs(mut self, module: &CxModule) -> Self {
		self.needs.push(module.clone());
		self
	}

	/// Makes this module an implementation of `module`.
	#[must_use]
	pub fn has(mut self, module: &CxModule) -> Self {
		self.has.push(module.clone());
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub(crate) fn name_arc(&self) -> &Arc<str> {
		&self.name
	}

	pub fn id(&self) -> EntryId {
		self.entry.id()
	}

	/// Entry resolving to the use of this module.
	pub fn entry(&self) -> &CxEntry<ModuleUse, CxModule> {
		&self.entry
	}

	pub(crate) fn setup(&self, setup: &ModuleSetup<'_>) -> Result<(), BoxError> {
		(self.setup)(setup)
	}

	pub(crate) fn needed(&self) -> &[CxModule] {
		&self.needs
	}

	/// Implementation assets of this module, revoked with `supply`.
	pub(crate) fn assets(&self, supply: &Supply) -> Vec<CxAsset<ModuleUse, CxModule>> {
		std::iter::once(self)
			.chain(&self.has)
			.map(|module| CxAsset::value(&module.entry, self.clone()).with_supply(supply))
			.collect()
	}

	/// Provides this module as implementation of itself and of every module it
	/// has.
	///
	/// Cutting off the returned supply revokes all of them.
	pub fn provide_to(&self, builder: &CxBuilder) -> Supply {
		let supply = builder.supply().derive();
		for asset in self.assets(&supply) {
			builder.provide(asset);
		}
		tracing::trace!(module = %self.name, implements = self.has.len() + 1, "module provided");
		supply
	}
}

impl PartialEq for CxModule {
	fn eq(&self, other: &Self) -> bool {
		self.entry == other.entry
	}
}

impl Eq for CxModule {}

impl std::fmt::Debug for CxModule {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CxModule")
			.field("name", &self.name)
			.field("needs", &self.needs.iter().map(CxModule::name).collect::<Vec<_>>())
			.field("has", &self.has.iter().map(CxModule::name).collect::<Vec<_>>())
			.finish()
	}
}
