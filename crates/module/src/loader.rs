//! Per-scope module loading.
//!
//! Loading starts on the first request of the module in a scope. From then
//! on, every change of the implementation list is reconciled right away: the
//! most actual implementation is kept loaded, and a replaced one is unloaded
//! by cutting off its load supply.

use std::sync::Arc;

use parking_lot::Mutex;
use proffer_context::{AssetHandle, CxDefiner, CxTarget, Definition, EntryId, Supply};
use tokio::sync::watch;

use crate::error::ModuleError;
use crate::module::CxModule;
use crate::setup::ModuleSetup;
use crate::status::{ModuleStatus, ModuleUse};

pub(crate) struct ModuleDefiner;

impl CxDefiner<ModuleUse, CxModule> for ModuleDefiner {
	fn per_context(&self, target: &CxTarget<CxModule>) -> Definition<ModuleUse> {
		let name: Arc<str> = Arc::from(target.entry().name());
		let (status, receiver) = watch::channel(ModuleStatus::default());
		let status = Arc::new(status);

		let loader = Arc::new(Loader {
			name: Arc::clone(&name),
			target: target.clone(),
			status: Arc::clone(&status),
			state: Mutex::new(LoaderState::default()),
		});

		let module = Arc::clone(&name);
		target.supply().when_off(move |reason| {
			status.send_modify(|status| {
				*status = ModuleStatus {
					error: Some(ModuleError::Unavailable {
						module,
						reason: reason.clone(),
					}),
					..ModuleStatus::default()
				};
			});
		});

		let tracked = Arc::downgrade(&loader);
		target.track_asset_list(move |implementations| {
			if let Some(loader) = tracked.upgrade() {
				loader.update(implementations);
			}
		});

		Definition::new().with_value(move || {
			loader.start();
			Ok(Some(ModuleUse::new(Arc::clone(&name), receiver.clone())))
		})
	}
}

struct Loaded {
	id: EntryId,
	supply: Supply,
}

#[derive(Default)]
struct LoaderState {
	started: bool,
	rejected: bool,
	implementations: Vec<Arc<AssetHandle<CxModule>>>,
	current: Option<Loaded>,
}

struct Loader {
	name: Arc<str>,
	target: CxTarget<CxModule>,
	status: Arc<watch::Sender<ModuleStatus>>,
	state: Mutex<LoaderState>,
}

impl Loader {
	fn start(&self) {
		let started = std::mem::replace(&mut self.state.lock().started, true);
		if !started {
			self.reconcile();
		}
	}

	fn update(&self, implementations: &[Arc<AssetHandle<CxModule>>]) {
		let started = {
			let mut state = self.state.lock();
			state.implementations = implementations.to_vec();
			state.started
		};
		if started {
			self.reconcile();
		}
	}

	fn reconcile(&self) {
		let implementations = self.state.lock().implementations.clone();
		let winner = implementations
			.iter()
			.rev()
			.find_map(|handle| handle.value().transpose())
			.transpose();
		let winner = match winner {
			Ok(winner) => winner,
			Err(error) => {
				self.reject(ModuleError::from(error));
				return;
			}
		};

		let (previous, next) = {
			let mut state = self.state.lock();
			let winner_id = winner.as_ref().map(CxModule::id);
			if state.current.as_ref().map(|loaded| loaded.id) == winner_id && !state.rejected {
				return;
			}
			state.rejected = false;
			let previous = state.current.take();
			let next = winner.map(|module| {
				let supply = self.target.supply().derive();
				state.current = Some(Loaded {
					id: module.id(),
					supply: supply.clone(),
				});
				(module, supply)
			});
			(previous, next)
		};

		if let Some(previous) = previous {
			tracing::debug!(module = %self.name, "module unloaded");
			previous.supply.off();
		}

		match next {
			Some((implementation, supply)) => self.load(&implementation, &supply),
			None => {
				self.status.send_modify(|status| *status = ModuleStatus::default());
			}
		}
	}

	/// Unloads the current implementation after the implementation list failed to evaluate.
	fn reject(&self, error: ModuleError) {
		let previous = {
			let mut state = self.state.lock();
			state.rejected = true;
			state.current.take()
		};
		if let Some(previous) = previous {
			tracing::debug!(module = %self.name, "module unloaded");
			previous.supply.off();
		}

		tracing::warn!(module = %self.name, %error, "module implementation failed to evaluate");
		self.status.send_modify(|status| {
			*status = ModuleStatus {
				provided: true,
				error: Some(error),
				..ModuleStatus::default()
			};
		});
	}

	fn load(&self, implementation: &CxModule, supply: &Supply) {
		self.publish(
			supply,
			ModuleStatus {
				provided: true,
				..ModuleStatus::default()
			},
		);

		match self.run(implementation, supply) {
			Ok(()) => {
				tracing::debug!(module = %self.name, implementation = %implementation.name(), "module loaded");
				self.publish(
					supply,
					ModuleStatus {
						provided: true,
						loaded: true,
						ready: true,
						error: None,
					},
				);
			}
			Err(error) => {
				tracing::warn!(module = %self.name, implementation = %implementation.name(), %error, "module setup failed");
				self.publish(
					supply,
					ModuleStatus {
						provided: true,
						error: Some(error.clone()),
						..ModuleStatus::default()
					},
				);
				supply.fail(error);
			}
		}
	}

	fn run(&self, implementation: &CxModule, supply: &Supply) -> Result<(), ModuleError> {
		let cx = self.target.context()?;

		for needed in implementation.needed() {
			let used = cx.get(needed.entry())?;
			if !used.status().provided {
				for asset in needed.assets(supply) {
					self.target.provide(asset);
				}
			}
			if let Some(error) = used.status().error {
				return Err(ModuleError::Dependency {
					module: Arc::clone(implementation.name_arc()),
					needed: Arc::clone(needed.name_arc()),
					source: Box::new(error),
				});
			}
		}

		let setup = ModuleSetup::new(implementation, &cx, &self.target, supply);
		implementation
			.setup(&setup)
			.map_err(|error| ModuleError::setup(implementation.name_arc(), error))?;
		self.publish(
			supply,
			ModuleStatus {
				provided: true,
				loaded: true,
				..ModuleStatus::default()
			},
		);

		for init in setup.into_initializers() {
			init(&cx).map_err(|error| ModuleError::setup(implementation.name_arc(), error))?;
		}
		Ok(())
	}

	fn is_current(&self, supply: &Supply) -> bool {
		self.state
			.lock()
			.current
			.as_ref()
			.is_some_and(|loaded| loaded.supply.same_as(supply))
	}

	/// Publishes `status` unless the load behind `supply` has been replaced.
	fn publish(&self, supply: &Supply, status: ModuleStatus) {
		if self.is_current(supply) && !supply.is_off() {
			self.status.send_modify(|current| *current = status);
		}
	}
}
