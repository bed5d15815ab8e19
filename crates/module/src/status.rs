//! Observable module state.

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::ModuleError;

/// Snapshot of a module's load state within one scope.
#[derive(Debug, Clone, Default)]
pub struct ModuleStatus {
	/// An implementation of the module is available.
	pub provided: bool,
	/// The implementation's setup has completed.
	pub loaded: bool,
	/// Every initializer queued by the setup has completed.
	pub ready: bool,
	/// Why loading failed, or why the module is gone.
	pub error: Option<ModuleError>,
}

impl ModuleStatus {
	/// Returns true once the module is ready or has failed.
	pub fn is_settled(&self) -> bool {
		self.ready || self.error.is_some()
	}
}

/// Use of a module within one scope, as resolved by [`Cx::get`].
///
/// [`Cx::get`]: proffer_context::Cx::get
#[derive(Clone)]
pub struct ModuleUse {
	name: Arc<str>,
	status: watch::Receiver<ModuleStatus>,
}

impl ModuleUse {
	pub(crate) fn new(name: Arc<str>, status: watch::Receiver<ModuleStatus>) -> Self {
		Self { name, status }
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Current status.
	pub fn status(&self) -> ModuleStatus {
		self.status.borrow().clone()
	}

	/// Subscribes to status changes.
	pub fn subscribe(&self) -> watch::Receiver<ModuleStatus> {
		self.status.clone()
	}

	/// Waits until the module is ready.
	///
	/// # Errors
	///
	/// Returns the load failure, or [`ModuleError::Closed`] when the status is
	/// no longer published.
	pub async fn when_ready(&self) -> Result<(), ModuleError> {
		let mut status = self.status.clone();
		let settled = status
			.wait_for(ModuleStatus::is_settled)
			.await
			.map_err(|_| ModuleError::Closed {
				module: Arc::clone(&self.name),
			})?;
		match &settled.error {
			Some(error) => Err(error.clone()),
			None => Ok(()),
		}
	}
}

impl std::fmt::Debug for ModuleUse {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ModuleUse")
			.field("name", &self.name)
			.field("status", &*self.status.borrow())
			.finish()
	}
}
