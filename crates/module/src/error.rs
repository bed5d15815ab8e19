use std::error::Error;
use std::sync::Arc;

use proffer_context::{ContextError, OffReason};

/// Boxed error returned by module setup and initializers.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Failure to load a module.
#[derive(thiserror::Error, Debug, Clone)]
pub enum ModuleError {
	/// The setup function or one of its initializers failed.
	#[error("failed to set up module `{module}`")]
	Setup {
		module: Arc<str>,
		source: Arc<dyn Error + Send + Sync>,
	},
	/// A needed module failed to load.
	#[error("module `{module}` needs `{needed}`, which failed to load")]
	Dependency {
		module: Arc<str>,
		needed: Arc<str>,
		source: Box<ModuleError>,
	},
	#[error(transparent)]
	Context(#[from] ContextError),
	/// The scope the module was loaded in has been torn down.
	#[error("module `{module}` is no longer available")]
	Unavailable {
		module: Arc<str>,
		#[source]
		reason: OffReason,
	},
	/// The module status stopped being published before the module got ready.
	#[error("module `{module}` dropped before getting ready")]
	Closed { module: Arc<str> },
}

impl ModuleError {
	pub(crate) fn setup(module: &Arc<str>, error: BoxError) -> Self {
		Self::Setup {
			module: Arc::clone(module),
			source: Arc::from(error),
		}
	}
}
