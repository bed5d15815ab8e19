//! Modules loaded through scoped entry resolution.
//!
//! A [`CxModule`] is provided to a [`CxBuilder`](proffer_context::CxBuilder)
//! like any other asset, and loaded the first time its entry is requested in
//! a scope:
//!
//! 1. Modules it needs are provided when absent, then loaded
//! 2. Its setup function runs, providing assets and queuing initializers
//! 3. The queued initializers run in order
//!
//! Progress is published as a [`ModuleStatus`] through the [`ModuleUse`]
//! the entry resolves to.

mod error;
mod loader;
mod module;
mod setup;
mod status;

pub use error::{BoxError, ModuleError};
pub use module::CxModule;
pub use setup::ModuleSetup;
pub use status::{ModuleStatus, ModuleUse};
