//! Asset registration.

use std::sync::Arc;

use proffer_supply::Supply;

use crate::CxValue;
use crate::asset::CxAsset;
use crate::cx::Cx;
use crate::scope::Scope;

/// Registers assets into one scope and hands out its [`Cx`].
///
/// A child builder sees the assets of its ancestors with increasing rank, but
/// its own registrations are invisible to them. Dropping the last handle to a
/// scope (builders and contexts alike) tears the scope down.
#[derive(Clone)]
pub struct CxBuilder {
	scope: Arc<Scope>,
}

impl Default for CxBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl CxBuilder {
	/// Creates a root scope.
	pub fn new() -> Self {
		Self {
			scope: Scope::new(None, None),
		}
	}

	/// Creates a root scope torn down together with `supply`.
	pub fn with_supply(supply: &Supply) -> Self {
		Self {
			scope: Scope::new(None, Some(supply)),
		}
	}

	/// Creates a nested scope.
	pub fn child(&self) -> Self {
		Self {
			scope: Scope::new(Some(Arc::clone(&self.scope)), None),
		}
	}

	/// Registers an asset; cutting off the returned supply revokes it.
	pub fn provide<V: CxValue, A: CxValue>(&self, asset: CxAsset<V, A>) -> Supply {
		self.scope.provide(asset.entry.info(), asset.source, asset.supply.as_ref())
	}

	/// The values accessor of this scope.
	pub fn context(&self) -> Cx {
		Cx::new(Arc::clone(&self.scope))
	}

	/// Supply of the scope.
	pub fn supply(&self) -> &Supply {
		self.scope.supply()
	}
}

impl std::fmt::Debug for CxBuilder {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CxBuilder").field("off", &self.scope.supply().is_off()).finish()
	}
}
