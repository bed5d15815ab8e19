//! Context value access.
//!
//! # Resolution Order
//!
//! 1. The value derived from the entry's assets
//! 2. The fallback supplied with the request
//! 3. The entry's default value
//!
//! If none of them holds a value, [`Cx::get`] fails with
//! [`ContextError::Missing`] while [`Cx::try_get`] returns `None`.

use std::sync::Arc;

use proffer_supply::Supply;

use crate::CxValue;
use crate::entry::CxEntry;
use crate::error::ContextError;
use crate::scope::Scope;

/// Request options for [`Cx::get_with`].
pub struct CxRequest<V> {
	or: Option<Option<V>>,
}

impl<V> Default for CxRequest<V> {
	fn default() -> Self {
		Self { or: None }
	}
}

impl<V> CxRequest<V> {
	/// A request without fallback.
	pub fn new() -> Self {
		Self::default()
	}

	/// A request falling back to `value`.
	pub fn or(value: V) -> Self {
		Self { or: Some(Some(value)) }
	}

	/// A request whose fallback is given, but holds no value.
	///
	/// Most entries treat this as no fallback at all. Entries resolving to a
	/// live value reject it.
	pub fn or_none() -> Self {
		Self { or: Some(None) }
	}

	/// The fallback: `None` when not given, `Some(None)` when given empty.
	pub fn fallback(&self) -> Option<&Option<V>> {
		self.or.as_ref()
	}
}

/// Values accessor of one scope.
///
/// Cloning yields another handle to the same scope and value cache.
#[derive(Clone)]
pub struct Cx {
	scope: Arc<Scope>,
}

impl Cx {
	pub(crate) fn new(scope: Arc<Scope>) -> Self {
		Self { scope }
	}

	/// Supply of the scope; cutting it off invalidates every value.
	pub fn supply(&self) -> &Supply {
		self.scope.supply()
	}

	/// Resolves the value of `entry`.
	pub fn get<V: CxValue, A: CxValue>(&self, entry: &CxEntry<V, A>) -> Result<V, ContextError> {
		self.get_with(entry, CxRequest::new())
	}

	/// Resolves the value of `entry`, falling back to `fallback`.
	pub fn get_or<V: CxValue, A: CxValue>(&self, entry: &CxEntry<V, A>, fallback: V) -> Result<V, ContextError> {
		self.get_with(entry, CxRequest::or(fallback))
	}

	/// Resolves the value of `entry`, or `None` when it has none.
	pub fn try_get<V: CxValue, A: CxValue>(&self, entry: &CxEntry<V, A>) -> Result<Option<V>, ContextError> {
		self.try_get_with(entry, CxRequest::new())
	}

	/// Resolves the value of `entry` with request options.
	pub fn get_with<V: CxValue, A: CxValue>(&self, entry: &CxEntry<V, A>, request: CxRequest<V>) -> Result<V, ContextError> {
		self.try_get_with(entry, request)?
			.ok_or_else(|| ContextError::Missing { entry: entry.info().clone() })
	}

	/// Resolves the value of `entry` with request options, or `None` when it
	/// has none.
	pub fn try_get_with<V: CxValue, A: CxValue>(&self, entry: &CxEntry<V, A>, request: CxRequest<V>) -> Result<Option<V>, ContextError> {
		let slot = self.scope.slot(entry)?;
		let definition = &slot.definition;

		if definition.rejects_empty_fallback() && matches!(request.or, Some(None)) {
			return Err(ContextError::InvalidFallback { entry: entry.info().clone() });
		}
		if let Some(value) = definition.value()? {
			return Ok(Some(value));
		}
		if let Some(Some(fallback)) = request.or {
			return Ok(Some(fallback));
		}
		definition.default_value()
	}
}

impl std::fmt::Debug for Cx {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Cx").field("off", &self.scope.supply().is_off()).finish()
	}
}
