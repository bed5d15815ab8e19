//! Lifecycle tokens.
//!
//! A [`Supply`] is a handle to something that can be cut off exactly once,
//! optionally with a failure. Supplies form a dependency graph through
//! [`Supply::needs`]: when a supply goes off, every supply that needs it goes
//! off too, carrying the same [`OffReason`].
//!
//! Dependents are tracked through weak back-references only, so a supply never
//! keeps the supplies depending on it alive.

use std::error::Error;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

#[cfg(test)]
mod tests;

/// Why a supply has been cut off.
#[derive(thiserror::Error, Debug, Clone)]
pub enum OffReason {
	/// Cut off normally.
	#[error("supply cut off")]
	Done,
	/// Cut off because of a failure.
	#[error("supply failed: {0}")]
	Failed(#[source] Arc<dyn Error + Send + Sync>),
}

impl OffReason {
	/// Wraps an error into a failure reason.
	pub fn failed(error: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
		Self::Failed(Arc::from(error.into()))
	}

	/// Returns true for [`OffReason::Failed`].
	pub fn is_failure(&self) -> bool {
		matches!(self, Self::Failed(_))
	}

	/// Returns the underlying failure, if any.
	pub fn failure(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
		match self {
			Self::Done => None,
			Self::Failed(error) => Some(error.as_ref()),
		}
	}
}

type OffObserver = Box<dyn FnOnce(&OffReason) + Send>;

enum SupplyState {
	On {
		observers: Vec<OffObserver>,
		dependents: Vec<Weak<SupplyInner>>,
	},
	Off(OffReason),
}

struct SupplyInner {
	state: Mutex<SupplyState>,
}

/// Cancellation and teardown handle.
///
/// Cloning a supply yields another handle to the same token.
#[derive(Clone)]
pub struct Supply {
	inner: Arc<SupplyInner>,
}

impl Default for Supply {
	fn default() -> Self {
		Self::new()
	}
}

impl Supply {
	/// Creates a supply that is on.
	pub fn new() -> Self {
		Self {
			inner: Arc::new(SupplyInner {
				state: Mutex::new(SupplyState::On {
					observers: Vec::new(),
					dependents: Vec::new(),
				}),
			}),
		}
	}

	/// Creates a supply that is already off with the given reason.
	pub fn off_already(reason: OffReason) -> Self {
		Self {
			inner: Arc::new(SupplyInner {
				state: Mutex::new(SupplyState::Off(reason)),
			}),
		}
	}

	/// Returns true once the supply has been cut off.
	pub fn is_off(&self) -> bool {
		matches!(*self.inner.state.lock(), SupplyState::Off(_))
	}

	/// Returns the reason the supply has been cut off with, if it is off.
	pub fn off_reason(&self) -> Option<OffReason> {
		match &*self.inner.state.lock() {
			SupplyState::On { .. } => None,
			SupplyState::Off(reason) => Some(reason.clone()),
		}
	}

	/// Cuts off the supply normally.
	pub fn off(&self) {
		self.off_with(OffReason::Done);
	}

	/// Cuts off the supply with a failure.
	pub fn fail(&self, error: impl Into<Box<dyn Error + Send + Sync>>) {
		self.off_with(OffReason::failed(error));
	}

	/// Cuts off the supply with the given reason.
	///
	/// Only the first call has any effect. Observers run first, then every
	/// dependent supply is cut off with the same reason.
	pub fn off_with(&self, reason: OffReason) {
		let (observers, dependents) = {
			let mut state = self.inner.state.lock();
			match std::mem::replace(&mut *state, SupplyState::Off(reason.clone())) {
				SupplyState::On { observers, dependents } => (observers, dependents),
				prev @ SupplyState::Off(_) => {
					*state = prev;
					return;
				}
			}
		};

		tracing::trace!(
			observers = observers.len(),
			dependents = dependents.len(),
			failed = reason.is_failure(),
			"supply off"
		);

		for observer in observers {
			observer(&reason);
		}
		for dependent in dependents {
			if let Some(inner) = dependent.upgrade() {
				Supply { inner }.off_with(reason.clone());
			}
		}
	}

	/// Registers a callback to run when the supply goes off.
	///
	/// Runs immediately if the supply is already off.
	pub fn when_off(&self, observer: impl FnOnce(&OffReason) + Send + 'static) -> &Self {
		let reason = {
			let mut state = self.inner.state.lock();
			match &mut *state {
				SupplyState::On { observers, .. } => {
					observers.push(Box::new(observer));
					return self;
				}
				SupplyState::Off(reason) => reason.clone(),
			}
		};
		observer(&reason);
		self
	}

	/// Makes this supply depend on `other`.
	///
	/// When `other` goes off, this supply goes off with the same reason. If
	/// `other` is already off, this supply is cut off right away.
	pub fn needs(&self, other: &Supply) -> &Self {
		if Arc::ptr_eq(&self.inner, &other.inner) {
			return self;
		}
		let reason = {
			let mut state = other.inner.state.lock();
			match &mut *state {
				SupplyState::On { dependents, .. } => {
					dependents.retain(|dep| dep.strong_count() > 0);
					dependents.push(Arc::downgrade(&self.inner));
					return self;
				}
				SupplyState::Off(reason) => reason.clone(),
			}
		};
		self.off_with(reason);
		self
	}

	/// Makes `other` depend on this supply.
	pub fn cuts_off(&self, other: &Supply) -> &Self {
		other.needs(self);
		self
	}

	/// Creates a new supply that needs this one.
	pub fn derive(&self) -> Supply {
		let derived = Supply::new();
		derived.needs(self);
		derived
	}

	/// Returns true when both handles refer to the same supply.
	pub fn same_as(&self, other: &Supply) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}
}

impl fmt::Debug for Supply {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &*self.inner.state.lock() {
			SupplyState::On { observers, dependents } => f
				.debug_struct("Supply")
				.field("observers", &observers.len())
				.field("dependents", &dependents.len())
				.finish(),
			SupplyState::Off(reason) => f.debug_struct("Supply").field("off", reason).finish(),
		}
	}
}
