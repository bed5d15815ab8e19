use parking_lot::Mutex;

use crate::entry::EntryInfo;
use crate::error::ContextError;

enum MemoState<T> {
	Empty,
	Computing,
	Ready(T),
}

/// Computes a value at most once until reset.
///
/// Failures are not cached. Reentrant access while computing fails with
/// [`ContextError::Recursive`] rather than blocking.
pub(crate) struct Memo<T> {
	state: Mutex<MemoState<T>>,
}

impl<T: Clone> Memo<T> {
	pub fn new() -> Self {
		Self {
			state: Mutex::new(MemoState::Empty),
		}
	}

	pub fn get_or_try_init(&self, entry: &EntryInfo, init: impl FnOnce() -> Result<T, ContextError>) -> Result<T, ContextError> {
		{
			let mut state = self.state.lock();
			match &*state {
				MemoState::Ready(value) => return Ok(value.clone()),
				MemoState::Computing => return Err(ContextError::Recursive { entry: entry.clone() }),
				MemoState::Empty => *state = MemoState::Computing,
			}
		}

		let result = init();

		let mut state = self.state.lock();
		// A reset while computing means the result is already stale.
		let current = matches!(*state, MemoState::Computing);
		match result {
			Ok(value) => {
				if current {
					*state = MemoState::Ready(value.clone());
				}
				Ok(value)
			}
			Err(error) => {
				if current {
					*state = MemoState::Empty;
				}
				Err(error)
			}
		}
	}

	pub fn reset(&self) {
		*self.state.lock() = MemoState::Empty;
	}
}
