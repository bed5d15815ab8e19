use std::error::Error;
use std::sync::Arc;

use proffer_supply::OffReason;

use crate::entry::EntryInfo;

/// Failure to resolve the value of an entry.
///
/// Absence of a value is not an error by itself; this is raised only when no
/// asset, fallback or default exists, or when the resolution can not be
/// performed at all.
#[derive(thiserror::Error, Debug, Clone)]
pub enum ContextError {
	/// No asset, fallback or default value.
	#[error("no value provided for `{entry}`")]
	Missing { entry: EntryInfo },
	/// The scope the value belongs to has been torn down.
	#[error("`{entry}` is no longer available")]
	Unavailable {
		entry: EntryInfo,
		#[source]
		reason: OffReason,
	},
	/// A fallback was given, but holds no value.
	#[error("fallback for `{entry}` must hold a value")]
	InvalidFallback { entry: EntryInfo },
	/// The entry was requested while its own value was being resolved.
	#[error("`{entry}` requested while being resolved")]
	Recursive { entry: EntryInfo },
	/// An asset evaluator failed.
	#[error("failed to evaluate asset of `{entry}`")]
	Asset {
		entry: EntryInfo,
		source: Arc<dyn Error + Send + Sync>,
	},
}

impl ContextError {
	/// Wraps an asset evaluation failure.
	pub fn asset(entry: &EntryInfo, error: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
		Self::Asset {
			entry: entry.clone(),
			source: Arc::from(error.into()),
		}
	}

	pub(crate) fn unavailable(entry: &EntryInfo, reason: OffReason) -> Self {
		Self::Unavailable {
			entry: entry.clone(),
			reason,
		}
	}

	/// Returns the entry that failed to resolve.
	pub fn entry(&self) -> &EntryInfo {
		match self {
			Self::Missing { entry }
			| Self::Unavailable { entry, .. }
			| Self::InvalidFallback { entry }
			| Self::Recursive { entry }
			| Self::Asset { entry, .. } => entry,
		}
	}

	/// Returns the teardown reason for [`ContextError::Unavailable`].
	pub fn off_reason(&self) -> Option<&OffReason> {
		match self {
			Self::Unavailable { reason, .. } => Some(reason),
			_ => None,
		}
	}
}
