//! Scoped value resolution.
//!
//! An entry ([`CxEntry`]) names a value. Assets ([`CxAsset`]) registered into
//! a scope ([`CxBuilder`]) contribute to it, and the entry's definer decides
//! how its contributions combine into a value. A [`Cx`] resolves entries for
//! one scope, seeing the assets of the scope itself and of all its ancestors.
//!
//! # Modules
//!
//! - [`definers`] - Single, dynamic and tracked entry strategies
//!
//! # Lifecycle
//!
//! Everything registered or materialized is bound to a
//! [`Supply`](proffer_supply::Supply). Cutting off an asset's supply revokes
//! it. Cutting off a scope's supply revokes its assets and invalidates every
//! value materialized in it and in its descendants.

mod asset;
mod builder;
mod cx;
pub mod definers;
mod entry;
mod error;
mod memo;
mod scope;
mod target;

pub use asset::{AssetHandle, AssetId, CxAsset};
pub use builder::CxBuilder;
pub use cx::{Cx, CxRequest};
pub use definers::{
	CxRequestMethod, DynamicDefiner, SingleDefiner, TrackedDefiner, cx_dynamic, cx_multi, cx_single,
	cx_tracked, cx_tracked_list,
};
pub use entry::{CxDefiner, CxEntry, Definition, EntryId, EntryInfo};
pub use error::ContextError;
pub use proffer_supply::{OffReason, Supply};
pub use proffer_value::ValueTracker;
pub use target::CxTarget;

/// Bound shared by entry values and assets.
pub trait CxValue: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> CxValue for T {}
