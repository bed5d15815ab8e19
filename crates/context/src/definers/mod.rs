//! Reusable entry definers.
//!
//! - [`SingleDefiner`]: the most actual asset wins.
//! - [`DynamicDefiner`]: state rebuilt from the full asset list on every change.
//! - [`TrackedDefiner`]: a live [`ValueTracker`](proffer_value::ValueTracker)
//!   following the assets.

mod dynamic;
mod single;
mod tracked;

pub use dynamic::{CxRequestMethod, DynamicDefiner, cx_dynamic, cx_multi};
pub use single::{SingleDefiner, cx_single};
pub use tracked::{TrackedDefiner, cx_tracked, cx_tracked_list};

#[cfg(test)]
mod tests;
