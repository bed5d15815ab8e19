use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use super::*;
use crate::{ContextError, CxAsset, CxBuilder, CxEntry};

#[test]
fn single_recomputes_after_asset_list_change() {
	let entry = cx_single::<u32>("answer");
	let builder = CxBuilder::new();
	let cx = builder.context();

	let first = builder.provide(CxAsset::value(&entry, 1));
	assert_eq!(cx.get(&entry).ok(), Some(1));

	let second = builder.provide(CxAsset::value(&entry, 2));
	assert_eq!(cx.get(&entry).ok(), Some(2));

	second.off();
	assert_eq!(cx.get(&entry).ok(), Some(1));

	first.off();
	assert!(matches!(cx.get(&entry), Err(ContextError::Missing { .. })));
}

#[test]
fn single_skips_assets_without_value() {
	let entry = cx_single::<&'static str>("name");
	let builder = CxBuilder::new();
	builder.provide(CxAsset::value(&entry, "kept"));
	builder.provide(CxAsset::evaluated(&entry, |_| Ok(None)));

	assert_eq!(builder.context().get(&entry).ok(), Some("kept"));
}

#[test]
fn single_default_evaluated_once() {
	let calls = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&calls);
	let entry = CxEntry::new(
		"counted",
		SingleDefiner::new().by_default(move |_| {
			counter.fetch_add(1, Ordering::SeqCst);
			Ok(Some(7u32))
		}),
	);
	let cx = CxBuilder::new().context();

	assert_eq!(cx.get(&entry).ok(), Some(7));
	assert_eq!(cx.get(&entry).ok(), Some(7));
	assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn dynamic_builds_state_from_all_assets() {
	let entry: CxEntry<usize, u32> = CxEntry::new(
		"sum",
		DynamicDefiner::new()
			.create(|assets: &[u32], _: &crate::CxTarget<u32>| -> Result<u32, ContextError> { Ok(assets.iter().sum()) })
			.access(|sum: &u32, _| *sum as usize),
	);
	let builder = CxBuilder::new();
	let cx = builder.context();
	builder.provide(CxAsset::value(&entry, 2));
	builder.provide(CxAsset::value(&entry, 3));

	assert_eq!(cx.get(&entry).ok(), Some(5));

	builder.provide(CxAsset::value(&entry, 10));
	assert_eq!(cx.get(&entry).ok(), Some(15));
}

#[test]
fn dynamic_reports_assignment_method() {
	let seen: Arc<Mutex<Vec<Option<(Vec<u32>, CxRequestMethod)>>>> = Arc::default();
	let sink = Arc::clone(&seen);
	let entry = CxEntry::new(
		"assigned",
		DynamicDefiner::new()
			.by_default(|_| Ok(Some(vec![0])))
			.on_assign(move |assigned| sink.lock().push(assigned)),
	);
	let builder = CxBuilder::new();
	let cx = builder.context();

	assert_eq!(cx.get(&entry).ok(), Some(vec![0]));
	let supply = builder.provide(CxAsset::value(&entry, 4));
	supply.off();

	assert_eq!(
		*seen.lock(),
		vec![
			Some((vec![0], CxRequestMethod::Defaults)),
			Some((vec![4], CxRequestMethod::Assets)),
			Some((vec![0], CxRequestMethod::Defaults)),
		]
	);
}

#[test]
fn dynamic_fails_after_teardown() {
	let entry = cx_multi::<u32>("list");
	let builder = CxBuilder::new();
	let cx = builder.context();
	builder.provide(CxAsset::value(&entry, 1));
	assert_eq!(cx.get(&entry).ok(), Some(vec![1]));

	builder.supply().off();
	let error = cx.get(&entry).err();
	assert!(matches!(error, Some(ContextError::Unavailable { .. })));
}

#[test]
fn tracked_follows_most_actual_asset() {
	let entry = cx_tracked::<u32>("live");
	let builder = CxBuilder::new();
	let Ok(tracker) = builder.context().get(&entry) else {
		panic!("tracked entry always resolves");
	};
	assert_eq!(tracker.get(), None);

	let first = builder.provide(CxAsset::value(&entry, 1));
	assert_eq!(tracker.get(), Some(1));
	let second = builder.provide(CxAsset::value(&entry, 2));
	assert_eq!(tracker.get(), Some(2));

	second.off();
	assert_eq!(tracker.get(), Some(1));
	first.off();
	assert_eq!(tracker.get(), None);
}

#[test]
fn tracked_list_updates_in_registration_order() {
	let entry = cx_tracked_list::<&'static str>("names");
	let builder = CxBuilder::new();
	builder.provide(CxAsset::value(&entry, "a"));
	let Ok(tracker) = builder.context().get(&entry) else {
		panic!("tracked entry always resolves");
	};
	builder.provide(CxAsset::value(&entry, "b"));

	assert_eq!(tracker.get(), vec!["a", "b"]);
}

#[test]
fn tracked_default_value_applies_without_assets() {
	let entry = CxEntry::new("live", TrackedDefiner::single().default_value(5u32));
	let builder = CxBuilder::new();
	let Ok(tracker) = builder.context().get(&entry) else {
		panic!("tracked entry always resolves");
	};
	assert_eq!(tracker.get(), Some(5));

	let supply = builder.provide(CxAsset::value(&entry, 9));
	assert_eq!(tracker.get(), Some(9));
	supply.off();
	assert_eq!(tracker.get(), Some(5));
}
