use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pretty_assertions::assert_eq;

use super::*;

#[test]
fn off_is_idempotent() {
	let supply = Supply::new();
	let calls = Arc::new(AtomicUsize::new(0));
	let calls_clone = Arc::clone(&calls);
	supply.when_off(move |_| {
		calls_clone.fetch_add(1, Ordering::SeqCst);
	});

	supply.off();
	supply.fail("ignored");

	assert!(supply.is_off());
	assert_eq!(calls.load(Ordering::SeqCst), 1);
	assert!(matches!(supply.off_reason(), Some(OffReason::Done)));
}

#[test]
fn when_off_runs_immediately_after_off() {
	let supply = Supply::new();
	supply.fail("boom");

	let seen = Arc::new(parking_lot::Mutex::new(None));
	let seen_clone = Arc::clone(&seen);
	supply.when_off(move |reason| {
		*seen_clone.lock() = Some(reason.to_string());
	});

	assert_eq!(seen.lock().as_deref(), Some("supply failed: boom"));
}

#[test]
fn needs_propagates_reason_to_dependents() {
	let parent = Supply::new();
	let child = parent.derive();
	let grandchild = child.derive();

	parent.fail("parent died");

	assert!(child.is_off());
	let reason = grandchild.off_reason().expect("grandchild should be off");
	assert_eq!(reason.failure().map(|e| e.to_string()).as_deref(), Some("parent died"));
}

#[test]
fn child_off_leaves_parent_on() {
	let parent = Supply::new();
	let child = parent.derive();

	child.off();

	assert!(child.is_off());
	assert!(!parent.is_off());
}

#[test]
fn needs_off_supply_cuts_off_immediately() {
	let parent = Supply::new();
	parent.off();

	let child = Supply::new();
	child.needs(&parent);

	assert!(child.is_off());
}

#[test]
fn cuts_off_is_the_inverse_of_needs() {
	let a = Supply::new();
	let b = Supply::new();
	a.cuts_off(&b);

	a.off();

	assert!(b.is_off());
}

#[test]
fn observers_may_reenter_the_same_supply() {
	let supply = Supply::new();
	let handle = supply.clone();
	let reentered = Arc::new(AtomicUsize::new(0));
	let reentered_clone = Arc::clone(&reentered);
	supply.when_off(move |_| {
		assert!(handle.is_off());
		handle.off();
		handle.when_off(move |_| {
			reentered_clone.fetch_add(1, Ordering::SeqCst);
		});
	});

	supply.off();

	assert_eq!(reentered.load(Ordering::SeqCst), 1);
}

#[test]
fn dropped_dependents_are_skipped() {
	let parent = Supply::new();
	{
		let _child = parent.derive();
	}
	let live = parent.derive();

	parent.off();

	assert!(live.is_off());
}
