//! Observable values.
//!
//! A [`ValueTracker`] keeps the last assigned value and pushes every later
//! assignment to its observers synchronously. Each subscription is a
//! [`Supply`]: cutting it off ends the subscription, and cutting off the
//! tracker's own supply ends all of them.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use proffer_supply::Supply;


type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Subscription<T> {
	id: u64,
	supply: Supply,
	observer: Observer<T>,
}

struct Observers<T> {
	next_id: u64,
	list: Vec<Subscription<T>>,
}

struct TrackerInner<T> {
	value: ArcSwap<T>,
	observers: Mutex<Observers<T>>,
	supply: Supply,
}

/// Value holder notifying observers on every assignment.
pub struct ValueTracker<T> {
	inner: Arc<TrackerInner<T>>,
}

impl<T> Clone for ValueTracker<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T> PartialEq for ValueTracker<T> {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}
}

impl<T: std::fmt::Debug> std::fmt::Debug for ValueTracker<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ValueTracker")
			.field("value", &**self.inner.value.load())
			.field("off", &self.inner.supply.is_off())
			.finish()
	}
}

impl<T> ValueTracker<T>
where
	T: Clone + Send + Sync + 'static,
{
	/// Creates a tracker holding `value`.
	pub fn new(value: T) -> Self {
		Self::with_supply(value, Supply::new())
	}

	/// Creates a tracker holding `value`, alive while `supply` is on.
	pub fn with_supply(value: T, supply: Supply) -> Self {
		let inner = Arc::new(TrackerInner {
			value: ArcSwap::from_pointee(value),
			observers: Mutex::new(Observers {
				next_id: 0,
				list: Vec::new(),
			}),
			supply,
		});

		let weak = Arc::downgrade(&inner);
		inner.supply.when_off(move |_| {
			if let Some(inner) = weak.upgrade() {
				let list = std::mem::take(&mut inner.observers.lock().list);
				for sub in list {
					sub.supply.off();
				}
			}
		});

		Self { inner }
	}

	/// Returns the current value.
	pub fn get(&self) -> T {
		T::clone(&self.inner.value.load())
	}

	/// Assigns a new value and delivers it to every observer.
	///
	/// Does nothing once the tracker's supply is off.
	pub fn set(&self, value: T) {
		if self.inner.supply.is_off() {
			return;
		}
		let value = Arc::new(value);
		self.inner.value.store(Arc::clone(&value));

		let observers: Vec<Observer<T>> = self
			.inner
			.observers
			.lock()
			.list
			.iter()
			.filter(|sub| !sub.supply.is_off())
			.map(|sub| Arc::clone(&sub.observer))
			.collect();
		for observer in observers {
			observer(&value);
		}
	}

	/// Subscribes to subsequent assignments.
	pub fn on_update(&self, observer: impl Fn(&T) + Send + Sync + 'static) -> Supply {
		let supply = Supply::new();
		if self.inner.supply.is_off() {
			supply.off();
			return supply;
		}

		let id = {
			let mut observers = self.inner.observers.lock();
			let id = observers.next_id;
			observers.next_id += 1;
			observers.list.push(Subscription {
				id,
				supply: supply.clone(),
				observer: Arc::new(observer),
			});
			id
		};

		let weak = Arc::downgrade(&self.inner);
		supply.when_off(move |_| {
			if let Some(inner) = weak.upgrade() {
				inner.observers.lock().list.retain(|sub| sub.id != id);
			}
		});
		supply
	}

	/// Delivers the current value right away, then every later assignment.
	pub fn read(&self, observer: impl Fn(&T) + Send + Sync + 'static) -> Supply {
		let observer = Arc::new(observer);
		let current = self.inner.value.load_full();
		observer(&current);
		let observer_clone = Arc::clone(&observer);
		self.on_update(move |value| observer_clone(value))
	}

	/// Returns the supply the tracker lives by.
	pub fn supply(&self) -> &Supply {
		&self.inner.supply
	}
}
