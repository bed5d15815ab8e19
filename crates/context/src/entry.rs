//! Entries and their definitions.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crate::CxValue;
use crate::error::ContextError;
use crate::target::CxTarget;

static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(u64);

impl EntryId {
	fn next() -> Self {
		Self(NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed))
	}

	/// Returns the underlying value.
	pub const fn as_u64(self) -> u64 {
		self.0
	}
}

/// Identity of an entry, carried by errors and diagnostics.
#[derive(Debug, Clone)]
pub struct EntryInfo {
	id: EntryId,
	name: Arc<str>,
}

impl EntryInfo {
	pub fn id(&self) -> EntryId {
		self.id
	}

	pub fn name(&self) -> &str {
		&self.name
	}
}

impl PartialEq for EntryInfo {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
	}
}

impl Eq for EntryInfo {}

impl fmt::Display for EntryInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.name)
	}
}

/// Resolution strategy of an entry.
///
/// [`CxDefiner::per_context`] is called at most once per entry and scope, the
/// first time the entry is requested there. Any `Fn(&CxTarget<A>) ->
/// Definition<V>` closure is a definer.
pub trait CxDefiner<V, A>: Send + Sync + 'static {
	fn per_context(&self, target: &CxTarget<A>) -> Definition<V>;
}

impl<V, A, F> CxDefiner<V, A> for F
where
	F: Fn(&CxTarget<A>) -> Definition<V> + Send + Sync + 'static,
{
	fn per_context(&self, target: &CxTarget<A>) -> Definition<V> {
		self(target)
	}
}

type BoxDefiner<V, A> = Box<dyn CxDefiner<V, A>>;

enum DefinerSlot<V, A> {
	Ready(BoxDefiner<V, A>),
	Deferred {
		definer: OnceLock<BoxDefiner<V, A>>,
		init: Box<dyn Fn() -> BoxDefiner<V, A> + Send + Sync>,
	},
}

struct EntryInner<V, A> {
	info: EntryInfo,
	definer: DefinerSlot<V, A>,
}

/// Named value slot resolved per scope.
///
/// `V` is the resolved value type, `A` the type of the assets contributing to
/// it. Entries are compared by identity: two entries with the same name are
/// still distinct.
pub struct CxEntry<V, A = V> {
	inner: Arc<EntryInner<V, A>>,
}

impl<V, A> Clone for CxEntry<V, A> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<V, A> PartialEq for CxEntry<V, A> {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}
}

impl<V, A> Eq for CxEntry<V, A> {}

impl<V, A> fmt::Debug for CxEntry<V, A> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("CxEntry").field(&self.inner.info.name).finish()
	}
}

impl<V: CxValue, A: CxValue> CxEntry<V, A> {
	/// Declares an entry resolved by `definer`.
	pub fn new(name: impl Into<Arc<str>>, definer: impl CxDefiner<V, A>) -> Self {
		Self::with_slot(name.into(), DefinerSlot::Ready(Box::new(definer)))
	}

	/// Declares an entry whose definer is built on first resolution.
	pub fn deferred<D>(name: impl Into<Arc<str>>, init: impl Fn() -> D + Send + Sync + 'static) -> Self
	where
		D: CxDefiner<V, A>,
	{
		Self::with_slot(
			name.into(),
			DefinerSlot::Deferred {
				definer: OnceLock::new(),
				init: Box::new(move || Box::new(init()) as BoxDefiner<V, A>),
			},
		)
	}

	fn with_slot(name: Arc<str>, definer: DefinerSlot<V, A>) -> Self {
		Self {
			inner: Arc::new(EntryInner {
				info: EntryInfo { id: EntryId::next(), name },
				definer,
			}),
		}
	}

	pub fn info(&self) -> &EntryInfo {
		&self.inner.info
	}

	pub fn id(&self) -> EntryId {
		self.inner.info.id
	}

	pub fn name(&self) -> &str {
		&self.inner.info.name
	}

	pub(crate) fn definer(&self) -> &dyn CxDefiner<V, A> {
		match &self.inner.definer {
			DefinerSlot::Ready(definer) => definer.as_ref(),
			DefinerSlot::Deferred { definer, init } => definer.get_or_init(|| init()).as_ref(),
		}
	}
}

type Getter<V> = Box<dyn Fn() -> Result<Option<V>, ContextError> + Send + Sync>;

/// Value accessors of an entry within one scope.
///
/// Both accessors report absence as `Ok(None)`.
pub struct Definition<V> {
	get: Option<Getter<V>>,
	get_default: Option<Getter<V>>,
	rejects_empty_fallback: bool,
}

impl<V> Default for Definition<V> {
	fn default() -> Self {
		Self {
			get: None,
			get_default: None,
			rejects_empty_fallback: false,
		}
	}
}

impl<V> Definition<V> {
	/// Creates a definition without any value.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the accessor of the current value.
	#[must_use]
	pub fn with_value(mut self, get: impl Fn() -> Result<Option<V>, ContextError> + Send + Sync + 'static) -> Self {
		self.get = Some(Box::new(get));
		self
	}

	/// Sets the accessor of the value used when nothing else is available.
	#[must_use]
	pub fn with_default(mut self, get_default: impl Fn() -> Result<Option<V>, ContextError> + Send + Sync + 'static) -> Self {
		self.get_default = Some(Box::new(get_default));
		self
	}

	/// Makes requests with a fallback holding no value fail.
	#[must_use]
	pub fn rejecting_empty_fallback(mut self) -> Self {
		self.rejects_empty_fallback = true;
		self
	}

	pub(crate) fn value(&self) -> Result<Option<V>, ContextError> {
		self.get.as_ref().map_or(Ok(None), |get| get())
	}

	pub(crate) fn default_value(&self) -> Result<Option<V>, ContextError> {
		self.get_default.as_ref().map_or(Ok(None), |get| get())
	}

	pub(crate) fn rejects_empty_fallback(&self) -> bool {
		self.rejects_empty_fallback
	}
}
