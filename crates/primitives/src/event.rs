use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Handlers<T> {
	next_id: u64,
	entries: Vec<(u64, Handler<T>)>,
}

impl<T> Default for Handlers<T> {
	fn default() -> Self {
		Self {
			next_id: 0,
			entries: Vec::new(),
		}
	}
}

/// Typed publish/subscribe channel.
///
/// Clones share the same handler list. Handlers run synchronously on the
/// firing thread, in subscription order, and may (un)subscribe while running.
pub struct Event<T> {
	handlers: Arc<Mutex<Handlers<T>>>,
}

impl<T> Clone for Event<T> {
	fn clone(&self) -> Self {
		Self {
			handlers: Arc::clone(&self.handlers),
		}
	}
}

impl<T> Default for Event<T> {
	fn default() -> Self {
		Self {
			handlers: Arc::new(Mutex::new(Handlers::default())),
		}
	}
}

impl<T: 'static> fmt::Debug for Event<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Event").field("handlers", &self.handler_count()).finish()
	}
}

impl<T: 'static> Event<T> {
	/// Creates an event with no handlers.
	pub fn new() -> Self {
		Self::default()
	}

	/// Attaches `handler` until the returned [`Subscription`] is disposed or dropped.
	#[must_use = "dropping the subscription detaches the handler"]
	pub fn on<F>(&self, handler: F) -> Subscription
	where
		F: Fn(&T) + Send + Sync + 'static,
	{
		let id = {
			let mut handlers = self.handlers.lock();
			let id = handlers.next_id;
			handlers.next_id = handlers.next_id.wrapping_add(1);
			handlers.entries.push((id, Arc::new(handler)));
			id
		};

		let weak: Weak<Mutex<Handlers<T>>> = Arc::downgrade(&self.handlers);
		Subscription {
			detach: Some(Box::new(move || {
				if let Some(handlers) = weak.upgrade() {
					handlers.lock().entries.retain(|(entry, _)| *entry != id);
				}
			})),
		}
	}

	/// Calls every attached handler with `value`.
	pub fn fire(&self, value: T) {
		let snapshot: Vec<Handler<T>> = self.handlers.lock().entries.iter().map(|(_, h)| Arc::clone(h)).collect();
		for handler in snapshot {
			handler(&value);
		}
	}

	/// Number of attached handlers.
	pub fn handler_count(&self) -> usize {
		self.handlers.lock().entries.len()
	}
}

/// Handle keeping an [`Event`] handler attached.
#[must_use = "dropping the subscription detaches the handler"]
pub struct Subscription {
	detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
	/// Detaches the handler now.
	pub fn dispose(mut self) {
		self.detach_now();
	}

	fn detach_now(&mut self) {
		if let Some(detach) = self.detach.take() {
			detach();
		}
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		self.detach_now();
	}
}

impl fmt::Debug for Subscription {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Subscription").field("attached", &self.detach.is_some()).finish()
	}
}

/// An [`Event`] that remembers the last value it carried.
pub struct ReactiveValue<T> {
	updated: Event<T>,
	last: Arc<RwLock<T>>,
}

impl<T> Clone for ReactiveValue<T> {
	fn clone(&self) -> Self {
		Self {
			updated: self.updated.clone(),
			last: Arc::clone(&self.last),
		}
	}
}

impl<T: fmt::Debug> fmt::Debug for ReactiveValue<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ReactiveValue").field("value", &*self.last.read()).finish()
	}
}

impl<T: Clone + Send + Sync + 'static> ReactiveValue<T> {
	/// Creates a value holding `initial`.
	pub fn new(initial: T) -> Self {
		Self {
			updated: Event::new(),
			last: Arc::new(RwLock::new(initial)),
		}
	}

	/// Returns a copy of the last value.
	pub fn value(&self) -> T {
		self.last.read().clone()
	}

	/// Borrows the last value for the duration of `f`.
	pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
		f(&self.last.read())
	}

	/// Stores `value` and notifies subscribers.
	pub fn set(&self, value: T) {
		*self.last.write() = value.clone();
		self.updated.fire(value);
	}

	/// Read-modify-write. `f` returns `None` to leave the value untouched, in
	/// which case nobody is notified. Returns whether the value changed.
	pub fn update(&self, f: impl FnOnce(&T) -> Option<T>) -> bool {
		let next = {
			let mut last = self.last.write();
			let Some(next) = f(&last) else {
				return false;
			};
			*last = next.clone();
			next
		};
		self.updated.fire(next);
		true
	}

	/// Subscribes to future updates.
	#[must_use = "dropping the subscription detaches the handler"]
	pub fn on<F>(&self, handler: F) -> Subscription
	where
		F: Fn(&T) + Send + Sync + 'static,
	{
		self.updated.on(handler)
	}

	/// The underlying change event.
	pub fn updated(&self) -> &Event<T> {
		&self.updated
	}
}
