use lemma_primitives::{ReactiveValue, Subscription};

use crate::protocol::DocumentId;

/// Documents with a push that has not been acknowledged yet.
///
/// Membership changes are published newest first; setting an id that is
/// already in the requested state fires nothing.
#[derive(Debug, Clone)]
pub struct RunningSet {
	members: ReactiveValue<Vec<DocumentId>>,
}

impl Default for RunningSet {
	fn default() -> Self {
		Self {
			members: ReactiveValue::new(Vec::new()),
		}
	}
}

impl RunningSet {
	/// Creates an empty set.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds `id`. Returns whether membership changed.
	pub fn mark_busy(&self, id: &DocumentId) -> bool {
		let changed = self.members.update(|members| {
			if members.contains(id) {
				return None;
			}
			let mut next = Vec::with_capacity(members.len() + 1);
			next.push(id.clone());
			next.extend(members.iter().cloned());
			Some(next)
		});
		if changed {
			tracing::debug!(document = %id, "running.busy");
		}
		changed
	}

	/// Removes `id`. Returns whether membership changed.
	pub fn mark_idle(&self, id: &DocumentId) -> bool {
		let changed = self.members.update(|members| {
			members.contains(id).then(|| members.iter().filter(|m| *m != id).cloned().collect())
		});
		if changed {
			tracing::debug!(document = %id, "running.idle");
		}
		changed
	}

	/// Whether `id` is waiting on the server.
	pub fn is_busy(&self, id: &DocumentId) -> bool {
		self.members.with(|members| members.contains(id))
	}

	/// Current members, newest first.
	pub fn snapshot(&self) -> Vec<DocumentId> {
		self.members.value()
	}

	/// True when nothing is in flight.
	pub fn is_empty(&self) -> bool {
		self.members.with(Vec::is_empty)
	}

	/// Subscribes to membership changes.
	#[must_use = "dropping the subscription detaches the handler"]
	pub fn subscribe<F>(&self, handler: F) -> Subscription
	where
		F: Fn(&Vec<DocumentId>) + Send + Sync + 'static,
	{
		self.members.on(handler)
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use parking_lot::Mutex;
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn membership_is_idempotent_and_newest_first() {
		let set = RunningSet::new();
		let fired = Arc::new(Mutex::new(Vec::new()));
		let sink = Arc::clone(&fired);
		let _sub = set.subscribe(move |members| sink.lock().push(members.clone()));

		let a = DocumentId::from("a.lean");
		let b = DocumentId::from("b.lean");
		assert!(set.mark_busy(&a));
		assert!(!set.mark_busy(&a));
		assert!(set.mark_busy(&b));
		assert_eq!(set.snapshot(), vec![b.clone(), a.clone()]);

		assert!(set.mark_idle(&a));
		assert!(!set.mark_idle(&a));
		assert!(set.is_busy(&b));
		assert!(!set.is_busy(&a));

		assert_eq!(*fired.lock(), vec![vec![a.clone()], vec![b.clone(), a], vec![b]]);
	}
}
