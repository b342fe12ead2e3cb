use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::AbortHandle;
use tokio::time::{Instant, sleep_until};

use crate::{SpawnError, TaskClass, spawn};

#[derive(Debug, Default)]
struct Pending {
	/// Bumped on every schedule; a firing task only runs if it still owns the latest generation.
	generation: u64,
	abort: Option<AbortHandle>,
}

/// Restartable single-shot delay.
///
/// Scheduling while an action is pending cancels that action and restarts the
/// delay, so a burst of calls produces exactly one invocation of the most
/// recently scheduled action once the burst has been quiet for `delay`.
///
/// Dropping the timer cancels the pending action.
#[derive(Debug)]
pub struct CoalescedTimer {
	class: TaskClass,
	pending: Arc<Mutex<Pending>>,
}

impl Default for CoalescedTimer {
	fn default() -> Self {
		Self::new(TaskClass::Background)
	}
}

impl CoalescedTimer {
	/// Creates an idle timer whose firing tasks are tagged with `class`.
	pub fn new(class: TaskClass) -> Self {
		Self {
			class,
			pending: Arc::new(Mutex::new(Pending::default())),
		}
	}

	/// Arms the timer, replacing any pending action.
	///
	/// The delay counts from this call, not from when the firing task is first
	/// polled. When it elapses the pending state is cleared before `action`
	/// runs, so the action itself may schedule again.
	pub fn schedule<F>(&self, delay: Duration, action: F) -> Result<(), SpawnError>
	where
		F: FnOnce() + Send + 'static,
	{
		let deadline = Instant::now() + delay;
		let mut pending = self.pending.lock();
		if let Some(abort) = pending.abort.take() {
			abort.abort();
		}
		pending.generation = pending.generation.wrapping_add(1);
		let generation = pending.generation;

		let slot = Arc::clone(&self.pending);
		let task = spawn(self.class, "coalesced_timer", async move {
			sleep_until(deadline).await;
			{
				let mut pending = slot.lock();
				if pending.generation != generation {
					return;
				}
				pending.abort = None;
			}
			action();
		})?;
		pending.abort = Some(task.abort_handle());
		Ok(())
	}

	/// Drops the pending action, if any.
	pub fn cancel(&self) {
		let mut pending = self.pending.lock();
		if let Some(abort) = pending.abort.take() {
			abort.abort();
			pending.generation = pending.generation.wrapping_add(1);
		}
	}

	/// Returns true while an action is armed and has not fired yet.
	pub fn is_pending(&self) -> bool {
		self.pending.lock().abort.is_some()
	}
}

impl Drop for CoalescedTimer {
	fn drop(&mut self) {
		self.cancel();
	}
}
