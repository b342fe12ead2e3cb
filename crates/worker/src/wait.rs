use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::{Instant, sleep_until};

/// Reason an outstanding [`CancellableWait::wait`] was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WaitError {
	/// A newer wait replaced this one.
	#[error("wait superseded by a newer request")]
	Superseded,
	/// The wait was cancelled explicitly.
	#[error("wait cancelled")]
	Cancelled,
}

impl WaitError {
	/// Both variants are cancellations; callers usually just stop.
	pub const fn is_cancellation(self) -> bool {
		matches!(self, Self::Superseded | Self::Cancelled)
	}
}

#[derive(Debug, Default)]
struct Slot {
	generation: u64,
	outstanding: Option<oneshot::Sender<WaitError>>,
}

/// Restartable delay that tells superseded callers they were superseded.
///
/// Unlike [`crate::CoalescedTimer`], which silently drops replaced actions,
/// every caller of [`Self::wait`] gets an answer: `Ok(())` once the delay
/// elapses untouched, or a [`WaitError`] when a newer wait or [`Self::cancel`]
/// got there first.
#[derive(Debug, Clone, Default)]
pub struct CancellableWait {
	slot: Arc<Mutex<Slot>>,
}

impl CancellableWait {
	/// Creates a wait with nothing outstanding.
	pub fn new() -> Self {
		Self::default()
	}

	/// Starts a new wait of `delay`, rejecting the previous one with
	/// [`WaitError::Superseded`].
	///
	/// The deadline is fixed when this is called, not when the returned future
	/// is first polled.
	pub fn wait(&self, delay: Duration) -> impl Future<Output = Result<(), WaitError>> + Send + 'static {
		let deadline = Instant::now() + delay;
		let (tx, rx) = oneshot::channel();
		let generation = {
			let mut slot = self.slot.lock();
			if let Some(previous) = slot.outstanding.replace(tx) {
				let _ = previous.send(WaitError::Superseded);
			}
			slot.generation = slot.generation.wrapping_add(1);
			slot.generation
		};

		let slot = Arc::clone(&self.slot);
		async move {
			tokio::select! {
				biased;
				reason = rx => Err(reason.unwrap_or(WaitError::Cancelled)),
				_ = sleep_until(deadline) => {
					let mut slot = slot.lock();
					if slot.generation == generation {
						slot.outstanding = None;
					}
					Ok(())
				}
			}
		}
	}

	/// Rejects the outstanding wait, if any, with [`WaitError::Cancelled`].
	pub fn cancel(&self) {
		if let Some(outstanding) = self.slot.lock().outstanding.take() {
			tracing::trace!("cancellable_wait.cancel");
			let _ = outstanding.send(WaitError::Cancelled);
		}
	}

	/// Returns true while a wait is outstanding.
	pub fn is_waiting(&self) -> bool {
		self.slot.lock().outstanding.is_some()
	}
}
