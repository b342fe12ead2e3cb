//! Task spawning and debounce primitives.
//!
//! * [`spawn`]: runs a future on the caller's tokio runtime, tagged with a [`TaskClass`].
//! * [`CoalescedTimer`]: restartable single-shot delay; only the latest action fires.
//! * [`CancellableWait`]: restartable delay whose superseded waiters observe a
//!   [`WaitError`] instead of hanging.
//!
//! Everything here must be driven from inside a tokio runtime.

mod task;
mod timer;
mod wait;

pub use task::{SpawnError, TaskClass, spawn};
pub use timer::CoalescedTimer;
pub use wait::{CancellableWait, WaitError};
