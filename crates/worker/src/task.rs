use std::future::Future;

use tokio::runtime::{Handle, TryCurrentError};
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Kind of work a spawned task does, recorded on its span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Work a caller is waiting on, such as routing server replies.
	Interactive,
	/// Deferred work such as debounced pushes and event pumps.
	Background,
}

impl TaskClass {
	const fn as_str(self) -> &'static str {
		match self {
			Self::Interactive => "interactive",
			Self::Background => "background",
		}
	}
}

/// [`spawn`] was called on a thread without a tokio runtime.
#[derive(Debug, thiserror::Error)]
#[error("no tokio runtime to run `{name}` on: {source}")]
pub struct SpawnError {
	/// Name of the task that could not start.
	pub name: &'static str,
	#[source]
	source: TryCurrentError,
}

/// Runs `fut` on the caller's tokio runtime inside a `task` span carrying
/// `class` and `name`.
///
/// There is no fallback runtime: the engine's tasks share the runtime that
/// drives the caller.
pub fn spawn<F>(class: TaskClass, name: &'static str, fut: F) -> Result<JoinHandle<F::Output>, SpawnError>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	let runtime = Handle::try_current().map_err(|source| SpawnError { name, source })?;
	tracing::trace!(class = class.as_str(), name, "worker.spawn");
	Ok(runtime.spawn(fut.instrument(tracing::debug_span!("task", class = class.as_str(), name))))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn outside_a_runtime_is_an_error() {
		let err = spawn(TaskClass::Background, "orphan", async {}).unwrap_err();
		assert_eq!(err.name, "orphan");
		assert!(err.to_string().starts_with("no tokio runtime to run `orphan` on"));
	}

	#[tokio::test(flavor = "current_thread")]
	async fn runs_on_the_ambient_runtime() {
		let handle = spawn(TaskClass::Interactive, "answer", async { 42 }).unwrap();
		assert_eq!(handle.await.unwrap(), 42);
	}
}
