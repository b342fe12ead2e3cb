//! Transport that runs `lean --server` as a child process.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use lemma_primitives::ServerPosition;
use lemma_worker::TaskClass;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as ProcessCommand};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::wire::{Command, Request, Response, parse_response};
use super::{AnalysisTransport, TransportEvent};
use crate::config::ServerCommand;
use crate::protocol::{CompletionResult, DocumentId, InfoResponse};
use crate::{Error, Result};

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value>>>>>;

/// A server process and the tasks pumping its pipes.
struct Connection {
	child: Child,
	outbound: mpsc::UnboundedSender<String>,
	router: Router,
	tasks: [JoinHandle<()>; 2],
}

impl Connection {
	fn is_alive(&self) -> bool {
		self.router.alive.load(Ordering::Acquire)
	}

	fn stop(mut self, reason: &str) -> Result<()> {
		for task in &self.tasks {
			task.abort();
		}
		self.router.disconnected(reason);
		self.child.start_kill().or_else(|err| match self.child.try_wait() {
			Ok(Some(_)) => Ok(()),
			_ => Err(err),
		})?;
		Ok(())
	}
}

/// Routes decoded server lines to pending requests or the event stream.
///
/// One per connection; `alive` flips once, when either pipe fails.
#[derive(Clone)]
struct Router {
	pending: PendingMap,
	events: mpsc::UnboundedSender<TransportEvent>,
	alive: Arc<AtomicBool>,
}

impl Router {
	fn route(&self, line: &str) {
		let response = match parse_response(line) {
			Ok(response) => response,
			Err(err) => {
				tracing::warn!(error = %err, line, "Undecodable line from Lean server");
				return;
			}
		};

		match response {
			Response::Ok { seq_num, body } => self.resolve(seq_num, Ok(body)),
			Response::Error {
				seq_num: Some(seq_num),
				message,
			} if self.pending.lock().contains_key(&seq_num) => self.resolve(seq_num, Err(Error::Server(message))),
			Response::Error { message, .. } => {
				tracing::warn!(error = %message, "Lean server error");
				let _ = self.events.send(TransportEvent::Error(message));
			}
			Response::AllMessages(msgs) => {
				tracing::debug!(count = msgs.len(), "all_messages");
				let _ = self.events.send(TransportEvent::AllMessages(msgs));
			}
			Response::CurrentTasks { is_running } => tracing::trace!(is_running, "current_tasks"),
			Response::Unknown(kind) => tracing::debug!(kind = %kind, "Ignoring unknown Lean server response"),
		}
	}

	fn resolve(&self, seq_num: u64, result: Result<Value>) {
		match self.pending.lock().remove(&seq_num) {
			Some(tx) => {
				let _ = tx.send(result);
			}
			None => tracing::debug!(seq_num, "Response for unknown request"),
		}
	}

	/// Marks the connection dead and fails everything still waiting on it.
	///
	/// Only the first call publishes `reason`.
	fn disconnected(&self, reason: &str) {
		let first = self.alive.swap(false, Ordering::AcqRel);
		let drained: Vec<_> = self.pending.lock().drain().collect();
		for (_, tx) in drained {
			let _ = tx.send(Err(Error::ServiceStopped));
		}
		if first {
			tracing::warn!(reason, "Lean server connection lost");
			let _ = self.events.send(TransportEvent::Error(reason.to_owned()));
		}
	}
}

/// Speaks the Lean 3 `--server` protocol over the child's stdin/stdout.
///
/// Requests carry a `seq_num`; replies are matched back through oneshot
/// channels. `all_messages` and unsolicited errors go to the event stream.
///
/// When the process dies every outstanding and later request fails with
/// [`Error::ServiceStopped`] until [`AnalysisTransport::connect`] starts a
/// new one.
pub struct LeanServerTransport {
	command: ServerCommand,
	seq: AtomicU64,
	pending: PendingMap,
	connection: Mutex<Option<Connection>>,
	event_tx: mpsc::UnboundedSender<TransportEvent>,
	event_rx: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
}

impl LeanServerTransport {
	/// Creates an unconnected transport for `command`.
	pub fn new(command: ServerCommand) -> Arc<Self> {
		let (event_tx, event_rx) = mpsc::unbounded_channel();
		Arc::new(Self {
			command,
			seq: AtomicU64::new(0),
			pending: Arc::new(Mutex::new(HashMap::new())),
			connection: Mutex::new(None),
			event_tx,
			event_rx: Mutex::new(Some(event_rx)),
		})
	}

	fn router(&self) -> Router {
		Router {
			pending: Arc::clone(&self.pending),
			events: self.event_tx.clone(),
			alive: Arc::new(AtomicBool::new(true)),
		}
	}

	async fn request(&self, command: Command<'_>) -> Result<Value> {
		let seq_num = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
		let name = command.name();
		let line = serde_json::to_string(&Request { seq_num, command })?;

		let (tx, rx) = oneshot::channel();
		self.pending.lock().insert(seq_num, tx);

		// Checked after inserting: a disconnect that already drained `pending`
		// has also cleared `alive`.
		let sent = match self.connection.lock().as_ref() {
			Some(conn) if conn.is_alive() => conn.outbound.send(line).map_err(|_| Error::ServiceStopped),
			Some(_) => Err(Error::ServiceStopped),
			None => Err(Error::NotConnected),
		};
		if let Err(err) = sent {
			self.pending.lock().remove(&seq_num);
			return Err(err);
		}

		tracing::trace!(seq_num, command = name, "Lean request sent");
		rx.await.map_err(|_| Error::ServiceStopped)?
	}
}

async fn run_writer(mut stdin: ChildStdin, mut outbound: mpsc::UnboundedReceiver<String>, router: Router) {
	while let Some(line) = outbound.recv().await {
		let written = async {
			stdin.write_all(line.as_bytes()).await?;
			stdin.write_all(b"\n").await?;
			stdin.flush().await
		};
		if let Err(err) = written.await {
			tracing::error!(error = %err, "Failed writing to Lean server");
			router.disconnected(&format!("failed writing to Lean server: {err}"));
			break;
		}
	}
}

async fn run_reader(stdout: ChildStdout, router: Router) {
	let mut lines = BufReader::new(stdout).lines();
	let reason = loop {
		match lines.next_line().await {
			Ok(Some(line)) if line.trim().is_empty() => {}
			Ok(Some(line)) => router.route(&line),
			Ok(None) => break "Lean server closed its output".to_owned(),
			Err(err) => break format!("failed reading from Lean server: {err}"),
		}
	};
	router.disconnected(&reason);
}

#[async_trait]
impl AnalysisTransport for LeanServerTransport {
	async fn connect(&self) -> Result<()> {
		let dead = {
			let mut slot = self.connection.lock();
			if slot.as_ref().is_some_and(Connection::is_alive) {
				return Ok(());
			}
			slot.take()
		};
		if let Some(conn) = dead {
			tracing::info!("Restarting Lean server");
			if let Err(err) = conn.stop("Lean server restarted") {
				tracing::debug!(error = %err, "Failed to reap dead Lean server");
			}
		}

		let mut cmd = ProcessCommand::new(&self.command.command);
		cmd.args(&self.command.args)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::null())
			.kill_on_drop(true);
		if let Some(root) = &self.command.root {
			cmd.current_dir(root);
		}

		let mut child = cmd.spawn()?;
		let stdin = child.stdin.take().ok_or_else(|| Error::Transport("failed to capture server stdin".into()))?;
		let stdout = child.stdout.take().ok_or_else(|| Error::Transport("failed to capture server stdout".into()))?;

		let router = self.router();
		let (outbound, outbound_rx) = mpsc::unbounded_channel();
		let writer = lemma_worker::spawn(TaskClass::Background, "lean_writer", run_writer(stdin, outbound_rx, router.clone()))?;
		let reader = match lemma_worker::spawn(TaskClass::Interactive, "lean_reader", run_reader(stdout, router.clone())) {
			Ok(reader) => reader,
			Err(err) => {
				writer.abort();
				return Err(err.into());
			}
		};

		tracing::info!(command = %self.command.command, pid = ?child.id(), "Lean server started");
		let mut slot = self.connection.lock();
		if slot.as_ref().is_some_and(Connection::is_alive) {
			// Lost a race with a concurrent connect; keep the first server.
			writer.abort();
			reader.abort();
			return Ok(());
		}
		*slot = Some(Connection {
			child,
			outbound,
			router,
			tasks: [writer, reader],
		});
		Ok(())
	}

	async fn sync(&self, document: &DocumentId, content: String) -> Result<()> {
		self.request(Command::Sync {
			file_name: document.as_str(),
			content: &content,
		})
		.await?;
		Ok(())
	}

	async fn complete(&self, document: &DocumentId, position: ServerPosition) -> Result<CompletionResult> {
		let body = self
			.request(Command::Complete {
				file_name: document.as_str(),
				line: position.line,
				column: position.column,
				skip_completions: false,
			})
			.await?;
		Ok(serde_json::from_value(body)?)
	}

	async fn info(&self, document: &DocumentId, position: ServerPosition) -> Result<InfoResponse> {
		let body = self
			.request(Command::Info {
				file_name: document.as_str(),
				line: position.line,
				column: position.column,
			})
			.await?;
		Ok(serde_json::from_value(body)?)
	}

	fn subscribe_events(&self) -> Result<mpsc::UnboundedReceiver<TransportEvent>> {
		self.event_rx
			.lock()
			.take()
			.ok_or_else(|| Error::Transport("event stream already subscribed".into()))
	}

	async fn shutdown(&self) -> Result<()> {
		let Some(conn) = self.connection.lock().take() else {
			return Ok(());
		};
		conn.stop("Lean server shut down")?;
		tracing::info!("Lean server stopped");
		Ok(())
	}
}
