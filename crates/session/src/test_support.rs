use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use lemma_primitives::ServerPosition;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::protocol::{CompletionResult, DocumentId, InfoResponse};
use crate::transport::{AnalysisTransport, TransportEvent};
use crate::{Error, Result};

/// A transport call as observed by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
	Connect,
	Sync { document: DocumentId, content: String },
	Complete { document: DocumentId, position: ServerPosition },
	Info { document: DocumentId, position: ServerPosition },
}

/// In-memory server double that records every call.
///
/// Syncs resolve immediately unless held, in which case the test releases
/// them one by one with [`RecordingTransport::release`].
pub struct RecordingTransport {
	calls: Mutex<Vec<Call>>,
	hold_syncs: AtomicBool,
	fail_syncs: AtomicBool,
	held: Mutex<Vec<Option<oneshot::Sender<Result<()>>>>>,
	completion: Mutex<CompletionResult>,
	info: Mutex<InfoResponse>,
	events_tx: mpsc::UnboundedSender<TransportEvent>,
	events_rx: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
}

impl RecordingTransport {
	pub fn new() -> Arc<Self> {
		let _ = tracing_subscriber::fmt().with_test_writer().with_max_level(tracing::Level::DEBUG).try_init();
		let (events_tx, events_rx) = mpsc::unbounded_channel();
		Arc::new(Self {
			calls: Mutex::new(Vec::new()),
			hold_syncs: AtomicBool::new(false),
			fail_syncs: AtomicBool::new(false),
			held: Mutex::new(Vec::new()),
			completion: Mutex::new(CompletionResult::default()),
			info: Mutex::new(InfoResponse::default()),
			events_tx,
			events_rx: Mutex::new(Some(events_rx)),
		})
	}

	pub fn calls(&self) -> Vec<Call> {
		self.calls.lock().clone()
	}

	/// Contents of every sync so far, in order.
	pub fn synced(&self) -> Vec<String> {
		self.calls
			.lock()
			.iter()
			.filter_map(|call| match call {
				Call::Sync { content, .. } => Some(content.clone()),
				_ => None,
			})
			.collect()
	}

	pub fn hold_syncs(&self, hold: bool) {
		self.hold_syncs.store(hold, Ordering::SeqCst);
	}

	pub fn fail_syncs(&self, fail: bool) {
		self.fail_syncs.store(fail, Ordering::SeqCst);
	}

	pub fn held_count(&self) -> usize {
		self.held.lock().len()
	}

	/// Answers the `index`th held sync.
	pub fn release(&self, index: usize, result: Result<()>) {
		let tx = self.held.lock().get_mut(index).and_then(Option::take).expect("no such held sync");
		let _ = tx.send(result);
	}

	pub fn set_completion(&self, result: CompletionResult) {
		*self.completion.lock() = result;
	}

	pub fn set_info(&self, info: InfoResponse) {
		*self.info.lock() = info;
	}

	pub fn emit(&self, event: TransportEvent) {
		self.events_tx.send(event).expect("event stream closed");
	}
}

#[async_trait]
impl AnalysisTransport for RecordingTransport {
	async fn connect(&self) -> Result<()> {
		self.calls.lock().push(Call::Connect);
		Ok(())
	}

	async fn sync(&self, document: &DocumentId, content: String) -> Result<()> {
		self.calls.lock().push(Call::Sync {
			document: document.clone(),
			content,
		});
		if self.fail_syncs.load(Ordering::SeqCst) {
			return Err(Error::Transport("sync refused".into()));
		}
		if !self.hold_syncs.load(Ordering::SeqCst) {
			return Ok(());
		}
		let (tx, rx) = oneshot::channel();
		self.held.lock().push(Some(tx));
		rx.await.unwrap_or(Err(Error::ServiceStopped))
	}

	async fn complete(&self, document: &DocumentId, position: ServerPosition) -> Result<CompletionResult> {
		self.calls.lock().push(Call::Complete {
			document: document.clone(),
			position,
		});
		Ok(self.completion.lock().clone())
	}

	async fn info(&self, document: &DocumentId, position: ServerPosition) -> Result<InfoResponse> {
		self.calls.lock().push(Call::Info {
			document: document.clone(),
			position,
		});
		Ok(self.info.lock().clone())
	}

	fn subscribe_events(&self) -> Result<mpsc::UnboundedReceiver<TransportEvent>> {
		self.events_rx.lock().take().ok_or_else(|| Error::Transport("already subscribed".into()))
	}
}

/// Lets spawned tasks run to their next await point.
pub async fn settle() {
	for _ in 0..16 {
		tokio::task::yield_now().await;
	}
}
