use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use lemma_primitives::{AbbreviationTable, ContentChange, EditorPosition, Event, VirtualDocument};
use lemma_worker::TaskClass;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{OnceCell, mpsc};
use tokio::task::JoinHandle;

use crate::completion::{CompletionOutcome, completion_items};
use crate::config::SessionConfig;
use crate::diagnostics::DiagnosticsStore;
use crate::error::TransportFailure;
use crate::hover::HoverInfo;
use crate::input::{AbbreviationInput, TextEdit};
use crate::protocol::{DocumentId, InfoRecord};
use crate::running::RunningSet;
use crate::sync::{DocumentSyncSession, SyncContext};
use crate::transport::{AnalysisTransport, LeanServerTransport, TransportEvent};
use crate::{Error, Result};

type SessionMap = Arc<RwLock<HashMap<DocumentId, Arc<DocumentSyncSession>>>>;

/// Owns the server connection and every open document session.
///
/// One manager per server; construct it explicitly and pass it around.
/// [`Self::connect`] must complete before documents can be opened.
pub struct SessionManager {
	ctx: Arc<SyncContext>,
	sessions: SessionMap,
	diagnostics: Arc<DiagnosticsStore>,
	input: AbbreviationInput,
	completion_delay: Duration,
	connected: OnceCell<()>,
	stopped: AtomicBool,
	pump: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for SessionManager {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SessionManager")
			.field("connected", &self.is_connected())
			.field("documents", &self.sessions.read().len())
			.field("running", &self.ctx.running.snapshot())
			.finish_non_exhaustive()
	}
}

impl SessionManager {
	/// Creates a manager over `transport`, loading the abbreviation table
	/// named in `config`.
	pub fn new(transport: Arc<dyn AnalysisTransport>, config: &SessionConfig) -> Result<Self> {
		let table = config.abbreviation_table()?;
		Ok(Self::with_table(transport, config, table))
	}

	/// Creates a manager with an explicit abbreviation table.
	pub fn with_table(transport: Arc<dyn AnalysisTransport>, config: &SessionConfig, table: AbbreviationTable) -> Self {
		Self {
			ctx: Arc::new(SyncContext::new(transport, config.sync_delay())),
			sessions: Arc::new(RwLock::new(HashMap::new())),
			diagnostics: Arc::new(DiagnosticsStore::new()),
			input: AbbreviationInput::new(Arc::new(table), &config.abbreviation_triggers),
			completion_delay: config.completion_delay(),
			connected: OnceCell::new(),
			stopped: AtomicBool::new(false),
			pump: Mutex::new(None),
		}
	}

	/// Creates a manager that runs the configured Lean server as a child process.
	pub fn from_config(config: &SessionConfig) -> Result<Self> {
		Self::new(LeanServerTransport::new(config.server_command()), config)
	}

	/// Connects to the server and starts routing its notifications.
	///
	/// Idempotent. A failed attempt can be retried.
	pub async fn connect(&self) -> Result<()> {
		self.ensure_running()?;
		self.connected
			.get_or_try_init(|| async {
				self.ctx.transport.connect().await?;
				let events = self.ctx.transport.subscribe_events()?;
				let pump = lemma_worker::spawn(
					TaskClass::Background,
					"session_events",
					pump_events(events, Arc::clone(&self.ctx), Arc::clone(&self.sessions), Arc::clone(&self.diagnostics)),
				)?;
				*self.pump.lock() = Some(pump);
				self.ctx.set_connected(true);
				tracing::info!("session.connected");
				Ok::<(), Error>(())
			})
			.await
			.inspect_err(|err| tracing::error!(error = %err, "session.connect_failed"))?;
		Ok(())
	}

	/// True once [`Self::connect`] succeeded and until [`Self::shutdown`].
	pub fn is_connected(&self) -> bool {
		self.ctx.is_connected()
	}

	/// Starts mirroring a document.
	///
	/// `changes` is the editor's content-change event for this document.
	/// The initial text is pushed right away, and markers from the last
	/// diagnostics snapshot are published for it.
	pub fn open_document(&self, id: impl Into<DocumentId>, document: VirtualDocument, changes: &Event<ContentChange>) -> Result<Arc<DocumentSyncSession>> {
		self.ensure_running()?;
		if !self.is_connected() {
			return Err(Error::NotConnected);
		}
		let id = id.into();
		if self.sessions.read().contains_key(&id) {
			return Err(Error::AlreadyOpen(id));
		}

		let session = Arc::new(DocumentSyncSession::open(id.clone(), document, Arc::clone(&self.ctx), changes));
		{
			let mut sessions = self.sessions.write();
			if sessions.contains_key(&id) {
				drop(sessions);
				session.close();
				return Err(Error::AlreadyOpen(id));
			}
			sessions.insert(id.clone(), Arc::clone(&session));
		}
		self.diagnostics.publish(id, session.mapper());
		Ok(session)
	}

	/// Stops mirroring `id`.
	pub fn close_document(&self, id: &DocumentId) -> Result<()> {
		let session = self.sessions.write().remove(id).ok_or_else(|| Error::UnknownDocument(id.clone()))?;
		session.close();
		self.diagnostics.forget(id);
		Ok(())
	}

	/// The session for `id`, if open.
	pub fn session(&self, id: &DocumentId) -> Option<Arc<DocumentSyncSession>> {
		self.sessions.read().get(id).cloned()
	}

	/// Ids of all open documents.
	pub fn open_documents(&self) -> Vec<DocumentId> {
		self.sessions.read().keys().cloned().collect()
	}

	/// Completion at `position`.
	///
	/// Waits out the completion delay first; a newer request or any edit in
	/// the meantime yields [`CompletionOutcome::Cancelled`]. The document is
	/// pushed before the server is asked.
	pub async fn request_completion(&self, id: &DocumentId, position: EditorPosition) -> Result<CompletionOutcome> {
		let session = self.require(id)?;
		if let Err(reason) = self.ctx.completion_wait.wait(self.completion_delay).await {
			tracing::debug!(document = %id, reason = %reason, "completion.cancelled");
			return Ok(CompletionOutcome::Cancelled);
		}

		session.flush().await?;
		let at = session.mapper().to_server(position);
		let result = self.ctx.transport.complete(id, at).await.inspect_err(|err| self.report(id, err))?;
		tracing::debug!(document = %id, position = %at, count = result.completions.len(), "completion.done");
		Ok(CompletionOutcome::Items(completion_items(result, position)))
	}

	/// Hover contents at `position`; empty when the server has nothing there.
	pub async fn request_hover(&self, id: &DocumentId, position: EditorPosition) -> Result<HoverInfo> {
		Ok(match self.request_info(id, position).await? {
			Some(record) => HoverInfo::from_record(&record, position),
			None => HoverInfo::empty(),
		})
	}

	/// Raw info record at `position`, e.g. to refresh a goal view.
	pub async fn request_info(&self, id: &DocumentId, position: EditorPosition) -> Result<Option<InfoRecord>> {
		let session = self.require(id)?;
		let at = session.mapper().to_server(position);
		let response = self.ctx.transport.info(id, at).await.inspect_err(|err| self.report(id, err))?;
		Ok(response.record)
	}

	/// Abbreviation expansion for a change the editor just reported on `id`.
	///
	/// Call after firing the change, so the mirrored line already contains it.
	pub fn expand_on_change(&self, id: &DocumentId, change: &ContentChange) -> Option<TextEdit> {
		let line = change.as_single()?.range.start.line;
		let text = self.session(id)?.line(line)?;
		self.input.on_content_change(change, &text)
	}

	/// Whether the manual expand command applies at `cursor`.
	pub fn can_expand(&self, id: &DocumentId, cursor: EditorPosition) -> bool {
		self.line_at(id, cursor).is_some_and(|text| self.input.can_expand_at(&text, cursor))
	}

	/// Manual expand command at `cursor`.
	pub fn expand(&self, id: &DocumentId, cursor: EditorPosition) -> Option<TextEdit> {
		let text = self.line_at(id, cursor)?;
		self.input.expand_at(&text, cursor)
	}

	/// The abbreviation expander.
	pub fn abbreviations(&self) -> &AbbreviationInput {
		&self.input
	}

	/// Documents waiting on the server.
	pub fn running(&self) -> &RunningSet {
		&self.ctx.running
	}

	/// Fires for every failed server interaction.
	pub fn errors(&self) -> &Event<TransportFailure> {
		&self.ctx.errors
	}

	/// Diagnostics snapshot and per-document markers.
	pub fn diagnostics(&self) -> &DiagnosticsStore {
		&self.diagnostics
	}

	/// Closes every session and the server connection. Terminal.
	pub async fn shutdown(&self) -> Result<()> {
		if self.stopped.swap(true, Ordering::AcqRel) {
			return Ok(());
		}
		self.ctx.completion_wait.cancel();
		let sessions: Vec<_> = self.sessions.write().drain().map(|(_, session)| session).collect();
		for session in &sessions {
			session.close();
			self.diagnostics.forget(session.id());
		}
		self.ctx.set_connected(false);
		if let Some(pump) = self.pump.lock().take() {
			pump.abort();
		}
		tracing::info!(closed = sessions.len(), "session.shutdown");
		self.ctx.transport.shutdown().await
	}

	fn ensure_running(&self) -> Result<()> {
		if self.stopped.load(Ordering::Acquire) {
			return Err(Error::ServiceStopped);
		}
		Ok(())
	}

	fn require(&self, id: &DocumentId) -> Result<Arc<DocumentSyncSession>> {
		self.ensure_running()?;
		if !self.is_connected() {
			return Err(Error::NotConnected);
		}
		self.session(id).ok_or_else(|| Error::UnknownDocument(id.clone()))
	}

	fn line_at(&self, id: &DocumentId, cursor: EditorPosition) -> Option<String> {
		self.session(id)?.line(cursor.line)
	}

	fn report(&self, id: &DocumentId, err: &Error) {
		tracing::warn!(document = %id, error = %err, "session.request_failed");
		self.ctx.errors.fire(TransportFailure::new(Some(id), err));
	}
}

impl Drop for SessionManager {
	fn drop(&mut self) {
		if let Some(pump) = self.pump.get_mut().take() {
			pump.abort();
		}
	}
}

async fn pump_events(mut events: mpsc::UnboundedReceiver<TransportEvent>, ctx: Arc<SyncContext>, sessions: SessionMap, diagnostics: Arc<DiagnosticsStore>) {
	while let Some(event) = events.recv().await {
		match event {
			TransportEvent::AllMessages(messages) => {
				let open: Vec<_> = sessions.read().values().map(|session| (session.id().clone(), session.mapper())).collect();
				diagnostics.apply_snapshot(messages, open);
			}
			TransportEvent::Error(message) => {
				tracing::warn!(error = %message, "session.server_error");
				ctx.errors.fire(TransportFailure { document: None, message });
			}
		}
	}
	tracing::debug!("session.events_closed");
}

#[cfg(test)]
mod tests;
