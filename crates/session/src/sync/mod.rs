//! Per-document synchronization with the server.
//!
//! Every edit bumps the document version and re-arms a debounce timer; when
//! the editor has been quiet for the configured delay the full reconstructed
//! text is pushed. Acknowledgements carry the version they were issued for and
//! only clear the busy flag if no newer edit happened in the meantime.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use lemma_primitives::{ContentChange, CoordinateMapper, Event, Subscription, VirtualDocument};
use lemma_worker::{CancellableWait, CoalescedTimer, TaskClass};
use parking_lot::{Mutex, RwLock};

use crate::error::TransportFailure;
use crate::protocol::DocumentId;
use crate::running::RunningSet;
use crate::transport::AnalysisTransport;
use crate::{Error, Result};

/// State shared by every session of one manager.
pub(crate) struct SyncContext {
	pub transport: Arc<dyn AnalysisTransport>,
	pub running: RunningSet,
	pub errors: Event<TransportFailure>,
	/// Outstanding completion debounce; any edit cancels it.
	pub completion_wait: CancellableWait,
	pub sync_delay: Duration,
	connected: AtomicBool,
}

impl SyncContext {
	pub fn new(transport: Arc<dyn AnalysisTransport>, sync_delay: Duration) -> Self {
		Self {
			transport,
			running: RunningSet::new(),
			errors: Event::new(),
			completion_wait: CancellableWait::new(),
			sync_delay,
			connected: AtomicBool::new(false),
		}
	}

	pub fn is_connected(&self) -> bool {
		self.connected.load(Ordering::Acquire)
	}

	pub fn set_connected(&self, connected: bool) {
		self.connected.store(connected, Ordering::Release);
	}
}

/// Where a session is in its push cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncPhase {
	/// Nothing scheduled or in flight.
	#[default]
	Idle,
	/// Debounce timer armed for `version`.
	PendingPush {
		/// Version the push will carry.
		version: u64,
	},
	/// Text for `version` sent, acknowledgement outstanding.
	AwaitingServer {
		/// Version that was sent.
		version: u64,
	},
}

/// Version captured when a push starts.
///
/// The acknowledgement only counts if the ticket is still current when it
/// arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTicket {
	version: u64,
}

impl SyncTicket {
	/// Ticket for `version`.
	pub const fn new(version: u64) -> Self {
		Self { version }
	}

	/// The captured version.
	pub const fn version(&self) -> u64 {
		self.version
	}

	/// True if no edit happened since the ticket was issued.
	pub const fn is_current(&self, current: u64) -> bool {
		self.version == current
	}
}

struct SessionInner {
	id: DocumentId,
	ctx: Arc<SyncContext>,
	version: AtomicU64,
	phase: Mutex<SyncPhase>,
	document: RwLock<VirtualDocument>,
	closed: AtomicBool,
	timer: CoalescedTimer,
}

/// Keeps one editor document mirrored on the server.
///
/// Created by [`crate::SessionManager::open_document`]; dropping it closes it.
pub struct DocumentSyncSession {
	inner: Arc<SessionInner>,
	subscription: Mutex<Option<Subscription>>,
}

impl std::fmt::Debug for DocumentSyncSession {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DocumentSyncSession")
			.field("id", &self.inner.id)
			.field("version", &self.version())
			.field("phase", &self.phase())
			.finish_non_exhaustive()
	}
}

impl DocumentSyncSession {
	/// Starts mirroring `document`: subscribes to `changes` and pushes the
	/// initial text right away.
	pub(crate) fn open(id: DocumentId, document: VirtualDocument, ctx: Arc<SyncContext>, changes: &Event<ContentChange>) -> Self {
		let inner = Arc::new(SessionInner {
			id,
			ctx,
			version: AtomicU64::new(0),
			phase: Mutex::new(SyncPhase::Idle),
			document: RwLock::new(document),
			closed: AtomicBool::new(false),
			timer: CoalescedTimer::new(TaskClass::Background),
		});

		let weak: Weak<SessionInner> = Arc::downgrade(&inner);
		let subscription = changes.on(move |change| {
			if let Some(inner) = weak.upgrade() {
				inner.on_content_change(change);
			}
		});

		tracing::debug!(document = %inner.id, line_offset = inner.document.read().line_offset(), "session.open");
		inner.sync_in(Duration::ZERO);

		Self {
			inner,
			subscription: Mutex::new(Some(subscription)),
		}
	}

	/// Document identity.
	pub fn id(&self) -> &DocumentId {
		&self.inner.id
	}

	/// Number of edits (and forced pushes) seen so far.
	pub fn version(&self) -> u64 {
		self.inner.version.load(Ordering::Acquire)
	}

	/// Current push state.
	pub fn phase(&self) -> SyncPhase {
		*self.inner.phase.lock()
	}

	/// Mapper for the current invisible prefix.
	pub fn mapper(&self) -> CoordinateMapper {
		self.inner.document.read().mapper()
	}

	/// Visible line `line` (1-based) without its terminator.
	pub fn line(&self, line: u32) -> Option<String> {
		self.inner.document.read().line(line)
	}

	/// Text the server will see on the next push.
	pub fn full_text(&self) -> String {
		self.inner.document.read().full_text()
	}

	/// Runs `f` against the mirrored document.
	pub fn with_document<R>(&self, f: impl FnOnce(&VirtualDocument) -> R) -> R {
		f(&self.inner.document.read())
	}

	/// True once [`Self::close`] ran.
	pub fn is_closed(&self) -> bool {
		self.inner.closed.load(Ordering::Acquire)
	}

	/// Replaces the whole visible buffer and schedules a push.
	pub fn set_text(&self, text: &str) {
		if self.is_closed() {
			return;
		}
		self.inner.document.write().set_visible(text);
		self.inner.ctx.completion_wait.cancel();
		self.inner.sync_in(self.inner.ctx.sync_delay);
	}

	/// Replaces the invisible context around the visible buffer and schedules a push.
	pub fn set_context(&self, text_before: impl Into<String>, text_after: impl Into<String>) {
		if self.is_closed() {
			return;
		}
		self.inner.document.write().set_context(text_before, text_after);
		self.inner.sync_in(self.inner.ctx.sync_delay);
	}

	/// Pushes the current text now, skipping the debounce, and waits for the
	/// server to accept it.
	pub async fn flush(&self) -> Result<()> {
		let inner = Arc::clone(&self.inner);
		if inner.closed.load(Ordering::Acquire) {
			return Ok(());
		}
		inner.timer.cancel();
		inner.bump();
		inner.push().await
	}

	/// Stops mirroring. Idempotent; acknowledgements arriving later are ignored.
	pub fn close(&self) {
		if self.inner.closed.swap(true, Ordering::AcqRel) {
			return;
		}
		if let Some(subscription) = self.subscription.lock().take() {
			subscription.dispose();
		}
		self.inner.timer.cancel();
		*self.inner.phase.lock() = SyncPhase::Idle;
		self.inner.ctx.running.mark_idle(&self.inner.id);
		tracing::debug!(document = %self.inner.id, "session.close");
	}
}

impl Drop for DocumentSyncSession {
	fn drop(&mut self) {
		self.close();
	}
}

impl SessionInner {
	fn on_content_change(self: &Arc<Self>, change: &ContentChange) {
		if self.closed.load(Ordering::Acquire) {
			return;
		}
		// All or nothing: a change rejected part-way must not leave earlier edits applied.
		let applied = {
			let mut document = self.document.write();
			let mut next = document.clone();
			next.apply_all(&change.changes).map(|()| *document = next)
		};
		if let Err(err) = applied {
			let err = Error::Edit(err);
			tracing::error!(document = %self.id, error = %err, "session.edit_rejected");
			self.ctx.errors.fire(TransportFailure::new(Some(&self.id), &err));
			return;
		}
		self.ctx.completion_wait.cancel();
		self.sync_in(self.ctx.sync_delay);
	}

	/// New version, marked busy, push pending.
	fn bump(&self) -> u64 {
		let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
		*self.phase.lock() = SyncPhase::PendingPush { version };
		self.ctx.running.mark_busy(&self.id);
		version
	}

	fn sync_in(self: &Arc<Self>, delay: Duration) {
		let version = self.bump();
		tracing::trace!(document = %self.id, version, delay_ms = delay.as_millis() as u64, "session.schedule");

		let weak = Arc::downgrade(self);
		let scheduled = self.timer.schedule(delay, move || {
			let Some(inner) = weak.upgrade() else {
				return;
			};
			let id = inner.id.clone();
			let spawned = lemma_worker::spawn(TaskClass::Background, "document_push", async move {
				if let Err(err) = inner.push().await {
					tracing::debug!(document = %inner.id, error = %err, "session.push_dropped");
				}
			});
			if let Err(err) = spawned {
				tracing::error!(document = %id, error = %err, "session.push_not_started");
			}
		});
		if let Err(err) = scheduled {
			let err = Error::Runtime(err);
			tracing::error!(document = %self.id, error = %err, "session.schedule_failed");
			self.ctx.errors.fire(TransportFailure::new(Some(&self.id), &err));
		}
	}

	async fn push(&self) -> Result<()> {
		if self.closed.load(Ordering::Acquire) {
			return Ok(());
		}
		if !self.ctx.is_connected() {
			return Err(Error::NotConnected);
		}

		let (ticket, text) = {
			let document = self.document.read();
			(SyncTicket::new(self.version.load(Ordering::Acquire)), document.full_text())
		};
		{
			let mut phase = self.phase.lock();
			if *phase == (SyncPhase::PendingPush { version: ticket.version }) {
				*phase = SyncPhase::AwaitingServer { version: ticket.version };
			}
		}

		tracing::debug!(document = %self.id, version = ticket.version, bytes = text.len(), "session.push");
		let result = self.ctx.transport.sync(&self.id, text).await;
		self.complete_push(ticket, result)
	}

	fn complete_push(&self, ticket: SyncTicket, result: Result<()>) -> Result<()> {
		if self.closed.load(Ordering::Acquire) {
			tracing::debug!(document = %self.id, version = ticket.version, "session.ack_after_close");
			return result;
		}

		match result {
			Ok(()) => {
				if !ticket.is_current(self.version.load(Ordering::Acquire)) {
					tracing::debug!(document = %self.id, version = ticket.version, "session.stale_ack");
					return Ok(());
				}
				self.settle(ticket);
				self.ctx.running.mark_idle(&self.id);
				// An edit may have landed between the check and the removal.
				if !ticket.is_current(self.version.load(Ordering::Acquire)) {
					self.ctx.running.mark_busy(&self.id);
				}
				tracing::debug!(document = %self.id, version = ticket.version, "session.synced");
				Ok(())
			}
			Err(err) => {
				tracing::error!(document = %self.id, version = ticket.version, error = %err, "session.push_failed");
				self.settle(ticket);
				self.ctx.errors.fire(TransportFailure::new(Some(&self.id), &err));
				Err(err)
			}
		}
	}

	/// Returns to idle unless a newer push was scheduled meanwhile.
	fn settle(&self, ticket: SyncTicket) {
		let mut phase = self.phase.lock();
		if *phase == (SyncPhase::AwaitingServer { version: ticket.version }) {
			*phase = SyncPhase::Idle;
		}
	}
}
