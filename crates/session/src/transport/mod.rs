//! The analysis server seen as an opaque asynchronous service.
//!
//! [`AnalysisTransport`] is the only seam between the session engine and the
//! server. [`LeanServerTransport`] implements it over a child process speaking
//! the Lean 3 `--server` JSON-lines protocol; tests substitute in-memory doubles.

mod lean;
mod wire;

use async_trait::async_trait;
pub use lean::LeanServerTransport;
use lemma_primitives::ServerPosition;
use tokio::sync::mpsc;

use crate::Result;
use crate::protocol::{CompletionResult, DocumentId, InfoResponse, ServerMessage};

/// Push-style notifications from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
	/// Full diagnostics snapshot across all documents.
	AllMessages(Vec<ServerMessage>),
	/// The server reported an error not tied to a request, or the connection broke.
	Error(String),
}

/// Request/response contract of the analysis server.
///
/// All coordinates are absolute: lines 1-based, columns 0-based.
#[async_trait]
pub trait AnalysisTransport: Send + Sync {
	/// Establishes the connection (spawns the server, opens the channel).
	async fn connect(&self) -> Result<()>;

	/// Replaces the server's copy of `document` with `content`. Resolves once
	/// the server has accepted the new text.
	async fn sync(&self, document: &DocumentId, content: String) -> Result<()>;

	/// Completion candidates at `position`.
	async fn complete(&self, document: &DocumentId, position: ServerPosition) -> Result<CompletionResult>;

	/// Information (name, type, goals) at `position`.
	async fn info(&self, document: &DocumentId, position: ServerPosition) -> Result<InfoResponse>;

	/// Takes the notification stream. Only one subscriber is supported.
	fn subscribe_events(&self) -> Result<mpsc::UnboundedReceiver<TransportEvent>>;

	/// Tears the connection down.
	async fn shutdown(&self) -> Result<()> {
		Ok(())
	}
}
