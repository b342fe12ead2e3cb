use std::io;

use lemma_primitives::{EditError, TableError};
use lemma_worker::SpawnError;

use crate::protocol::DocumentId;

/// A convenient type alias for `Result` with `E` = [`enum@crate::Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Possible errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// [`crate::SessionManager::connect`] has not completed.
	#[error("not connected to the analysis server")]
	NotConnected,
	/// No session is open for the document.
	#[error("no open session for {0}")]
	UnknownDocument(DocumentId),
	/// A session is already open for the document.
	#[error("a session for {0} is already open")]
	AlreadyOpen(DocumentId),
	/// The server process or channel failed.
	#[error("transport error: {0}")]
	Transport(String),
	/// The server answered a request with an error.
	#[error("server error: {0}")]
	Server(String),
	/// The manager was shut down, or the server went away with requests pending.
	#[error("service stopped")]
	ServiceStopped,
	/// The server sent something we could not decode.
	#[error("deserialization failed: {0}")]
	Deserialize(#[from] serde_json::Error),
	/// Input/output errors from the server pipes or config files.
	#[error("{0}")]
	Io(#[from] io::Error),
	/// The configuration file is malformed.
	#[error("invalid configuration: {0}")]
	Config(#[from] toml::de::Error),
	/// The abbreviation table could not be loaded.
	#[error(transparent)]
	Table(#[from] TableError),
	/// An editor change did not fit the mirrored document; the mirror was
	/// left as it was before the change.
	#[error(transparent)]
	Edit(#[from] EditError),
	/// Background work was requested outside a tokio runtime.
	#[error(transparent)]
	Runtime(#[from] SpawnError),
}

/// Published on [`crate::SessionManager::errors`] whenever talking to the
/// server fails. Nothing is retried automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
	/// Document whose request failed, if the failure is tied to one.
	pub document: Option<DocumentId>,
	/// Human-readable reason.
	pub message: String,
}

impl TransportFailure {
	pub(crate) fn new(document: Option<&DocumentId>, err: &Error) -> Self {
		Self {
			document: document.cloned(),
			message: err.to_string(),
		}
	}
}
