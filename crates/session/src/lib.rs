//! Keeps editor documents synchronized with a long-lived Lean server and
//! layers diagnostics, completion, hover and abbreviation input on top.
//!
//! The entry point is [`SessionManager`], an explicitly owned object holding
//! the single server connection. Each open document gets a
//! [`DocumentSyncSession`] that debounces full-text pushes and uses a version
//! counter to discard stale acknowledgements. Documents with a pending or
//! unacknowledged push are listed in the [`RunningSet`].
//!
//! ## Coordinates
//!
//! The editor shows a slice of a larger virtual file, so everything crossing
//! the server boundary goes through a
//! [`CoordinateMapper`](lemma_primitives::CoordinateMapper): lines shift by
//! the invisible prefix, columns switch between 1-based and 0-based.
#![warn(missing_docs)]

pub mod completion;
pub mod config;
pub mod diagnostics;
mod error;
pub mod hover;
pub mod info_view;
pub mod input;
mod manager;
pub mod protocol;
mod running;
pub mod sync;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use completion::{CompletionItem, CompletionKind, CompletionOutcome};
pub use config::{ServerCommand, SessionConfig};
pub use diagnostics::{DiagnosticsStore, Marker, MarkerSeverity, MarkerUpdate};
pub use error::{Error, Result, TransportFailure};
pub use hover::{HoverInfo, MarkedString};
pub use info_view::DisplayMode;
pub use input::{AbbreviationInput, TextEdit};
pub use manager::SessionManager;
pub use protocol::{CompletionResult, DocumentId, InfoRecord, InfoResponse, RawCompletion, ServerMessage, Severity};
pub use running::RunningSet;
pub use sync::{DocumentSyncSession, SyncPhase, SyncTicket};
pub use transport::{AnalysisTransport, LeanServerTransport, TransportEvent};
