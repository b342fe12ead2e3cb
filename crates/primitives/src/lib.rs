//! Building blocks shared by the session engine: typed events, editor/server
//! coordinates, the virtual document model and abbreviation expansion.

/// Backslash abbreviation table and matcher.
pub mod abbrev;
/// Editor and server position types and the mapper between them.
pub mod coords;
/// Visible buffer plus invisible context, and the edits applied to it.
pub mod document;
/// Publish/subscribe events and cached reactive values.
pub mod event;

pub use abbrev::{AbbreviationMatch, AbbreviationTable, Expansion, TableError};
pub use coords::{CoordinateMapper, EditorPosition, EditorRange, ServerPosition};
pub use document::{ContentChange, EditError, TextChange, VirtualDocument};
pub use event::{Event, ReactiveValue, Subscription};
pub use ropey::Rope;
