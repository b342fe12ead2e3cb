//! The editor shows a slice of a larger virtual file. Lines before the slice
//! are invisible context, so every position crossing the editor/server
//! boundary is shifted by that many lines. Columns are 1-based in the editor
//! and 0-based on the wire.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Position in the visible editor. Both fields are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EditorPosition {
	/// 1-based line in the visible buffer.
	pub line: u32,
	/// 1-based column.
	pub column: u32,
}

impl EditorPosition {
	/// Creates an editor position.
	pub const fn new(line: u32, column: u32) -> Self {
		Self { line, column }
	}
}

impl fmt::Display for EditorPosition {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.line, self.column)
	}
}

/// Span in the visible editor, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EditorRange {
	/// Start position (inclusive).
	pub start: EditorPosition,
	/// End position (exclusive).
	pub end: EditorPosition,
}

impl EditorRange {
	/// Creates a range.
	pub const fn new(start: EditorPosition, end: EditorPosition) -> Self {
		Self { start, end }
	}

	/// Creates a zero-length range.
	pub const fn point(pos: EditorPosition) -> Self {
		Self { start: pos, end: pos }
	}

	/// Returns true if start and end coincide.
	pub fn is_empty(&self) -> bool {
		self.start == self.end
	}
}

/// Absolute position in the full document as the server sees it:
/// 1-based line, 0-based column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServerPosition {
	/// 1-based line in the full document.
	pub line: u32,
	/// 0-based column.
	pub column: u32,
}

impl ServerPosition {
	/// Creates a server position.
	pub const fn new(line: u32, column: u32) -> Self {
		Self { line, column }
	}
}

impl fmt::Display for ServerPosition {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.line, self.column)
	}
}

/// Converts between [`EditorPosition`] and [`ServerPosition`] for one document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CoordinateMapper {
	line_offset: u32,
}

impl CoordinateMapper {
	/// Creates a mapper for a document with `line_offset` invisible prefix lines.
	pub const fn new(line_offset: u32) -> Self {
		Self { line_offset }
	}

	/// Number of invisible lines preceding the editor.
	pub const fn line_offset(&self) -> u32 {
		self.line_offset
	}

	/// Maps an editor position to the server's coordinates.
	pub const fn to_server(&self, pos: EditorPosition) -> ServerPosition {
		ServerPosition {
			line: pos.line.saturating_add(self.line_offset),
			column: pos.column.saturating_sub(1),
		}
	}

	/// Maps a server position back into the editor.
	///
	/// Returns `None` when the position lies in the invisible prefix.
	pub const fn to_editor(&self, pos: ServerPosition) -> Option<EditorPosition> {
		if pos.line <= self.line_offset {
			return None;
		}
		Some(EditorPosition {
			line: pos.line - self.line_offset,
			column: pos.column.saturating_add(1),
		})
	}

	/// Like [`Self::to_editor`] but pins prefix positions to the first editor cell.
	pub const fn to_editor_clamped(&self, pos: ServerPosition) -> EditorPosition {
		match self.to_editor(pos) {
			Some(pos) => pos,
			None => EditorPosition { line: 1, column: 1 },
		}
	}
}
