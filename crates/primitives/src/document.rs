use ropey::Rope;
use serde::{Deserialize, Serialize};

use crate::coords::{CoordinateMapper, EditorPosition, EditorRange};

/// One edit reported by the editor host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChange {
	/// Replaced span in editor coordinates.
	pub range: EditorRange,
	/// Number of characters replaced; zero for a pure insertion.
	pub range_length: u32,
	/// Inserted text.
	pub text: String,
}

impl TextChange {
	/// An insertion of `text` at `at`.
	pub fn insert(at: EditorPosition, text: impl Into<String>) -> Self {
		Self {
			range: EditorRange::point(at),
			range_length: 0,
			text: text.into(),
		}
	}

	/// Replacement of `range` (which spans `range_length` characters) by `text`.
	pub fn replace(range: EditorRange, range_length: u32, text: impl Into<String>) -> Self {
		Self {
			range,
			range_length,
			text: text.into(),
		}
	}

	/// True for an insertion that replaces nothing.
	pub fn is_insertion(&self) -> bool {
		self.range_length == 0 && self.range.is_empty()
	}
}

/// A content-change notification from the editor host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentChange {
	/// Edits in application order; each applies to the result of the previous.
	pub changes: Vec<TextChange>,
}

impl ContentChange {
	/// Wraps a single edit.
	pub fn single(change: TextChange) -> Self {
		Self { changes: vec![change] }
	}

	/// The only edit, if the notification carries exactly one.
	pub fn as_single(&self) -> Option<&TextChange> {
		match self.changes.as_slice() {
			[change] => Some(change),
			_ => None,
		}
	}
}

/// Failure to apply a [`TextChange`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
	/// The position does not exist in the visible buffer.
	#[error("position {0} is outside the document")]
	OutOfBounds(EditorPosition),
	/// The range ends before it starts.
	#[error("range {start}..{end} is inverted")]
	Inverted {
		/// Start of the offending range.
		start: EditorPosition,
		/// End of the offending range.
		end: EditorPosition,
	},
}

/// The editable slice of a larger file plus the invisible text around it.
///
/// The server always analyses `text_before + visible + text_after`; the
/// editor only ever shows and edits `visible`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualDocument {
	text_before: String,
	visible: Rope,
	text_after: String,
	line_offset: u32,
}

impl VirtualDocument {
	/// Creates a document from its three parts.
	pub fn new(text_before: impl Into<String>, visible: &str, text_after: impl Into<String>) -> Self {
		let text_before = text_before.into();
		let line_offset = count_line_breaks(&text_before);
		Self {
			text_before,
			visible: Rope::from_str(visible),
			text_after: text_after.into(),
			line_offset,
		}
	}

	/// Creates a document with no invisible context.
	pub fn standalone(visible: &str) -> Self {
		Self::new(String::new(), visible, String::new())
	}

	/// Number of invisible lines before the editor.
	pub fn line_offset(&self) -> u32 {
		self.line_offset
	}

	/// Mapper for this document's current prefix.
	pub fn mapper(&self) -> CoordinateMapper {
		CoordinateMapper::new(self.line_offset)
	}

	/// The editable text.
	pub fn visible(&self) -> &Rope {
		&self.visible
	}

	/// Invisible text before the editor.
	pub fn text_before(&self) -> &str {
		&self.text_before
	}

	/// Invisible text after the editor.
	pub fn text_after(&self) -> &str {
		&self.text_after
	}

	/// The full text pushed to the server.
	pub fn full_text(&self) -> String {
		let mut out = String::with_capacity(self.text_before.len() + self.visible.len_bytes() + self.text_after.len());
		out.push_str(&self.text_before);
		for chunk in self.visible.chunks() {
			out.push_str(chunk);
		}
		out.push_str(&self.text_after);
		out
	}

	/// Replaces the whole visible buffer.
	pub fn set_visible(&mut self, text: &str) {
		self.visible = Rope::from_str(text);
	}

	/// Replaces the invisible context around the editor.
	pub fn set_context(&mut self, text_before: impl Into<String>, text_after: impl Into<String>) {
		self.text_before = text_before.into();
		self.text_after = text_after.into();
		self.line_offset = count_line_breaks(&self.text_before);
	}

	/// Text of a 1-based editor line without its line break.
	pub fn line(&self, line: u32) -> Option<String> {
		let idx = (line as usize).checked_sub(1)?;
		if idx >= self.visible.len_lines() {
			return None;
		}
		let slice = self.visible.line(idx);
		let len = line_content_len(&slice);
		Some(slice.slice(..len).to_string())
	}

	/// Applies one change against the current buffer.
	pub fn apply(&mut self, change: &TextChange) -> Result<(), EditError> {
		let start = self.char_index(change.range.start)?;
		let end = self.char_index(change.range.end)?;
		if end < start {
			return Err(EditError::Inverted {
				start: change.range.start,
				end: change.range.end,
			});
		}
		self.visible.remove(start..end);
		self.visible.insert(start, &change.text);
		Ok(())
	}

	/// Applies changes in order, each against the result of the previous one.
	pub fn apply_all<'a>(&mut self, changes: impl IntoIterator<Item = &'a TextChange>) -> Result<(), EditError> {
		for change in changes {
			self.apply(change)?;
		}
		Ok(())
	}

	fn char_index(&self, pos: EditorPosition) -> Result<usize, EditError> {
		let line = (pos.line as usize).checked_sub(1).ok_or(EditError::OutOfBounds(pos))?;
		let column = (pos.column as usize).checked_sub(1).ok_or(EditError::OutOfBounds(pos))?;
		if line >= self.visible.len_lines() {
			return Err(EditError::OutOfBounds(pos));
		}
		let slice = self.visible.line(line);
		if column > line_content_len(&slice) {
			return Err(EditError::OutOfBounds(pos));
		}
		Ok(self.visible.line_to_char(line) + column)
	}
}

fn line_content_len(line: &ropey::RopeSlice<'_>) -> usize {
	let mut len = line.len_chars();
	if len > 0 && line.char(len - 1) == '\n' {
		len -= 1;
	}
	if len > 0 && line.char(len - 1) == '\r' {
		len -= 1;
	}
	len
}

/// Counts `\r\n`, `\r` and `\n` as one break each.
fn count_line_breaks(text: &str) -> u32 {
	let mut count = 0u32;
	let mut chars = text.chars().peekable();
	while let Some(c) = chars.next() {
		match c {
			'\n' => count += 1,
			'\r' => {
				if chars.peek() == Some(&'\n') {
					chars.next();
				}
				count += 1;
			}
			_ => {}
		}
	}
	count
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn line_offset_counts_mixed_breaks() {
		let doc = VirtualDocument::new("a\r\nb\rc\nd", "x", "");
		assert_eq!(doc.line_offset(), 3);
		assert_eq!(doc.mapper().line_offset(), 3);
	}

	#[test]
	fn full_text_joins_context() {
		let doc = VirtualDocument::new("theorem t : true :=\nbegin\n", "  trivial\n", "end\n");
		assert_eq!(doc.full_text(), "theorem t : true :=\nbegin\n  trivial\nend\n");
		assert_eq!(doc.line_offset(), 2);
	}

	#[test]
	fn insert_and_replace_in_order() {
		let mut doc = VirtualDocument::standalone("intro h,\nexact h");
		doc.apply_all(&[
			TextChange::insert(EditorPosition::new(1, 9), "\n  simp,"),
			TextChange::replace(EditorRange::new(EditorPosition::new(3, 1), EditorPosition::new(3, 6)), 5, "apply"),
		])
		.unwrap();
		assert_eq!(doc.visible().to_string(), "intro h,\n  simp,\napply h");
		assert_eq!(doc.line(2).as_deref(), Some("  simp,"));
	}

	#[test]
	fn rejects_out_of_bounds_edits() {
		let mut doc = VirtualDocument::standalone("ab\ncd");
		let err = doc.apply(&TextChange::insert(EditorPosition::new(1, 4), "x")).unwrap_err();
		assert_eq!(err, EditError::OutOfBounds(EditorPosition::new(1, 4)));
		assert!(doc.apply(&TextChange::insert(EditorPosition::new(3, 1), "x")).is_err());
		assert_eq!(doc.visible().to_string(), "ab\ncd");
	}

	#[test]
	fn line_strips_crlf() {
		let doc = VirtualDocument::standalone("one\r\ntwo");
		assert_eq!(doc.line(1).as_deref(), Some("one"));
		assert_eq!(doc.line(2).as_deref(), Some("two"));
		assert_eq!(doc.line(3), None);
		assert_eq!(doc.line(0), None);
	}

	#[test]
	fn unicode_separators_are_not_line_breaks() {
		let mut doc = VirtualDocument::standalone("a\u{2028}b\u{85}\nc");
		doc.apply(&TextChange::insert(EditorPosition::new(2, 1), "X")).unwrap();
		assert_eq!(doc.visible().to_string(), "a\u{2028}b\u{85}\nXc");
		assert_eq!(doc.line(1).as_deref(), Some("a\u{2028}b\u{85}"));
		assert_eq!(doc.line(2).as_deref(), Some("Xc"));
		assert_eq!(doc.line(3), None);
	}
}
