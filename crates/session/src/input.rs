//! Backslash abbreviation input (`\alpha` → `α`) as editor edits.

use std::sync::Arc;

use lemma_primitives::{AbbreviationMatch, AbbreviationTable, ContentChange, EditorPosition, EditorRange};

/// Edit for the editor host to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
	/// Span to replace, on a single line.
	pub range: EditorRange,
	/// Replacement text.
	pub text: String,
	/// Where the cursor goes afterwards.
	pub cursor: EditorPosition,
}

/// Turns abbreviation matches into [`TextEdit`]s for the three input paths:
/// typing a trigger character, the cursor affordance check and the manual
/// expand command.
#[derive(Debug, Clone)]
pub struct AbbreviationInput {
	table: Arc<AbbreviationTable>,
	triggers: Vec<char>,
}

impl AbbreviationInput {
	/// Creates an expander over `table` triggered by any char in `triggers`.
	pub fn new(table: Arc<AbbreviationTable>, triggers: &str) -> Self {
		Self {
			table,
			triggers: triggers.chars().collect(),
		}
	}

	/// The shortcut table.
	pub fn table(&self) -> &AbbreviationTable {
		&self.table
	}

	/// Trigger path. `line_text` is the line the change landed on, with the
	/// change already applied. Only a single insertion of exactly one trigger
	/// char qualifies; the trigger stays after the replacement.
	pub fn on_content_change(&self, change: &ContentChange, line_text: &str) -> Option<TextEdit> {
		let edit = change.as_single()?;
		if !edit.is_insertion() {
			return None;
		}
		let mut chars = edit.text.chars();
		let trigger = chars.next()?;
		if chars.next().is_some() || !self.triggers.contains(&trigger) {
			return None;
		}

		let at = edit.range.start;
		let found = self.find(line_text, at)?;
		let (range, text) = replacement(at.line, &found, at.column);
		let cursor = EditorPosition::new(at.line, range.start.column + found_len(&found) + 1);
		tracing::trace!(key = found.key, trigger = %trigger, "abbreviation.expand");
		Some(TextEdit { range, text, cursor })
	}

	/// Whether a shortcut ends right before `cursor`.
	pub fn can_expand_at(&self, line_text: &str, cursor: EditorPosition) -> bool {
		self.find(line_text, cursor).is_some()
	}

	/// Manual command: expands the shortcut ending at `cursor`.
	pub fn expand_at(&self, line_text: &str, cursor: EditorPosition) -> Option<TextEdit> {
		let found = self.find(line_text, cursor)?;
		let (range, text) = replacement(cursor.line, &found, cursor.column);
		let cursor = EditorPosition::new(cursor.line, range.start.column + found_len(&found));
		Some(TextEdit { range, text, cursor })
	}

	fn find<'a>(&'a self, line_text: &'a str, cursor: EditorPosition) -> Option<AbbreviationMatch<'a>> {
		let column = usize::try_from(cursor.column.checked_sub(1)?).ok()?;
		self.table.find(line_text, column)
	}
}

fn found_len(found: &AbbreviationMatch<'_>) -> u32 {
	u32::try_from(found.replacement_len()).unwrap_or(u32::MAX)
}

/// Range from the backslash up to (not including) `end_column`.
fn replacement(line: u32, found: &AbbreviationMatch<'_>, end_column: u32) -> (EditorRange, String) {
	let start = u32::try_from(found.start).unwrap_or(u32::MAX).saturating_add(1);
	(EditorRange::new(EditorPosition::new(line, start), EditorPosition::new(line, end_column)), found.replacement.to_owned())
}
