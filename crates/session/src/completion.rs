//! Completion items in editor terms.

use lemma_primitives::{EditorPosition, EditorRange};
use serde::Serialize;

use crate::protocol::{CompletionResult, RawCompletion};

/// Kind shown next to a completion label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum CompletionKind {
	/// Every Lean candidate is presented as a function.
	#[default]
	Function,
}

/// One entry of the completion popup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionItem {
	/// Text inserted on accept.
	pub label: String,
	/// Icon kind.
	pub kind: CompletionKind,
	/// Type signature, or the tactic's parameters.
	pub detail: Option<String>,
	/// Doc string.
	pub documentation: Option<String>,
	/// Text replaced on accept: the typed prefix up to the cursor.
	pub range: EditorRange,
}

impl CompletionItem {
	/// Builds an item replacing `prefix_len` chars before `cursor`.
	pub fn from_raw(raw: RawCompletion, cursor: EditorPosition, prefix_len: usize) -> Self {
		let prefix_len = u32::try_from(prefix_len).unwrap_or(u32::MAX);
		let start = EditorPosition::new(cursor.line, cursor.column.saturating_sub(prefix_len).max(1));
		let detail = match raw.tactic_params {
			Some(params) if !params.is_empty() => Some(params.join(" ")),
			_ => raw.signature,
		};
		Self {
			label: raw.text,
			kind: CompletionKind::Function,
			detail,
			documentation: raw.doc,
			range: EditorRange::new(start, cursor),
		}
	}
}

/// Result of [`crate::SessionManager::request_completion`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
	/// Candidates, possibly none.
	Items(Vec<CompletionItem>),
	/// A newer request or an edit superseded this one.
	Cancelled,
}

impl CompletionOutcome {
	/// The items, or an empty list when cancelled.
	pub fn into_items(self) -> Vec<CompletionItem> {
		match self {
			Self::Items(items) => items,
			Self::Cancelled => Vec::new(),
		}
	}

	/// True for [`Self::Cancelled`].
	pub fn is_cancelled(&self) -> bool {
		matches!(self, Self::Cancelled)
	}
}

/// Translates a server response for a request made at `cursor`.
pub fn completion_items(result: CompletionResult, cursor: EditorPosition) -> Vec<CompletionItem> {
	let prefix_len = result.prefix.chars().count();
	result.completions.into_iter().map(|raw| CompletionItem::from_raw(raw, cursor, prefix_len)).collect()
}
