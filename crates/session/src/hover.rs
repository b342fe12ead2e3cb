//! Hover contents built from an `info` record.

use lemma_primitives::{EditorPosition, EditorRange};
use serde::Serialize;

use crate::protocol::InfoRecord;

/// One block of hover content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MarkedString {
	/// Fenced code in `language`.
	Code {
		/// Highlighting language, `lean` or `text`.
		language: String,
		/// The code.
		value: String,
	},
	/// Markdown prose.
	Markdown(String),
}

impl MarkedString {
	fn code(language: &str, value: impl Into<String>) -> Self {
		Self::Code {
			language: language.to_owned(),
			value: value.into(),
		}
	}
}

/// Hover popup contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HoverInfo {
	/// Blocks, top to bottom. Empty when the server knows nothing.
	pub contents: Vec<MarkedString>,
	/// Anchor of the popup.
	pub range: Option<EditorRange>,
}

impl HoverInfo {
	/// Nothing to show.
	pub fn empty() -> Self {
		Self::default()
	}

	/// True if there is nothing to show.
	pub fn is_empty(&self) -> bool {
		self.contents.is_empty()
	}

	/// Formats `record` as hover blocks anchored at `at`.
	///
	/// The signature block is omitted when the record has no name. Tactics
	/// show their parameters as plain text; everything else shows
	/// `name : type` as Lean.
	pub fn from_record(record: &InfoRecord, at: EditorPosition) -> Self {
		let mut contents = Vec::new();

		if let Some(name) = record.name() {
			match (&record.tactic_params, &record.signature) {
				(Some(params), _) if !params.is_empty() => {
					contents.push(MarkedString::code("text", format!("{name} {}", params.join(" "))));
				}
				(_, Some(signature)) => contents.push(MarkedString::code("lean", format!("{name} : {signature}"))),
				_ => contents.push(MarkedString::code("lean", name)),
			}
		}
		if let Some(doc) = record.doc.as_deref().filter(|doc| !doc.is_empty()) {
			contents.push(MarkedString::Markdown(doc.to_owned()));
		}
		if let Some(state) = record.state.as_deref().filter(|state| !state.is_empty()) {
			contents.push(MarkedString::code("lean", state));
		}

		Self {
			contents,
			range: Some(EditorRange::point(at)),
		}
	}
}
