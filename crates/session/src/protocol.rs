//! Message shapes exchanged with the Lean server.
//!
//! Field names follow the server's JSON (`file_name`, `pos_line`, `full-id`,
//! ...). Lines are absolute and 1-based, columns 0-based.

use std::borrow::Borrow;
use std::fmt;

use lemma_primitives::ServerPosition;
use serde::{Deserialize, Serialize};

/// Stable key of an open document (file path or URI).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
	/// Wraps a path or URI.
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	/// The raw key.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for DocumentId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for DocumentId {
	fn from(id: &str) -> Self {
		Self(id.to_owned())
	}
}

impl From<String> for DocumentId {
	fn from(id: String) -> Self {
		Self(id)
	}
}

impl Borrow<str> for DocumentId {
	fn borrow(&self) -> &str {
		&self.0
	}
}

/// Diagnostic severity as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
	/// Informational output (`#check`, `#eval`, traces).
	Information,
	/// Warning, e.g. a proof using `sorry`.
	Warning,
	/// Elaboration error.
	Error,
}

/// One diagnostic from an `all_messages` snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMessage {
	/// Document the message belongs to.
	#[serde(rename = "file_name")]
	pub document: DocumentId,
	/// Start line (absolute, 1-based).
	#[serde(rename = "pos_line")]
	pub line: u32,
	/// Start column (0-based).
	#[serde(rename = "pos_col")]
	pub column: u32,
	/// End line, when the server reports a span.
	#[serde(rename = "end_pos_line", default, skip_serializing_if = "Option::is_none")]
	pub end_line: Option<u32>,
	/// End column, when the server reports a span.
	#[serde(rename = "end_pos_col", default, skip_serializing_if = "Option::is_none")]
	pub end_column: Option<u32>,
	/// Severity.
	pub severity: Severity,
	/// Message body.
	pub text: String,
	/// Short heading, e.g. `"tactic failed"`.
	#[serde(default)]
	pub caption: String,
}

impl ServerMessage {
	/// Start position.
	pub fn start(&self) -> ServerPosition {
		ServerPosition::new(self.line, self.column)
	}

	/// End position, if both halves were reported. A zero end line counts as absent.
	pub fn end(&self) -> Option<ServerPosition> {
		match (self.end_line, self.end_column) {
			(Some(line), Some(column)) if line > 0 => Some(ServerPosition::new(line, column)),
			_ => None,
		}
	}
}

/// One candidate from a `complete` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCompletion {
	/// Identifier to insert.
	pub text: String,
	/// Type signature.
	#[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
	pub signature: Option<String>,
	/// Doc string.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub doc: Option<String>,
	/// Parameter names for interactive tactics.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub tactic_params: Option<Vec<String>>,
}

/// Body of a `complete` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResult {
	/// Candidates; absent when the server has none.
	#[serde(default)]
	pub completions: Vec<RawCompletion>,
	/// Text before the cursor the candidates replace.
	#[serde(default)]
	pub prefix: String,
}

/// What the server knows about a position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoRecord {
	/// Fully qualified name.
	#[serde(rename = "full-id", default, skip_serializing_if = "Option::is_none")]
	pub full_id: Option<String>,
	/// Plain name when there is no qualified one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub text: Option<String>,
	/// Type of the term.
	#[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
	pub signature: Option<String>,
	/// Doc string.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub doc: Option<String>,
	/// Tactic state (goals) at the position.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub state: Option<String>,
	/// Parameter names for interactive tactics.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub tactic_params: Option<Vec<String>>,
}

impl InfoRecord {
	/// Qualified name, falling back to the plain name.
	pub fn name(&self) -> Option<&str> {
		self.full_id.as_deref().or(self.text.as_deref()).filter(|name| !name.is_empty())
	}
}

/// Body of an `info` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoResponse {
	/// Absent when the server has nothing at the position.
	#[serde(default)]
	pub record: Option<InfoRecord>,
}
