//! Message filter for the goal/info panel.

use lemma_primitives::ServerPosition;
use serde::{Deserialize, Serialize};

use crate::protocol::{DocumentId, ServerMessage};

/// What the info panel lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
	/// Only messages covering the cursor, next to the goal state.
	#[default]
	OnlyState,
	/// Every message of the document.
	AllMessages,
}

/// Whether `msg` covers `cursor`. End columns are inclusive; a message
/// without an end covers only its start line.
pub fn covers(msg: &ServerMessage, cursor: ServerPosition) -> bool {
	let ServerPosition { line, column } = cursor;
	let end_line = msg.end_line.filter(|&l| l > 0);
	let within_lines = match end_line {
		None => line == msg.line,
		Some(end) => line <= end,
	};
	msg.line <= line
		&& within_lines
		&& (line != msg.line || msg.column <= column)
		&& (end_line != Some(line) || msg.end_column.is_some_and(|end| end >= column))
}

/// Messages of `document` the panel shows in `mode`.
///
/// Without a cursor, [`DisplayMode::OnlyState`] shows nothing.
pub fn messages_at<'a>(messages: &'a [ServerMessage], document: &DocumentId, cursor: Option<ServerPosition>, mode: DisplayMode) -> Vec<&'a ServerMessage> {
	let in_document = messages.iter().filter(|msg| &msg.document == document);
	match (mode, cursor) {
		(DisplayMode::AllMessages, _) => in_document.collect(),
		(DisplayMode::OnlyState, Some(cursor)) => in_document.filter(|msg| covers(msg, cursor)).collect(),
		(DisplayMode::OnlyState, None) => Vec::new(),
	}
}
