//! Diagnostics fan-out.
//!
//! The server always sends the complete message list across every document.
//! [`DiagnosticsStore`] keeps that snapshot and, for each open document,
//! replaces (never merges) its marker list with the translated subset.

use std::collections::HashMap;

use lemma_primitives::{CoordinateMapper, EditorRange, Event, ReactiveValue, Subscription};
use parking_lot::RwLock;
use serde::Serialize;

use crate::protocol::{DocumentId, ServerMessage, Severity};

/// Editor marker severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerSeverity {
	/// Informational output.
	Info,
	/// Warning.
	Warning,
	/// Error.
	Error,
}

impl From<Severity> for MarkerSeverity {
	fn from(severity: Severity) -> Self {
		match severity {
			Severity::Information => Self::Info,
			Severity::Warning => Self::Warning,
			Severity::Error => Self::Error,
		}
	}
}

/// A diagnostic placed in the visible editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Marker {
	/// Severity.
	pub severity: MarkerSeverity,
	/// Message body.
	pub message: String,
	/// Short heading, possibly empty.
	pub caption: String,
	/// Span in editor coordinates; a point when the server sent no end.
	pub range: EditorRange,
}

impl Marker {
	/// Translates `msg` into editor coordinates.
	///
	/// Messages entirely inside the invisible prefix yield `None`. A span that
	/// starts in the prefix but ends in the editor is clipped to the first cell.
	pub fn from_message(msg: &ServerMessage, mapper: CoordinateMapper) -> Option<Self> {
		let range = match msg.end() {
			None => EditorRange::point(mapper.to_editor(msg.start())?),
			Some(end) => {
				let end = mapper.to_editor(end)?;
				EditorRange::new(mapper.to_editor_clamped(msg.start()), end)
			}
		};
		Some(Self {
			severity: msg.severity.into(),
			message: msg.text.clone(),
			caption: msg.caption.clone(),
			range,
		})
	}
}

/// Marker list published for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerUpdate {
	/// Document the markers belong to.
	pub document: DocumentId,
	/// The complete new list.
	pub markers: Vec<Marker>,
}

/// Latest server snapshot plus per-document marker lists.
#[derive(Debug)]
pub struct DiagnosticsStore {
	all_messages: ReactiveValue<Vec<ServerMessage>>,
	markers: RwLock<HashMap<DocumentId, Vec<Marker>>>,
	updates: Event<MarkerUpdate>,
}

impl Default for DiagnosticsStore {
	fn default() -> Self {
		Self {
			all_messages: ReactiveValue::new(Vec::new()),
			markers: RwLock::new(HashMap::new()),
			updates: Event::new(),
		}
	}
}

impl DiagnosticsStore {
	/// Creates an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Stores a new snapshot and republishes markers for each document in `open`.
	pub fn apply_snapshot<I>(&self, messages: Vec<ServerMessage>, open: I)
	where
		I: IntoIterator<Item = (DocumentId, CoordinateMapper)>,
	{
		tracing::debug!(count = messages.len(), "diagnostics.snapshot");
		self.all_messages.set(messages);
		for (document, mapper) in open {
			self.publish(document, mapper);
		}
	}

	/// Recomputes one document's markers from the stored snapshot.
	pub fn publish(&self, document: DocumentId, mapper: CoordinateMapper) {
		let markers: Vec<Marker> = self.all_messages.with(|messages| {
			messages
				.iter()
				.filter(|msg| msg.document == document)
				.filter_map(|msg| Marker::from_message(msg, mapper))
				.collect()
		});
		tracing::trace!(document = %document, markers = markers.len(), "diagnostics.publish");
		self.markers.write().insert(document.clone(), markers.clone());
		self.updates.fire(MarkerUpdate { document, markers });
	}

	/// Drops the markers of a closed document.
	pub fn forget(&self, document: &DocumentId) {
		self.markers.write().remove(document);
	}

	/// Markers last published for `document`.
	pub fn markers(&self, document: &DocumentId) -> Vec<Marker> {
		self.markers.read().get(document).cloned().unwrap_or_default()
	}

	/// Raw server messages for `document` from the last snapshot.
	pub fn messages_for(&self, document: &DocumentId) -> Vec<ServerMessage> {
		self.all_messages.with(|messages| messages.iter().filter(|msg| &msg.document == document).cloned().collect())
	}

	/// The whole last snapshot.
	pub fn all_messages(&self) -> &ReactiveValue<Vec<ServerMessage>> {
		&self.all_messages
	}

	/// Number of error markers currently shown for `document`.
	pub fn error_count(&self, document: &DocumentId) -> usize {
		self.count(document, MarkerSeverity::Error)
	}

	/// Number of warning markers currently shown for `document`.
	pub fn warning_count(&self, document: &DocumentId) -> usize {
		self.count(document, MarkerSeverity::Warning)
	}

	fn count(&self, document: &DocumentId, severity: MarkerSeverity) -> usize {
		self.markers
			.read()
			.get(document)
			.map_or(0, |markers| markers.iter().filter(|m| m.severity == severity).count())
	}

	/// Subscribes to per-document marker lists.
	#[must_use = "dropping the subscription detaches the handler"]
	pub fn subscribe<F>(&self, handler: F) -> Subscription
	where
		F: Fn(&MarkerUpdate) + Send + Sync + 'static,
	{
		self.updates.on(handler)
	}
}

#[cfg(test)]
mod tests {
	use lemma_primitives::EditorPosition;
	use pretty_assertions::assert_eq;

	use super::*;

	fn msg(document: &str, line: u32, column: u32, end: Option<(u32, u32)>, severity: Severity) -> ServerMessage {
		ServerMessage {
			document: document.into(),
			line,
			column,
			end_line: end.map(|(l, _)| l),
			end_column: end.map(|(_, c)| c),
			severity,
			text: format!("{severity:?} at {line}:{column}"),
			caption: String::new(),
		}
	}

	#[test]
	fn marker_shifts_lines_and_columns() {
		let marker = Marker::from_message(&msg("a", 14, 2, Some((14, 9)), Severity::Error), CoordinateMapper::new(10)).unwrap();
		assert_eq!(marker.range, EditorRange::new(EditorPosition::new(4, 3), EditorPosition::new(4, 10)));
		assert_eq!(marker.severity, MarkerSeverity::Error);

		let point = Marker::from_message(&msg("a", 11, 0, None, Severity::Warning), CoordinateMapper::new(10)).unwrap();
		assert_eq!(point.range, EditorRange::point(EditorPosition::new(1, 1)));
	}

	#[test]
	fn prefix_messages_are_hidden_or_clipped() {
		let mapper = CoordinateMapper::new(5);
		assert_eq!(Marker::from_message(&msg("a", 3, 0, None, Severity::Error), mapper), None);
		assert_eq!(Marker::from_message(&msg("a", 3, 0, Some((5, 4)), Severity::Error), mapper), None);

		let clipped = Marker::from_message(&msg("a", 3, 0, Some((7, 4)), Severity::Error), mapper).unwrap();
		assert_eq!(clipped.range, EditorRange::new(EditorPosition::new(1, 1), EditorPosition::new(2, 5)));
	}

	#[test]
	fn snapshots_replace_previous_markers() {
		let store = DiagnosticsStore::new();
		let a = DocumentId::from("a");
		let b = DocumentId::from("b");
		let open = || [(a.clone(), CoordinateMapper::default()), (b.clone(), CoordinateMapper::default())];

		store.apply_snapshot(
			vec![
				msg("a", 1, 0, None, Severity::Error),
				msg("a", 2, 0, None, Severity::Warning),
				msg("b", 1, 0, None, Severity::Error),
			],
			open(),
		);
		assert_eq!(store.error_count(&a), 1);
		assert_eq!(store.warning_count(&a), 1);
		assert_eq!(store.markers(&b).len(), 1);

		store.apply_snapshot(vec![msg("a", 3, 0, None, Severity::Information)], open());
		assert_eq!(store.markers(&a).len(), 1);
		assert_eq!(store.markers(&a)[0].severity, MarkerSeverity::Info);
		assert!(store.markers(&b).is_empty());
		assert_eq!(store.messages_for(&a).len(), 1);
	}

	#[test]
	fn publishes_one_update_per_open_document() {
		let store = DiagnosticsStore::new();
		let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
		let sink = std::sync::Arc::clone(&seen);
		let _sub = store.subscribe(move |update| sink.lock().push((update.document.clone(), update.markers.len())));

		store.apply_snapshot(vec![msg("a", 1, 0, None, Severity::Error), msg("closed", 1, 0, None, Severity::Error)], [(DocumentId::from("a"), CoordinateMapper::default())]);
		assert_eq!(*seen.lock(), vec![(DocumentId::from("a"), 1)]);
		assert_eq!(store.all_messages().value().len(), 2);
	}
}
