use std::time::Duration;

use lemma_primitives::{EditorRange, ServerPosition, TextChange};
use pretty_assertions::assert_eq;
use tokio::time::advance;

use super::*;
use crate::diagnostics::MarkerUpdate;
use crate::hover::MarkedString;
use crate::protocol::{CompletionResult, InfoResponse, RawCompletion, ServerMessage, Severity};
use crate::test_support::{Call, RecordingTransport, settle};

fn manager(transport: &Arc<RecordingTransport>) -> SessionManager {
	let table = AbbreviationTable::from_pairs([("alpha", "α"), ("N", "ℕ")]);
	SessionManager::with_table(Arc::clone(transport) as Arc<dyn AnalysisTransport>, &SessionConfig::default(), table)
}

fn doc() -> DocumentId {
	DocumentId::from("/game/world1/level3.lean")
}

fn message(document: &str, line: u32, column: u32, severity: Severity) -> ServerMessage {
	ServerMessage {
		document: document.into(),
		line,
		column,
		end_line: None,
		end_column: None,
		severity,
		text: "type mismatch".into(),
		caption: String::new(),
	}
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn connect_is_idempotent() {
	let transport = RecordingTransport::new();
	let manager = manager(&transport);
	assert!(!manager.is_connected());

	manager.connect().await.unwrap();
	manager.connect().await.unwrap();
	assert!(manager.is_connected());
	assert_eq!(transport.calls(), vec![Call::Connect]);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn document_operations_require_connection() {
	let transport = RecordingTransport::new();
	let manager = manager(&transport);
	let changes = Event::new();

	assert!(matches!(manager.open_document(doc(), VirtualDocument::standalone(""), &changes), Err(Error::NotConnected)));
	assert!(matches!(manager.request_hover(&doc(), EditorPosition::new(1, 1)).await, Err(Error::NotConnected)));

	manager.connect().await.unwrap();
	let _session = manager.open_document(doc(), VirtualDocument::standalone(""), &changes).unwrap();
	assert!(matches!(manager.open_document(doc(), VirtualDocument::standalone(""), &changes), Err(Error::AlreadyOpen(_))));
	assert!(matches!(manager.close_document(&DocumentId::from("other")), Err(Error::UnknownDocument(_))));
	assert!(matches!(manager.request_info(&DocumentId::from("other"), EditorPosition::new(1, 1)).await, Err(Error::UnknownDocument(_))));
	assert_eq!(manager.open_documents(), vec![doc()]);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn snapshots_fan_out_per_document_in_editor_coordinates() {
	let transport = RecordingTransport::new();
	let manager = manager(&transport);
	manager.connect().await.unwrap();
	let changes = Event::new();
	let _session = manager.open_document(doc(), VirtualDocument::new("import data.nat\nopen nat\n", "example : 2 + 2 = 4 :=\nbegin\n  refl\nend", ""), &changes).unwrap();

	let updates = Arc::new(Mutex::new(Vec::<MarkerUpdate>::new()));
	let sink = Arc::clone(&updates);
	let _sub = manager.diagnostics().subscribe(move |update| sink.lock().push(update.clone()));

	transport.emit(TransportEvent::AllMessages(vec![
		message(doc().as_str(), 5, 2, Severity::Error),
		message(doc().as_str(), 1, 0, Severity::Warning),
		message("/game/world1/level4.lean", 3, 0, Severity::Error),
	]));
	settle().await;

	let markers = manager.diagnostics().markers(&doc());
	assert_eq!(markers.len(), 1);
	assert_eq!(markers[0].range, EditorRange::point(EditorPosition::new(3, 3)));
	assert_eq!(manager.diagnostics().all_messages().value().len(), 3);

	transport.emit(TransportEvent::AllMessages(Vec::new()));
	settle().await;
	assert!(manager.diagnostics().markers(&doc()).is_empty());

	let updates = updates.lock();
	assert_eq!(updates.len(), 2);
	assert!(updates.iter().all(|update| update.document == doc()));
	assert!(updates[1].markers.is_empty());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn opening_publishes_markers_from_last_snapshot() {
	let transport = RecordingTransport::new();
	let manager = manager(&transport);
	manager.connect().await.unwrap();

	transport.emit(TransportEvent::AllMessages(vec![message(doc().as_str(), 2, 0, Severity::Error)]));
	settle().await;
	assert!(manager.diagnostics().markers(&doc()).is_empty());

	let changes = Event::new();
	let _session = manager.open_document(doc(), VirtualDocument::new("-- header\n", "sorry", ""), &changes).unwrap();
	assert_eq!(manager.diagnostics().error_count(&doc()), 1);

	manager.close_document(&doc()).unwrap();
	assert_eq!(manager.diagnostics().error_count(&doc()), 0);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn newer_completion_supersedes_older_and_syncs_first() {
	let transport = RecordingTransport::new();
	transport.set_completion(CompletionResult {
		completions: vec![RawCompletion {
			text: "nat.succ".into(),
			signature: Some("ℕ → ℕ".into()),
			doc: None,
			tactic_params: None,
		}],
		prefix: "nat.su".into(),
	});
	let manager = manager(&transport);
	manager.connect().await.unwrap();
	let changes = Event::new();
	let _session = manager.open_document(doc(), VirtualDocument::new("import data.nat\n", "#check nat.su", ""), &changes).unwrap();
	settle().await;

	let id = doc();
	let cursor = EditorPosition::new(1, 14);
	let (first, second) = tokio::join!(manager.request_completion(&id, cursor), async {
		advance(Duration::from_millis(500)).await;
		manager.request_completion(&id, cursor).await
	});

	assert_eq!(first.unwrap(), CompletionOutcome::Cancelled);
	let items = second.unwrap().into_items();
	assert_eq!(items.len(), 1);
	assert_eq!(items[0].label, "nat.succ");
	assert_eq!(items[0].range, EditorRange::new(EditorPosition::new(1, 8), cursor));

	let calls = transport.calls();
	let complete = calls.iter().position(|call| matches!(call, Call::Complete { .. })).unwrap();
	assert!(matches!(&calls[complete - 1], Call::Sync { content, .. } if content == "import data.nat\n#check nat.su"));
	assert_eq!(
		calls[complete],
		Call::Complete {
			document: doc(),
			position: ServerPosition::new(2, 13),
		}
	);
	assert_eq!(calls.iter().filter(|call| matches!(call, Call::Complete { .. })).count(), 1);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn typing_cancels_pending_completion() {
	let transport = RecordingTransport::new();
	let manager = manager(&transport);
	manager.connect().await.unwrap();
	let changes = Event::new();
	let _session = manager.open_document(doc(), VirtualDocument::standalone("nat"), &changes).unwrap();

	let id = doc();
	let (outcome, ()) = tokio::join!(manager.request_completion(&id, EditorPosition::new(1, 4)), async {
		advance(Duration::from_millis(200)).await;
		changes.fire(ContentChange::single(TextChange::insert(EditorPosition::new(1, 4), ".")));
	});
	assert!(outcome.unwrap().is_cancelled());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn hover_translates_position_and_formats_record() {
	let transport = RecordingTransport::new();
	let manager = manager(&transport);
	manager.connect().await.unwrap();
	let changes = Event::new();
	let _session = manager.open_document(doc(), VirtualDocument::new("a\nb\nc\n", "rw nat.add_comm", ""), &changes).unwrap();

	let at = EditorPosition::new(1, 5);
	assert!(manager.request_hover(&doc(), at).await.unwrap().is_empty());

	transport.set_info(InfoResponse {
		record: Some(InfoRecord {
			full_id: Some("nat.add_comm".into()),
			signature: Some("∀ (n m : ℕ), n + m = m + n".into()),
			..InfoRecord::default()
		}),
	});
	let hover = manager.request_hover(&doc(), at).await.unwrap();
	assert_eq!(
		hover.contents,
		vec![MarkedString::Code {
			language: "lean".into(),
			value: "nat.add_comm : ∀ (n m : ℕ), n + m = m + n".into(),
		}]
	);
	assert_eq!(
		transport.calls().last(),
		Some(&Call::Info {
			document: doc(),
			position: ServerPosition::new(4, 4),
		})
	);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn server_errors_reach_error_event() {
	let transport = RecordingTransport::new();
	let manager = manager(&transport);
	let failures = Arc::new(Mutex::new(Vec::new()));
	let sink = Arc::clone(&failures);
	let _sub = manager.errors().on(move |failure| sink.lock().push(failure.clone()));

	manager.connect().await.unwrap();
	transport.emit(TransportEvent::Error("out of memory".into()));
	settle().await;

	assert_eq!(
		*failures.lock(),
		vec![TransportFailure {
			document: None,
			message: "out of memory".into(),
		}]
	);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn running_set_tracks_open_document_until_acknowledged() {
	let transport = RecordingTransport::new();
	transport.hold_syncs(true);
	let manager = manager(&transport);
	manager.connect().await.unwrap();
	let changes = Event::new();
	let _session = manager.open_document(doc(), VirtualDocument::standalone("x"), &changes).unwrap();
	settle().await;
	assert_eq!(manager.running().snapshot(), vec![doc()]);

	transport.release(0, Ok(()));
	settle().await;
	assert!(manager.running().is_empty());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn expands_abbreviations_on_mirrored_lines() {
	let transport = RecordingTransport::new();
	let manager = manager(&transport);
	manager.connect().await.unwrap();
	let changes = Event::new();
	let _session = manager.open_document(doc(), VirtualDocument::standalone("foo \\alpha"), &changes).unwrap();

	let change = ContentChange::single(TextChange::insert(EditorPosition::new(1, 11), " "));
	changes.fire(change.clone());
	let edit = manager.expand_on_change(&doc(), &change).unwrap();
	assert_eq!(edit.text, "α");
	assert_eq!(edit.range, EditorRange::new(EditorPosition::new(1, 5), EditorPosition::new(1, 11)));

	let _other = manager.open_document("b.lean", VirtualDocument::standalone("x : \\N"), &Event::new()).unwrap();
	let b = DocumentId::from("b.lean");
	assert!(manager.can_expand(&b, EditorPosition::new(1, 7)));
	assert_eq!(manager.expand(&b, EditorPosition::new(1, 7)).map(|edit| edit.text), Some("ℕ".to_string()));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn shutdown_is_terminal() {
	let transport = RecordingTransport::new();
	let manager = manager(&transport);
	manager.connect().await.unwrap();
	let changes = Event::new();
	let session = manager.open_document(doc(), VirtualDocument::standalone("x"), &changes).unwrap();

	manager.shutdown().await.unwrap();
	manager.shutdown().await.unwrap();
	assert!(session.is_closed());
	assert!(manager.running().is_empty());
	assert!(!manager.is_connected());
	assert!(matches!(manager.connect().await, Err(Error::ServiceStopped)));
	assert!(matches!(manager.open_document(doc(), VirtualDocument::standalone(""), &changes), Err(Error::ServiceStopped)));
}
